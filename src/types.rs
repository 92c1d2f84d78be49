//! Type-safe configuration types for the wizard
//!
//! Constrained settings are enums rather than strings, so the RAID minimum
//! table and the backend flag values are checked exhaustively by the compiler.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Installation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InstallMode {
    /// Fresh install onto empty drives (destroys their contents)
    New,
    /// Migrate the running system onto a new ZFS pool
    Existing,
}

impl InstallMode {
    /// Menu label shown on the mode selection screen
    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New Installation",
            Self::Existing => "Migrate System",
        }
    }

    /// One-line explanation shown next to the label
    pub fn description(self) -> &'static str {
        match self {
            Self::New => "Install ZFS on empty drives (DESTROYS data)",
            Self::Existing => "Copy running system to new ZFS installation",
        }
    }
}

/// Pool redundancy layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RaidLevel {
    #[default]
    None,
    Mirror,
    Raidz1,
    Raidz2,
    Raidz3,
}

impl RaidLevel {
    /// Minimum number of selected drives the layout needs
    pub const fn min_devices(self) -> usize {
        match self {
            Self::None => 1,
            Self::Mirror => 2,
            Self::Raidz1 => 3,
            Self::Raidz2 => 4,
            Self::Raidz3 => 5,
        }
    }

    /// Human-readable name used in validator messages and summaries
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "Single drive / stripe",
            Self::Mirror => "Mirror",
            Self::Raidz1 => "RAIDZ1",
            Self::Raidz2 => "RAIDZ2",
            Self::Raidz3 => "RAIDZ3",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::None => "No redundancy",
            Self::Mirror => "Every drive holds a full copy",
            Self::Raidz1 => "Single parity, survives 1 drive failure",
            Self::Raidz2 => "Double parity, survives 2 drive failures",
            Self::Raidz3 => "Triple parity, survives 3 drive failures",
        }
    }
}

/// Dataset compression algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Lz4,
    Lzjb,
    Gzip,
    Off,
}

impl Compression {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Zstd => "Best ratio with good speed (recommended)",
            Self::Lz4 => "Fastest, lower ratio",
            Self::Lzjb => "Legacy ZFS default",
            Self::Gzip => "High ratio, CPU heavy",
            Self::Off => "No compression",
        }
    }
}

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Parse a size-with-unit string such as `512M`, `1G`, `1.5GiB` or `100MiB`.
///
/// Units are binary multiples and case-insensitive; a bare number is bytes.
/// Returns `None` for anything else (negative, empty, unknown unit).
pub fn parse_size(input: &str) -> Option<u64> {
    let input = input.trim();
    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);
    if number.is_empty() {
        return None;
    }

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KIB,
        "m" | "mb" | "mib" => MIB,
        "g" | "gb" | "gib" => GIB,
        "t" | "tb" | "tib" => TIB,
        _ => return None,
    };

    if number.contains('.') {
        let value: f64 = number.parse().ok()?;
        Some((value * multiplier as f64) as u64)
    } else {
        number.parse::<u64>().ok()?.checked_mul(multiplier)
    }
}

/// Format a byte count for device listings (`931GB`, `3TB`).
pub fn format_size(bytes: u64) -> String {
    let gb = bytes / GIB;
    if gb > 1024 {
        format!("{}TB", gb / 1024)
    } else {
        format!("{}GB", gb)
    }
}
