//! Configuration validation
//!
//! Pure functions over `InstallConfig`, `HostFacts` and `HostUsage`.
//! Nothing here mutates state or touches the system.
//!
//! - `validate` is the aggregate gate: every rule is evaluated, in a fixed
//!   order, and all failure messages are returned together.
//! - The `check_*` functions are narrow validators used at the point of
//!   entry. They distinguish blocking failures from advisory warnings.

use crate::config::InstallConfig;
use crate::probe::{HostFacts, HostUsage};
use crate::types::parse_size;

/// Smallest EFI system partition accepted
pub const MIN_EFI_BYTES: u64 = 100 * 1024 * 1024;
/// EFI sizes above this only warrant a warning
pub const MAX_EFI_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// Minimum host memory in whole GB
pub const MIN_RAM_GB: u64 = 2;
/// Below this much RAM, swap smaller than RAM is flagged
pub const SWAP_ADVICE_RAM_GB: u64 = 8;
/// Longest pool name ZFS accepts
pub const MAX_POOL_NAME_LEN: usize = 256;

const GIB: u64 = 1024 * 1024 * 1024;

/// Outcome of a narrow validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Advisory, shown but never blocking
    Warn(String),
    /// Blocking
    Fail(String),
}

impl Verdict {
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Warn(msg) | Self::Fail(msg) => Some(msg),
        }
    }
}

/// Check the configuration against the structural and host-resource rules.
///
/// Returns every failure message (empty = valid). Rules are evaluated in
/// order without short-circuiting:
///
/// 1. mode selected
/// 2. at least one drive
/// 3. drive count meets the RAID level minimum (skipped with no drives,
///    which rule 2 already reports)
/// 4. EFI firmware
/// 5. at least 2 GB of RAM
pub fn validate(config: &InstallConfig, facts: &HostFacts) -> Vec<String> {
    let mut failures = Vec::new();

    if config.mode().is_none() {
        failures.push("Installation mode not selected".to_string());
    }

    let count = config.devices().len();
    if count == 0 {
        failures.push("No drives selected".to_string());
    }

    let level = config.raid_level();
    let min = level.min_devices();
    if count > 0 && count < min {
        failures.push(format!(
            "{} requires at least {} drive{}",
            level.label(),
            min,
            if min == 1 { "" } else { "s" }
        ));
    }

    if !facts.firmware.is_efi() {
        failures.push("EFI boot mode required (BIOS systems are not supported)".to_string());
    }

    if facts.ram_gb < MIN_RAM_GB {
        failures.push(format!(
            "At least {} GB of RAM required (found {} GB)",
            MIN_RAM_GB, facts.ram_gb
        ));
    }

    failures
}

/// EFI partition size: 100 MiB minimum, warn above 2 GiB.
pub fn check_efi_size(size: &str) -> Verdict {
    let Some(bytes) = parse_size(size) else {
        return Verdict::Fail(format!("Invalid EFI size '{}' (examples: 512M, 1G)", size));
    };
    if bytes < MIN_EFI_BYTES {
        Verdict::Fail(format!("EFI partition must be at least 100M (got {})", size))
    } else if bytes > MAX_EFI_BYTES {
        Verdict::Warn(format!(
            "EFI partition of {} is larger than the usual 2G maximum",
            size
        ))
    } else {
        Verdict::Pass
    }
}

/// Swap size: `0` disables swap; sizing advice is never blocking.
pub fn check_swap_size(size: &str, ram_gb: u64) -> Verdict {
    if size.trim() == "0" {
        return Verdict::Pass;
    }
    let Some(bytes) = parse_size(size) else {
        return Verdict::Fail(format!(
            "Invalid swap size '{}' (examples: 4G, 16G, 0 to disable)",
            size
        ));
    };
    let ram_bytes = ram_gb * GIB;
    if bytes > ram_bytes * 2 {
        Verdict::Warn(format!(
            "Swap of {} is more than twice the installed RAM ({} GB)",
            size, ram_gb
        ))
    } else if ram_gb < SWAP_ADVICE_RAM_GB && bytes < ram_bytes {
        Verdict::Warn(format!(
            "With only {} GB of RAM, swap should be at least as large as RAM",
            ram_gb
        ))
    } else {
        Verdict::Pass
    }
}

/// Pool name: non-empty, at most 256 chars, `[A-Za-z0-9_.-]`, and not an
/// already-imported pool unless `force` is set.
pub fn check_pool_name(name: &str, existing_pools: &[String], force: bool) -> Verdict {
    if name.is_empty() {
        return Verdict::Fail("Pool name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_POOL_NAME_LEN {
        return Verdict::Fail(format!(
            "Pool name must be at most {} characters",
            MAX_POOL_NAME_LEN
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Verdict::Fail(
            "Pool name may only contain letters, digits, '_', '.' and '-'".to_string(),
        );
    }
    if existing_pools.iter().any(|p| p == name) {
        if force {
            return Verdict::Warn(format!(
                "Pool '{}' already exists and will be replaced (--force)",
                name
            ));
        }
        return Verdict::Fail(format!(
            "Pool '{}' already exists on this system (use --force to override)",
            name
        ));
    }
    Verdict::Pass
}

/// Ashift: empty means auto-detect, otherwise an integer from 9 to 16.
pub fn check_ashift(value: &str) -> Result<Option<u8>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<u8>() {
        Ok(n) if (9..=16).contains(&n) => Ok(Some(n)),
        _ => Err(format!(
            "Ashift must be a number from 9 to 16, or empty for auto (got '{}')",
            value
        )),
    }
}

/// Hostname: empty means unset, otherwise a single DNS label.
pub fn check_hostname(value: &str) -> Result<Option<String>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let valid = value.len() <= 63
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');
    if valid {
        Ok(Some(value.to_string()))
    } else {
        Err(format!(
            "Invalid hostname '{}' (1-63 letters, digits or '-', not starting or ending with '-')",
            value
        ))
    }
}

/// Selected drives must not be mounted, belong to an md array or an
/// imported pool, or have a holder such as a dm-crypt or LVM mapping.
pub fn check_device_conflicts(devices: &[String], usage: &HostUsage) -> Vec<String> {
    let mut failures = Vec::new();
    for device in devices {
        let mounts = usage.mountpoints_of(device);
        if !mounts.is_empty() {
            failures.push(format!(
                "{} is in use: mounted at {}",
                device,
                mounts.join(", ")
            ));
        }
        let arrays = usage.raid_arrays_of(device);
        if !arrays.is_empty() {
            failures.push(format!(
                "{} is a member of RAID array {}",
                device,
                arrays.join(", ")
            ));
        }
        // md arrays also show up as holders
        for holder in usage.holders_of(device) {
            if arrays.contains(&holder.holder.as_str()) {
                continue;
            }
            failures.push(format!(
                "{} is in use: {} is held by {}",
                device,
                holder.device,
                holder.label()
            ));
        }
        let pools = usage.imported_pools_of(device);
        if !pools.is_empty() {
            failures.push(format!(
                "{} belongs to imported ZFS pool {}",
                device,
                pools.join(", ")
            ));
        }
    }
    failures
}

/// Everything the validation screen shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Text block listing failures, then warnings.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for failure in &self.failures {
            lines.push(format!("✗ {}", failure));
        }
        for warning in &self.warnings {
            lines.push(format!("⚠ {}", warning));
        }
        if lines.is_empty() {
            lines.push("✓ All checks passed".to_string());
        }
        lines.join("\n")
    }
}

/// The full pre-confirmation gate: `validate` plus host conflict checks,
/// with the narrow validators' warnings attached as advice.
pub fn validation_report(
    config: &InstallConfig,
    facts: &HostFacts,
    usage: &HostUsage,
    force: bool,
) -> ValidationReport {
    let mut report = ValidationReport {
        failures: validate(config, facts),
        warnings: Vec::new(),
    };
    report
        .failures
        .extend(check_device_conflicts(config.devices(), usage));

    for verdict in [
        check_pool_name(config.pool_name(), &usage.pools, force),
        check_efi_size(config.efi_size()),
        check_swap_size(config.swap_size(), facts.ram_gb),
    ] {
        match verdict {
            Verdict::Pass => {}
            Verdict::Warn(msg) => report.warnings.push(msg),
            Verdict::Fail(msg) => report.failures.push(msg),
        }
    }
    report
}
