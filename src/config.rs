//! Installation configuration model
//!
//! `InstallConfig` is the single source of truth for everything the operator
//! has entered during a session. Setters are plain overwrites: business rules
//! live in `validator`, never here.

use crate::command::{self, BackendInvocation};
use crate::types::{Compression, InstallMode, RaidLevel};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Default EFI system partition size
pub const DEFAULT_EFI_SIZE: &str = "1G";
/// Default swap size
pub const DEFAULT_SWAP_SIZE: &str = "8G";
/// Default pool name
pub const DEFAULT_POOL_NAME: &str = "zroot";
/// Default source root for migrations
pub const DEFAULT_SOURCE_ROOT: &str = "/";

/// Mutable session state, filled in screen by screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    mode: Option<InstallMode>,
    pool_name: String,
    raid_level: RaidLevel,
    compression: Compression,
    ashift: Option<u8>,
    efi_size: String,
    swap_size: String,
    hostname: Option<String>,
    source_root: String,
    copy_home: bool,
    devices: Vec<String>,
    exclusions: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            mode: None,
            pool_name: DEFAULT_POOL_NAME.to_string(),
            raid_level: RaidLevel::default(),
            compression: Compression::default(),
            ashift: None,
            efi_size: DEFAULT_EFI_SIZE.to_string(),
            swap_size: DEFAULT_SWAP_SIZE.to_string(),
            hostname: None,
            source_root: DEFAULT_SOURCE_ROOT.to_string(),
            copy_home: true,
            devices: Vec::new(),
            exclusions: Vec::new(),
        }
    }
}

impl InstallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: InstallMode) {
        self.mode = Some(mode);
    }

    /// Replace the device selection. Order and duplicates are kept as given.
    pub fn set_devices(&mut self, devices: Vec<String>) {
        self.devices = devices;
    }

    pub fn set_raid(&mut self, level: RaidLevel) {
        self.raid_level = level;
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn set_sizes(&mut self, efi_size: impl Into<String>, swap_size: impl Into<String>) {
        self.efi_size = efi_size.into();
        self.swap_size = swap_size.into();
    }

    pub fn set_pool_name(&mut self, name: impl Into<String>) {
        self.pool_name = name.into();
    }

    /// `None` lets the backend auto-detect alignment.
    pub fn set_ashift(&mut self, ashift: Option<u8>) {
        self.ashift = ashift;
    }

    /// An empty hostname clears the setting.
    pub fn set_hostname(&mut self, hostname: Option<String>) {
        self.hostname = hostname.filter(|h| !h.is_empty());
    }

    pub fn set_source_root(&mut self, root: impl Into<String>) {
        self.source_root = root.into();
    }

    pub fn set_copy_home(&mut self, copy_home: bool) {
        self.copy_home = copy_home;
    }

    /// Flip the copy-home setting and return the new value.
    pub fn toggle_copy_home(&mut self) -> bool {
        self.copy_home = !self.copy_home;
        self.copy_home
    }

    pub fn add_exclusion(&mut self, pattern: impl Into<String>) {
        self.exclusions.push(pattern.into());
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn mode(&self) -> Option<InstallMode> {
        self.mode
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn raid_level(&self) -> RaidLevel {
        self.raid_level
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn efi_size(&self) -> &str {
        &self.efi_size
    }

    pub fn swap_size(&self) -> &str {
        &self.swap_size
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn ashift(&self) -> Option<u8> {
        self.ashift
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    pub fn copy_home(&self) -> bool {
        self.copy_home
    }

    /// Exclusion patterns in insertion order.
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    pub fn is_existing_mode(&self) -> bool {
        self.mode == Some(InstallMode::Existing)
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// Human-readable configuration report shared by several screens.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mode = self
            .mode
            .map(|m| m.label().to_string())
            .unwrap_or_else(|| "(not selected)".to_string());
        let drives = if self.devices.is_empty() {
            "(none)".to_string()
        } else {
            self.devices.join(", ")
        };
        let ashift = self
            .ashift
            .map(|a| a.to_string())
            .unwrap_or_else(|| "auto".to_string());
        let swap = if self.swap_size.trim() == "0" {
            "disabled".to_string()
        } else {
            self.swap_size.clone()
        };

        let _ = writeln!(out, "Mode:         {}", mode);
        let _ = writeln!(out, "Drives:       {}", drives);
        let _ = writeln!(out, "Pool:         {}", self.pool_name);
        let _ = writeln!(out, "RAID:         {}", self.raid_level.label());
        let _ = writeln!(out, "Compression:  {}", self.compression);
        let _ = writeln!(out, "Ashift:       {}", ashift);
        let _ = writeln!(out, "EFI size:     {}", self.efi_size);
        let _ = writeln!(out, "Swap:         {}", swap);
        if let Some(ref hostname) = self.hostname {
            let _ = writeln!(out, "Hostname:     {}", hostname);
        }
        if self.is_existing_mode() {
            let _ = writeln!(out, "Source root:  {}", self.source_root);
            let _ = writeln!(
                out,
                "Copy /home:   {}",
                if self.copy_home { "yes" } else { "no" }
            );
            if self.exclusions.is_empty() {
                let _ = writeln!(out, "Exclusions:   (none)");
            } else {
                let _ = writeln!(out, "Exclusions:");
                for pattern in &self.exclusions {
                    let _ = writeln!(out, "  - {}", pattern);
                }
            }
        }
        out
    }

    /// Build the backend invocation for this configuration.
    pub fn synthesize_command(&self, program: &str) -> BackendInvocation {
        command::synthesize(self, program)
    }
}
