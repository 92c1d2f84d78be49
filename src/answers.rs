//! Answers files
//!
//! An answers file is an `InstallConfig` serialized as JSON. It preloads the
//! wizard (`install --answers`), records a session (`install --save-config`)
//! and feeds the `validate` and `command` subcommands. Unknown keys are
//! rejected; missing keys take their defaults.

use crate::config::InstallConfig;
use crate::validator::{self, Verdict};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Load an answers file.
pub fn load_answers<P: AsRef<Path>>(path: P) -> Result<InstallConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read answers from {:?}", path))?;
    let config: InstallConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse answers JSON in {:?}", path))?;
    check_entries(&config).with_context(|| format!("Invalid answers in {:?}", path))?;
    Ok(config)
}

/// Write `config` as pretty-printed JSON.
pub fn save_answers<P: AsRef<Path>>(path: P, config: &InstallConfig) -> Result<()> {
    let path = path.as_ref();
    let json =
        serde_json::to_string_pretty(config).context("Failed to serialize answers to JSON")?;
    fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write answers to {:?}", path))?;
    Ok(())
}

/// Apply the entry validators the interactive screens would have applied.
///
/// Host-dependent checks (RAM, firmware, conflicts) are left to the
/// validation gate.
pub fn check_entries(config: &InstallConfig) -> Result<()> {
    let mut problems = Vec::new();

    if let Verdict::Fail(msg) = validator::check_pool_name(config.pool_name(), &[], false) {
        problems.push(msg);
    }
    if let Some(ashift) = config.ashift() {
        if let Err(msg) = validator::check_ashift(&ashift.to_string()) {
            problems.push(msg);
        }
    }
    if let Verdict::Fail(msg) = validator::check_efi_size(config.efi_size()) {
        problems.push(msg);
    }
    if crate::types::parse_size(config.swap_size()).is_none() {
        problems.push(format!("Invalid swap size '{}'", config.swap_size()));
    }
    if let Some(hostname) = config.hostname() {
        if let Err(msg) = validator::check_hostname(hostname) {
            problems.push(msg);
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        bail!(problems.join("; "))
    }
}
