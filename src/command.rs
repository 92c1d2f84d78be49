//! Backend command synthesis.
//!
//! Turns an `InstallConfig` into the exact argument vector the install
//! backend expects. The flag order is fixed so identical configurations
//! always produce byte-identical command lines:
//!
//! ```text
//! --mode --drives --pool --raid --compression --efi-size --swap-size
//! [--ashift] [--hostname]
//! [--source-root] [--no-copy-home] [--exclude]...   (existing mode only)
//! --verbose
//! ```
//!
//! Synthesis never fails; rejecting malformed values is the validator's job.

use crate::config::InstallConfig;
use crate::types::InstallMode;
use std::borrow::Cow;
use std::fmt;

/// Executable name used when no backend path is configured.
pub const DEFAULT_BACKEND: &str = "zbm-install";

/// A fully-resolved backend invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl BackendInvocation {
    /// Render as a single shell-safe command line (for logs and display).
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for BackendInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Build the backend invocation for `config`.
pub fn synthesize(config: &InstallConfig, program: &str) -> BackendInvocation {
    let mut args: Vec<String> = Vec::new();
    let mut flag = |name: &str, value: String| {
        args.push(name.to_string());
        args.push(value);
    };

    if let Some(mode) = config.mode() {
        flag("--mode", mode.to_string());
    }
    flag("--drives", config.devices().join(","));
    flag("--pool", config.pool_name().to_string());
    flag("--raid", config.raid_level().to_string());
    flag("--compression", config.compression().to_string());
    flag("--efi-size", config.efi_size().to_string());
    flag("--swap-size", config.swap_size().to_string());

    if let Some(ashift) = config.ashift() {
        flag("--ashift", ashift.to_string());
    }
    if let Some(hostname) = config.hostname() {
        flag("--hostname", hostname.to_string());
    }

    if config.mode() == Some(InstallMode::Existing) {
        flag("--source-root", config.source_root().to_string());
        if !config.copy_home() {
            args.push("--no-copy-home".to_string());
        }
        for pattern in config.exclusions() {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
    }

    args.push("--verbose".to_string());

    BackendInvocation {
        program: program.to_string(),
        args,
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./=,:+@%".contains(c)
}

/// Single-quote `arg` if it contains anything a POSIX shell would interpret.
fn shell_quote(arg: &str) -> Cow<'_, str> {
    if !arg.is_empty() && arg.chars().all(is_shell_safe) {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}
