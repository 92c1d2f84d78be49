//! Pre-flight sanity checks for the runtime environment
//!
//! This module verifies the environment before the TUI starts:
//! - Running with root privileges (EUID 0)
//! - Standard input and output are an interactive terminal
//! - The install backend is an executable (skipped for dry runs)
//!
//! If any check fails, the program prints a report and exits with
//! `EX_UNAVAILABLE` before the terminal is switched to raw mode.

use std::env;
use std::io::IsTerminal;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// sysexits.h `EX_UNAVAILABLE`, returned when pre-flight fails.
pub const EX_UNAVAILABLE: i32 = 69;

/// Set to `1` or `true` to skip the root check during development.
pub const SKIP_ROOT_ENV: &str = "ZBM_WIZARD_SKIP_ROOT_CHECK";

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityCheckResult {
    pub is_root: bool,
    pub is_interactive: bool,
    /// Backend name that could not be resolved to an executable
    pub missing_backend: Option<String>,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.is_root && self.is_interactive && self.missing_backend.is_none()
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolve `program` the way `execvp` would: a name containing `/` is used
/// as is, anything else is searched in `search_path`.
pub fn find_executable(program: &str, search_path: Option<&str>) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    search_path?
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn should_skip_root_check() -> bool {
    env::var(SKIP_ROOT_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Perform all checks and return the result.
pub fn verify_environment(backend: &str, dry_run: bool) -> SanityCheckResult {
    let is_root = if should_skip_root_check() {
        warn!("Root check skipped ({} is set)", SKIP_ROOT_ENV);
        true
    } else {
        is_running_as_root()
    };

    let missing_backend = if dry_run {
        debug!("Dry run: backend presence not checked");
        None
    } else {
        let path = env::var("PATH").ok();
        match find_executable(backend, path.as_deref()) {
            Some(found) => {
                debug!("Backend resolved to {}", found.display());
                None
            }
            None => Some(backend.to_string()),
        }
    };

    SanityCheckResult {
        is_root,
        is_interactive: std::io::stdin().is_terminal() && std::io::stdout().is_terminal(),
        missing_backend,
    }
}

/// Human-readable failure report.
pub fn failure_report(result: &SanityCheckResult) -> String {
    let mut out = String::new();
    out.push_str("ZFSBootMenu installer: pre-flight check failed\n\n");

    if !result.is_root {
        out.push_str("ERROR: root privileges required\n");
        out.push_str("   The installer partitions drives and creates ZFS pools.\n");
        out.push_str("   Run it as root (e.g. with sudo).\n\n");
    }
    if !result.is_interactive {
        out.push_str("ERROR: not running on an interactive terminal\n");
        out.push_str("   Run the wizard from a console or terminal emulator, or use the\n");
        out.push_str("   'validate' and 'command' subcommands for scripted use.\n\n");
    }
    if let Some(ref backend) = result.missing_backend {
        out.push_str(&format!("ERROR: install backend '{}' not found\n", backend));
        out.push_str("   Install it, point --backend (or ZBM_WIZARD_BACKEND) at it,\n");
        out.push_str("   or pass --dry-run to walk through the wizard only.\n\n");
    }

    out.push_str("Fix the above issues and try again.\n");
    out
}

/// Verify the environment; print the report and exit with
/// `EX_UNAVAILABLE` if anything is missing. Call before initializing the TUI.
pub fn run_preflight_checks(backend: &str, dry_run: bool) {
    debug!("Running pre-flight checks (backend={}, dry_run={})", backend, dry_run);

    let result = verify_environment(backend, dry_run);
    if !result.is_ok() {
        warn!("Pre-flight checks failed: {:?}", result);
        eprintln!();
        eprint!("{}", failure_report(&result));
        std::process::exit(EX_UNAVAILABLE);
    }

    info!("Pre-flight checks passed");
}
