//! Install backend execution
//!
//! The backend is an external, privileged program. This module starts it,
//! sends its output to a log file and reports its exit status.
//!
//! # Process model
//!
//! - The child runs in its own process group, so terminal-generated signals
//!   never reach it.
//! - No parent-death signal is set: once started, a crash of the wizard does
//!   not interrupt the destructive operation.
//! - stdout and stderr go to the log file opened in append mode, never to a
//!   pipe, so everything written survives the wizard.
//! - `BackendHandle::wait` is the single blocking point of a run.

use crate::command::BackendInvocation;
use crate::error::{Result, WizardError};
use nix::unistd::{setpgid, Pid};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Command used to restart the machine after a successful install.
pub const REBOOT_COMMAND: &[&str] = &["systemctl", "reboot"];

/// Exit code reported when the backend was killed by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// A started backend run.
pub trait BackendHandle {
    /// Byte offset in the log file where this run's output begins.
    fn log_offset(&self) -> u64;

    /// Non-blocking: `Some(code)` once the backend has exited.
    fn poll_exit(&mut self) -> Result<Option<i32>>;

    /// Block until the backend exits and return its exit code.
    fn wait(&mut self) -> Result<i32>;
}

/// Something that can run the install backend.
pub trait Backend {
    /// Start `invocation`, appending its output to `log_path`.
    fn start(
        &mut self,
        invocation: &BackendInvocation,
        log_path: &Path,
    ) -> Result<Box<dyn BackendHandle>>;

    fn reboot(&mut self) -> Result<()>;
}

fn open_log(log_path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| {
            WizardError::backend(format!(
                "Cannot open log file {}: {}",
                log_path.display(),
                e
            ))
        })
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Map an exit status to a single code; signal deaths become `-1`.
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => {
            if let Some(sig) = status.signal() {
                warn!("Backend terminated by signal {}", sig);
            }
            SIGNALED_EXIT_CODE
        }
    }
}

// ============================================================================
// Real process
// ============================================================================

/// Runs the configured backend executable.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    reboot_command: Vec<String>,
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self {
            reboot_command: REBOOT_COMMAND.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_reboot_command(mut self, command: Vec<String>) -> Self {
        self.reboot_command = command;
        self
    }
}

/// Put the child in a new process group whose id is its own pid.
fn in_new_process_group(cmd: &mut Command) -> &mut Command {
    // SAFETY: setpgid is async-signal-safe and touches no parent state.
    unsafe {
        cmd.pre_exec(|| {
            setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(io::Error::from)?;
            Ok(())
        })
    }
}

impl Backend for ProcessBackend {
    fn start(
        &mut self,
        invocation: &BackendInvocation,
        log_path: &Path,
    ) -> Result<Box<dyn BackendHandle>> {
        let mut log = open_log(log_path)?;
        let log_offset = log.metadata()?.len();
        let command_line = invocation.command_line();
        writeln!(log, "=== zbm-wizard run started at {} ===", unix_time())?;
        writeln!(log, "$ {}", command_line)?;
        log.flush()?;

        info!("Starting backend: {}", command_line);
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?));
        in_new_process_group(&mut cmd);

        let child = cmd.spawn().map_err(|e| {
            let _ = writeln!(log, "=== failed to start backend: {} ===", e);
            error!("Failed to start backend {}: {}", invocation.program, e);
            WizardError::backend(format!("Cannot start {}: {}", invocation.program, e))
        })?;
        info!("Backend running as PID {}", child.id());

        Ok(Box::new(ProcessHandle {
            child,
            log,
            log_path: log_path.to_path_buf(),
            log_offset,
            started: Instant::now(),
            exit: None,
        }))
    }

    fn reboot(&mut self) -> Result<()> {
        let Some((program, args)) = self.reboot_command.split_first() else {
            return Err(WizardError::backend("No reboot command configured"));
        };
        info!("Rebooting via {}", self.reboot_command.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| WizardError::backend(format!("Cannot run {}: {}", program, e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(WizardError::backend(format!(
                "{} exited with status {}",
                program,
                exit_code(status)
            )))
        }
    }
}

/// A running backend child process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    log: File,
    log_path: PathBuf,
    log_offset: u64,
    started: Instant,
    exit: Option<i32>,
}

impl ProcessHandle {
    fn record_exit(&mut self, status: ExitStatus) -> i32 {
        let code = exit_code(status);
        self.exit = Some(code);
        let elapsed = self.started.elapsed().as_secs();
        let _ = writeln!(
            self.log,
            "=== backend exited with status {} after {}s ===",
            code, elapsed
        );
        if code == 0 {
            info!("Backend finished successfully after {}s", elapsed);
        } else {
            error!(
                "Backend exited with status {} after {}s, see {}",
                code,
                elapsed,
                self.log_path.display()
            );
        }
        code
    }
}

impl BackendHandle for ProcessHandle {
    fn log_offset(&self) -> u64 {
        self.log_offset
    }

    fn poll_exit(&mut self) -> Result<Option<i32>> {
        if let Some(code) = self.exit {
            return Ok(Some(code));
        }
        match self.child.try_wait()? {
            Some(status) => Ok(Some(self.record_exit(status))),
            None => Ok(None),
        }
    }

    fn wait(&mut self) -> Result<i32> {
        if let Some(code) = self.exit {
            return Ok(code);
        }
        let status = self.child.wait()?;
        Ok(self.record_exit(status))
    }
}

// ============================================================================
// Dry run
// ============================================================================

/// Logs what would run and reports success without touching the system.
#[derive(Debug, Clone, Default)]
pub struct DryRunBackend;

impl DryRunBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for DryRunBackend {
    fn start(
        &mut self,
        invocation: &BackendInvocation,
        log_path: &Path,
    ) -> Result<Box<dyn BackendHandle>> {
        let mut log = open_log(log_path)?;
        let log_offset = log.metadata()?.len();
        writeln!(log, "=== zbm-wizard dry run at {} ===", unix_time())?;
        writeln!(log, "[dry-run] would run: {}", invocation.command_line())?;
        writeln!(log, "=== backend exited with status 0 ===")?;
        log.flush()?;
        info!("[DRY RUN] Would run: {}", invocation.command_line());
        Ok(Box::new(FinishedHandle {
            log_offset,
            code: 0,
        }))
    }

    fn reboot(&mut self) -> Result<()> {
        info!("[DRY RUN] Skipping reboot");
        Ok(())
    }
}

/// Handle for a run that completed before `start` returned.
#[derive(Debug, Clone, Copy)]
pub struct FinishedHandle {
    pub log_offset: u64,
    pub code: i32,
}

impl BackendHandle for FinishedHandle {
    fn log_offset(&self) -> u64 {
        self.log_offset
    }

    fn poll_exit(&mut self) -> Result<Option<i32>> {
        Ok(Some(self.code))
    }

    fn wait(&mut self) -> Result<i32> {
        Ok(self.code)
    }
}

// ============================================================================
// Signal shield
// ============================================================================

/// Keeps SIGINT, SIGTERM and SIGHUP from killing the wizard while the
/// backend runs.
///
/// Installed once. Outside of a `ShieldGuard` the signals keep their default
/// action; inside one they are only recorded.
#[derive(Debug, Clone)]
pub struct SignalShield {
    default_action: Arc<AtomicBool>,
    captured: Arc<AtomicUsize>,
}

impl SignalShield {
    pub fn install() -> Result<Self> {
        let default_action = Arc::new(AtomicBool::new(true));
        let captured = Arc::new(AtomicUsize::new(0));
        for sig in [SIGINT, SIGTERM, SIGHUP] {
            signal_hook::flag::register_usize(sig, Arc::clone(&captured), sig as usize)?;
            signal_hook::flag::register_conditional_default(sig, Arc::clone(&default_action))?;
        }
        debug!("Signal shield installed");
        Ok(Self {
            default_action,
            captured,
        })
    }

    /// Capture signals until the returned guard is dropped.
    pub fn guard(&self) -> ShieldGuard<'_> {
        self.captured.store(0, Ordering::SeqCst);
        self.default_action.store(false, Ordering::SeqCst);
        ShieldGuard { shield: self }
    }

    /// Most recent signal captured inside a guard, if any.
    pub fn take_captured(&self) -> Option<i32> {
        match self.captured.swap(0, Ordering::SeqCst) {
            0 => None,
            sig => Some(sig as i32),
        }
    }
}

/// Active signal capture; restores default actions on drop.
#[derive(Debug)]
pub struct ShieldGuard<'a> {
    shield: &'a SignalShield,
}

impl ShieldGuard<'_> {
    /// Log a signal captured since the last check.
    pub fn log_captured(&self) {
        if let Some(sig) = self.shield.take_captured() {
            warn!(
                "Ignoring signal {} while the backend is running; the install cannot be interrupted",
                sig
            );
        }
    }
}

impl Drop for ShieldGuard<'_> {
    fn drop(&mut self) {
        self.log_captured();
        self.shield.default_action.store(true, Ordering::SeqCst);
    }
}
