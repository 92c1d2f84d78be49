use crate::command::DEFAULT_BACKEND;
use crate::wizard::DEFAULT_LOG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default path of the wizard's own tracing log.
pub const DEFAULT_WIZARD_LOG: &str = "/tmp/zbm-wizard.log";

/// ZBM Wizard - ZFSBootMenu installation wizard
#[derive(Parser, Debug)]
#[command(name = "zbm-wizard")]
#[command(about = "A terminal wizard for root-on-ZFS installations with ZFSBootMenu")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: walk through the wizard without touching any drive.
    ///
    /// The synthesized backend command is written to the log instead of
    /// being executed, and the backend presence check is skipped.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Install backend executable
    #[arg(long, global = true, env = "ZBM_WIZARD_BACKEND", default_value = DEFAULT_BACKEND)]
    pub backend: String,

    /// Log file the backend's output is appended to
    #[arg(long, global = true, default_value = DEFAULT_LOG_PATH)]
    pub log_file: PathBuf,

    /// Log file for the wizard's own diagnostics
    #[arg(long, global = true, default_value = DEFAULT_WIZARD_LOG)]
    pub wizard_log: PathBuf,

    /// Accept a pool name that is already imported on this system
    #[arg(long, global = true)]
    pub force: bool,

    /// Filesystem root to probe instead of `/`
    #[arg(long, global = true, default_value = "/")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the interactive installation wizard (default)
    Install {
        /// Answers file that preloads the wizard
        #[arg(short, long)]
        answers: Option<PathBuf>,

        /// Write the final answers to this file once the install is confirmed
        #[arg(long)]
        save_config: Option<PathBuf>,
    },
    /// Print host facts and candidate drives as JSON
    Probe,
    /// Validate an answers file against this host
    Validate {
        /// Answers file to validate
        answers: PathBuf,
    },
    /// Print the backend command an answers file would run
    Command {
        /// Answers file to synthesize from
        answers: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// The subcommand to run; `install` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Install {
            answers: None,
            save_config: None,
        })
    }
}
