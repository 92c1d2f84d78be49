//! ZBM Wizard Library
//!
//! Workflow engine for a ZFSBootMenu root-on-ZFS installation wizard: host
//! probing, the configuration model, validation, the screen state machine
//! and synthesis of the backend command line. The terminal front end and
//! the backend runner sit behind the `Presenter` and `Backend` traits.

pub mod answers;
pub mod backend;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod presenter;
pub mod probe;
pub mod sanity;
pub mod theme;
pub mod types;
pub mod ui;
pub mod validator;
pub mod wizard;

// Re-export main types for convenience
pub use backend::{Backend, BackendHandle, DryRunBackend, ProcessBackend, SignalShield};
pub use command::{synthesize, BackendInvocation};
pub use config::InstallConfig;
pub use error::{Result, WizardError};
pub use presenter::{FormField, MenuItem, Presenter};
pub use probe::{BlockDevice, FirmwareMode, HostFacts, HostUsage, LinuxProbe, SystemProbe};
pub use types::{Compression, InstallMode, RaidLevel};
pub use validator::{validate, ValidationReport, Verdict};
pub use wizard::{transition, Event, Screen, Session, Wizard, WizardOptions, WizardOutcome};
