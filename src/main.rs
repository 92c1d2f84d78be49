//! ZBM Wizard - Main entry point
//!
//! Parses the command line, sets up logging and dispatches to the wizard or
//! to one of the scripted subcommands.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use zbm_wizard::answers;
use zbm_wizard::backend::{Backend, DryRunBackend, ProcessBackend, SignalShield};
use zbm_wizard::cli::{Cli, Commands};
use zbm_wizard::config::InstallConfig;
use zbm_wizard::probe::{LinuxProbe, SystemProbe};
use zbm_wizard::sanity::{self, EX_UNAVAILABLE};
use zbm_wizard::ui::TuiPresenter;
use zbm_wizard::validator;
use zbm_wizard::wizard::{Session, Wizard, WizardOptions};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to `path`; the terminal belongs to the TUI while the wizard runs.
fn init_file_logger(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open wizard log {:?}", path))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn init_stderr_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application entry point
fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let command = cli.command();

    match command {
        Commands::Install {
            answers,
            save_config,
        } => {
            init_file_logger(&cli.wizard_log)?;
            info!("ZBM Wizard starting up");
            let code = run_wizard(&cli, answers.as_deref(), save_config)?;
            std::process::exit(code);
        }
        Commands::Probe => {
            init_stderr_logger();
            run_probe(&cli)
        }
        Commands::Validate { answers } => {
            init_stderr_logger();
            let valid = run_validate(&cli, &answers)?;
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Command { answers } => {
            init_stderr_logger();
            let config = answers::load_answers(&answers)?;
            println!("{}", config.synthesize_command(&cli.backend).command_line());
            Ok(())
        }
    }
}

/// Run the interactive wizard and return the process exit code.
fn run_wizard(
    cli: &Cli,
    answers_path: Option<&Path>,
    save_config: Option<PathBuf>,
) -> Result<i32> {
    sanity::run_preflight_checks(&cli.backend, cli.dry_run);

    let config = match answers_path {
        Some(path) => {
            info!("Preloading answers from {:?}", path);
            answers::load_answers(path)?
        }
        None => InstallConfig::new(),
    };
    let mut session = Session::new(config);

    let shield = match SignalShield::install() {
        Ok(shield) => Some(shield),
        Err(e) => {
            warn!("Failed to install signal handlers: {}", e);
            None
        }
    };

    let mut backend: Box<dyn Backend> = if cli.dry_run {
        info!("Dry run: the backend will not be executed");
        Box::new(DryRunBackend::new())
    } else {
        Box::new(ProcessBackend::new())
    };
    let probe = LinuxProbe::with_root(&cli.root);
    let options = WizardOptions {
        backend_program: cli.backend.clone(),
        log_path: cli.log_file.clone(),
        force: cli.force,
        dry_run: cli.dry_run,
        save_config,
    };

    let subtitle = if cli.dry_run { "DRY RUN" } else { "" };
    let mut presenter = match TuiPresenter::new(subtitle) {
        Ok(presenter) => presenter,
        Err(e) => {
            error!("Terminal unavailable: {}", e);
            eprintln!("ZFSBootMenu installer: cannot initialize the terminal: {}", e);
            return Ok(EX_UNAVAILABLE);
        }
    };

    let outcome = {
        let mut wizard = Wizard::new(&mut presenter, backend.as_mut(), &probe, options);
        if let Some(shield) = shield {
            wizard = wizard.with_signal_shield(shield);
        }
        wizard.run(&mut session)
    };
    drop(presenter);

    let outcome = outcome.context("Wizard aborted")?;
    debug!("Screens visited: {:?}", outcome.visited);

    if outcome.installed {
        println!("Installation complete. Log: {}", cli.log_file.display());
        Ok(0)
    } else if let Some(code) = outcome.backend_runs.last() {
        println!(
            "Installation did not complete (last backend exit status {}). Log: {}",
            code,
            cli.log_file.display()
        );
        Ok(1)
    } else {
        info!("Wizard exited without installing");
        Ok(0)
    }
}

fn run_probe(cli: &Cli) -> Result<()> {
    let probe = LinuxProbe::with_root(&cli.root);
    let report = serde_json::json!({
        "facts": probe.host_facts(),
        "devices": probe.block_devices(),
        "usage": probe.host_usage(),
    });
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize probe report")?;
    println!("{}", json);
    Ok(())
}

/// Returns whether the answers pass the validation gate on this host.
fn run_validate(cli: &Cli, path: &Path) -> Result<bool> {
    info!("Validating answers file: {:?}", path);
    let config = answers::load_answers(path)?;
    let probe = LinuxProbe::with_root(&cli.root);
    let report = validator::validation_report(
        &config,
        &probe.host_facts(),
        &probe.host_usage(),
        cli.force,
    );

    println!("{}", report.render());
    if report.is_valid() {
        info!("Answers file is valid");
    } else {
        error!("Answers file failed validation");
    }
    Ok(report.is_valid())
}
