//! Installation wizard driver
//!
//! `Wizard` walks the screen state machine: for the current screen it runs
//! the matching handler, which talks to the presenter, updates the
//! `Session` and reports an `Event`; `state::transition` picks the next
//! screen. Handlers never choose their successor.
//!
//! Presenter cancellation always maps to `Event::Back` (or `Decline`), so
//! backing out is never fatal. The `Execute` handler is the only one that
//! blocks: it returns only after the backend process has exited.

pub mod state;

use crate::answers;
use crate::backend::{Backend, SignalShield};
use crate::command::DEFAULT_BACKEND;
use crate::config::InstallConfig;
use crate::error::{Result, WizardError};
use crate::presenter::{FormField, MenuItem, Presenter};
use crate::probe::{BlockDevice, HostFacts, SystemProbe};
use crate::theme::Severity;
use crate::types::{Compression, InstallMode, RaidLevel};
use crate::validator::{self, Verdict};
use std::path::PathBuf;
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

pub use state::{transition, Event, Screen, SettingsChoice, TransitionError};

/// Default path of the backend log.
pub const DEFAULT_LOG_PATH: &str = "/tmp/zbm-install.log";

/// Everything one wizard run owns: the configuration being built and the
/// host facts, probed once and cached.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub config: InstallConfig,
    facts: Option<HostFacts>,
    devices: Option<Vec<BlockDevice>>,
}

impl Session {
    pub fn new(config: InstallConfig) -> Self {
        Self {
            config,
            facts: None,
            devices: None,
        }
    }

    /// Host facts, probed on first use.
    pub fn facts(&mut self, probe: &dyn SystemProbe) -> &HostFacts {
        self.facts.get_or_insert_with(|| probe.host_facts())
    }

    /// Candidate devices, probed on first use.
    pub fn devices(&mut self, probe: &dyn SystemProbe) -> &[BlockDevice] {
        self.devices.get_or_insert_with(|| probe.block_devices())
    }
}

/// Knobs set from the command line.
#[derive(Debug, Clone)]
pub struct WizardOptions {
    /// Backend executable placed at the head of the synthesized command
    pub backend_program: String,
    /// Backend log file
    pub log_path: PathBuf,
    /// Accept a pool name that collides with an existing pool
    pub force: bool,
    pub dry_run: bool,
    /// Write the answers to this file once the installation is confirmed
    pub save_config: Option<PathBuf>,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            backend_program: DEFAULT_BACKEND.to_string(),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            force: false,
            dry_run: false,
            save_config: None,
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardOutcome {
    /// Screens in the order they were shown
    pub visited: Vec<Screen>,
    /// Exit codes of every backend run, in order
    pub backend_runs: Vec<i32>,
    pub installed: bool,
    pub rebooted: bool,
}

/// The installation wizard.
pub struct Wizard<'a> {
    presenter: &'a mut dyn Presenter,
    backend: &'a mut dyn Backend,
    probe: &'a dyn SystemProbe,
    options: WizardOptions,
    shield: Option<SignalShield>,
}

impl<'a> Wizard<'a> {
    pub fn new(
        presenter: &'a mut dyn Presenter,
        backend: &'a mut dyn Backend,
        probe: &'a dyn SystemProbe,
        options: WizardOptions,
    ) -> Self {
        Self {
            presenter,
            backend,
            probe,
            options,
            shield: None,
        }
    }

    /// Capture termination signals while the backend runs.
    pub fn with_signal_shield(mut self, shield: SignalShield) -> Self {
        self.shield = Some(shield);
        self
    }

    /// Run from `Welcome` until `Quit`, then tear the presenter down.
    pub fn run(&mut self, session: &mut Session) -> Result<WizardOutcome> {
        let mut outcome = WizardOutcome::default();
        let mut screen = Screen::Welcome;

        while !screen.is_terminal() {
            outcome.visited.push(screen);
            let event = self.handle(screen, session, &mut outcome)?;
            let next = transition(screen, event)?;
            debug!("{:?} --{:?}--> {:?}", screen, event, next);
            screen = next;
        }
        outcome.visited.push(Screen::Quit);

        self.presenter.teardown()?;
        info!(
            "Wizard finished: installed={}, backend runs={:?}",
            outcome.installed, outcome.backend_runs
        );
        Ok(outcome)
    }

    fn handle(
        &mut self,
        screen: Screen,
        session: &mut Session,
        outcome: &mut WizardOutcome,
    ) -> Result<Event> {
        match screen {
            Screen::Welcome => self.welcome(session),
            Screen::ModeSelect => self.mode_select(session),
            Screen::DeviceSelect => self.device_select(session),
            Screen::Settings => self.settings(session),
            Screen::RaidSelect => self.raid_select(session),
            Screen::PoolSettings => self.pool_settings(session),
            Screen::ExistingOptions => self.existing_options(session),
            Screen::Validation => self.validation(session),
            Screen::Confirm => self.confirm(session),
            Screen::Execute => {
                let event = self.execute(session)?;
                if let Event::BackendExited(code) = event {
                    outcome.backend_runs.push(code);
                    outcome.installed = code == 0;
                }
                Ok(event)
            }
            Screen::Complete => {
                outcome.rebooted = self.complete(session)?;
                Ok(Event::Done)
            }
            Screen::Quit => Err(WizardError::transition("Quit has no handler")),
        }
    }

    // ------------------------------------------------------------------
    // Screens
    // ------------------------------------------------------------------

    fn welcome(&mut self, session: &mut Session) -> Result<Event> {
        let facts = session.facts(self.probe).clone();
        let mut text = String::from("Welcome to the ZFSBootMenu installer.\n\n");
        text.push_str("System information:\n");
        text.push_str(&format!("  Boot mode:     {}\n", facts.firmware));
        text.push_str(&format!("  RAM:           {} GB\n", facts.ram_gb));
        text.push_str(&format!("  CPUs:          {}\n", facts.cpu_count));
        text.push_str(&format!(
            "  Distribution:  {} {}\n",
            facts.distro, facts.distro_version
        ));
        if !facts.is_healthy() {
            text.push_str(&format!(
                "\n  Could not read: {}\n",
                facts.degraded.join(", ")
            ));
        }
        if !facts.firmware.is_efi() {
            text.push_str("\nWARNING: this system did not boot in EFI mode.\n");
            text.push_str("ZFSBootMenu requires EFI; the installation will not be allowed.\n");
        }
        if facts.ram_gb < validator::MIN_RAM_GB {
            text.push_str(&format!(
                "\nWARNING: at least {} GB of RAM is required.\n",
                validator::MIN_RAM_GB
            ));
        }
        text.push_str("\nContinue?");

        if self
            .presenter
            .confirm(Screen::Welcome.title(), &text, true)?
        {
            Ok(Event::Accept)
        } else {
            Ok(Event::Decline)
        }
    }

    fn mode_select(&mut self, session: &mut Session) -> Result<Event> {
        let items: Vec<MenuItem> = InstallMode::iter()
            .map(|mode| {
                MenuItem::new(mode.to_string(), mode.label()).with_description(mode.description())
            })
            .collect();
        let current = session.config.mode().map(|m| m.to_string());

        let Some(choice) = self.presenter.choose(
            Screen::ModeSelect.title(),
            "How do you want to install?",
            &items,
            current.as_deref(),
        )?
        else {
            return Ok(Event::Back);
        };

        let mode: InstallMode = choice
            .parse()
            .map_err(|_| WizardError::config(format!("Unknown installation mode '{}'", choice)))?;
        info!("Installation mode: {}", mode);
        session.config.set_mode(mode);
        Ok(Event::ModeChosen)
    }

    fn device_select(&mut self, session: &mut Session) -> Result<Event> {
        let items: Vec<MenuItem> = session
            .devices(self.probe)
            .iter()
            .map(|dev| MenuItem::new(dev.name.clone(), dev.display_line()))
            .collect();
        let prompt = if items.is_empty() {
            "No usable drives were detected."
        } else if session.config.is_existing_mode() {
            "Select the drives for the new ZFS pool.\nThe running system will be copied onto them; their current contents are DESTROYED."
        } else {
            "Select the drives for the new ZFS pool.\nALL DATA on the selected drives will be DESTROYED."
        };

        let Some(selected) = self.presenter.multi_choose(
            Screen::DeviceSelect.title(),
            prompt,
            &items,
            session.config.devices(),
        )?
        else {
            return Ok(Event::Back);
        };

        info!("Selected drives: {:?}", selected);
        session.config.set_devices(selected);
        Ok(Event::DevicesChosen)
    }

    fn settings(&mut self, session: &mut Session) -> Result<Event> {
        let config = &session.config;
        let items: Vec<MenuItem> = SettingsChoice::all()
            .iter()
            .map(|choice| {
                let (label, description) = match choice {
                    SettingsChoice::Raid => {
                        ("RAID level", config.raid_level().label().to_string())
                    }
                    SettingsChoice::Pool => (
                        "Pool settings",
                        format!("{}, {} compression", config.pool_name(), config.compression()),
                    ),
                    SettingsChoice::Existing => (
                        "Migration options",
                        if config.is_existing_mode() {
                            format!("source {}", config.source_root())
                        } else {
                            "migrate mode only".to_string()
                        },
                    ),
                    SettingsChoice::Continue => ("Continue", "validate and install".to_string()),
                };
                MenuItem::new(choice.id(), label).with_description(description)
            })
            .collect();

        let Some(id) = self.presenter.choose(
            Screen::Settings.title(),
            &config.summary(),
            &items,
            Some(SettingsChoice::Continue.id()),
        )?
        else {
            return Ok(Event::Back);
        };

        let choice = SettingsChoice::from_id(&id)
            .ok_or_else(|| WizardError::config(format!("Unknown settings entry '{}'", id)))?;
        if choice == SettingsChoice::Existing && !session.config.is_existing_mode() {
            self.presenter.show_message(
                "Not Available",
                "Migration options only apply to the 'Migrate System' mode.",
                Severity::Warning,
            )?;
            return Ok(Event::Refused);
        }
        Ok(Event::Open(choice))
    }

    fn raid_select(&mut self, session: &mut Session) -> Result<Event> {
        let count = session.config.devices().len();
        let items: Vec<MenuItem> = RaidLevel::iter()
            .map(|level| {
                MenuItem::new(level.to_string(), level.label()).with_description(format!(
                    "{} (min {} drive{})",
                    level.description(),
                    level.min_devices(),
                    if level.min_devices() == 1 { "" } else { "s" }
                ))
            })
            .collect();
        let prompt = format!("{} drive(s) selected.", count);
        // Preselect what is configured, never a level derived from the drive count
        let current = session.config.raid_level().to_string();

        let Some(choice) =
            self.presenter
                .choose(Screen::RaidSelect.title(), &prompt, &items, Some(&current))?
        else {
            return Ok(Event::Back);
        };

        let level: RaidLevel = choice
            .parse()
            .map_err(|_| WizardError::config(format!("Unknown RAID level '{}'", choice)))?;
        info!("RAID level: {}", level);
        session.config.set_raid(level);
        Ok(Event::Done)
    }

    fn pool_settings(&mut self, session: &mut Session) -> Result<Event> {
        let ram_gb = session.facts(self.probe).ram_gb;
        let pools = self.probe.host_usage().pools;
        let config = &session.config;
        let mut fields = vec![
            FormField::new("Pool name", config.pool_name()),
            FormField::new("Ashift", config.ashift().map(|a| a.to_string()).unwrap_or_default())
                .with_help("9-16, empty = auto-detect"),
            FormField::new("EFI partition size", config.efi_size()).with_help("e.g. 512M, 1G"),
            FormField::new("Swap size", config.swap_size()).with_help("0 disables swap"),
            FormField::new("Hostname", config.hostname().unwrap_or_default())
                .with_help("optional"),
        ];

        let values = loop {
            let Some(values) =
                self.presenter
                    .form(Screen::PoolSettings.title(), "", &fields)?
            else {
                return Ok(Event::Back);
            };
            let [pool, ashift, efi, swap, hostname] = values.as_slice() else {
                return Err(WizardError::terminal("Pool form returned the wrong number of fields"));
            };

            let mut failures = Vec::new();
            let mut warnings = Vec::new();
            for verdict in [
                validator::check_pool_name(pool.trim(), &pools, self.options.force),
                validator::check_efi_size(efi.trim()),
                validator::check_swap_size(swap.trim(), ram_gb),
            ] {
                match verdict {
                    Verdict::Pass => {}
                    Verdict::Warn(msg) => warnings.push(msg),
                    Verdict::Fail(msg) => failures.push(msg),
                }
            }
            let ashift = validator::check_ashift(ashift).unwrap_or_else(|msg| {
                failures.push(msg);
                None
            });
            let hostname = validator::check_hostname(hostname).unwrap_or_else(|msg| {
                failures.push(msg);
                None
            });

            if !failures.is_empty() {
                debug!("Pool settings rejected: {:?}", failures);
                self.presenter.show_message(
                    "Invalid Settings",
                    &failures.join("\n"),
                    Severity::Danger,
                )?;
                for (field, value) in fields.iter_mut().zip(&values) {
                    field.value = value.clone();
                }
                continue;
            }
            if !warnings.is_empty() {
                self.presenter
                    .show_message("Please Note", &warnings.join("\n"), Severity::Warning)?;
            }
            break (
                pool.trim().to_string(),
                ashift,
                efi.trim().to_string(),
                swap.trim().to_string(),
                hostname,
            );
        };

        let (pool, ashift, efi, swap, hostname) = values;
        session.config.set_pool_name(pool);
        session.config.set_ashift(ashift);
        session.config.set_sizes(efi, swap);
        session.config.set_hostname(hostname);

        let items: Vec<MenuItem> = Compression::iter()
            .map(|c| MenuItem::new(c.to_string(), c.to_string()).with_description(c.description()))
            .collect();
        let current = session.config.compression().to_string();
        if let Some(choice) =
            self.presenter
                .choose("Compression", "Dataset compression:", &items, Some(&current))?
        {
            let compression: Compression = choice
                .parse()
                .map_err(|_| WizardError::config(format!("Unknown compression '{}'", choice)))?;
            session.config.set_compression(compression);
        }

        info!(
            "Pool settings: pool={} ashift={:?} efi={} swap={} compression={}",
            session.config.pool_name(),
            session.config.ashift(),
            session.config.efi_size(),
            session.config.swap_size(),
            session.config.compression()
        );
        Ok(Event::Done)
    }

    fn existing_options(&mut self, session: &mut Session) -> Result<Event> {
        loop {
            let config = &session.config;
            let items = vec![
                MenuItem::new("source", "Source root").with_description(config.source_root()),
                MenuItem::new("home", "Copy /home")
                    .with_description(if config.copy_home() { "yes" } else { "no" }),
                MenuItem::new("add", "Add exclusion"),
                MenuItem::new("list", "Show exclusions")
                    .with_description(format!("{} pattern(s)", config.exclusions().len())),
                MenuItem::new("done", "Done"),
            ];

            let Some(choice) = self.presenter.choose(
                Screen::ExistingOptions.title(),
                "Options for copying the running system:",
                &items,
                None,
            )?
            else {
                return Ok(Event::Back);
            };

            match choice.as_str() {
                "source" => {
                    let current = session.config.source_root().to_string();
                    if let Some(root) = self.presenter.text_input(
                        "Source Root",
                        "Root of the system to copy:",
                        &current,
                    )? {
                        let root = root.trim();
                        if root.starts_with('/') {
                            session.config.set_source_root(root);
                        } else {
                            self.presenter.show_message(
                                "Invalid Path",
                                "The source root must be an absolute path.",
                                Severity::Danger,
                            )?;
                        }
                    }
                }
                "home" => {
                    let copy = session.config.toggle_copy_home();
                    debug!("Copy /home: {}", copy);
                }
                "add" => {
                    if let Some(pattern) = self.presenter.text_input(
                        "Add Exclusion",
                        "Path or pattern to leave out (e.g. /home/*/Downloads):",
                        "",
                    )? {
                        let pattern = pattern.trim();
                        if !pattern.is_empty() {
                            session.config.add_exclusion(pattern);
                        }
                    }
                }
                "list" => {
                    let exclusions = session.config.exclusions();
                    let text = if exclusions.is_empty() {
                        "No exclusions configured.".to_string()
                    } else {
                        exclusions
                            .iter()
                            .map(|p| format!("  {}", p))
                            .collect::<Vec<_>>()
                            .join("\n")
                    };
                    self.presenter
                        .show_message("Exclusions", &text, Severity::Info)?;
                }
                _ => return Ok(Event::Done),
            }
        }
    }

    fn validation(&mut self, session: &mut Session) -> Result<Event> {
        let facts = session.facts(self.probe).clone();
        let usage = self.probe.host_usage();
        let report =
            validator::validation_report(&session.config, &facts, &usage, self.options.force);

        for warning in &report.warnings {
            warn!("Validation warning: {}", warning);
        }
        if report.is_valid() {
            info!("Validation passed");
            self.presenter.show_message(
                Screen::Validation.title(),
                &report.render(),
                if report.warnings.is_empty() {
                    Severity::Info
                } else {
                    Severity::Warning
                },
            )?;
            Ok(Event::ValidationPassed)
        } else {
            for failure in &report.failures {
                warn!("Validation failure: {}", failure);
            }
            let text = format!(
                "The configuration cannot be installed:\n\n{}\n\nReturn to the settings to fix these problems.",
                report.render()
            );
            self.presenter
                .show_message(Screen::Validation.title(), &text, Severity::Danger)?;
            Ok(Event::ValidationFailed)
        }
    }

    fn confirm(&mut self, session: &mut Session) -> Result<Event> {
        let invocation = session
            .config
            .synthesize_command(&self.options.backend_program);
        let devices = session
            .config
            .devices()
            .iter()
            .map(|d| format!("  /dev/{}", d))
            .collect::<Vec<_>>()
            .join("\n");
        let mut text = format!(
            "ALL DATA on these drives will be DESTROYED:\n{}\n\n{}\nCommand:\n  {}\n",
            devices,
            session.config.summary(),
            invocation.command_line()
        );
        if self.options.dry_run {
            text.push_str("\nDry run: nothing will be written.\n");
        }
        text.push_str("\nOnce started, the installation cannot be interrupted. Proceed?");

        if !self
            .presenter
            .confirm(Screen::Confirm.title(), &text, false)?
        {
            info!("Installation not confirmed");
            return Ok(Event::Decline);
        }

        if let Some(ref path) = self.options.save_config {
            match answers::save_answers(path, &session.config) {
                Ok(()) => info!("Answers saved to {}", path.display()),
                Err(e) => {
                    warn!("Could not save answers: {:#}", e);
                    self.presenter.show_message(
                        "Answers Not Saved",
                        &format!("{:#}", e),
                        Severity::Warning,
                    )?;
                }
            }
        }
        Ok(Event::Accept)
    }

    fn execute(&mut self, session: &mut Session) -> Result<Event> {
        let invocation = session
            .config
            .synthesize_command(&self.options.backend_program);
        let log_path = self.options.log_path.clone();
        let guard = self.shield.as_ref().map(|s| s.guard());

        let mut handle = match self.backend.start(&invocation, &log_path) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Backend unavailable: {}", e);
                drop(guard);
                self.presenter.show_message(
                    "Installer Unavailable",
                    &format!(
                        "The installer backend could not be started:\n  {}\n\nLog: {}",
                        e,
                        log_path.display()
                    ),
                    Severity::Danger,
                )?;
                return Ok(Event::BackendUnavailable);
            }
        };

        let viewed = self.presenter.follow_log(
            Screen::Execute.title(),
            &log_path,
            handle.log_offset(),
            &mut || -> Result<bool> {
                if let Some(ref guard) = guard {
                    guard.log_captured();
                }
                Ok(handle.poll_exit()?.is_some())
            },
        );
        // Wait even if the view failed: the backend must have exited first
        let code = handle.wait()?;
        drop(guard);
        viewed?;

        if code != 0 {
            self.presenter.show_message(
                "Installation Failed",
                &format!(
                    "The installer exited with status {}.\n\nSee the log for details:\n  {}\n\nAdjust the settings and try again.",
                    code,
                    log_path.display()
                ),
                Severity::Danger,
            )?;
        }
        Ok(Event::BackendExited(code))
    }

    /// Returns true if a reboot was requested and issued.
    fn complete(&mut self, session: &mut Session) -> Result<bool> {
        let text = format!(
            "ZFS pool '{}' with ZFSBootMenu has been installed on {}.\n\nLog: {}",
            session.config.pool_name(),
            session.config.devices().join(", "),
            self.options.log_path.display()
        );
        self.presenter
            .show_message(Screen::Complete.title(), &text, Severity::Info)?;

        if !self
            .presenter
            .confirm("Reboot", "Reboot into the new system now?", false)?
        {
            return Ok(false);
        }
        match self.backend.reboot() {
            Ok(()) => Ok(true),
            Err(e) => {
                error!("Reboot failed: {}", e);
                self.presenter.show_message(
                    "Reboot Failed",
                    &format!("{}\n\nReboot manually when ready.", e),
                    Severity::Warning,
                )?;
                Ok(false)
            }
        }
    }
}
