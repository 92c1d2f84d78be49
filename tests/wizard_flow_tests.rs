//! Wizard flow tests
//!
//! Drive the whole wizard with a scripted presenter, a fake backend and a
//! fixed host, from `Welcome` to `Quit`.

use std::cell::Cell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use zbm_wizard::backend::{Backend, BackendHandle};
use zbm_wizard::command::BackendInvocation;
use zbm_wizard::config::InstallConfig;
use zbm_wizard::error::{Result, WizardError};
use zbm_wizard::presenter::{ExitPoll, FormField, MenuItem, Presenter};
use zbm_wizard::probe::{BlockDevice, FirmwareMode, HostFacts, HostUsage, SystemProbe};
use zbm_wizard::theme::Severity;
use zbm_wizard::types::{Compression, InstallMode, RaidLevel};
use zbm_wizard::wizard::{Screen, Session, Wizard, WizardOptions};

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Debug)]
enum Reply {
    Choose(Option<&'static str>),
    Multi(Option<Vec<&'static str>>),
    Confirm(bool),
    Text(Option<&'static str>),
    Form(Option<Vec<&'static str>>),
}

/// What the wizard asked, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Choose {
        title: String,
        default: Option<String>,
    },
    Multi {
        title: String,
        checked: Vec<String>,
    },
    Confirm {
        title: String,
    },
    Text {
        title: String,
    },
    Form {
        title: String,
        values: Vec<String>,
    },
    Message {
        title: String,
        severity: Severity,
    },
    Log {
        from: u64,
    },
}

#[derive(Default)]
struct ScriptedPresenter {
    replies: VecDeque<Reply>,
    shown: Vec<Shown>,
    messages: Vec<String>,
    torn_down: bool,
}

impl ScriptedPresenter {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: replies.into(),
            ..Self::default()
        }
    }

    fn next(&mut self, asking: &str) -> Reply {
        self.replies
            .pop_front()
            .unwrap_or_else(|| panic!("script exhausted while asking: {}", asking))
    }

    fn message_titles(&self) -> Vec<&str> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Message { title, .. } => Some(title.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for ScriptedPresenter {
    fn choose(
        &mut self,
        title: &str,
        _prompt: &str,
        items: &[MenuItem],
        default: Option<&str>,
    ) -> Result<Option<String>> {
        self.shown.push(Shown::Choose {
            title: title.to_string(),
            default: default.map(str::to_string),
        });
        match self.next(title) {
            Reply::Choose(choice) => {
                if let Some(id) = choice {
                    assert!(
                        items.iter().any(|item| item.id == id),
                        "'{}' is not offered on '{}'",
                        id,
                        title
                    );
                }
                Ok(choice.map(str::to_string))
            }
            other => panic!("expected Choose for '{}', scripted {:?}", title, other),
        }
    }

    fn multi_choose(
        &mut self,
        title: &str,
        _prompt: &str,
        _items: &[MenuItem],
        checked: &[String],
    ) -> Result<Option<Vec<String>>> {
        self.shown.push(Shown::Multi {
            title: title.to_string(),
            checked: checked.to_vec(),
        });
        match self.next(title) {
            Reply::Multi(ids) => Ok(ids.map(|v| v.into_iter().map(str::to_string).collect())),
            other => panic!("expected Multi for '{}', scripted {:?}", title, other),
        }
    }

    fn confirm(&mut self, title: &str, _message: &str, _default_yes: bool) -> Result<bool> {
        self.shown.push(Shown::Confirm {
            title: title.to_string(),
        });
        match self.next(title) {
            Reply::Confirm(answer) => Ok(answer),
            other => panic!("expected Confirm for '{}', scripted {:?}", title, other),
        }
    }

    fn text_input(&mut self, title: &str, _prompt: &str, _initial: &str) -> Result<Option<String>> {
        self.shown.push(Shown::Text {
            title: title.to_string(),
        });
        match self.next(title) {
            Reply::Text(text) => Ok(text.map(str::to_string)),
            other => panic!("expected Text for '{}', scripted {:?}", title, other),
        }
    }

    fn form(
        &mut self,
        title: &str,
        _prompt: &str,
        fields: &[FormField],
    ) -> Result<Option<Vec<String>>> {
        self.shown.push(Shown::Form {
            title: title.to_string(),
            values: fields.iter().map(|f| f.value.clone()).collect(),
        });
        match self.next(title) {
            Reply::Form(values) => {
                if let Some(ref values) = values {
                    assert_eq!(values.len(), fields.len());
                }
                Ok(values.map(|v| v.into_iter().map(str::to_string).collect()))
            }
            other => panic!("expected Form for '{}', scripted {:?}", title, other),
        }
    }

    fn show_message(&mut self, title: &str, message: &str, severity: Severity) -> Result<()> {
        self.shown.push(Shown::Message {
            title: title.to_string(),
            severity,
        });
        self.messages.push(message.to_string());
        Ok(())
    }

    fn follow_log(
        &mut self,
        _title: &str,
        _log_path: &Path,
        from: u64,
        finished: &mut ExitPoll<'_>,
    ) -> Result<()> {
        self.shown.push(Shown::Log { from });
        for _ in 0..100 {
            if finished()? {
                return Ok(());
            }
        }
        panic!("backend never reported completion");
    }

    fn teardown(&mut self) -> Result<()> {
        self.torn_down = true;
        Ok(())
    }
}

struct FakeHandle {
    code: i32,
    polls_left: u32,
    waits: Rc<Cell<usize>>,
}

impl BackendHandle for FakeHandle {
    fn log_offset(&self) -> u64 {
        42
    }

    fn poll_exit(&mut self) -> Result<Option<i32>> {
        if self.polls_left == 0 {
            Ok(Some(self.code))
        } else {
            self.polls_left -= 1;
            Ok(None)
        }
    }

    fn wait(&mut self) -> Result<i32> {
        self.waits.set(self.waits.get() + 1);
        Ok(self.code)
    }
}

#[derive(Default)]
struct FakeBackend {
    /// Exit codes for successive runs; `None` fails to start
    runs: VecDeque<Option<i32>>,
    started: Vec<BackendInvocation>,
    log_paths: Vec<PathBuf>,
    /// Number of `wait` calls across all runs
    waits: Rc<Cell<usize>>,
    reboots: usize,
}

impl FakeBackend {
    fn with_runs(runs: Vec<Option<i32>>) -> Self {
        Self {
            runs: runs.into(),
            ..Self::default()
        }
    }
}

impl Backend for FakeBackend {
    fn start(
        &mut self,
        invocation: &BackendInvocation,
        log_path: &Path,
    ) -> Result<Box<dyn BackendHandle>> {
        self.started.push(invocation.clone());
        self.log_paths.push(log_path.to_path_buf());
        match self.runs.pop_front().expect("unexpected backend run") {
            Some(code) => Ok(Box::new(FakeHandle {
                code,
                polls_left: 3,
                waits: Rc::clone(&self.waits),
            })),
            None => Err(WizardError::backend(format!(
                "Failed to start {}: No such file or directory",
                invocation.program
            ))),
        }
    }

    fn reboot(&mut self) -> Result<()> {
        self.reboots += 1;
        Ok(())
    }
}

struct FixedProbe {
    usage: HostUsage,
}

impl FixedProbe {
    fn new() -> Self {
        Self {
            usage: HostUsage::default(),
        }
    }
}

fn drive(name: &str) -> BlockDevice {
    BlockDevice {
        name: name.to_string(),
        size_bytes: 500 * 1024 * 1024 * 1024,
        model: "Test Disk".to_string(),
        rotational: false,
        physical_block_size: 512,
    }
}

impl SystemProbe for FixedProbe {
    fn host_facts(&self) -> HostFacts {
        HostFacts {
            firmware: FirmwareMode::Efi,
            ram_gb: 16,
            cpu_count: 8,
            distro: "Void".to_string(),
            distro_version: String::new(),
            degraded: vec![],
        }
    }

    fn block_devices(&self) -> Vec<BlockDevice> {
        vec![drive("nvme0n1"), drive("sda"), drive("sdb")]
    }

    fn host_usage(&self) -> HostUsage {
        self.usage.clone()
    }
}

fn options(dir: &Path) -> WizardOptions {
    WizardOptions {
        log_path: dir.join("install.log"),
        ..WizardOptions::default()
    }
}

// =============================================================================
// Flows
// =============================================================================

#[test]
fn happy_path_new_mirror() {
    let dir = tempfile::tempdir().expect("tempdir");
    let answers_path = dir.path().join("answers.json");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("new")),
        Reply::Multi(Some(vec!["sda", "sdb"])),
        Reply::Choose(Some("raid")),
        Reply::Choose(Some("mirror")),
        Reply::Choose(Some("continue")),
        Reply::Confirm(true),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::with_runs(vec![Some(0)]);
    let probe = FixedProbe::new();
    let mut session = Session::default();

    let outcome = Wizard::new(
        &mut presenter,
        &mut backend,
        &probe,
        WizardOptions {
            save_config: Some(answers_path.clone()),
            ..options(dir.path())
        },
    )
    .run(&mut session)
    .expect("wizard run");

    assert_eq!(
        outcome.visited,
        [
            Screen::Welcome,
            Screen::ModeSelect,
            Screen::DeviceSelect,
            Screen::Settings,
            Screen::RaidSelect,
            Screen::Settings,
            Screen::Validation,
            Screen::Confirm,
            Screen::Execute,
            Screen::Complete,
            Screen::Quit,
        ]
    );
    assert!(outcome.installed);
    assert!(!outcome.rebooted);
    assert_eq!(outcome.backend_runs, [0]);
    assert_eq!(backend.waits.get(), 1);
    assert!(presenter.torn_down);
    assert!(presenter.replies.is_empty());
    assert!(presenter.shown.contains(&Shown::Log { from: 42 }));

    assert_eq!(backend.started.len(), 1);
    let args = &backend.started[0].args;
    assert_eq!(backend.started[0].program, "zbm-install");
    assert_eq!(&args[..6], ["--mode", "new", "--drives", "sda,sdb", "--pool", "zroot"]);
    assert_eq!(&args[6..8], ["--raid", "mirror"]);
    assert_eq!(backend.log_paths[0], dir.path().join("install.log"));
    assert_eq!(backend.reboots, 0);

    let saved = zbm_wizard::answers::load_answers(&answers_path).expect("saved answers");
    assert_eq!(saved, session.config);
}

#[test]
fn failed_backend_returns_to_settings_and_retries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("new")),
        Reply::Multi(Some(vec!["nvme0n1"])),
        Reply::Choose(Some("continue")),
        Reply::Confirm(true),
        // backend exits 2, back at the hub
        Reply::Choose(Some("continue")),
        Reply::Confirm(true),
        Reply::Confirm(true),
    ]);
    let mut backend = FakeBackend::with_runs(vec![Some(2), Some(0)]);
    let probe = FixedProbe::new();
    let mut session = Session::default();

    let outcome = Wizard::new(&mut presenter, &mut backend, &probe, options(dir.path()))
        .run(&mut session)
        .expect("wizard run");

    assert_eq!(outcome.backend_runs, [2, 0]);
    assert_eq!(backend.waits.get(), 2);
    assert!(outcome.installed);
    assert!(outcome.rebooted);
    assert_eq!(backend.reboots, 1);
    assert_eq!(backend.started.len(), 2);
    assert_eq!(backend.started[0], backend.started[1]);

    let after_failure = outcome
        .visited
        .iter()
        .position(|s| *s == Screen::Execute)
        .expect("execute visited");
    assert_eq!(outcome.visited[after_failure + 1], Screen::Settings);

    assert!(presenter.message_titles().contains(&"Installation Failed"));
    let failure = presenter
        .messages
        .iter()
        .find(|m| m.contains("exited with status 2"))
        .expect("failure message");
    assert!(failure.contains("install.log"));
}

#[test]
fn validation_failure_and_backing_out_keeps_answers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("existing")),
        Reply::Multi(Some(vec!["sda"])),
        Reply::Choose(Some("raid")),
        Reply::Choose(Some("raidz1")),
        Reply::Choose(Some("continue")),
        // validation fails: raidz1 on one drive
        Reply::Choose(Some("raid")),
        Reply::Choose(None),
        Reply::Choose(None),
        Reply::Multi(None),
        Reply::Choose(None),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::default();
    let probe = FixedProbe::new();
    let mut session = Session::default();

    let outcome = Wizard::new(&mut presenter, &mut backend, &probe, options(dir.path()))
        .run(&mut session)
        .expect("wizard run");

    assert!(backend.started.is_empty());
    assert!(!outcome.installed);
    assert_eq!(outcome.visited.last(), Some(&Screen::Quit));
    assert_eq!(
        presenter.message_titles(),
        ["Validation"],
        "only the validation result is shown"
    );
    assert!(presenter.messages[0].contains("RAIDZ1 requires at least 3 drives"));

    // Re-entered screens preselect earlier answers
    let raid_defaults: Vec<Option<String>> = presenter
        .shown
        .iter()
        .filter_map(|s| match s {
            Shown::Choose { title, default } if title == "RAID Level" => Some(default.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        raid_defaults,
        [Some("none".to_string()), Some("raidz1".to_string())]
    );
    let checked: Vec<Vec<String>> = presenter
        .shown
        .iter()
        .filter_map(|s| match s {
            Shown::Multi { checked, .. } => Some(checked.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(checked, [vec![], vec!["sda".to_string()]]);

    assert_eq!(session.config.mode(), Some(InstallMode::Existing));
    assert_eq!(session.config.raid_level(), RaidLevel::Raidz1);
    assert_eq!(session.config.devices(), ["sda"]);
}

#[test]
fn migration_options_refused_in_new_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("new")),
        Reply::Multi(Some(vec!["sda"])),
        Reply::Choose(Some("existing")),
        Reply::Choose(None),
        Reply::Multi(None),
        Reply::Choose(None),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::default();
    let probe = FixedProbe::new();

    let outcome = Wizard::new(&mut presenter, &mut backend, &probe, options(dir.path()))
        .run(&mut Session::default())
        .expect("wizard run");

    assert_eq!(
        &outcome.visited[3..5],
        [Screen::Settings, Screen::Settings]
    );
    assert!(!outcome.visited.contains(&Screen::ExistingOptions));
    assert!(presenter.message_titles().contains(&"Not Available"));
}

#[test]
fn migration_options_edit_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("existing")),
        Reply::Multi(Some(vec!["sda", "sdb"])),
        Reply::Choose(Some("existing")),
        Reply::Choose(Some("home")),
        Reply::Choose(Some("add")),
        Reply::Text(Some("/home/*/Downloads")),
        Reply::Choose(Some("add")),
        Reply::Text(Some("  /var/cache ")),
        Reply::Choose(Some("source")),
        Reply::Text(Some("relative/path")),
        Reply::Choose(Some("source")),
        Reply::Text(Some("/mnt/old")),
        Reply::Choose(Some("list")),
        Reply::Choose(Some("done")),
        Reply::Choose(None),
        Reply::Multi(None),
        Reply::Choose(None),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::default();
    let probe = FixedProbe::new();
    let mut session = Session::default();

    Wizard::new(&mut presenter, &mut backend, &probe, options(dir.path()))
        .run(&mut session)
        .expect("wizard run");

    let config = &session.config;
    assert!(!config.copy_home());
    assert_eq!(config.exclusions(), ["/home/*/Downloads", "/var/cache"]);
    assert_eq!(config.source_root(), "/mnt/old");
    assert_eq!(
        presenter.message_titles(),
        ["Invalid Path", "Exclusions"]
    );

    let args = config.synthesize_command("zbm-install").args;
    assert!(args.contains(&"--no-copy-home".to_string()));
    assert!(args.windows(2).any(|w| w == ["--source-root", "/mnt/old"]));
}

#[test]
fn pool_form_reshown_until_valid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("new")),
        Reply::Multi(Some(vec!["sda"])),
        Reply::Choose(Some("pool")),
        Reply::Form(Some(vec!["bad name!", "20", "1G", "8G", ""])),
        Reply::Form(Some(vec!["tank", "12", "512M", "4G", "zbox"])),
        Reply::Choose(Some("lz4")),
        Reply::Choose(None),
        Reply::Multi(None),
        Reply::Choose(None),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::default();
    let probe = FixedProbe::new();
    let mut session = Session::default();

    Wizard::new(&mut presenter, &mut backend, &probe, options(dir.path()))
        .run(&mut session)
        .expect("wizard run");

    let forms: Vec<Vec<String>> = presenter
        .shown
        .iter()
        .filter_map(|s| match s {
            Shown::Form { values, .. } => Some(values.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0], ["zroot", "", "1G", "8G", ""]);
    assert_eq!(forms[1], ["bad name!", "20", "1G", "8G", ""]);
    assert_eq!(presenter.message_titles(), ["Invalid Settings"]);
    assert!(presenter.messages[0].contains("Ashift"));

    let config = &session.config;
    assert_eq!(config.pool_name(), "tank");
    assert_eq!(config.ashift(), Some(12));
    assert_eq!(config.efi_size(), "512M");
    assert_eq!(config.swap_size(), "4G");
    assert_eq!(config.hostname(), Some("zbox"));
    assert_eq!(config.compression(), Compression::Lz4);
}

#[test]
fn existing_pool_name_needs_force() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = || {
        vec![
            Reply::Confirm(true),
            Reply::Choose(Some("new")),
            Reply::Multi(Some(vec!["sda"])),
            Reply::Choose(Some("pool")),
            Reply::Form(Some(vec!["rpool", "", "1G", "8G", ""])),
            Reply::Choose(None),
            Reply::Choose(None),
            Reply::Multi(None),
            Reply::Choose(None),
            Reply::Confirm(false),
        ]
    };
    let probe = FixedProbe {
        usage: HostUsage {
            pools: vec!["rpool".to_string()],
            ..HostUsage::default()
        },
    };

    // Without --force the form comes back; cancelling it leaves the name alone
    let mut replies = script();
    replies[5] = Reply::Form(None);
    let mut presenter = ScriptedPresenter::new(replies);
    let mut session = Session::default();
    Wizard::new(&mut presenter, &mut FakeBackend::default(), &probe, options(dir.path()))
        .run(&mut session)
        .expect("wizard run");
    assert_eq!(session.config.pool_name(), "zroot");
    assert_eq!(presenter.message_titles(), ["Invalid Settings"]);

    let mut presenter = ScriptedPresenter::new(script());
    let mut session = Session::default();
    Wizard::new(
        &mut presenter,
        &mut FakeBackend::default(),
        &probe,
        WizardOptions {
            force: true,
            ..options(dir.path())
        },
    )
    .run(&mut session)
    .expect("wizard run");
    assert_eq!(session.config.pool_name(), "rpool");
}

#[test]
fn unavailable_backend_returns_to_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("new")),
        Reply::Multi(Some(vec!["sda"])),
        Reply::Choose(Some("continue")),
        Reply::Confirm(true),
        Reply::Choose(None),
        Reply::Multi(None),
        Reply::Choose(None),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::with_runs(vec![None]);
    let probe = FixedProbe::new();

    let outcome = Wizard::new(&mut presenter, &mut backend, &probe, options(dir.path()))
        .run(&mut Session::default())
        .expect("wizard run");

    assert!(outcome.backend_runs.is_empty());
    assert!(!outcome.installed);
    assert!(presenter.message_titles().contains(&"Installer Unavailable"));
    assert!(!presenter.shown.iter().any(|s| matches!(s, Shown::Log { .. })));
}

#[test]
fn declined_confirmation_runs_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let answers_path = dir.path().join("answers.json");
    let mut preset = InstallConfig::new();
    preset.set_mode(InstallMode::New);
    preset.set_devices(vec!["sdb".into()]);

    let mut presenter = ScriptedPresenter::new(vec![
        Reply::Confirm(true),
        Reply::Choose(Some("new")),
        Reply::Multi(Some(vec!["sdb"])),
        Reply::Choose(Some("continue")),
        Reply::Confirm(false),
        Reply::Choose(None),
        Reply::Multi(None),
        Reply::Choose(None),
        Reply::Confirm(false),
    ]);
    let mut backend = FakeBackend::default();
    let probe = FixedProbe::new();
    let mut session = Session::new(preset);

    Wizard::new(
        &mut presenter,
        &mut backend,
        &probe,
        WizardOptions {
            save_config: Some(answers_path.clone()),
            ..options(dir.path())
        },
    )
    .run(&mut session)
    .expect("wizard run");

    assert!(backend.started.is_empty());
    assert!(!answers_path.exists());
    assert!(presenter.shown.contains(&Shown::Choose {
        title: "Select Installation Mode".to_string(),
        default: Some("new".to_string()),
    }));
}
