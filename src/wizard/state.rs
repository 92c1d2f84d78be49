//! Screen state machine
//!
//! The wizard's screens are a tagged enum and every move between them goes
//! through `transition`, a pure `(Screen, Event) -> Screen` function. Screen
//! handlers never pick their successor directly; they report what happened
//! as an `Event`.
//!
//! # Screen Flow
//!
//! ```text
//! Welcome ──► ModeSelect ──► DeviceSelect ──► Settings ◄──► RaidSelect
//!    │            ▲               ▲           │   ▲  ◄──► PoolSettings
//!    ▼            └── Back ───────┘── Back ───┘   │  ◄──► ExistingOptions
//!  Quit                                          ▼   │
//!                                         Validation ─┤ (failed)
//!                                                ▼   │
//!                                            Confirm ─┤ (declined)
//!                                                ▼   │
//!                                            Execute ─┘ (backend failed)
//!                                                ▼
//!                                            Complete ──► Quit
//! ```
//!
//! `Execute` is the only state whose event comes from a blocking wait: the
//! backend's exit status.

use std::fmt;
use thiserror::Error;

/// Wizard screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Screen {
    #[default]
    Welcome,
    ModeSelect,
    DeviceSelect,
    /// Re-entrant hub with the settings sub-menu
    Settings,
    RaidSelect,
    PoolSettings,
    ExistingOptions,
    Validation,
    /// Destructive-action confirmation
    Confirm,
    /// Backend running; blocks until it exits
    Execute,
    Complete,
    Quit,
}

impl Screen {
    /// Returns true for the terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Quit)
    }

    /// Returns true for the state that waits on the backend.
    #[inline]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Execute)
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Welcome => "ZFSBootMenu Installation",
            Self::ModeSelect => "Select Installation Mode",
            Self::DeviceSelect => "Select Target Drives",
            Self::Settings => "Installation Settings",
            Self::RaidSelect => "RAID Level",
            Self::PoolSettings => "Pool Settings",
            Self::ExistingOptions => "Migration Options",
            Self::Validation => "Validation",
            Self::Confirm => "Confirm Installation",
            Self::Execute => "Installing",
            Self::Complete => "Installation Complete",
            Self::Quit => "Quit",
        }
    }

    /// All screens, in flow order.
    pub const fn all() -> &'static [Self] {
        &[
            Self::Welcome,
            Self::ModeSelect,
            Self::DeviceSelect,
            Self::Settings,
            Self::RaidSelect,
            Self::PoolSettings,
            Self::ExistingOptions,
            Self::Validation,
            Self::Confirm,
            Self::Execute,
            Self::Complete,
            Self::Quit,
        ]
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Entries of the settings hub menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsChoice {
    Raid,
    Pool,
    Existing,
    Continue,
}

impl SettingsChoice {
    pub const fn all() -> &'static [Self] {
        &[Self::Raid, Self::Pool, Self::Existing, Self::Continue]
    }

    /// Stable identifier used as the menu item key.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Raid => "raid",
            Self::Pool => "pool",
            Self::Existing => "existing",
            Self::Continue => "continue",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.id() == id)
    }
}

/// What a screen handler observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Positive answer to a yes/no screen
    Accept,
    /// Negative answer to a yes/no screen
    Decline,
    /// Presenter cancellation: navigate backwards
    Back,
    ModeChosen,
    DevicesChosen,
    Open(SettingsChoice),
    /// Existing-mode options requested while mode is not `existing`
    Refused,
    /// A settings sub-screen finished
    Done,
    ValidationPassed,
    ValidationFailed,
    /// Backend exited with the given code (`-1` when killed by a signal)
    BackendExited(i32),
    /// Backend could not be started at all
    BackendUnavailable,
}

/// Errors returned for events a screen does not accept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Screen '{screen}' does not accept event {event:?}")]
    Unexpected { screen: Screen, event: Event },

    #[error("Cannot leave terminal screen '{screen}'")]
    FromTerminal { screen: Screen },
}

impl From<TransitionError> for crate::error::WizardError {
    fn from(err: TransitionError) -> Self {
        crate::error::WizardError::transition(err.to_string())
    }
}

/// The transition table.
pub fn transition(screen: Screen, event: Event) -> Result<Screen, TransitionError> {
    use Event as E;
    use Screen as S;

    let next = match (screen, event) {
        (S::Quit, _) => return Err(TransitionError::FromTerminal { screen }),

        (S::Welcome, E::Accept) => S::ModeSelect,
        (S::Welcome, E::Decline | E::Back) => S::Quit,

        (S::ModeSelect, E::ModeChosen) => S::DeviceSelect,
        (S::ModeSelect, E::Back) => S::Welcome,

        (S::DeviceSelect, E::DevicesChosen) => S::Settings,
        (S::DeviceSelect, E::Back) => S::ModeSelect,

        (S::Settings, E::Open(SettingsChoice::Raid)) => S::RaidSelect,
        (S::Settings, E::Open(SettingsChoice::Pool)) => S::PoolSettings,
        (S::Settings, E::Open(SettingsChoice::Existing)) => S::ExistingOptions,
        (S::Settings, E::Open(SettingsChoice::Continue)) => S::Validation,
        (S::Settings, E::Refused) => S::Settings,
        (S::Settings, E::Back) => S::DeviceSelect,

        (S::RaidSelect | S::PoolSettings | S::ExistingOptions, E::Done | E::Back) => S::Settings,

        (S::Validation, E::ValidationPassed) => S::Confirm,
        (S::Validation, E::ValidationFailed) => S::Settings,

        (S::Confirm, E::Accept) => S::Execute,
        (S::Confirm, E::Decline | E::Back) => S::Settings,

        (S::Execute, E::BackendExited(0)) => S::Complete,
        (S::Execute, E::BackendExited(_) | E::BackendUnavailable) => S::Settings,

        (S::Complete, E::Done) => S::Quit,

        _ => return Err(TransitionError::Unexpected { screen, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_reaches_quit() {
        let script = [
            Event::Accept,
            Event::ModeChosen,
            Event::DevicesChosen,
            Event::Open(SettingsChoice::Continue),
            Event::ValidationPassed,
            Event::Accept,
            Event::BackendExited(0),
            Event::Done,
        ];
        let mut screen = Screen::Welcome;
        for event in script {
            screen = transition(screen, event).expect("valid transition");
        }
        assert_eq!(screen, Screen::Quit);
        assert!(screen.is_terminal());
    }

    #[test]
    fn test_backward_transitions() {
        assert_eq!(transition(Screen::ModeSelect, Event::Back), Ok(Screen::Welcome));
        assert_eq!(
            transition(Screen::DeviceSelect, Event::Back),
            Ok(Screen::ModeSelect)
        );
        assert_eq!(
            transition(Screen::Settings, Event::Back),
            Ok(Screen::DeviceSelect)
        );
        assert_eq!(transition(Screen::Welcome, Event::Decline), Ok(Screen::Quit));
    }

    #[test]
    fn test_backend_failure_returns_to_settings() {
        assert_eq!(
            transition(Screen::Execute, Event::BackendExited(2)),
            Ok(Screen::Settings)
        );
        assert_eq!(
            transition(Screen::Execute, Event::BackendExited(-1)),
            Ok(Screen::Settings)
        );
        assert_eq!(
            transition(Screen::Execute, Event::BackendUnavailable),
            Ok(Screen::Settings)
        );
    }

    #[test]
    fn test_execute_ignores_navigation() {
        for event in [Event::Back, Event::Decline, Event::Accept, Event::Done] {
            assert!(matches!(
                transition(Screen::Execute, event),
                Err(TransitionError::Unexpected { .. })
            ));
        }
    }

    #[test]
    fn test_quit_is_terminal() {
        for &screen in Screen::all() {
            assert_eq!(screen.is_terminal(), screen == Screen::Quit);
        }
        assert_eq!(
            transition(Screen::Quit, Event::Accept),
            Err(TransitionError::FromTerminal { screen: Screen::Quit })
        );
    }

    #[test]
    fn test_only_execute_blocks() {
        for &screen in Screen::all() {
            assert_eq!(screen.is_blocking(), screen == Screen::Execute);
        }
    }

    #[test]
    fn test_settings_choice_ids_round_trip() {
        for &choice in SettingsChoice::all() {
            assert_eq!(SettingsChoice::from_id(choice.id()), Some(choice));
        }
        assert_eq!(SettingsChoice::from_id("bogus"), None);
    }

    #[test]
    fn test_error_display() {
        let err = transition(Screen::Welcome, Event::DevicesChosen).unwrap_err();
        assert!(err.to_string().contains("does not accept"));
    }
}
