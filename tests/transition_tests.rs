//! Transition table tests
//!
//! Every `(Screen, Event)` pair is checked against the expected table;
//! anything not listed must be rejected.

use zbm_wizard::wizard::{transition, Event, Screen, SettingsChoice, TransitionError};

fn all_events() -> Vec<Event> {
    let mut events = vec![
        Event::Accept,
        Event::Decline,
        Event::Back,
        Event::ModeChosen,
        Event::DevicesChosen,
        Event::Refused,
        Event::Done,
        Event::ValidationPassed,
        Event::ValidationFailed,
        Event::BackendExited(0),
        Event::BackendExited(1),
        Event::BackendExited(-1),
        Event::BackendUnavailable,
    ];
    events.extend(SettingsChoice::all().iter().map(|c| Event::Open(*c)));
    events
}

fn expected(screen: Screen, event: Event) -> Option<Screen> {
    use Event as E;
    use Screen as S;

    let next = match (screen, event) {
        (S::Welcome, E::Accept) => S::ModeSelect,
        (S::Welcome, E::Decline) => S::Quit,
        (S::Welcome, E::Back) => S::Quit,
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
        (S::RaidSelect, E::Done | E::Back) => S::Settings,
        (S::PoolSettings, E::Done | E::Back) => S::Settings,
        (S::ExistingOptions, E::Done | E::Back) => S::Settings,
        (S::Validation, E::ValidationPassed) => S::Confirm,
        (S::Validation, E::ValidationFailed) => S::Settings,
        (S::Confirm, E::Accept) => S::Execute,
        (S::Confirm, E::Decline | E::Back) => S::Settings,
        (S::Execute, E::BackendExited(0)) => S::Complete,
        (S::Execute, E::BackendExited(_)) => S::Settings,
        (S::Execute, E::BackendUnavailable) => S::Settings,
        (S::Complete, E::Done) => S::Quit,
        _ => return None,
    };
    Some(next)
}

#[test]
fn every_pair_matches_the_table() {
    for &screen in Screen::all() {
        for event in all_events() {
            let actual = transition(screen, event);
            match expected(screen, event) {
                Some(next) => assert_eq!(
                    actual,
                    Ok(next),
                    "{:?} --{:?}--> expected {:?}",
                    screen,
                    event,
                    next
                ),
                None => assert!(
                    actual.is_err(),
                    "{:?} --{:?}--> should be rejected, got {:?}",
                    screen,
                    event,
                    actual
                ),
            }
        }
    }
}

#[test]
fn quit_is_terminal() {
    for event in all_events() {
        assert_eq!(
            transition(Screen::Quit, event),
            Err(TransitionError::FromTerminal {
                screen: Screen::Quit
            })
        );
    }
}

#[test]
fn only_execute_blocks() {
    let blocking: Vec<Screen> = Screen::all()
        .iter()
        .copied()
        .filter(|s| s.is_blocking())
        .collect();
    assert_eq!(blocking, [Screen::Execute]);
}

#[test]
fn every_screen_is_reachable_from_welcome() {
    let mut seen = vec![Screen::Welcome];
    let mut frontier = vec![Screen::Welcome];
    while let Some(screen) = frontier.pop() {
        for event in all_events() {
            if let Ok(next) = transition(screen, event) {
                if !seen.contains(&next) {
                    seen.push(next);
                    frontier.push(next);
                }
            }
        }
    }
    for screen in Screen::all() {
        assert!(seen.contains(screen), "{:?} unreachable", screen);
    }
}
