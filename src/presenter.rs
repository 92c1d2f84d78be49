//! Presentation seam between the workflow engine and the terminal.
//!
//! The wizard only talks to a `Presenter`: it offers choices and gets back
//! a selection or a cancellation. Cancellation is always `None` (or `false`
//! for yes/no questions) and is never an error; `Err` is reserved for a
//! broken terminal.

use crate::error::Result;
use crate::theme::Severity;
use std::path::Path;

/// One entry of a menu or checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Value returned when the entry is picked
    pub id: String,
    pub label: String,
    /// Secondary text, may be empty
    pub description: String,
}

impl MenuItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One text field of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: String,
    /// Initial contents
    pub value: String,
    /// Hint shown while the field is focused
    pub help: String,
}

impl FormField {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            help: String::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// Reports whether the watched process has finished.
pub type ExitPoll<'a> = dyn FnMut() -> Result<bool> + 'a;

/// Dialog toolkit consumed by the wizard.
pub trait Presenter {
    /// Single choice from `items`; `default` is the id highlighted first.
    fn choose(
        &mut self,
        title: &str,
        prompt: &str,
        items: &[MenuItem],
        default: Option<&str>,
    ) -> Result<Option<String>>;

    /// Any number of choices; returns the checked ids in item order.
    fn multi_choose(
        &mut self,
        title: &str,
        prompt: &str,
        items: &[MenuItem],
        checked: &[String],
    ) -> Result<Option<Vec<String>>>;

    /// Yes/no question. Cancellation counts as "no".
    fn confirm(&mut self, title: &str, message: &str, default_yes: bool) -> Result<bool>;

    fn text_input(&mut self, title: &str, prompt: &str, initial: &str) -> Result<Option<String>>;

    /// Several text fields at once; returns their values in field order.
    fn form(&mut self, title: &str, prompt: &str, fields: &[FormField])
        -> Result<Option<Vec<String>>>;

    /// Blocking message box, dismissed by the operator.
    fn show_message(&mut self, title: &str, message: &str, severity: Severity) -> Result<()>;

    /// Tail `log_path` from byte `from` until `finished` reports true.
    ///
    /// Operator input cannot end the view early; once the process has
    /// finished the presenter may wait for an acknowledgement.
    fn follow_log(
        &mut self,
        title: &str,
        log_path: &Path,
        from: u64,
        finished: &mut ExitPoll<'_>,
    ) -> Result<()>;

    /// Restore the terminal. Called once, on the way out.
    fn teardown(&mut self) -> Result<()>;
}
