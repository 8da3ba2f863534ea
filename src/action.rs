use std::fmt;
use std::num::NonZeroU32;

use thiserror::Error;

use crate::config::{Config, ModelSettings};

/// Numbered custom-prompt slot. Slot 1 is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(NonZeroU32);

impl Slot {
    pub const DEFAULT: Slot = Slot(NonZeroU32::MIN);

    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn parse(raw: &str) -> Result<Self, InvocationError> {
        raw.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvocationError::InvalidSlot(raw.to_string()))
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Rewrite,
    Ask,
    CustomPrompt(Slot),
}

impl Action {
    pub const SUPPORTED: [&'static str; 3] = ["Rewrite", "Ask", "CustomPrompt"];

    /// Parses the action name exactly as it is typed on the command line.
    pub fn parse(name: &str, slot: Option<&str>) -> Result<Self, InvocationError> {
        match name {
            "Rewrite" => Ok(Action::Rewrite),
            "Ask" => Ok(Action::Ask),
            "CustomPrompt" => {
                let slot = match slot {
                    Some(raw) => Slot::parse(raw)?,
                    None => Slot::DEFAULT,
                };
                Ok(Action::CustomPrompt(slot))
            }
            other => Err(InvocationError::UnsupportedAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Rewrite => "Rewrite",
            Action::Ask => "Ask",
            Action::CustomPrompt(_) => "CustomPrompt",
        }
    }

    /// Label for the trigger control.
    pub fn label(&self) -> String {
        match self {
            Action::CustomPrompt(slot) if *slot != Slot::DEFAULT => {
                format!("CustomPrompt #{}", slot)
            }
            _ => self.name().to_string(),
        }
    }

    pub fn model_settings<'a>(&self, config: &'a Config) -> &'a ModelSettings {
        match self {
            Action::Rewrite => &config.rewrite,
            Action::Ask => &config.ask,
            Action::CustomPrompt(_) => &config.custom,
        }
    }

    /// Only rewritten text goes back to the clipboard automatically.
    pub fn copies_result(&self) -> bool {
        matches!(self, Action::Rewrite)
    }

    pub fn runs_on_startup(&self) -> bool {
        matches!(self, Action::Rewrite)
    }

    /// Builds the initial contents of the input pane from the clipboard.
    /// CustomPrompt seeds from the stored template instead, see
    /// [`crate::prompt::PromptStore::load`].
    pub fn seed_input(&self, clipboard: &str) -> String {
        match self {
            Action::Ask => format!("Explain: {}", clipboard),
            _ => clipboard.to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CustomPrompt(slot) => write!(f, "CustomPrompt({})", slot),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvocationError {
    #[error("missing action argument")]
    MissingAction,
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    #[error("invalid prompt slot '{0}', expected a positive number")]
    InvalidSlot(String),
}

/// What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Run(Action),
    ListPrompts,
}

impl Invocation {
    /// Parses arguments without the program name.
    pub fn from_args<I, S>(args: I) -> Result<Self, InvocationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

        if args.iter().any(|arg| arg == "--prompts") {
            return Ok(Invocation::ListPrompts);
        }

        let name = args.first().ok_or(InvocationError::MissingAction)?;
        let action = Action::parse(name, args.get(1).map(String::as_str))?;
        Ok(Invocation::Run(action))
    }

    pub fn usage(program: &str) -> String {
        format!(
            "Usage:\n  {program} <ACTION> [SLOT]\n  {program} --prompts\n Supported actions: {}\n SLOT selects the CustomPrompt template (default 1)",
            Action::SUPPORTED.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions() {
        assert_eq!(
            Invocation::from_args(["Rewrite"]),
            Ok(Invocation::Run(Action::Rewrite))
        );
        assert_eq!(
            Invocation::from_args(["Ask"]),
            Ok(Invocation::Run(Action::Ask))
        );
        assert_eq!(
            Invocation::from_args(["CustomPrompt"]),
            Ok(Invocation::Run(Action::CustomPrompt(Slot::DEFAULT)))
        );
        assert_eq!(
            Invocation::from_args(["CustomPrompt", "2"]),
            Ok(Invocation::Run(Action::CustomPrompt(Slot::new(2).unwrap())))
        );
    }

    #[test]
    fn rejects_missing_and_unknown_actions() {
        let empty: [&str; 0] = [];
        assert_eq!(
            Invocation::from_args(empty),
            Err(InvocationError::MissingAction)
        );
        assert_eq!(
            Invocation::from_args(["rewrite"]),
            Err(InvocationError::UnsupportedAction("rewrite".into()))
        );
        assert_eq!(
            Invocation::from_args(["CustomPrompt", "0"]),
            Err(InvocationError::InvalidSlot("0".into()))
        );
        assert_eq!(
            Invocation::from_args(["CustomPrompt", "two"]),
            Err(InvocationError::InvalidSlot("two".into()))
        );
    }

    #[test]
    fn prompts_flag_wins() {
        assert_eq!(
            Invocation::from_args(["--prompts"]),
            Ok(Invocation::ListPrompts)
        );
    }

    #[test]
    fn temperatures_follow_action_intent() {
        let config = Config::default();
        assert_eq!(Action::Ask.model_settings(&config).temperature, 0.0);
        assert!(Action::Rewrite.model_settings(&config).temperature >= 0.9);
        let custom = Action::CustomPrompt(Slot::DEFAULT);
        assert!((custom.model_settings(&config).temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn ask_seed_gets_explain_prefix() {
        assert_eq!(Action::Ask.seed_input("borrowck"), "Explain: borrowck");
        assert_eq!(Action::Rewrite.seed_input("borrowck"), "borrowck");
    }

    #[test]
    fn usage_lists_actions() {
        let usage = Invocation::usage("aihelper-rs");
        assert!(usage.contains("Rewrite, Ask, CustomPrompt"));
    }
}
