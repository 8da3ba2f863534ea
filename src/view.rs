use crate::dispatch::{DispatchEvent, Outcome};

pub const COPIED_LABEL: &str = "Copied into the clipboard";
pub const WORKING_LABEL: &str = "Working…";
pub const SKIPPED_LABEL: &str = "Nothing to send";

/// State of the two-pane view. Only the UI side mutates it, by applying
/// [`DispatchEvent`]s received from the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub input: String,
    pub output: String,
    pub info: String,
    busy: bool,
    latest_generation: u64,
}

impl ViewState {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_generation
    }

    /// Applies `event` and reports whether the view changed. Results from
    /// any generation other than the latest one are dropped.
    pub fn apply(&mut self, event: DispatchEvent) -> bool {
        match event {
            DispatchEvent::Started { generation } => {
                if generation <= self.latest_generation {
                    return false;
                }
                self.latest_generation = generation;
                self.busy = true;
                self.info = WORKING_LABEL.to_string();
                true
            }
            DispatchEvent::Finished {
                generation,
                outcome,
            } => {
                if generation != self.latest_generation {
                    tracing::debug!(
                        generation,
                        latest = self.latest_generation,
                        "Discarding stale result"
                    );
                    return false;
                }

                self.busy = false;
                match outcome {
                    Outcome::Completed { text, copied } => {
                        self.output = text;
                        self.info = if copied {
                            COPIED_LABEL.to_string()
                        } else {
                            String::new()
                        };
                    }
                    Outcome::Failed { message } => {
                        self.output = message;
                        self.info = String::new();
                    }
                    Outcome::Skipped => {
                        self.info = SKIPPED_LABEL.to_string();
                    }
                }
                true
            }
        }
    }
}
