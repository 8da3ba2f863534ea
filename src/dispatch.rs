use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::clipboard::ClipboardAccess;
use crate::completion::{CompletionBackend, CompletionRequest};
use crate::config::Config;
use crate::journal::{ActionJournal, LogEntry};
use crate::logging::{record_completion, CompletionRecord};
use crate::prompt::{self, PromptStore};

/// Shown instead of the underlying error when an action fails.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, try again later.";

/// Keeps the first `max_chars` characters and trims surrounding whitespace.
pub fn clip_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Everything an action needs, built once at startup.
pub struct AppContext {
    pub config: Config,
    pub backend: Arc<dyn CompletionBackend>,
    pub clipboard: Arc<dyn ClipboardAccess>,
    pub prompts: PromptStore,
    pub journal: ActionJournal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { text: String, copied: bool },
    Failed { message: String },
    /// Input was empty after clipping; nothing was sent.
    Skipped,
}

impl Outcome {
    fn failed() -> Self {
        Outcome::Failed {
            message: GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Worker-to-UI messages. Every `Started` is followed by exactly one
/// `Finished` with the same generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Started { generation: u64 },
    Finished { generation: u64, outcome: Outcome },
}

impl DispatchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            DispatchEvent::Started { generation } | DispatchEvent::Finished { generation, .. } => {
                *generation
            }
        }
    }
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs one action at a time on a tokio task and reports back over a channel.
pub struct Dispatcher {
    action: Action,
    context: Arc<AppContext>,
    busy: Arc<AtomicBool>,
    generation: AtomicU64,
    events: mpsc::UnboundedSender<DispatchEvent>,
}

impl Dispatcher {
    pub fn new(
        action: Action,
        context: Arc<AppContext>,
    ) -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            action,
            context,
            busy: Arc::new(AtomicBool::new(false)),
            generation: AtomicU64::new(0),
            events,
        };
        (dispatcher, events_rx)
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Starts the action on `raw_input` and returns its generation, or `None`
    /// when another submission is still in flight. Must be called from within
    /// a tokio runtime.
    pub fn submit(&self, raw_input: &str) -> Option<u64> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Still processing previous request, ignoring submission");
            return None;
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.events.send(DispatchEvent::Started { generation });
        info!("▶️  {} submitted (generation {})", self.action, generation);

        let action = self.action;
        let context = Arc::clone(&self.context);
        let events = self.events.clone();
        let input = raw_input.to_string();

        tokio::spawn(async move {
            let worker = tokio::spawn(run_action(action, context, input, generation));
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!("❌ {} worker aborted: {}", action, err);
                    Outcome::failed()
                }
            };

            drop(guard);
            let _ = events.send(DispatchEvent::Finished {
                generation,
                outcome,
            });
        });

        Some(generation)
    }
}

/// The text actually sent for `raw_input`: the clipboard for custom prompts,
/// the input itself otherwise. Clipped to `max_input_chars`.
fn effective_input(action: &Action, context: &AppContext, raw_input: &str) -> String {
    let max_chars = context.config.max_input_chars;
    match action {
        Action::CustomPrompt(_) => clip_text(&context.clipboard.read_text(), max_chars),
        Action::Rewrite | Action::Ask => clip_text(raw_input, max_chars),
    }
}

async fn run_action(
    action: Action,
    context: Arc<AppContext>,
    raw_input: String,
    generation: u64,
) -> Outcome {
    let input = effective_input(&action, &context, &raw_input);

    match execute(&action, &context, &raw_input, &input).await {
        Ok(Some(text)) => {
            let copied = action.copies_result()
                && context.config.copy_rewrite_result
                && copy_result(context.clipboard.as_ref(), &text);

            if let Err(err) = context
                .journal
                .append(&LogEntry::success(action.to_string(), &input, &text))
            {
                warn!("Failed to write journal entry: {:#}", err);
            }

            record_completion(CompletionRecord::new(
                action.to_string(),
                generation,
                input,
                text.clone(),
                matches!(action, Action::Rewrite),
            ));
            info!("✅ {} finished (generation {})", action, generation);

            Outcome::Completed { text, copied }
        }
        Ok(None) => {
            debug!("Empty input for {}, nothing to send", action);
            Outcome::Skipped
        }
        Err(err) => {
            error!("❌ {} failed: {:#}", action, err);
            if let Err(journal_err) = context.journal.append(&LogEntry::failure(
                action.to_string(),
                &input,
                format!("{err:#}"),
            )) {
                warn!("Failed to write journal entry: {:#}", journal_err);
            }
            Outcome::failed()
        }
    }
}

async fn execute(
    action: &Action,
    context: &AppContext,
    raw_input: &str,
    input: &str,
) -> Result<Option<String>> {
    // For custom prompts the edited text becomes the stored template, even
    // when there is nothing to send.
    let template = match action {
        Action::CustomPrompt(slot) => Some(
            context
                .prompts
                .save(*slot, raw_input)
                .context("Failed to save custom prompt")?,
        ),
        Action::Rewrite | Action::Ask => None,
    };

    if input.is_empty() {
        return Ok(None);
    }

    let prompt = prompt::build(action, input, template.as_ref())?;
    let settings = action.model_settings(&context.config);
    let request = CompletionRequest::single(
        settings.model.as_str(),
        settings.temperature,
        prompt,
        context.config.max_tokens,
    );

    let text = context
        .backend
        .complete(request)
        .await
        .with_context(|| format!("{} completion via {} failed", action, context.backend.name()))?;

    Ok(Some(text))
}

fn copy_result(clipboard: &dyn ClipboardAccess, text: &str) -> bool {
    match clipboard.write_text(text) {
        Ok(()) => true,
        Err(err) => {
            warn!("Failed to copy result to clipboard: {:#}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_text_keeps_short_input_trimmed() {
        assert_eq!(clip_text("  hello  ", 10), "hello");
        assert_eq!(clip_text("", 10), "");
        assert_eq!(clip_text("   ", 10), "");
    }

    #[test]
    fn clip_text_slices_by_characters_then_trims() {
        assert_eq!(clip_text("abcdef", 3), "abc");
        assert_eq!(clip_text("ab   cdef", 4), "ab");
        assert_eq!(clip_text("ééééé", 2), "éé");
        assert_eq!(clip_text("abc", 3), "abc");
    }

    #[test]
    fn clip_text_is_idempotent() {
        let samples = [
            "  padded text  ".to_string(),
            "x".repeat(50),
            "a b c d e".to_string(),
        ];
        for sample in &samples {
            let once = clip_text(sample, 7);
            assert_eq!(clip_text(&once, 7), once);
            assert!(once.chars().count() <= 7);
        }
    }

    #[test]
    fn event_generation_accessor() {
        let started = DispatchEvent::Started { generation: 4 };
        let finished = DispatchEvent::Finished {
            generation: 5,
            outcome: Outcome::Skipped,
        };
        assert_eq!(started.generation(), 4);
        assert_eq!(finished.generation(), 5);
    }
}
