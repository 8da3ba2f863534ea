use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::action::Action;
use crate::dispatch::{AppContext, DispatchEvent, Dispatcher};
use crate::prompt::PromptStore;
use crate::view::{ViewState, COPIED_LABEL};

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Empty line: submit the draft, or the current input when there is none.
    Submit,
    Run,
    Copy,
    Show,
    Quit,
    /// Any other line is appended to the draft input.
    Text(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Command::Submit,
            "/run" => Command::Run,
            "/copy" => Command::Copy,
            "/show" => Command::Show,
            "/quit" | "/q" => Command::Quit,
            _ => Command::Text(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// Terminal front end: an input pane and an output pane printed to stdout,
/// commands read line by line from stdin.
pub struct TerminalShell {
    action: Action,
    dispatcher: Dispatcher,
    events_rx: Option<mpsc::UnboundedReceiver<DispatchEvent>>,
    view: ViewState,
    draft: Vec<String>,
}

impl TerminalShell {
    pub fn new(action: Action, context: Arc<AppContext>, initial_input: String) -> Self {
        let (dispatcher, events_rx) = Dispatcher::new(action, context);
        Self {
            action,
            dispatcher,
            events_rx: Some(events_rx),
            view: ViewState::new(initial_input),
            draft: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut events_rx = self
            .events_rx
            .take()
            .expect("dispatch receiver already consumed");

        self.print_help();
        self.render();

        let config = &self.dispatcher.context().config;
        if self.action.runs_on_startup()
            && config.auto_run_rewrite
            && !self.view.input.trim().is_empty()
        {
            self.submit_current();
        }

        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin).lines();

        loop {
            tokio::select! {
                line = reader.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_command(Command::parse(&line)) {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("Error reading input: {}", e);
                            break;
                        }
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Some(event) => {
                            if self.view.apply(event) {
                                self.render_status();
                                if !self.view.is_busy() {
                                    self.render_output();
                                }
                            }
                        }
                        None => {
                            info!("Dispatcher channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns `false` when the shell should exit.
    pub fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Quit => return false,
            Command::Text(line) => self.draft.push(line),
            Command::Submit => {
                if !self.draft.is_empty() {
                    self.view.input = self.draft.join("\n");
                    self.draft.clear();
                }
                self.submit_current();
            }
            Command::Run => self.submit_current(),
            Command::Copy => self.copy_output(),
            Command::Show => self.render(),
        }
        true
    }

    fn submit_current(&mut self) {
        if self.view.is_busy() {
            warn!("Still working on the previous request");
            return;
        }

        if let Some(generation) = self.dispatcher.submit(&self.view.input) {
            self.view.apply(DispatchEvent::Started { generation });
            self.render_status();
        }
    }

    fn copy_output(&mut self) {
        let clipboard = &self.dispatcher.context().clipboard;
        match clipboard.write_text(&self.view.output) {
            Ok(()) => {
                self.view.info = COPIED_LABEL.to_string();
                self.render_status();
            }
            Err(err) => warn!("Failed to copy output: {:#}", err),
        }
    }

    fn print_help(&self) {
        println!("{}", help_text(self.action).dimmed());
    }

    fn render(&self) {
        println!("{}", "── Input ──".bold());
        println!("{}", self.view.input);
        self.render_output();
    }

    fn render_output(&self) {
        println!("{}", "── Output ──".bold());
        println!("{}", self.view.output);
    }

    fn render_status(&self) {
        if !self.view.info.is_empty() {
            println!("{}", self.view.info.as_str().green());
        }
    }
}

/// Copied text is served by this process; without a clipboard manager it is
/// gone once the shell exits.
pub fn help_text(action: Action) -> String {
    format!(
        "[{}] type to replace the input, empty line submits, /run /copy /show /quit\n\
         copies stay on the clipboard only while this program runs, unless a clipboard manager keeps them",
        action.label()
    )
}

/// Table of stored custom-prompt slots for `--prompts`.
pub fn render_prompt_table(store: &PromptStore) -> Result<String> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Slot", "File", "Template"]);

    for slot in store.list()? {
        let template = store.load(slot)?;
        let path = store.slot_path(slot);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        table.add_row(vec![
            slot.to_string(),
            file_name,
            preview(template.as_str()),
        ]);
    }

    Ok(table.to_string())
}

fn preview(text: &str) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    let mut preview: String = flat.chars().take(PREVIEW_CHARS).collect();
    if flat.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}
