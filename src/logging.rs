use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};
use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
};

const COMPLETION_TARGET: &str = "aihelper::completion";
const MAX_DIFF_CHARS: usize = 4096;
const PREVIEW_CHAR_LIMIT: usize = 160;
const TIMESTAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Debug view of one finished completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub action: String,
    pub generation: u64,
    pub input: String,
    pub output: String,
    /// Word diff between input and output is only meaningful for rewrites.
    pub show_diff: bool,
}

impl CompletionRecord {
    pub fn new(
        action: impl Into<String>,
        generation: u64,
        input: String,
        output: String,
        show_diff: bool,
    ) -> Self {
        Self {
            action: action.into(),
            generation,
            input,
            output,
            show_diff,
        }
    }

    pub fn render_pretty(&self, use_color: bool) -> String {
        let mut lines = vec![format!("┌─ {} (generation {})", self.action, self.generation)];
        lines.push(format!("│ IN  : {}", preview(&self.input, use_color)));

        if self.show_diff {
            for diff in self.inline_diff(use_color).unwrap_or_default() {
                lines.push(format!("│   {diff}"));
            }
        }

        lines.push(format!("│ OUT : {}", preview(&self.output, use_color)));
        lines.push("└─".to_string());
        lines.join("\n")
    }

    fn inline_diff(&self, use_color: bool) -> Option<Vec<String>> {
        if self.input == self.output || self.input.len() + self.output.len() > MAX_DIFF_CHARS {
            return None;
        }

        let diff = TextDiff::from_words(&self.input, &self.output);
        let (mut before, mut after) = (String::new(), String::new());
        for change in diff.iter_all_changes() {
            let piece = paint_change(&escape(change.value()), change.tag(), use_color);
            match change.tag() {
                ChangeTag::Delete => before.push_str(&piece),
                ChangeTag::Insert => after.push_str(&piece),
                ChangeTag::Equal => {
                    before.push_str(&piece);
                    after.push_str(&piece);
                }
            }
        }

        let has = |tag: ChangeTag| diff.iter_all_changes().any(|change| change.tag() == tag);
        let mut lines = Vec::new();
        if has(ChangeTag::Delete) {
            lines.push(format!("- {before}"));
        }
        if has(ChangeTag::Insert) {
            lines.push(format!("+ {after}"));
        }
        (!lines.is_empty()).then_some(lines)
    }
}

fn paint_change(fragment: &str, tag: ChangeTag, use_color: bool) -> String {
    match (use_color, tag) {
        (false, _) => fragment.to_string(),
        (true, ChangeTag::Delete) => fragment.red().to_string(),
        (true, ChangeTag::Insert) => fragment.green().to_string(),
        (true, ChangeTag::Equal) => fragment.dimmed().to_string(),
    }
}

/// Keeps multi-line text on a single log line.
fn escape(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '\n' => "⏎".to_string(),
            '\t' => "⇥".to_string(),
            c if c.is_control() => c.escape_unicode().to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn preview(value: &str, use_color: bool) -> String {
    let head: String = value.chars().take(PREVIEW_CHAR_LIMIT).collect();
    let mut shown = escape(&head);
    if value.chars().nth(PREVIEW_CHAR_LIMIT).is_some() {
        shown.push_str("...");
    }
    if use_color {
        shown.cyan().to_string()
    } else {
        shown
    }
}

#[derive(Default)]
struct RecordJson(Option<String>);

impl tracing::field::Visit for RecordJson {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "record_json" {
            self.0 = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn fmt::Debug) {}
}

/// `timestamp level target: message` lines, plus a boxed rendering of
/// completion records.
#[derive(Default)]
pub struct AppFormatter;

impl AppFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl<S, N> FormatEvent<S, N> for AppFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let use_color = writer.has_ansi_escapes();
        write_prefix(&mut writer, metadata, use_color)?;

        if metadata.target() == COMPLETION_TARGET {
            let mut json = RecordJson::default();
            event.record(&mut json);
            if let Some(record) = json
                .0
                .and_then(|json| serde_json::from_str::<CompletionRecord>(&json).ok())
            {
                return writeln!(writer, "completion finished\n{}", record.render_pretty(use_color));
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn record_completion(record: CompletionRecord) {
    if !tracing::level_enabled!(tracing::Level::DEBUG) {
        return;
    }
    if let Ok(json) = serde_json::to_string(&record) {
        tracing::event!(
            target: COMPLETION_TARGET,
            tracing::Level::DEBUG,
            record_json = json.as_str(),
            generation = record.generation,
            "completion finished"
        );
    }
}

fn write_prefix(writer: &mut Writer<'_>, metadata: &Metadata<'_>, use_color: bool) -> fmt::Result {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let timestamp = now.format(&TIMESTAMP_FORMAT).map_err(|_| fmt::Error)?;
    let level = format!("{:>5}", metadata.level());
    let target = metadata.target();

    if !use_color {
        return write!(writer, "{timestamp} {level} {target}: ");
    }

    let level = match *metadata.level() {
        Level::ERROR => level.red().bold().to_string(),
        Level::WARN => level.yellow().bold().to_string(),
        Level::INFO => level.green().to_string(),
        _ => level.dimmed().to_string(),
    };
    write!(writer, "{} {} {}: ", timestamp.dimmed(), level, target.blue())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_record_shows_word_diff() {
        let record = CompletionRecord::new(
            "Rewrite",
            3,
            "helo wrld".to_string(),
            "Hello, world.".to_string(),
            true,
        );
        let rendered = record.render_pretty(false);

        assert!(rendered.starts_with("┌─ Rewrite (generation 3)"));
        assert!(rendered.contains("│ IN  : helo wrld"));
        assert!(rendered.contains("│   - helo"));
        assert!(rendered.contains("│   + Hello,"));
        assert!(rendered.contains("│ OUT : Hello, world."));
    }

    #[test]
    fn ask_record_has_no_diff_and_escapes_newlines() {
        let record = CompletionRecord::new(
            "Ask",
            1,
            "Explain: x".to_string(),
            "line one\nline two".to_string(),
            false,
        );
        let rendered = record.render_pretty(false);

        assert!(!rendered.contains("│   -"));
        assert!(rendered.contains("line one⏎line two"));
    }

    #[test]
    fn long_values_are_previewed() {
        let long = "a".repeat(PREVIEW_CHAR_LIMIT + 10);
        let shown = preview(&long, false);
        assert_eq!(shown.len(), PREVIEW_CHAR_LIMIT + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short", false), "short");
    }
}
