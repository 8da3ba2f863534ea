use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// One completed (or failed) action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub action: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    pub fn success(action: impl Into<String>, input: &str, output: &str) -> Self {
        Self {
            timestamp: now_timestamp(),
            action: action.into(),
            input: input.to_string(),
            output: Some(output.to_string()),
            error: None,
        }
    }

    pub fn failure(action: impl Into<String>, input: &str, error: impl Into<String>) -> Self {
        Self {
            timestamp: now_timestamp(),
            action: action.into(),
            input: input.to_string(),
            output: None,
            error: Some(error.into()),
        }
    }
}

fn now_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Append-only JSON-lines file, rotated to `<name>.1` once it grows past
/// `max_bytes`.
pub struct ActionJournal {
    path: Option<PathBuf>,
    max_bytes: u64,
    write_lock: Mutex<()>,
}

impl ActionJournal {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: Some(path.into()),
            max_bytes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            max_bytes: 0,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().expect("journal lock poisoned");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create journal directory {:?}", parent))?;
        }

        self.rotate_if_needed(path)?;

        let mut line = serde_json::to_string(entry).context("Failed to serialize journal entry")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal at {:?}", path))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to journal at {:?}", path))
    }

    fn rotate_if_needed(&self, path: &Path) -> Result<()> {
        let len = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(_) => return Ok(()),
        };
        if self.max_bytes == 0 || len < self.max_bytes {
            return Ok(());
        }

        let rotated = rotated_path(path);
        fs::rename(path, &rotated)
            .with_context(|| format!("Failed to rotate journal to {:?}", rotated))?;
        tracing::debug!("Rotated journal to {:?}", rotated);
        Ok(())
    }
}

pub fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".1");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_entries(path: &Path) -> Vec<LogEntry> {
        fs::read_to_string(path)
            .expect("read journal")
            .lines()
            .map(|line| serde_json::from_str(line).expect("entry"))
            .collect()
    }

    #[test]
    fn appends_one_line_per_entry() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("logs").join("journal.jsonl");
        let journal = ActionJournal::new(&path, 1024 * 1024);

        journal
            .append(&LogEntry::success("Rewrite", "helo", "Hello"))
            .expect("append");
        journal
            .append(&LogEntry::failure("Ask", "why", "HTTP status 500"))
            .expect("append");

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].output.as_deref(), Some("Hello"));
        assert_eq!(entries[1].error.as_deref(), Some("HTTP status 500"));
        assert!(entries[1].output.is_none());
    }

    #[test]
    fn rotates_when_over_limit() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("journal.jsonl");
        let journal = ActionJournal::new(&path, 10);

        journal
            .append(&LogEntry::success("Ask", "first", "one"))
            .expect("append");
        journal
            .append(&LogEntry::success("Ask", "second", "two"))
            .expect("append");

        let rotated = rotated_path(&path);
        assert_eq!(rotated, tmp.path().join("journal.jsonl.1"));
        assert_eq!(read_entries(&rotated)[0].input, "first");
        let current = read_entries(&path);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].input, "second");
    }

    #[test]
    fn disabled_journal_writes_nothing() {
        let journal = ActionJournal::disabled();
        assert!(journal.path().is_none());
        journal
            .append(&LogEntry::success("Ask", "a", "b"))
            .expect("noop");
    }
}
