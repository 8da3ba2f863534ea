use regex::Regex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

use super::template::PromptTemplate;
use crate::action::Slot;

pub const DEFAULT_TEMPLATE: &str = "Summarize the following text:\n\n{CLIPBOARD}";

static SLOT_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^custom_prompt_(\d+)\.txt$").expect("valid slot file regex"));

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("failed to create prompts directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read prompt slot {slot} from {path:?}: {source}")]
    Read {
        slot: Slot,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write prompt slot {slot} to {path:?}: {source}")]
    Write {
        slot: Slot,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One plain-text template file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn slot_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!("custom_prompt_{}.txt", slot))
    }

    /// Returns the stored template, creating the slot with
    /// [`DEFAULT_TEMPLATE`] when it does not exist yet.
    pub fn load(&self, slot: Slot) -> Result<PromptTemplate, PromptStoreError> {
        let path = self.slot_path(slot);
        if !path.exists() {
            info!("Creating default prompt for slot {} at {:?}", slot, path);
            return self.save(slot, DEFAULT_TEMPLATE);
        }

        let content = fs::read_to_string(&path).map_err(|source| PromptStoreError::Read {
            slot,
            path: path.clone(),
            source,
        })?;
        debug!("Loaded prompt slot {} ({} bytes)", slot, content.len());
        Ok(PromptTemplate::new(content))
    }

    /// Persists `text` for `slot`, appending the placeholder if it is missing,
    /// and returns exactly what was written.
    pub fn save(&self, slot: Slot, text: &str) -> Result<PromptTemplate, PromptStoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| PromptStoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let template = PromptTemplate::new(text);
        let path = self.slot_path(slot);
        fs::write(&path, template.as_str()).map_err(|source| PromptStoreError::Write {
            slot,
            path: path.clone(),
            source,
        })?;
        debug!("Saved prompt slot {} to {:?}", slot, path);
        Ok(template)
    }

    /// Slots that currently have a file, in ascending order.
    pub fn list(&self) -> Result<Vec<Slot>, PromptStoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PromptStoreError::Read {
                    slot: Slot::DEFAULT,
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut slots: Vec<Slot> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let captures = SLOT_FILE_REGEX.captures(name.to_str()?)?;
                captures[1].parse::<u32>().ok().and_then(Slot::new)
            })
            .collect();
        slots.sort();
        Ok(slots)
    }
}
