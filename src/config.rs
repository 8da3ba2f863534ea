use anyhow::{anyhow, Context, Result};
use jsonc_parser::{parse_to_serde_value, ParseOptions};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const APPLICATION: &str = "aihelper-rs";
const CONFIG_DIR_ENV: &str = "AIHELPER_CONFIG_DIR";
const CONFIG_FILE: &str = "config.jsonc";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_true")]
    pub copy_rewrite_result: bool,

    #[serde(default = "default_true")]
    pub auto_run_rewrite: bool,

    #[serde(default = "default_rewrite")]
    pub rewrite: ModelSettings,

    #[serde(default = "default_ask")]
    pub ask: ModelSettings,

    #[serde(default = "default_custom")]
    pub custom: ModelSettings,

    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,

    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
}

impl ModelSettings {
    fn new(model: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_journal_max_bytes")]
    pub max_bytes: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_bytes: default_journal_max_bytes(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_input_chars() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_rewrite() -> ModelSettings {
    ModelSettings::new("gpt-3.5-turbo", 0.9)
}

fn default_ask() -> ModelSettings {
    ModelSettings::new("gpt-4", 0.0)
}

fn default_custom() -> ModelSettings {
    ModelSettings::new("gpt-3.5-turbo", 0.8)
}

fn default_journal_max_bytes() -> u64 {
    1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            max_input_chars: default_max_input_chars(),
            max_tokens: None,
            copy_rewrite_result: true,
            auto_run_rewrite: true,
            rewrite: default_rewrite(),
            ask: default_ask(),
            custom: default_custom(),
            prompts_dir: None,
            journal: JournalConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<ConfigManagerInner>,
}

struct ConfigManagerInner {
    config: RwLock<Config>,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    /// Loads the config from the platform config directory, or from
    /// `AIHELPER_CONFIG_DIR` when set.
    pub fn load() -> Result<Self> {
        if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|value| !value.is_empty()) {
            let dir = PathBuf::from(dir);
            return Self::load_from(&dir, &dir);
        }

        let dirs = directories::ProjectDirs::from("", "", APPLICATION)
            .context("Failed to get config directory")?;
        Self::load_from(dirs.config_dir(), dirs.data_dir())
    }

    pub fn load_from(config_dir: &Path, data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(config_dir).context("Failed to create config directory")?;

        let config_path = config_dir.join(CONFIG_FILE);
        let config = if config_path.exists() {
            Self::read_config_from_disk(&config_path)?
        } else {
            let default_config = Config::default();
            Self::write_config_file(&config_path, &default_config)?;
            tracing::info!("Created default config at: {:?}", config_path);
            default_config
        };

        tracing::info!("Loaded config from: {:?}", config_path);

        Ok(Self {
            inner: Arc::new(ConfigManagerInner {
                config: RwLock::new(config),
                config_dir: config_dir.to_path_buf(),
                data_dir: data_dir.to_path_buf(),
            }),
        })
    }

    pub fn get(&self) -> Config {
        self.inner
            .config
            .read()
            .expect("config lock poisoned")
            .clone()
    }

    pub fn config_path(&self) -> PathBuf {
        self.inner.config_dir.join(CONFIG_FILE)
    }

    pub fn get_prompts_dir(&self) -> PathBuf {
        self.get()
            .prompts_dir
            .unwrap_or_else(|| self.inner.config_dir.join("prompts"))
    }

    pub fn get_journal_path(&self) -> PathBuf {
        self.get()
            .journal
            .path
            .unwrap_or_else(|| self.inner.data_dir.join("journal.jsonl"))
    }

    fn read_config_from_disk(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {:?}", path))?;
        parse_config(&content)
    }

    fn write_config_file(path: &Path, config: &Config) -> Result<()> {
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config file at {:?}", path))
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let value = parse_to_serde_value(content, &ParseOptions::default())
        .context("Failed to parse config as JSONC")?
        .ok_or_else(|| anyhow!("Config file did not contain a JSON value"))?;
    serde_json::from_value(value).context("Failed to deserialize config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_jsonc_with_comments_and_defaults() {
        let content = r#"{
            // cheaper model for rewrites
            "rewrite": { "model": "gpt-4o-mini", "temperature": 1.0 },
            "max_input_chars": 3000, /* trailing */
        }"#;

        let config = parse_config(content).expect("parse");
        assert_eq!(config.rewrite.model, "gpt-4o-mini");
        assert_eq!(config.max_input_chars, 3000);
        assert_eq!(config.ask, default_ask());
        assert_eq!(config.endpoint, default_endpoint());
        assert!(config.journal.enabled);
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(parse_config("   ").is_err());
    }

    #[test]
    fn load_from_creates_default_file() {
        let tmp = tempdir().expect("tempdir");
        let manager = ConfigManager::load_from(tmp.path(), tmp.path()).expect("load");

        assert!(manager.config_path().exists());
        assert_eq!(manager.get(), Config::default());
        assert_eq!(manager.get_prompts_dir(), tmp.path().join("prompts"));
        assert_eq!(manager.get_journal_path(), tmp.path().join("journal.jsonl"));

        let reloaded = ConfigManager::load_from(tmp.path(), tmp.path()).expect("reload");
        assert_eq!(reloaded.get(), Config::default());
    }
}
