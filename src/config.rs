//! Configuration for sentiflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SENTIFLOW_HOME, SENTIFLOW_CLASSIFIER_API_KEY,
//!    SENTIFLOW_TELEGRAM_TOKEN)
//! 2. Config file (.sentiflow/config.yaml)
//! 3. Defaults (~/.sentiflow)
//!
//! Config file discovery:
//! - Searches current directory and parents for .sentiflow/config.yaml
//! - Paths in config file are relative to the .sentiflow/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::record_store::DEFAULT_KEY_FIELD;
use crate::adapters::ClassifierConfig;
use crate::core::ExecutionLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".sentiflow";
const ENV_HOME: &str = "SENTIFLOW_HOME";
const ENV_CLASSIFIER_KEY: &str = "SENTIFLOW_CLASSIFIER_API_KEY";
const ENV_TELEGRAM_TOKEN: &str = "SENTIFLOW_TELEGRAM_TOKEN";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    /// State directory (relative to .sentiflow/)
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Workflow definition file (relative to .sentiflow/)
    #[serde(default)]
    pub workflow: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Database file (relative to .sentiflow/)
    pub path: Option<String>,
    /// Payload field holding the record key
    pub key_field: Option<String>,
}

/// Where notifications go
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Write alerts to the log
    #[default]
    Log,

    /// Send alerts to a Telegram chat
    Telegram {
        chat_id: String,
        #[serde(default)]
        bot_token: Option<String>,
        #[serde(default)]
        api_base: Option<String>,
    },
}

/// Overrides applied on top of the workflow's own limits
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    pub timeout_seconds: Option<u64>,
    pub max_transitions: Option<u32>,
    pub max_payload_bytes: Option<usize>,
}

impl LimitsConfig {
    /// Apply the configured overrides to a set of limits
    pub fn apply_to(&self, limits: &mut ExecutionLimits) {
        if let Some(timeout) = self.timeout_seconds {
            limits.timeout_seconds = timeout;
        }
        if let Some(max) = self.max_transitions {
            limits.max_transitions = max;
        }
        if let Some(max) = self.max_payload_bytes {
            limits.max_payload_bytes = max;
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Record database path
    pub store_path: PathBuf,
    /// Payload field holding the record key
    pub key_field: String,
    /// Classifier endpoint settings
    pub classifier: ClassifierConfig,
    /// Notification destination
    pub notifier: NotifierConfig,
    /// Limit overrides
    pub limits: LimitsConfig,
    /// Custom workflow definition (built-in sentiment workflow if None)
    pub workflow: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file (if any) with the environment and defaults
fn resolve(config: ConfigFile, config_file: Option<PathBuf>) -> Result<ResolvedConfig> {
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    let home = if let Ok(env_home) = std::env::var(ENV_HOME) {
        PathBuf::from(env_home)
    } else if let (Some(dir), Some(home)) = (&config_dir, &config.home) {
        resolve_path(dir, home)
    } else {
        dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR)
    };

    let store_path = match (&config_dir, &config.store.path) {
        (Some(dir), Some(path)) => resolve_path(dir, path),
        (None, Some(path)) => PathBuf::from(path),
        _ => home.join("records.db"),
    };

    let mut classifier = config.classifier.unwrap_or_default();
    if let Ok(key) = std::env::var(ENV_CLASSIFIER_KEY) {
        classifier.api_key = Some(key);
    }

    let mut notifier = config.notifier;
    if let NotifierConfig::Telegram {
        ref mut bot_token, ..
    } = notifier
    {
        if let Ok(token) = std::env::var(ENV_TELEGRAM_TOKEN) {
            *bot_token = Some(token);
        }
    }

    let workflow = config.workflow.as_deref().map(|w| match &config_dir {
        Some(dir) => resolve_path(dir, w),
        None => PathBuf::from(w),
    });

    Ok(ResolvedConfig {
        home,
        config_file,
        store_path,
        key_field: config
            .store
            .key_field
            .unwrap_or_else(|| DEFAULT_KEY_FIELD.to_string()),
        classifier,
        notifier,
        limits: config.limits,
        workflow,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            resolve(config, Some(path))
        }
        None => resolve(ConfigFile::default(), None),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
