use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VeritasError};

/// Top-level configuration for Veritas.
///
/// Loaded from `~/.veritas/config.toml` by default. Each section corresponds
/// to one bounded context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeritasConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl VeritasConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VeritasConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VeritasError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply the process environment on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognised variables: `MODEL_URL`, `MODEL_API_KEY`, `CHAT_MODEL_NAME`,
    /// `MAX_CHAT_MODEL_INPUT_LENGTH`, `TAVILY_API_KEY`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MODEL_URL") {
            self.model.base_url = url;
        }
        if let Some(key) = lookup("MODEL_API_KEY") {
            self.model.api_key = key;
        }
        if let Some(name) = lookup("CHAT_MODEL_NAME") {
            self.model.chat_model = name;
        }
        if let Some(raw) = lookup("MAX_CHAT_MODEL_INPUT_LENGTH") {
            self.model.max_input_length =
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| VeritasError::InvalidValue {
                        field: "MAX_CHAT_MODEL_INPUT_LENGTH".to_string(),
                        value: raw.clone(),
                    })?;
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.search.tavily_api_key = key;
        }
        Ok(())
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for conversation logs and the API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
    /// User id used when a caller does not supply one.
    pub default_user_id: String,
}

impl GeneralConfig {
    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.veritas/data".to_string(),
            log_level: "info".to_string(),
            port: 3030,
            default_user_id: "default".to_string(),
        }
    }
}

/// Chat model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Chat model name.
    pub chat_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Total prompt budget in characters, used to window conversation history.
    pub max_input_length: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_input_length: 40_960,
            request_timeout_secs: 120,
        }
    }
}

/// Answering state-machine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Hard ceiling on answer attempts per turn.
    pub max_generate_count: u32,
    /// Hard ceiling on node executions per turn.
    pub max_steps: u32,
    /// Capacity of the per-turn event channel.
    pub event_buffer: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_generate_count: 15,
            max_steps: 100,
            event_buffer: 256,
        }
    }
}

/// Conversation log persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Directory of per-user log files. Relative paths resolve under `data_dir`.
    pub dir: String,
    /// File name pattern; `{user_id}` is replaced by the sanitised user id.
    pub file_pattern: String,
    /// Number of background writers.
    pub writer_pool_size: usize,
}

impl HistoryConfig {
    /// Resolve the log directory against the general data directory.
    pub fn store_dir(&self, general: &GeneralConfig) -> PathBuf {
        let dir = expand_home(&self.dir);
        if dir.is_absolute() {
            dir
        } else {
            general.data_path().join(dir)
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: "_conversation_history".to_string(),
            file_pattern: "dialogue_{user_id}.json".to_string(),
            writer_pool_size: 3,
        }
    }
}

/// Evidence backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Tavily API key.
    pub tavily_api_key: String,
    /// Tavily search endpoint.
    pub tavily_url: String,
    /// Number of web results per query.
    pub max_results: usize,
    /// HTTP endpoint of the document retriever.
    pub retriever_url: String,
    /// Number of documents requested from the retriever.
    pub retriever_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: String::new(),
            tavily_url: "https://api.tavily.com/search".to_string(),
            max_results: 3,
            retriever_url: "http://127.0.0.1:8000/retrieve".to_string(),
            retriever_top_k: 4,
        }
    }
}

/// API session lifetime and cleanup cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session token lifetime in seconds.
    pub ttl_secs: u64,
    /// Seconds between expiry sweeps.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            cleanup_interval_secs: 60,
        }
    }
}

/// HTTP surface limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Requests per second accepted on chat routes.
    pub rate_limit_per_sec: u64,
    /// Maximum question length in characters.
    pub max_question_chars: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 20,
            max_question_chars: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = VeritasConfig::default();
        assert_eq!(config.general.data_dir, "~/.veritas/data");
        assert_eq!(config.general.default_user_id, "default");
        assert_eq!(config.model.chat_model, "gpt-4o-mini");
        assert_eq!(config.model.max_input_length, 40_960);
        assert_eq!(config.graph.max_generate_count, 15);
        assert_eq!(config.history.writer_pool_size, 3);
        assert_eq!(config.history.file_pattern, "dialogue_{user_id}.json");
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.sessions.cleanup_interval_secs, 60);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/veritas"
log_level = "debug"
port = 8080

[model]
base_url = "http://localhost:11434/v1"
chat_model = "qwen2.5"
max_input_length = 8000

[graph]
max_generate_count = 5

[history]
dir = "/var/lib/veritas/history"
writer_pool_size = 1
"#;
        let file = create_temp_config(content);
        let config = VeritasConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/veritas");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model.chat_model, "qwen2.5");
        assert_eq!(config.model.max_input_length, 8000);
        assert_eq!(config.graph.max_generate_count, 5);
        // Unspecified keys in a present section keep their defaults
        assert_eq!(config.graph.max_steps, 100);
        assert_eq!(config.history.writer_pool_size, 1);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = VeritasConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.model.chat_model, "gpt-4o-mini");
        assert_eq!(config.api.rate_limit_per_sec, 20);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(VeritasConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = VeritasConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.veritas/data");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = VeritasConfig::default();
        config.graph.max_generate_count = 7;
        config.save(&path).unwrap();

        let reloaded = VeritasConfig::load(&path).unwrap();
        assert_eq!(reloaded.graph.max_generate_count, 7);
        assert_eq!(reloaded.model.chat_model, config.model.chat_model);
    }

    #[test]
    fn test_env_overrides_applied() {
        let vars: HashMap<&str, &str> = [
            ("MODEL_URL", "http://model.local/v1"),
            ("MODEL_API_KEY", "sk-test"),
            ("CHAT_MODEL_NAME", "gpt-4o"),
            ("MAX_CHAT_MODEL_INPUT_LENGTH", "1024"),
            ("TAVILY_API_KEY", "tvly-test"),
        ]
        .into_iter()
        .collect();

        let mut config = VeritasConfig::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.model.base_url, "http://model.local/v1");
        assert_eq!(config.model.api_key, "sk-test");
        assert_eq!(config.model.chat_model, "gpt-4o");
        assert_eq!(config.model.max_input_length, 1024);
        assert_eq!(config.search.tavily_api_key, "tvly-test");
    }

    #[test]
    fn test_env_override_rejects_bad_length() {
        let mut config = VeritasConfig::default();
        let err = config
            .apply_overrides_from(|k| {
                (k == "MAX_CHAT_MODEL_INPUT_LENGTH").then(|| "lots".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, VeritasError::InvalidValue { .. }));
        assert_eq!(config.model.max_input_length, 40_960);
    }

    #[test]
    fn test_no_env_overrides_keeps_values() {
        let mut config = VeritasConfig::default();
        config.apply_overrides_from(|_| None).unwrap();
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_history_dir_relative_resolves_under_data_dir() {
        let general = GeneralConfig {
            data_dir: "/srv/veritas".to_string(),
            ..GeneralConfig::default()
        };
        let history = HistoryConfig::default();
        assert_eq!(
            history.store_dir(&general),
            PathBuf::from("/srv/veritas/_conversation_history")
        );
    }

    #[test]
    fn test_history_dir_absolute_is_kept() {
        let history = HistoryConfig {
            dir: "/tmp/history".to_string(),
            ..HistoryConfig::default()
        };
        assert_eq!(
            history.store_dir(&GeneralConfig::default()),
            PathBuf::from("/tmp/history")
        );
    }

    #[test]
    fn test_expand_home_plain_path() {
        assert_eq!(expand_home("/a/b"), PathBuf::from("/a/b"));
        assert_eq!(expand_home("rel"), PathBuf::from("rel"));
    }
}
