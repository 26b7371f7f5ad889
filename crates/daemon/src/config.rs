// Daemon configuration: `~/.commitcast/config.toml`.
//
// Secrets may come from the environment instead of the file;
// `COMMITCAST_GITHUB_TOKEN`, `COMMITCAST_OPENAI_API_KEY` and
// `COMMITCAST_RELAY_TOKEN` take precedence when set. Validation failures
// are fatal at load time: a malformed config must never reach the
// orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use commitcast_common::types::RepoId;

/// Root directory for commitcast state: `~/.commitcast/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".commitcast"))
}

/// Path to the config file: `~/.commitcast/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

const MIN_POLL_INTERVAL_SEC: u64 = 60;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Checkpoint database path; `~/.commitcast/checkpoints.db` when unset.
    pub database_path: Option<PathBuf>,
    /// Seconds between poll cycles (min 60).
    pub poll_interval_sec: u64,
    /// Pause after an unexpected cycle error; must exceed the poll
    /// interval.
    pub error_cooldown_sec: u64,
    /// Timeout applied to every outbound HTTP call.
    pub request_timeout_sec: u64,
    pub github: GithubConfig,
    pub summary: SummaryConfig,
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            poll_interval_sec: 300,
            error_cooldown_sec: 600,
            request_timeout_sec: 30,
            github: GithubConfig::default(),
            summary: SummaryConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

/// Commit source settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GithubConfig {
    /// API token; `COMMITCAST_GITHUB_TOKEN` overrides.
    pub token: String,
    /// Repositories to watch, in cycle order.
    pub repos: Vec<RepoId>,
    /// Recent-window size used before a checkpoint exists.
    pub fetch_page_size: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self { token: String::new(), repos: Vec::new(), fetch_page_size: 10 }
    }
}

/// Digest model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    /// API key; `COMMITCAST_OPENAI_API_KEY` overrides.
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Fall back to a deterministic commit listing when the model fails.
    /// With this off, a model failure leaves the window for retry.
    pub fallback_digest: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            fallback_digest: true,
        }
    }
}

/// Chat relay settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// OneBot HTTP endpoint, e.g. `http://127.0.0.1:5700`.
    pub url: String,
    /// Target group chat id.
    pub group_id: String,
    /// Optional bearer token; `COMMITCAST_RELAY_TOKEN` overrides.
    pub token: String,
}

impl Config {
    /// Load from `~/.commitcast/config.toml`, apply env overrides, and
    /// validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        Self::load_from(&path)
    }

    /// Load from a specific path, apply env overrides, and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("COMMITCAST_GITHUB_TOKEN") {
            self.github.token = token;
        }
        if let Ok(key) = std::env::var("COMMITCAST_OPENAI_API_KEY") {
            self.summary.api_key = key;
        }
        if let Ok(token) = std::env::var("COMMITCAST_RELAY_TOKEN") {
            self.relay.token = token;
        }
    }

    /// Reject configurations the orchestrator must never see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_sec < MIN_POLL_INTERVAL_SEC {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_sec must be at least {MIN_POLL_INTERVAL_SEC}, got {}",
                self.poll_interval_sec
            )));
        }
        if self.error_cooldown_sec <= self.poll_interval_sec {
            return Err(ConfigError::Invalid(format!(
                "error_cooldown_sec ({}) must exceed poll_interval_sec ({})",
                self.error_cooldown_sec, self.poll_interval_sec
            )));
        }
        if self.github.repos.is_empty() {
            return Err(ConfigError::Invalid("github.repos must list at least one repository".into()));
        }
        if self.github.fetch_page_size == 0 {
            return Err(ConfigError::Invalid("github.fetch_page_size must be positive".into()));
        }
        if self.relay.url.is_empty() {
            return Err(ConfigError::Invalid("relay.url must be set".into()));
        }
        if Url::parse(&self.relay.url).is_err() {
            return Err(ConfigError::Invalid(format!("relay.url is not a valid URL: `{}`", self.relay.url)));
        }
        self.relay_group_id()?;
        Ok(())
    }

    /// Numeric group id for the relay payload.
    pub fn relay_group_id(&self) -> Result<i64, ConfigError> {
        self.relay
            .group_id
            .parse::<i64>()
            .map_err(|_| ConfigError::Invalid(format!(
                "relay.group_id must be a numeric chat id, got `{}`",
                self.relay.group_id
            )))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_sec)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    /// Resolved checkpoint database path.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => global_dir().map(|d| d.join("checkpoints.db")).ok_or_else(|| {
                ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "could not determine home directory",
                ))
            }),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.github.repos = vec!["acme/widgets".parse().unwrap()];
        config.relay.url = "http://127.0.0.1:5700".into();
        config.relay.group_id = "123456".into();
        config
    }

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.poll_interval_sec, 300);
        assert_eq!(config.error_cooldown_sec, 600);
        assert_eq!(config.github.fetch_page_size, 10);
        assert!(config.summary.fallback_digest);
        assert_eq!(config.summary.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config().validate().expect("config should validate");
    }

    #[test]
    fn rejects_short_poll_interval() {
        let mut config = valid_config();
        config.poll_interval_sec = 30;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("poll_interval_sec"));
    }

    #[test]
    fn default_cooldown_exceeds_default_interval() {
        let config = Config::default();
        assert!(config.error_cooldown() > config.poll_interval());
    }

    #[test]
    fn rejects_cooldown_not_exceeding_the_interval() {
        let mut config = valid_config();
        config.error_cooldown_sec = config.poll_interval_sec;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("error_cooldown_sec"));

        config.error_cooldown_sec = config.poll_interval_sec - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_repo_list() {
        let mut config = valid_config();
        config.github.repos.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_numeric_group_id() {
        let mut config = valid_config();
        config.relay.group_id = "dev-chat".into();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("group_id"));
    }

    #[test]
    fn rejects_unparseable_relay_url() {
        let mut config = valid_config();
        config.relay.url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_from_toml_with_partial_fields_uses_defaults() {
        let toml_str = r#"
poll_interval_sec = 600
error_cooldown_sec = 900

[github]
repos = ["acme/widgets", "acme/gadgets"]

[relay]
url = "http://127.0.0.1:5700"
group_id = "987"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.poll_interval_sec, 600);
        assert_eq!(config.error_cooldown_sec, 900);
        assert_eq!(config.github.repos.len(), 2);
        assert_eq!(config.github.repos[0].to_string(), "acme/widgets");
        assert_eq!(config.github.fetch_page_size, 10); // default
        config.validate().expect("partial config should validate");
    }

    #[test]
    fn malformed_repo_id_fails_at_parse_time() {
        let toml_str = r#"
[github]
repos = ["not-a-repo"]
"#;
        let error = toml::from_str::<Config>(toml_str).expect_err("parse should fail");
        assert!(error.to_string().contains("invalid repository id"));
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = valid_config();
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.github.repos, config.github.repos);
        assert_eq!(loaded.relay.group_id, config.relay.group_id);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_from(&dir.path().join("missing.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("config.toml");
        valid_config().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn explicit_database_path_wins() {
        let mut config = valid_config();
        config.database_path = Some(PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/custom.db"));
    }
}
