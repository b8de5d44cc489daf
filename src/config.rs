//! Configuration loader and validator for the extractor bot.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub catalog: Catalog,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    /// The only Telegram user allowed to run `/add`, `/remove` and `/users`.
    pub admin_id: i64,
}

/// Remote course catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    pub base_url: String,
    #[serde(default = "default_course_id")]
    pub course_id: u64,
    /// Identifier appended to every catalog path. The upstream service accepts an empty one.
    #[serde(default)]
    pub service_user_id: String,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_course_id() -> u64 {
    135
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl App {
    /// Data directory with a leading `~/` expanded.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }

    /// Where generated link files are written.
    pub fn exports_dir(&self) -> PathBuf {
        Path::new(&self.resolved_data_dir()).join("exports")
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir/exports` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.exports_dir())
    }

    /// Apply environment overrides for secrets that should not live in the file.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram.bot_token = token;
            }
        }
    }

    /// SQLite URL for the user store, honouring `DATABASE_URL`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!("sqlite://{}/extractor.db", self.app.resolved_data_dir())
        })
    }
}

/// Load configuration from a YAML file, apply env overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.admin_id == 0 {
        return Err(ConfigError::Invalid("telegram.admin_id must be set"));
    }

    if cfg.catalog.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.base_url must be non-empty"));
    }
    if Url::parse(&cfg.catalog.base_url).is_err() {
        return Err(ConfigError::Invalid("catalog.base_url must be a valid URL"));
    }
    if cfg.catalog.request_timeout_secs == Some(0) {
        return Err(ConfigError::Invalid("catalog.request_timeout_secs must be > 0"));
    }

    Ok(())
}

/// Example configuration, also used as the test fixture.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  admin_id: 123456789

catalog:
  base_url: "https://www.futurekul.com/admin/api"
  course_id: 135
  service_user_id: ""
  accept_invalid_certs: true
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.catalog.course_id, 135);
        assert_eq!(cfg.catalog.service_user_id, "");
        assert_eq!(cfg.catalog.request_timeout_secs, None);
    }

    #[test]
    fn catalog_defaults_apply() {
        let raw = r#"app:
  data_dir: "./data"
telegram:
  bot_token: "t"
  admin_id: 1
catalog:
  base_url: "https://example.com/api"
"#;
        let cfg: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.catalog.course_id, 135);
        assert!(cfg.catalog.accept_invalid_certs);
        assert!(cfg.catalog.service_user_id.is_empty());
    }

    #[test]
    fn invalid_bot_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.bot_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("telegram.bot_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_admin_and_catalog() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.admin_id = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("admin_id")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.catalog.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.catalog.request_timeout_secs = Some(0);
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_exports_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.join("exports").exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.telegram.admin_id, 123456789);
    }
}
