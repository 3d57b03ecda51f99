mod styles;

pub use styles::StyleSheet;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Secret for verifying GitHub webhook signatures (HMAC-SHA256)
    pub github_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_tls: bool,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Domain part of every sender address; the local part is the GitHub login
    #[serde(default = "default_sender_domain")]
    pub sender_domain: String,
    /// The single mailbox every notification is delivered to
    pub recipient: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_tls: false,
            smtp_username: None,
            smtp_password: None,
            sender_domain: default_sender_domain(),
            recipient: None,
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_sender_domain() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Optional token; the markdown endpoint works anonymously at a lower rate limit
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token: None,
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// IANA zone every displayed date is converted into
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
        }
    }
}

fn default_time_zone() -> String {
    "America/Los_Angeles".to_string()
}

impl DisplayConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid time zone {:?}: {}", self.time_zone, e))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StylesConfig {
    /// JSON style table; the built-in table is used when unset
    pub path: Option<PathBuf>,
}

impl StylesConfig {
    pub fn load(&self) -> Result<StyleSheet> {
        match &self.path {
            Some(path) => StyleSheet::from_file(path),
            None => StyleSheet::builtin(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            webhooks: WebhookConfig::default(),
            mail: MailConfig::default(),
            github: GitHubConfig::default(),
            display: DisplayConfig::default(),
            styles: StylesConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.display.tz().unwrap(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
[server]
port = 9000

[mail]
smtp_host = "smtp.example.com"
sender_domain = "mail.example.com"
recipient = "eng+commits@example.com"

[display]
time_zone = "Europe/London"

[storage]
backend = "memory"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.mail.smtp_host, "smtp.example.com");
        assert_eq!(config.mail.smtp_port, 25);
        assert_eq!(config.mail.recipient.as_deref(), Some("eng+commits@example.com"));
        assert_eq!(config.display.tz().unwrap(), chrono_tz::Europe::London);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.webhooks.github_secret.is_none());
    }

    #[test]
    fn test_example_file_parses() {
        let config = Config::parse(include_str!("../../commitmail.example.toml")).unwrap();
        assert_eq!(config.mail.sender_domain, "commits.example.com");
        assert!(config.styles.load().is_ok());
        assert!(config.display.tz().is_ok());
    }

    #[test]
    fn test_invalid_time_zone() {
        let display = DisplayConfig {
            time_zone: "Mars/Olympus_Mons".to_string(),
        };
        assert!(display.tz().is_err());
    }
}
