//! Daemon configuration.
//!
//! Loaded once at startup from a TOML file. Each component is handed the
//! section it needs; nothing reads configuration globally. Notification
//! settings are validated here, so a bad `[EmailNotification]` section fails
//! startup rather than the first send.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/acsr/alarmd.toml";

pub use acsr_protocol::{DEFAULT_SOCKET_PATH, SOCKET_ENV};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "ACSR_CONFIG";

/// Picks the config file: explicit path, else `ACSR_CONFIG`, else the default.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Values of `tls` that enable STARTTLS (compared case-insensitively).
const TLS_TRUTHY: [&str; 4] = ["yes", "true", "t", "1"];

/// Parses the `tls` setting: `yes`, `true`, `t`, `1` in any case are true,
/// anything else is false.
pub fn parse_tls_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    TLS_TRUTHY.contains(&value.as_str())
}

/// Returns the default location of the persisted alarm state.
pub fn default_state_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("acsr")
        .join("alarm_state.json")
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlarmdConfig {
    pub daemon: DaemonSettings,
    pub batching: BatchingConfig,
    pub dispatch: DispatchConfig,

    /// Email channel; present only when the section exists
    #[serde(rename = "EmailNotification")]
    pub email: Option<EmailConfig>,

    /// Log channel; present only when the section exists
    #[serde(rename = "LogNotification")]
    pub log: Option<LogNotificationConfig>,
}

/// `[daemon]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Unix socket the control server listens on
    pub socket_path: PathBuf,

    /// File holding the persisted alarm state
    pub state_path: PathBuf,

    /// Permission bits applied to the socket file
    pub socket_mode: u32,

    /// Peer uids allowed to issue commands (the daemon's own uid always is)
    pub trusted_uids: Vec<u32>,

    /// Check peer credentials on every connection
    pub verify_peer: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            state_path: default_state_path(),
            socket_mode: 0o600,
            trusted_uids: vec![0],
            verify_peer: true,
        }
    }
}

/// `[batching]` section: flush on size or window, whichever comes first.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub max_batch_size: usize,
    pub max_window_ms: u64,
}

impl BatchingConfig {
    pub fn max_window(&self) -> Duration {
        Duration::from_millis(self.max_window_ms)
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_window_ms: 2_000,
        }
    }
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Batches that may wait, both at intake and in each channel's backlog
    pub queue_capacity: usize,

    /// Concurrent sends per channel
    pub max_workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            max_workers: 4,
        }
    }
}

/// `[EmailNotification]` section, validated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEmailConfig")]
pub struct EmailConfig {
    /// SMTP login; also the sender when it is an address and `from` is unset
    pub username: String,
    pub password: String,
    /// Explicit sender address
    pub from: Option<String>,
    pub notification_email: String,
    pub notification_subject: String,
    pub tls: bool,
    pub server_address: String,
    pub port: u16,
}

/// `[LogNotification]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogNotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Port may be written as a number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(i64),
    Text(String),
}

/// `tls` may be a TOML boolean or one of the truthy strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TlsValue {
    Flag(bool),
    Text(String),
}

impl TlsValue {
    fn enabled(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Text(text) => parse_tls_flag(text),
        }
    }
}

/// Email section as written in the file, before validation.
#[derive(Debug, Deserialize)]
struct RawEmailConfig {
    username: Option<String>,
    password: Option<String>,
    from: Option<String>,
    notification_email: Option<String>,
    notification_subject: Option<String>,
    tls: Option<TlsValue>,
    server_address: Option<String>,
    port: Option<PortValue>,
}

fn required(value: Option<String>, key: &str) -> Result<String, String> {
    value.ok_or_else(|| format!("EmailNotification.{key} is missing"))
}

impl TryFrom<RawEmailConfig> for EmailConfig {
    type Error = String;

    fn try_from(raw: RawEmailConfig) -> Result<Self, String> {
        let port = match raw.port {
            Some(PortValue::Number(n)) => u16::try_from(n).ok(),
            Some(PortValue::Text(s)) => s.trim().parse::<u16>().ok(),
            None => return Err("EmailNotification.port is missing".to_string()),
        }
        .filter(|p| *p != 0)
        .ok_or_else(|| "EmailNotification.port is not a valid port number".to_string())?;

        let notification_email = required(raw.notification_email, "notification_email")?;
        if notification_email.trim().is_empty() {
            return Err("EmailNotification.notification_email is empty".to_string());
        }

        let server_address = required(raw.server_address, "server_address")?;
        if server_address.trim().is_empty() {
            return Err("EmailNotification.server_address is empty".to_string());
        }

        Ok(Self {
            username: required(raw.username, "username")?,
            password: required(raw.password, "password")?,
            from: raw.from.filter(|from| !from.trim().is_empty()),
            notification_email,
            notification_subject: required(raw.notification_subject, "notification_subject")?,
            tls: raw
                .tls
                .as_ref()
                .map(TlsValue::enabled)
                .ok_or_else(|| "EmailNotification.tls is missing".to_string())?,
            server_address,
            port,
        })
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AlarmdConfig {
    /// Loads configuration from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&text)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batching.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batching.max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.dispatch.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies `ACSR_SOCKET`, which takes precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(socket) = std::env::var_os(SOCKET_ENV) {
            self.daemon.socket_path = PathBuf::from(socket);
        }
    }

    /// Returns true if the log channel is configured and enabled.
    pub fn log_channel_enabled(&self) -> bool {
        self.log.as_ref().is_some_and(|l| l.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL_SECTION: &str = r#"
[EmailNotification]
username = "station@example.com"
password = "hunter2"
notification_email = "owner@example.com"
notification_subject = "Alarm Notification"
tls = "Yes"
server_address = "smtp.example.com"
port = "587"
"#;

    #[test]
    fn test_tls_truthy_values() {
        for value in ["True", "YES", "t", "1", "yes", "TRUE", "T"] {
            assert!(parse_tls_flag(value), "{value} should be truthy");
        }
    }

    #[test]
    fn test_tls_falsy_values() {
        for value in ["no", "", "0", "false", "on", "y", " yes"] {
            assert!(!parse_tls_flag(value), "{value:?} should be falsy");
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AlarmdConfig::from_toml_str("").unwrap();
        assert_eq!(config.daemon.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.daemon.socket_mode, 0o600);
        assert_eq!(config.daemon.trusted_uids, vec![0]);
        assert!(config.daemon.verify_peer);
        assert_eq!(config.batching.max_batch_size, 10);
        assert_eq!(config.batching.max_window(), Duration::from_secs(2));
        assert!(config.email.is_none());
        assert!(!config.log_channel_enabled());
    }

    #[test]
    fn test_email_section_parsed() {
        let config = AlarmdConfig::from_toml_str(EMAIL_SECTION).unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.username, "station@example.com");
        assert_eq!(email.notification_email, "owner@example.com");
        assert!(email.tls);
        assert_eq!(email.port, 587);
    }

    #[test]
    fn test_email_numeric_port_and_falsy_tls() {
        let text = EMAIL_SECTION
            .replace("port = \"587\"", "port = 25")
            .replace("tls = \"Yes\"", "tls = \"no\"");
        let email = AlarmdConfig::from_toml_str(&text).unwrap().email.unwrap();
        assert_eq!(email.port, 25);
        assert!(!email.tls);
    }

    #[test]
    fn test_email_boolean_tls() {
        let text = EMAIL_SECTION.replace("tls = \"Yes\"", "tls = true");
        assert!(AlarmdConfig::from_toml_str(&text).unwrap().email.unwrap().tls);

        let text = EMAIL_SECTION.replace("tls = \"Yes\"", "tls = false");
        assert!(!AlarmdConfig::from_toml_str(&text).unwrap().email.unwrap().tls);
    }

    #[test]
    fn test_email_missing_tls_rejected() {
        let text = EMAIL_SECTION.replace("tls = \"Yes\"\n", "");
        let err = AlarmdConfig::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("tls"));
    }

    #[test]
    fn test_email_plain_login_and_sender() {
        let email = AlarmdConfig::from_toml_str(EMAIL_SECTION)
            .unwrap()
            .email
            .unwrap();
        assert_eq!(email.from, None);

        let text = EMAIL_SECTION.replace(
            "username = \"station@example.com\"",
            "username = \"alarm\"\nfrom = \"station@example.com\"",
        );
        let email = AlarmdConfig::from_toml_str(&text).unwrap().email.unwrap();
        assert_eq!(email.username, "alarm");
        assert_eq!(email.from.as_deref(), Some("station@example.com"));
    }

    #[test]
    fn test_email_missing_key_rejected() {
        let text = EMAIL_SECTION.replace("password = \"hunter2\"\n", "");
        let err = AlarmdConfig::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_email_bad_port_rejected() {
        let text = EMAIL_SECTION.replace("port = \"587\"", "port = \"smtp\"");
        assert!(AlarmdConfig::from_toml_str(&text).is_err());

        let text = EMAIL_SECTION.replace("port = \"587\"", "port = 70000");
        assert!(AlarmdConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = format!("{EMAIL_SECTION}\nsms_gateway = \"x\"\n[Extra]\nfoo = 1\n");
        assert!(AlarmdConfig::from_toml_str(&text).is_ok());
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        assert!(AlarmdConfig::from_toml_str("[batching]\nmax_batch_size = 0\n").is_err());
        assert!(AlarmdConfig::from_toml_str("[dispatch]\nmax_workers = 0\n").is_err());
        assert!(AlarmdConfig::from_toml_str("[dispatch]\nqueue_capacity = 0\n").is_err());
    }

    #[test]
    fn test_daemon_section() {
        let config = AlarmdConfig::from_toml_str(
            "[daemon]\nsocket_path = \"/run/acsr.sock\"\nsocket_mode = 0o660\ntrusted_uids = [0, 1000]\n",
        )
        .unwrap();
        assert_eq!(config.daemon.socket_path, PathBuf::from("/run/acsr.sock"));
        assert_eq!(config.daemon.socket_mode, 0o660);
        assert_eq!(config.daemon.trusted_uids, vec![0, 1000]);
    }

    #[test]
    fn test_log_section_defaults_enabled() {
        let config = AlarmdConfig::from_toml_str("[LogNotification]\n").unwrap();
        assert!(config.log_channel_enabled());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AlarmdConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.email.is_none());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/srv/alarm.toml")));
        assert_eq!(path, PathBuf::from("/srv/alarm.toml"));
    }
}
