use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Args;
use serde::{Deserialize, Serialize};
use tasksync_core::ReconnectPolicy;
use tasksync_engine::ApiSettings;

use super::logging::LogDestination;

const DEFAULT_CONFIG_FILE: &str = "tasksync.ron";

/// Startup flags that take precedence over the config file. Each one can
/// also come from its environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// RON config file; without it ./tasksync.ron is used when present
    #[arg(long, env = "TASKSYNC_CONFIG")]
    pub config: Option<PathBuf>,
    /// Backend base URL, e.g. https://parser.example.com
    #[arg(long, env = "TASKSYNC_BASE_URL")]
    pub base_url: Option<String>,
    /// Opaque session id forwarded to the backend
    #[arg(long, env = "TASKSYNC_SESSION", hide_env_values = true)]
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            max_attempts: policy.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub session: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
    pub notice_ttl_ms: u64,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        Self {
            base_url: api.base_url,
            session: None,
            connect_timeout_ms: api.connect_timeout.as_millis() as u64,
            request_timeout_ms: api.request_timeout.as_millis() as u64,
            reconnect: ReconnectConfig::default(),
            notice_ttl_ms: tasksync_core::DEFAULT_NOTICE_TTL.as_millis() as u64,
            log_destination: LogDestination::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            session: self.session.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    fn apply_overrides(&mut self, base_url: Option<String>, session: Option<String>) {
        if let Some(base_url) = base_url.filter(|value| !value.trim().is_empty()) {
            self.base_url = base_url.trim().to_string();
        }
        if let Some(session) = session.filter(|value| !value.trim().is_empty()) {
            self.session = Some(session.trim().to_string());
        }
    }
}

/// Loads the config file named by `overrides.config` (or `tasksync.ron`)
/// and applies the remaining overrides. A missing default file is fine; a
/// missing explicitly named file is an error.
pub fn load(overrides: &ConfigOverrides) -> anyhow::Result<AppConfig> {
    let mut config = match &overrides.config {
        Some(path) => read_file(path)?,
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                read_file(path)?
            } else {
                AppConfig::default()
            }
        }
    };
    config.apply_overrides(overrides.base_url.clone(), overrides.session.clone());
    validate(&config)?;
    Ok(config)
}

pub fn read_file(path: &Path) -> anyhow::Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing config file {}", path.display()))
}

pub fn parse(text: &str) -> anyhow::Result<AppConfig> {
    Ok(ron::from_str(text)?)
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    if config.base_url.trim().is_empty() {
        bail!("base_url must not be empty");
    }
    if config.reconnect.base_delay_ms == 0 {
        bail!("reconnect.base_delay_ms must be positive");
    }
    if config.reconnect.max_delay_ms < config.reconnect.base_delay_ms {
        bail!("reconnect.max_delay_ms must be at least reconnect.base_delay_ms");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse(r#"(base_url: "http://parser:8000", reconnect: (max_attempts: 3))"#)
            .expect("parse");
        assert_eq!(config.base_url, "http://parser:8000");
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay_ms, 1000);
        assert_eq!(config.reconnect_policy().max_delay, Duration::from_secs(10));
        assert_eq!(config.log_destination, LogDestination::File);
    }

    #[test]
    fn overrides_win_and_blank_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some(" http://other:9000 ".to_string()), Some("  ".to_string()));
        assert_eq!(config.base_url, "http://other:9000");
        assert_eq!(config.session, None);
    }

    #[test]
    fn read_file_reports_path_on_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ron");
        fs::write(&path, "(base_url: ").expect("write");
        let err = read_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.ron"));
    }

    #[derive(Debug, clap::Parser)]
    struct Startup {
        #[command(flatten)]
        overrides: ConfigOverrides,
    }

    #[test]
    fn flags_select_the_file_and_override_it() {
        use clap::Parser;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.ron");
        fs::write(
            &path,
            r#"(base_url: "http://from-file:8000", notice_ttl_ms: 2500)"#,
        )
        .expect("write");

        let startup = Startup::try_parse_from([
            "tasksync",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--base-url",
            "https://from-flag",
            "--session",
            "s-1",
        ])
        .expect("flags");
        let config = load(&startup.overrides).expect("load");
        assert_eq!(config.base_url, "https://from-flag");
        assert_eq!(config.session.as_deref(), Some("s-1"));
        assert_eq!(config.notice_ttl(), Duration::from_millis(2500));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let overrides = ConfigOverrides {
            config: Some(PathBuf::from("does/not/exist.ron")),
            ..ConfigOverrides::default()
        };
        let err = load(&overrides).unwrap_err();
        assert!(format!("{err:#}").contains("exist.ron"));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let mut config = AppConfig::default();
        config.reconnect.max_delay_ms = 10;
        assert!(validate(&config).is_err());
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn api_settings_carry_session_and_timeouts() {
        let config = AppConfig {
            session: Some("s".to_string()),
            request_timeout_ms: 1500,
            ..AppConfig::default()
        };
        let settings = config.api_settings();
        assert_eq!(settings.session.as_deref(), Some("s"));
        assert_eq!(settings.request_timeout, Duration::from_millis(1500));
    }
}
