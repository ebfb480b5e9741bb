use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::notify::DEFAULT_NOTIFICATION_DURATION;
use crate::session::DEFAULT_CONFIDENCE;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_DOWNLOAD_DIR: &str = ".";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClientConfigFile {
    server: Option<ServerConfigFile>,
    processing: Option<ProcessingConfigFile>,
    download: Option<DownloadConfigFile>,
    notifications: Option<NotificationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProcessingConfigFile {
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DownloadConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct NotificationConfigFile {
    duration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub confidence: f64,
    pub download_dir: PathBuf,
    pub notification_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            confidence: DEFAULT_CONFIDENCE,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            notification_duration: DEFAULT_NOTIFICATION_DURATION,
        }
    }
}

/// Values given on the command line. They win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub confidence: Option<f64>,
}

impl ClientConfig {
    /// Defaults, then the file named by `DETECT_CONFIG`, then `DETECT_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(&ConfigOverrides::default())
    }

    /// Like `load`, with `overrides` applied last. Validation runs once, on
    /// the final values, so an overridden environment value is never judged.
    pub fn load_with(overrides: &ConfigOverrides) -> Result<Self> {
        let config_path = std::env::var("DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env(overrides)?;
        if let Some(url) = &overrides.server_url {
            cfg.server_url = url.trim().to_string();
        }
        if let Some(confidence) = overrides.confidence {
            cfg.confidence = confidence;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ClientConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            server_url: file
                .server
                .and_then(|server| server.url)
                .unwrap_or(defaults.server_url),
            confidence: file
                .processing
                .and_then(|processing| processing.confidence)
                .unwrap_or(defaults.confidence),
            download_dir: file
                .download
                .and_then(|download| download.dir)
                .unwrap_or(defaults.download_dir),
            notification_duration: file
                .notifications
                .and_then(|notifications| notifications.duration_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.notification_duration),
        }
    }

    fn apply_env(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Ok(url) = std::env::var("DETECT_SERVER_URL") {
            if overrides.server_url.is_none() && !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }
        if let Ok(confidence) = std::env::var("DETECT_CONFIDENCE") {
            if overrides.confidence.is_none() {
                self.confidence = confidence
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("DETECT_CONFIDENCE must be a number between 0 and 1"))?;
            }
        }
        if let Ok(dir) = std::env::var("DETECT_DOWNLOAD_DIR") {
            if !dir.trim().is_empty() {
                self.download_dir = PathBuf::from(dir);
            }
        }
        if let Ok(ms) = std::env::var("DETECT_NOTIFICATION_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                anyhow!("DETECT_NOTIFICATION_MS must be an integer number of milliseconds")
            })?;
            self.notification_duration = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_server_url(&self.server_url)?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "confidence must be between 0 and 1, got {}",
                self.confidence
            ));
        }
        if self.notification_duration.is_zero() {
            return Err(anyhow!("notification duration must be greater than zero"));
        }
        Ok(())
    }
}

pub fn validate_server_url(server_url: &str) -> Result<()> {
    let url = Url::parse(server_url)
        .map_err(|e| anyhow!("invalid server url '{}': {}", server_url, e))?;
    match url.scheme() {
        "http" | "https" | "stub" => Ok(()),
        other => Err(anyhow!(
            "unsupported server url scheme '{}'; expected http, https or stub",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<ClientConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ClientConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.server_url, "http://127.0.0.1:5000");
        assert_eq!(cfg.confidence, 0.25);
        assert_eq!(cfg.notification_duration, Duration::from_millis(5000));
    }

    #[test]
    fn server_url_schemes() {
        assert!(validate_server_url("https://detector.local:8443/api").is_ok());
        assert!(validate_server_url("stub://demo").is_ok());
        assert!(validate_server_url("ftp://detector.local").is_err());
        assert!(validate_server_url("not a url").is_err());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let cfg = ClientConfig {
            confidence: 1.2,
            ..ClientConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
