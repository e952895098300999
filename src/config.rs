use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use testi_ai_dirs::DirType;
use tracing::{debug, info};

use crate::{AppError, AppResult};

/// Name of the optional settings file inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV_VAR: &str = "TESTI_AI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub server: ServerSettings,
}

/// Where the language model lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub host: String,
    pub port: u16,
    /// Force HTTPS on or off. Unset picks by host.
    pub secure: Option<bool>,
    pub api_version: String,
    pub model: String,
    pub temperature: f32,
    /// Per-request timeout, e.g. `60s` or `2m`.
    pub timeout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1234,
            secure: None,
            api_version: "v1".to_string(),
            model: "openai/gpt-oss-20b".to_string(),
            temperature: 0.7,
            timeout: "60s".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
        }
    }
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> AppResult<PathBuf> {
        Ok(DirType::Config.file(CONFIG_FILE)?)
    }

    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    #[tracing::instrument(name = "Loading settings", level = "debug")]
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Ok(p) => (p, false),
                Err(e) => {
                    debug!("No config directory: {e}");
                    return Ok(Self::default());
                }
            },
        };

        if !required && !path.exists() {
            debug!("No settings file at {}", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        let settings = Self::from_json(&raw).map_err(|e| {
            AppError::Config(format!("{}: {e}", path.display()))
        })?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let jd = &mut serde_json::Deserializer::from_str(raw);
        let settings: Self = serde_path_to_error::deserialize(jd)
            .map_err(|e| AppError::Config(format!("{} at `{}`", e.inner(), e.path())))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> AppResult<()> {
        self.provider.timeout()?;
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(AppError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.provider.temperature
            )));
        }
        if self.provider.model.trim().is_empty() {
            return Err(AppError::Config("model must not be empty".to_string()));
        }
        Ok(())
    }

    /// Write the settings as pretty JSON, creating the config directory.
    pub async fn write_default(path: Option<&Path>) -> AppResult<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => DirType::Config.ensure_dir_async().await?.join(CONFIG_FILE),
        };
        let data = serde_json::to_string_pretty(&Self::default())?;
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> AppResult<Duration> {
        Ok(humantime::parse_duration(&self.timeout)?)
    }

    /// API key from the environment; `None` lets async-openai fall back to
    /// `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// HTTPS unless forced otherwise or the host is clearly local.
    pub fn scheme(&self) -> &'static str {
        let secure = self.secure.unwrap_or_else(|| !is_local_host(&self.host));
        if secure { "https" } else { "http" }
    }

    pub fn api_base(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme(),
            self.host,
            self.port,
            self.api_version.trim_matches('/')
        )
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost"
        || host.ends_with(".local")
        || host.ends_with(".internal")
        || host.ends_with(".lan")
        || host.ends_with(".corp")
        || host.ends_with(".home.arpa")
        || host.ends_with(".private")
        || host.ends_with(".test")
        || host
            .parse::<Ipv4Addr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_private() || ip.is_link_local())
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<Ipv6Addr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_unique_local() || ip.is_unicast_link_local())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_server() {
        let settings = Settings::default();
        assert_eq!(settings.provider.api_base(), "http://localhost:1234/v1");
        assert_eq!(settings.provider.timeout().unwrap(), Duration::from_secs(60));
        assert_eq!(settings.server.bind.port(), 8080);
    }

    #[test]
    fn scheme_follows_host() {
        let mut provider = ProviderSettings {
            host: "api.example.com".to_string(),
            port: 443,
            ..Default::default()
        };
        assert_eq!(provider.scheme(), "https");
        provider.host = "192.168.1.20".to_string();
        assert_eq!(provider.scheme(), "http");
        provider.host = "[::1]".to_string();
        assert_eq!(provider.scheme(), "http");
        provider.secure = Some(true);
        assert_eq!(provider.scheme(), "https");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_json(
            r#"{ "provider": { "model": "gemma-3-12b", "timeout": "2m" } }"#,
        )
        .unwrap();
        assert_eq!(settings.provider.model, "gemma-3-12b");
        assert_eq!(settings.provider.timeout().unwrap(), Duration::from_secs(120));
        assert_eq!(settings.provider.port, 1234);
        assert_eq!(settings.server, ServerSettings::default());
    }

    #[test]
    fn rejects_bad_files() {
        for raw in [
            r#"{ "provider": { "modle": "typo" } }"#,
            r#"{ "provider": { "timeout": "soon" } }"#,
            r#"{ "provider": { "temperature": 3.5 } }"#,
            r#"{ "server": { "bind": "not an address" } }"#,
        ] {
            let err = Settings::from_json(raw).unwrap_err();
            assert!(matches!(err, AppError::Config(_) | AppError::DurationParse(_)), "{raw}");
        }
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("testi-ai-does-not-exist.json");
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[tokio::test]
    async fn written_defaults_load_back() {
        let path = std::env::temp_dir().join(format!("testi-ai-{}.json", std::process::id()));
        let written = Settings::write_default(Some(&path)).await.unwrap();
        let loaded = Settings::load(Some(&written)).unwrap();
        assert_eq!(loaded, Settings::default());
        std::fs::remove_file(written).unwrap();
    }
}
