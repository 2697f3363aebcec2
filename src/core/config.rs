//! Configuration management

use crate::core::error::{Error, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default Pangea API domain
pub const DEFAULT_DOMAIN: &str = "aws.us.pangea.cloud";

/// Default local port for the login callback listener
pub const DEFAULT_CALLBACK_PORT: u16 = 3000;

/// Default time to wait for the browser login, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Global configuration
///
/// Secrets such as the AuthN client token are never read from this file;
/// they come from the command line or the environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub login: LoginConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Hosted login page URL
    pub hosted_login: Option<String>,
    /// Pangea API domain
    pub domain: String,
    /// Loopback port the callback listener binds to
    pub callback_port: u16,
    /// Seconds to wait for the browser login (0 waits forever)
    pub timeout_secs: u64,
    /// Try to open the system browser
    pub open_browser: bool,
    /// Suppress per-request listener diagnostics
    pub quiet: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            hosted_login: None,
            domain: DEFAULT_DOMAIN.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            open_browser: true,
            quiet: true,
        }
    }
}

impl Config {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, falling back to defaults
    /// when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = Self::app_home()?;
        Ok(home.join("config.toml"))
    }

    /// Get the application home directory
    pub fn app_home() -> Result<PathBuf> {
        // Check PANGEA_LOGIN_HOME env var first
        if let Ok(home) = std::env::var("PANGEA_LOGIN_HOME") {
            return Ok(PathBuf::from(home));
        }

        ProjectDirs::from("cloud", "pangea", "pangea-login")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| Error::ConfigError {
                message: "Could not determine pangea-login home directory".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config.login.domain, DEFAULT_DOMAIN);
        assert_eq!(config.login.callback_port, 3000);
        assert_eq!(config.login.timeout_secs, 300);
        assert!(config.login.open_browser);
        assert!(config.login.quiet);
        assert!(config.login.hosted_login.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[login]\nhosted_login = \"https://pdn-example.login.aws.us.pangea.cloud/authorize\"\ncallback_port = 4123"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(
            config.login.hosted_login.as_deref(),
            Some("https://pdn-example.login.aws.us.pangea.cloud/authorize")
        );
        assert_eq!(config.login.callback_port, 4123);
        assert_eq!(config.login.domain, DEFAULT_DOMAIN);
        assert_eq!(config.login.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[login\ncallback_port = ").unwrap();

        assert!(matches!(
            Config::load_from(file.path()),
            Err(Error::TomlParse(_))
        ));
    }
}
