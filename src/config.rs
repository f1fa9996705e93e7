use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the credential home directory
pub const HOME_ENV: &str = "BRANCHWRIGHT_HOME";

/// Main configuration structure for branchwright
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Home directory for persisted credentials (defaults to ~/.branchwright)
    #[serde(default)]
    pub home_directory: Option<String>,

    /// Hosting provider endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Branch and remote naming
    #[serde(default)]
    pub publish: PublishConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosting provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_github")]
    pub github: ProviderEndpoint,

    #[serde(default = "default_gitee")]
    pub gitee: ProviderEndpoint,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// REST and SSH locations of a single provider
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub api_url: String,
    pub ssh_host: String,
}

/// Publish workflow configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublishConfig {
    /// Name of the remote that is linked and pushed to
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Integration branch merged into every dev branch
    #[serde(default = "default_master_branch")]
    pub master_branch: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_github() -> ProviderEndpoint {
    ProviderEndpoint {
        api_url: "https://api.github.com".to_string(),
        ssh_host: "github.com".to_string(),
    }
}
fn default_gitee() -> ProviderEndpoint {
    ProviderEndpoint {
        api_url: "https://gitee.com/api/v5".to_string(),
        ssh_host: "gitee.com".to_string(),
    }
}
fn default_timeout() -> u64 {
    5
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_master_branch() -> String {
    "master".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

// Default implementations
impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            github: default_github(),
            gitee: default_gitee(),
            timeout: default_timeout(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            master_branch: default_master_branch(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("branchwright").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(home) = &self.home_directory {
            self.home_directory = Some(
                shellexpand::full(home)
                    .context("Failed to expand home_directory path")?
                    .into_owned(),
            );
        }

        Ok(())
    }

    /// Resolve the directory that holds persisted credentials and choices
    ///
    /// `BRANCHWRIGHT_HOME` wins over the config file, which wins over `~/.branchwright`.
    pub fn home_path(&self) -> Result<PathBuf> {
        if let Ok(home) = std::env::var(HOME_ENV) {
            if !home.trim().is_empty() {
                return Ok(PathBuf::from(home));
            }
        }

        if let Some(home) = &self.home_directory {
            return Ok(PathBuf::from(home));
        }

        let user_home = dirs::home_dir().context("Failed to get user home directory")?;
        Ok(user_home.join(".branchwright"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert!(config.home_directory.is_none());
        assert_eq!(config.providers.github.api_url, "https://api.github.com");
        assert_eq!(config.providers.gitee.ssh_host, "gitee.com");
        assert_eq!(config.providers.timeout, 5);
        assert_eq!(config.publish.remote, "origin");
        assert_eq!(config.publish.master_branch, "master");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.yml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yml");

        let mut config = Config::default();
        config.home_directory = Some("/custom/home".to_string());
        config.publish.master_branch = "main".to_string();
        config.providers.timeout = 30;

        config.save(&config_path).expect("Failed to save config");
        let loaded = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded.home_directory.as_deref(), Some("/custom/home"));
        assert_eq!(loaded.publish.master_branch, "main");
        assert_eq!(loaded.providers.timeout, 30);
    }

    #[test]
    fn test_yaml_parsing_with_partial_sections() {
        let yaml_content = r#"
providers:
  github:
    api_url: "http://127.0.0.1:9999"
    ssh_host: "github.example.com"
publish:
  remote: "upstream"
logging:
  level: "debug"
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.providers.github.api_url, "http://127.0.0.1:9999");
        assert_eq!(config.providers.gitee.api_url, "https://gitee.com/api/v5");
        assert_eq!(config.providers.timeout, 5);
        assert_eq!(config.publish.remote, "upstream");
        assert_eq!(config.publish.master_branch, "master");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.color);
    }

    #[test]
    #[serial]
    fn test_home_path_resolution_order() {
        env::remove_var(HOME_ENV);

        let mut config = Config::default();
        config.home_directory = Some("/from/config".to_string());
        assert_eq!(config.home_path().unwrap(), PathBuf::from("/from/config"));

        env::set_var(HOME_ENV, "/from/env");
        assert_eq!(config.home_path().unwrap(), PathBuf::from("/from/env"));
        env::remove_var(HOME_ENV);

        config.home_directory = None;
        let default_home = config.home_path().unwrap();
        assert!(default_home.ends_with(".branchwright"));
    }

    #[test]
    #[serial]
    fn test_expand_paths() {
        env::set_var("TEST_BRANCHWRIGHT_ROOT", "/test/home");

        let mut config = Config::default();
        config.home_directory = Some("${TEST_BRANCHWRIGHT_ROOT}/.bw".to_string());
        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.home_directory.as_deref(), Some("/test/home/.bw"));

        env::remove_var("TEST_BRANCHWRIGHT_ROOT");
    }
}
