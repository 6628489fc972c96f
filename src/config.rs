use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name looked up in the current directory
pub const CONFIG_FILE: &str = "npmflow.toml";

/// Represents the complete configuration for npm-flow.
///
/// Contains the canonical remote, package-manager settings and dependency check options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default)]
    pub packages: PackagesConfig,

    #[serde(default)]
    pub dependencies: DependenciesConfig,
}

/// Returns the default remote name.
fn default_remote() -> String {
    "origin".to_string()
}

/// Returns the default package-manager binary.
fn default_manager() -> String {
    "npm".to_string()
}

/// Returns the default monorepo marker file.
fn default_workspace_marker() -> String {
    "lerna.json".to_string()
}

/// Returns the default lock files, primary first.
fn default_lock_files() -> Vec<String> {
    vec![
        "package-lock.json".to_string(),
        "npm-shrinkwrap.json".to_string(),
    ]
}

/// Configuration for the package manager and the on-disk package layout.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PackagesConfig {
    #[serde(default = "default_manager")]
    pub manager: String,

    #[serde(default = "default_workspace_marker")]
    pub workspace_marker: String,

    #[serde(default = "default_lock_files")]
    pub lock_files: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        PackagesConfig {
            manager: default_manager(),
            workspace_marker: default_workspace_marker(),
            lock_files: default_lock_files(),
        }
    }
}

/// Configuration for dependency validation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct DependenciesConfig {
    /// Package names never checked against the branch policy
    #[serde(default)]
    pub no_version_check: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            remote: default_remote(),
            packages: PackagesConfig::default(),
            dependencies: DependenciesConfig::default(),
        }
    }
}

impl Config {
    /// Configured exclusions merged with the ones given for one invocation
    pub fn excluded_packages(&self, extra: &[String]) -> Vec<String> {
        let mut excluded = self.dependencies.no_version_check.clone();
        for name in extra {
            if !excluded.contains(name) {
                excluded.push(name.clone());
            }
        }
        excluded
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `npmflow.toml` in current directory
/// 3. `.npmflow.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let local = Path::new(".").join(CONFIG_FILE);

    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if local.exists() {
        fs::read_to_string(local)?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(format!(".{}", CONFIG_FILE));
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    parse_config(&config_str)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| FlowError::config(e.to_string()))?;

    if config.remote.trim().is_empty() {
        return Err(FlowError::config("remote must not be empty"));
    }
    if config.packages.lock_files.is_empty() {
        return Err(FlowError::config("packages.lock_files must list at least one file"));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote, "origin");
        assert_eq!(config.packages.manager, "npm");
        assert_eq!(config.packages.workspace_marker, "lerna.json");
        assert_eq!(
            config.packages.lock_files,
            vec!["package-lock.json", "npm-shrinkwrap.json"]
        );
        assert!(config.dependencies.no_version_check.is_empty());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config("remote = \"upstream\"\n").unwrap();
        assert_eq!(config.remote, "upstream");
        assert_eq!(config.packages, PackagesConfig::default());
    }

    #[test]
    fn test_empty_remote_rejected() {
        let err = parse_config("remote = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn test_empty_lock_files_rejected() {
        let err = parse_config("[packages]\nlock_files = []\n").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_excluded_packages_are_merged_without_duplicates() {
        let mut config = Config::default();
        config.dependencies.no_version_check = vec!["@mui/lab".to_string()];

        let excluded = config.excluded_packages(&["@mui/lab".to_string(), "left-pad".to_string()]);
        assert_eq!(excluded, vec!["@mui/lab", "left-pad"]);
    }
}
