//! Armory configuration loading and parsing.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "/etc/armory/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Root configuration structure.
#[derive(Debug, Deserialize, Default)]
pub struct ArmoryConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecConfig {
    /// Ceiling on simultaneously running child processes. Requests beyond the
    /// ceiling wait for a slot instead of being rejected.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per-stream capture cap; output past this point is truncated with a marker.
    #[serde(default = "default_output_cap")]
    pub output_cap_bytes: usize,
    /// Grace period between SIGTERM and SIGKILL when a tool exceeds its deadline.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_secs: u64,
    /// How long a binary-availability probe result stays cached.
    #[serde(default = "default_probe_ttl")]
    pub probe_ttl_secs: u64,
    /// When set, path parameters (wordlists, hash files) must resolve under
    /// this directory.
    #[serde(default)]
    pub wordlist_root: Option<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            output_cap_bytes: default_output_cap(),
            kill_grace_secs: default_kill_grace(),
            probe_ttl_secs: default_probe_ttl(),
            wordlist_root: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_bind() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 5000 }
fn default_max_concurrent() -> usize { 8 }
fn default_output_cap() -> usize { 10 * 1024 * 1024 }
fn default_kill_grace() -> u64 { 5 }
fn default_probe_ttl() -> u64 { 30 }
fn default_log_level() -> String { "info".into() }

/// Load configuration from `ARMORY_CONFIG` or /etc/armory/config.toml,
/// falling back to defaults when no file exists.
pub fn load_config() -> Result<ArmoryConfig, ConfigError> {
    let config_path =
        std::env::var("ARMORY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&config_path).exists() {
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })
    } else {
        tracing::warn!("Config file not found at {config_path}, using defaults");
        Ok(ArmoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArmoryConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.exec.max_concurrent, 8);
        assert_eq!(config.exec.output_cap_bytes, 10 * 1024 * 1024);
        assert_eq!(config.exec.kill_grace_secs, 5);
        assert!(config.exec.wordlist_root.is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
[server]
port = 8081

[log]
level = "debug"
"#;
        let config: ArmoryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.log.level, "debug");
        // Untouched sections keep their defaults
        assert_eq!(config.exec.max_concurrent, 8);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
bind = "127.0.0.1"
port = 5000

[exec]
max_concurrent = 2
output_cap_bytes = 65536
kill_grace_secs = 1
probe_ttl_secs = 5
wordlist_root = "/usr/share/wordlists"

[log]
level = "warn"
"#;
        let config: ArmoryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.exec.max_concurrent, 2);
        assert_eq!(config.exec.output_cap_bytes, 65536);
        assert_eq!(
            config.exec.wordlist_root.as_deref(),
            Some("/usr/share/wordlists")
        );
        assert_eq!(config.log.level, "warn");
    }
}
