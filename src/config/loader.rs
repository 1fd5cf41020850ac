//! Configuration loading.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! then explicit overrides (environment variables and CLI flags, resolved by
//! the binary's argument parser).

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{HeaderPolicy, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::net::tls::TlsError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Tls(#[from] TlsError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values that take precedence over the file and defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub target_url: Option<String>,
    pub host_policy: Option<HeaderPolicy>,
    pub marker: Option<String>,
    pub accept_invalid_certs: Option<bool>,
}

impl ConfigOverrides {
    /// Apply the overrides that are set.
    pub fn apply(self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(url) = self.target_url {
            config.upstream.url = url;
        }
        if let Some(policy) = self.host_policy {
            config.upstream.host_policy = policy;
        }
        if let Some(marker) = self.marker {
            config.upstream.marker = marker;
        }
        if let Some(accept) = self.accept_invalid_certs {
            config.upstream.accept_invalid_certs = accept;
        }
    }
}

/// Parse a configuration file without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the effective configuration from all sources and validate it once.
pub fn resolve_config(
    file: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<ProxyConfig, ConfigError> {
    let mut config = match file {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn overrides_beat_file_values() {
        let path = write_temp(
            "session-proxy-overrides",
            "[listener]\nport = 7000\n[upstream]\nurl = \"http://file-host:1\"\n",
        );
        let config = resolve_config(
            Some(&path),
            ConfigOverrides {
                target_url: Some("http://flag-host:2".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.listener.port, 7000);
        assert_eq!(config.upstream.url, "http://flag-host:2");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn invalid_override_fails_validation() {
        let err = resolve_config(
            None,
            ConfigOverrides {
                target_url: Some("::nope::".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().starts_with("Validation failed: invalid upstream url"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = resolve_config(
            Some(Path::new("/definitely/not/here.toml")),
            ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
