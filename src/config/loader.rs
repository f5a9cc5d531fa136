//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Values given on the command line (or their `WDA_*` environment twins).
/// They win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub consul_url: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(host) = &self.host {
            config.httpd.host = host.clone();
        }
        if let Some(port) = self.port {
            config.httpd.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(file) = &self.log_file {
            config.log.file = file.clone();
        }
        if let Some(url) = &self.consul_url {
            config.consul.url = url.clone();
        }
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str, overrides: &Overrides) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PermissionSource, SessionSource};

    const SAMPLE: &str = r#"
        [app]
        name = "wda"
        env = "production"
        tags = "layout, gateway"

        [httpd]
        port = 8080
        service_port = 8081

        [proxy]
        health_url = "http://layout:8080"
        timeout_secs = 10
        insecure_skip_verify = true
        targets = [
            { url = "http://layout-a:8080" },
            { url = "http://layout-b:8080", weight = 3 },
        ]

        [session]
        source = "kratos"
        url = "http://kratos:4433"

        [permissions]
        source = "keto"
        url = "http://keto:4466"

        [layout]
        proxy = "http://gw/v2"

        [layout.visible]
        online = "false"
    "#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE, &Overrides::default()).unwrap();

        assert!(config.app.is_production());
        assert_eq!(config.app.tag_list(), vec!["layout", "gateway"]);
        assert_eq!(config.proxy.targets.len(), 2);
        assert_eq!(config.proxy.targets[0].weight, 1);
        assert_eq!(config.proxy.targets[1].weight, 3);
        assert_eq!(config.session.source, SessionSource::Kratos);
        assert_eq!(config.session.cookie_name, "ory_kratos_session");
        assert_eq!(config.permissions.source, PermissionSource::Keto);
        assert_eq!(config.layout.visible.online, "false");
        assert_eq!(config.layout.visible.queue, "true");
        assert_eq!(config.health.interval_secs, 30);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            port: Some(9999),
            log_level: Some("debug".into()),
            ..Default::default()
        };
        let config = parse_config(SAMPLE, &overrides).unwrap();
        assert_eq!(config.httpd.port, 9999);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unknown_source_is_parse_error() {
        let text = SAMPLE.replace("source = \"kratos\"", "source = \"ldap\"");
        assert!(matches!(parse_config(&text, &Overrides::default()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = parse_config(include_str!("../../config.toml"), &Overrides::default()).unwrap();
        assert_eq!(config.session.tokens["dev-token"].id, "developer");
        assert_eq!(config.permissions.rules[0].subject, "*");
        assert_eq!(config.repository.dsn, "sqlserver://127.0.0.1:1433/countmax");
        assert!(config.proxy.insecure_skip_verify);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/wda.toml"), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
