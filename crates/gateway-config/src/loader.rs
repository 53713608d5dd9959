//! Loading, environment overlay, and validation of [`GatewayConfig`].

use crate::error::{ConfigError, ConfigResult};
use crate::schema::GatewayConfig;
use std::path::{Path, PathBuf};
use validator::Validate;

const DEFAULT_CONFIG_PATHS: &[&str] = &["config.yaml", "config.yml", "config.toml"];
const ENV_CONFIG_PATH: &str = "GATEWAY_CONFIG";

/// Load, overlay, and validate the gateway's configuration document.
///
/// Resolution order: `$GATEWAY_CONFIG` if set, else the first of
/// `config.yaml`/`config.yml`/`config.toml` that exists, else built-in
/// defaults. `GATEWAY_*` environment variables are then applied as a final
/// overlay (§6: "Configuration: a single structured document").
///
/// # Errors
/// Returns [`ConfigError::Io`]/[`ConfigError::Parse`] if an explicitly
/// requested file is unreadable or malformed, and
/// [`ConfigError::InvalidField`]/[`ConfigError::AmbiguousLimit`] if the
/// resolved document fails validation.
pub async fn load_config() -> ConfigResult<GatewayConfig> {
    let mut config = if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        load_from_path(Path::new(&path)).await?
    } else if let Some(path) = find_default_path().await {
        load_from_path(&path).await?
    } else {
        GatewayConfig::default()
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

async fn find_default_path() -> Option<PathBuf> {
    for candidate in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(candidate);
        if tokio::fs::metadata(&path).await.is_ok() {
            return Some(path);
        }
    }
    None
}

/// Load and parse a config document from an explicit path.
///
/// # Errors
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Parse`] if its content does not parse as YAML or TOML.
pub async fn load_from_path(path: &Path) -> ConfigResult<GatewayConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_document(path, &contents)
}

fn parse_document(path: &Path, contents: &str) -> ConfigResult<GatewayConfig> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Apply `GATEWAY_*` environment variables over an already-loaded document.
/// Unknown `GATEWAY_*` keys are ignored rather than rejected, since they may
/// be meant for a co-located process; only recognized keys are applied.
fn apply_env_overrides(config: &mut GatewayConfig) -> ConfigResult<()> {
    if let Ok(host) = std::env::var("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Ok(port) = std::env::var("GATEWAY_PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidField {
            field: "server.port".to_string(),
            message: format!("'{port}' is not a valid port number"),
        })?;
    }
    if let Ok(strategy) = std::env::var("GATEWAY_STRATEGY") {
        config.strategy = strategy;
    }
    if let Ok(max_concurrent) = std::env::var("GATEWAY_MAX_CONCURRENT") {
        config.max_concurrent =
            max_concurrent
                .parse()
                .map_err(|_| ConfigError::InvalidField {
                    field: "max_concurrent".to_string(),
                    message: format!("'{max_concurrent}' is not a valid integer"),
                })?;
    }
    if let Ok(timeout_ms) = std::env::var("GATEWAY_TIMEOUT_MS") {
        config.timeout_ms = timeout_ms.parse().map_err(|_| ConfigError::InvalidField {
            field: "timeout_ms".to_string(),
            message: format!("'{timeout_ms}' is not a valid integer"),
        })?;
    }
    if let Ok(max_models) = std::env::var("GATEWAY_MAX_MODELS") {
        config.registry.max_models =
            Some(max_models.parse().map_err(|_| ConfigError::InvalidField {
                field: "registry.max_models".to_string(),
                message: format!("'{max_models}' is not a valid integer"),
            })?);
    }
    Ok(())
}

/// Shape validation (`validator` derive) plus the semantic checks that
/// cross-cut multiple fields.
fn validate(config: &GatewayConfig) -> ConfigResult<()> {
    config
        .validate()
        .map_err(|errors| first_validation_error(&errors))?;

    match config.registry.max_models {
        None => {
            return Err(ConfigError::AmbiguousLimit {
                field: "registry.max_models".to_string(),
                message: "must be set explicitly; the gateway does not assume a default cap on \
                          loaded models"
                    .to_string(),
            });
        }
        Some(0) => {
            return Err(ConfigError::AmbiguousLimit {
                field: "registry.max_models".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Some(_) => {}
    }

    for (scope, limit) in &config.providers {
        if limit.enabled && limit.id.is_empty() {
            return Err(ConfigError::InvalidField {
                field: format!("providers.{scope}.id"),
                message: "provider id must not be empty".to_string(),
            });
        }
        if limit.enabled && limit.api_key.is_none() && limit.api_key_env.is_none() {
            return Err(ConfigError::InvalidField {
                field: format!("providers.{scope}"),
                message: "enabled provider must set either api_key or api_key_env".to_string(),
            });
        }
    }

    Ok(())
}

fn first_validation_error(errors: &validator::ValidationErrors) -> ConfigError {
    let flattened = errors.field_errors();
    let Some((field, field_errors)) = flattened.iter().next() else {
        return ConfigError::InvalidField {
            field: "unknown".to_string(),
            message: "validation failed".to_string(),
        };
    };
    let message = field_errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "invalid value".to_string());
    ConfigError::InvalidField {
        field: (*field).to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
strategy: weighted
max_concurrent: 64
registry:
  max_models: 10
"#;
        let config = parse_document(Path::new("config.yaml"), yaml).expect("parse");
        assert_eq!(config.strategy, "weighted");
        assert_eq!(config.max_concurrent, 64);
        assert_eq!(config.registry.max_models, Some(10));
    }

    #[test]
    fn test_parse_toml_document() {
        let toml_src = r#"
strategy = "failover"
max_concurrent = 16

[registry]
max_models = 5
"#;
        let config = parse_document(Path::new("config.toml"), toml_src).expect("parse");
        assert_eq!(config.strategy, "failover");
        assert_eq!(config.registry.max_models, Some(5));
    }

    #[test]
    fn test_missing_max_models_is_ambiguous() {
        let config = GatewayConfig::default();
        let result = validate(&config);
        assert!(matches!(result, Err(ConfigError::AmbiguousLimit { .. })));
    }

    #[test]
    fn test_valid_config_passes() {
        let mut config = GatewayConfig::default();
        config.registry.max_models = Some(50);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_enabled_provider_without_credentials_rejected() {
        let mut config = GatewayConfig::default();
        config.registry.max_models = Some(50);
        config.providers.insert(
            "openai".to_string(),
            crate::schema::ProviderConfig {
                id: "openai".to_string(),
                enabled: true,
                ..Default::default()
            },
        );
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidField { .. })
        ));
    }
}
