//! Effective configuration with full provenance
//!
//! The effective config is the merged configuration plus where each
//! layer came from. Secrets are redacted in it; the unredacted values
//! only ever reach [`Settings`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::settings::Settings;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "flowvault/effective_config@1";

/// Environment variable holding the access token
pub const ACCESS_TOKEN_ENV: &str = "FLOWVAULT_ACCESS_TOKEN";

/// Project config file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "flowvault.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
    Env,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli/env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli/env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Where the file layers live
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// `~/.config/flowvault/config.toml`; skipped when absent
    pub user: Option<PathBuf>,
    /// `./flowvault.toml` or `--config`
    pub project: Option<PathBuf>,
    /// The project file was named explicitly and must exist
    pub project_required: bool,
}

impl ConfigPaths {
    /// Standard locations, with `explicit` replacing the project file.
    pub fn discover(explicit: Option<&Path>) -> Self {
        let user = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/flowvault/config.toml"));
        match explicit {
            Some(path) => Self {
                user,
                project: Some(path.to_path_buf()),
                project_required: true,
            },
            None => Self {
                user,
                project: Some(PathBuf::from(PROJECT_CONFIG_FILE)),
                project_required: false,
            },
        }
    }
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,

    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration, secrets redacted
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,
}

/// Result of loading configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// For display
    pub effective: EffectiveConfig,
    /// For use
    pub settings: Settings,
}

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "private_key", "api_key", "credential"];

impl EffectiveConfig {
    /// Merge every layer: defaults, user file, project file, CLI
    /// overrides, then the access token from the environment.
    pub fn load(
        paths: &ConfigPaths,
        cli_overrides: Option<Value>,
        env_access_token: Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        if let Some(path) = &paths.user {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::User,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(path) = &paths.project {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Project,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            } else if paths.project_required {
                return Err(ConfigError::IoError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        if let Some(token) = env_access_token.filter(|t| !t.is_empty()) {
            layers.push(json!({ "org": { "access_token": token } }));
            sources.push(ConfigSource {
                origin: ConfigOrigin::Env,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings = Settings::from_value(&merged)?;

        let mut redacted = merged;
        let redactions = Self::redact_secrets(&mut redacted);
        debug!(sources = sources.len(), redactions = redactions.len(), "configuration loaded");

        Ok(LoadedConfig {
            effective: Self {
                schema_version: SCHEMA_VERSION,
                schema_id: SCHEMA_ID.to_string(),
                created_at: Utc::now(),
                config: redacted,
                sources,
                redactions,
            },
            settings,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Redact secrets in place, returning the redacted paths
    fn redact_secrets(value: &mut Value) -> Vec<String> {
        let mut redactions = Vec::new();
        Self::redact_recursive(value, String::new(), &mut redactions);
        redactions
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let current_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };

                    let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));
                    if is_secret && !val.is_object() && !val.is_array() {
                        *val = Value::String("[REDACTED]".to_string());
                        redactions.push(current_path);
                    } else {
                        Self::redact_recursive(val, current_path, redactions);
                    }
                }
            }
            Value::Array(arr) => {
                for (i, val) in arr.iter_mut().enumerate() {
                    Self::redact_recursive(val, format!("{}[{}]", path, i), redactions);
                }
            }
            _ => {}
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing setting: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_files() -> ConfigPaths {
        ConfigPaths::default()
    }

    #[test]
    fn test_defaults_only() {
        let loaded = EffectiveConfig::load(&no_files(), None, None).unwrap();

        assert_eq!(loaded.effective.schema_version, SCHEMA_VERSION);
        assert_eq!(loaded.effective.get_str("org.api_version"), Some("v52.0"));
        assert_eq!(loaded.effective.get_u64("client.max_retries"), Some(3));
        assert_eq!(loaded.effective.sources.len(), 1);
        assert_eq!(loaded.effective.sources[0].origin, ConfigOrigin::Builtin);
        assert_eq!(loaded.settings.batch.concurrency, 1);
    }

    #[test]
    fn test_layer_precedence() {
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "[org]").unwrap();
        writeln!(user, "instance_url = \"https://user.my.salesforce.com\"").unwrap();
        writeln!(user, "[client]").unwrap();
        writeln!(user, "max_retries = 5").unwrap();

        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "[org]").unwrap();
        writeln!(project, "instance_url = \"https://project.my.salesforce.com\"").unwrap();
        writeln!(project, "access_token = \"from-file\"").unwrap();

        let paths = ConfigPaths {
            user: Some(user.path().to_path_buf()),
            project: Some(project.path().to_path_buf()),
            project_required: true,
        };
        let cli = json!({ "org": { "api_version": "v60.0" } });

        let loaded = EffectiveConfig::load(&paths, Some(cli), Some("from-env".into())).unwrap();

        assert_eq!(
            loaded.settings.org.instance_url.as_deref(),
            Some("https://project.my.salesforce.com")
        );
        assert_eq!(loaded.settings.org.api_version, "v60.0");
        assert_eq!(loaded.settings.org.access_token.as_deref(), Some("from-env"));
        assert_eq!(loaded.settings.client.max_retries, 5);

        let origins: Vec<ConfigOrigin> = loaded.effective.sources.iter().map(|s| s.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![
                ConfigOrigin::Builtin,
                ConfigOrigin::User,
                ConfigOrigin::Project,
                ConfigOrigin::Cli,
                ConfigOrigin::Env
            ]
        );
        assert_eq!(loaded.effective.sources[1].digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_token_redacted_for_display() {
        let loaded = EffectiveConfig::load(&no_files(), None, Some("00Dxx!secret".into())).unwrap();

        assert_eq!(loaded.effective.get_str("org.access_token"), Some("[REDACTED]"));
        assert_eq!(loaded.effective.redactions, vec!["org.access_token".to_string()]);
        assert!(!loaded.effective.to_json().unwrap().contains("secret"));
        assert_eq!(loaded.settings.org.access_token.as_deref(), Some("00Dxx!secret"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let paths = ConfigPaths {
            user: None,
            project: Some(PathBuf::from("/nonexistent/flowvault.toml")),
            project_required: true,
        };
        assert!(matches!(
            EffectiveConfig::load(&paths, None, None),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_missing_implicit_file_is_skipped() {
        let paths = ConfigPaths {
            user: Some(PathBuf::from("/nonexistent/config.toml")),
            project: Some(PathBuf::from("/nonexistent/flowvault.toml")),
            project_required: false,
        };
        let loaded = EffectiveConfig::load(&paths, None, None).unwrap();
        assert_eq!(loaded.effective.sources.len(), 1);
    }

    #[test]
    fn test_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[org").unwrap();
        let paths = ConfigPaths {
            user: None,
            project: Some(file.path().to_path_buf()),
            project_required: true,
        };
        assert!(matches!(
            EffectiveConfig::load(&paths, None, None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let cli = json!({ "batch": { "concurrency": 0 } });
        let err = EffectiveConfig::load(&no_files(), Some(cli), None).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }
}
