//! Service configuration read from the environment.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::chat::{ChatConfig, DEFAULT_CHAT_MODEL, DEFAULT_CHAT_URL};
use crate::classifier::{ClassifierError, FeatureStatistics, ScalingStrategy};
use crate::model_store::{ModelArtifact, ModelStore};
use crate::runtime::{parse_optimization_level, ExecutionPolicy, RuntimeConfig};

pub const ALZHEIMER_MODEL: &str = "alzheimer";
pub const EEG_MODEL: &str = "eeg";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// How EEG features are standardized, before any statistics file is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EegScaling {
    Batch,
    Fixed(PathBuf),
}

impl EegScaling {
    pub fn resolve(&self) -> Result<ScalingStrategy, ClassifierError> {
        match self {
            Self::Batch => Ok(ScalingStrategy::BatchStatistics),
            Self::Fixed(path) => Ok(ScalingStrategy::Fixed(FeatureStatistics::from_json_file(path)?)),
        }
    }
}

/// Everything the service needs at startup. Passed explicitly to constructors.
#[derive(Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
    pub models_dir: PathBuf,
    pub alzheimer_model: ModelArtifact,
    pub eeg_model: ModelArtifact,
    pub allow_degraded: bool,
    pub reject_degraded: bool,
    pub runtime: RuntimeConfig,
    pub eeg_scaling: EegScaling,
    pub max_upload_bytes: usize,
    pub chat: ChatConfig,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_keys", &self.api_keys.len())
            .field("models_dir", &self.models_dir)
            .field("alzheimer_model", &self.alzheimer_model)
            .field("eeg_model", &self.eeg_model)
            .field("allow_degraded", &self.allow_degraded)
            .field("reject_degraded", &self.reject_degraded)
            .field("runtime", &self.runtime)
            .field("eeg_scaling", &self.eeg_scaling)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("chat_endpoint", &self.chat.endpoint)
            .field("chat_model", &self.chat.model_id)
            .finish()
    }
}

impl ServiceConfig {
    /// Reads the process environment. Call `dotenv` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, such as a map in tests
    /// or the environment layered under command line overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("NEUROPATH_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("NEUROPATH_PORT", get("NEUROPATH_PORT"), 8000u16)?;

        let api_keys: Vec<String> = get("NEUROPATH_API_KEYS")
            .ok_or(ConfigError::MissingVar("NEUROPATH_API_KEYS"))?
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if api_keys.is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "NEUROPATH_API_KEYS",
                value: String::new(),
                reason: "at least one key is required".to_string(),
            });
        }

        let models_dir = get("NEUROPATH_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(ModelStore::default_models_dir);

        let alzheimer_model = artifact(&get, ALZHEIMER_MODEL, "NEUROPATH_ALZHEIMER", &models_dir);
        let eeg_model = artifact(&get, EEG_MODEL, "NEUROPATH_EEG", &models_dir);

        let allow_degraded = parse_bool("NEUROPATH_ALLOW_DEGRADED", get("NEUROPATH_ALLOW_DEGRADED"), true)?;
        let reject_degraded = parse_bool("NEUROPATH_REJECT_DEGRADED", get("NEUROPATH_REJECT_DEGRADED"), false)?;
        let serialize = parse_bool(
            "NEUROPATH_SERIALIZE_INFERENCE",
            get("NEUROPATH_SERIALIZE_INFERENCE"),
            false,
        )?;

        let mut runtime = RuntimeConfig {
            inter_threads: parse_or("NEUROPATH_INTER_THREADS", get("NEUROPATH_INTER_THREADS"), 0usize)?,
            intra_threads: parse_or("NEUROPATH_INTRA_THREADS", get("NEUROPATH_INTRA_THREADS"), 0usize)?,
            execution_policy: if serialize {
                ExecutionPolicy::Serialized
            } else {
                ExecutionPolicy::Concurrent
            },
            ..RuntimeConfig::default()
        };
        if let Some(raw) = get("NEUROPATH_OPTIMIZATION_LEVEL") {
            runtime.optimization_level = parse_optimization_level(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: "NEUROPATH_OPTIMIZATION_LEVEL",
                value: raw.clone(),
                reason: "expected disable, 1, 2 or 3".to_string(),
            })?;
        }

        let eeg_scaling = match get("NEUROPATH_EEG_SCALING").map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("batch") => EegScaling::Batch,
            Some("fixed") => EegScaling::Fixed(
                get("NEUROPATH_EEG_STATS")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingVar("NEUROPATH_EEG_STATS"))?,
            ),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "NEUROPATH_EEG_SCALING",
                    value: other.to_string(),
                    reason: "expected batch or fixed".to_string(),
                })
            }
        };

        let max_upload_mb = parse_or("NEUROPATH_MAX_UPLOAD_MB", get("NEUROPATH_MAX_UPLOAD_MB"), 16usize)?;

        let chat = ChatConfig {
            endpoint: get("NEUROPATH_CHAT_URL").unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            api_key: get("OPENROUTER_API_KEY").unwrap_or_default(),
            model_id: get("NEUROPATH_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            ..ChatConfig::default()
        };

        Ok(Self {
            host,
            port,
            api_keys,
            models_dir,
            alzheimer_model,
            eeg_model,
            allow_degraded,
            reject_degraded,
            runtime,
            eeg_scaling,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            chat,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn artifact<G>(get: &G, name: &str, prefix: &str, models_dir: &std::path::Path) -> ModelArtifact
where
    G: Fn(&str) -> Option<String>,
{
    let path = get(&format!("{}_MODEL", prefix))
        .map(PathBuf::from)
        .unwrap_or_else(|| models_dir.join(name).join("model.onnx"));
    let mut artifact = ModelArtifact::new(name, path);
    if let Some(hash) = get(&format!("{}_SHA256", prefix)) {
        artifact = artifact.with_sha256(hash);
    }
    if let Some(url) = get(&format!("{}_URL", prefix)) {
        artifact = artifact.with_url(url);
    }
    artifact
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            var,
            value: other.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("NEUROPATH_API_KEYS", "k1"), ("NEUROPATH_MODELS_DIR", "/srv/models")]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.api_keys, vec!["k1".to_string()]);
        assert_eq!(config.alzheimer_model.path, PathBuf::from("/srv/models/alzheimer/model.onnx"));
        assert_eq!(config.eeg_model.path, PathBuf::from("/srv/models/eeg/model.onnx"));
        assert!(config.allow_degraded);
        assert!(!config.reject_degraded);
        assert_eq!(config.runtime.execution_policy, ExecutionPolicy::Concurrent);
        assert_eq!(config.eeg_scaling, EegScaling::Batch);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.chat.endpoint, DEFAULT_CHAT_URL);
        assert!(config.chat.api_key.is_empty());
    }

    #[test]
    fn test_keys_are_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::MissingVar("NEUROPATH_API_KEYS"));
        assert!(matches!(
            config(&[("NEUROPATH_API_KEYS", " , ")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("NEUROPATH_API_KEYS", "old, new"),
            ("NEUROPATH_PORT", "9000"),
            ("NEUROPATH_EEG_MODEL", "/opt/eeg.onnx"),
            ("NEUROPATH_EEG_SHA256", "ABCDEF"),
            ("NEUROPATH_SERIALIZE_INFERENCE", "yes"),
            ("NEUROPATH_REJECT_DEGRADED", "true"),
            ("NEUROPATH_EEG_SCALING", "fixed"),
            ("NEUROPATH_EEG_STATS", "/opt/eeg_stats.json"),
            ("NEUROPATH_MAX_UPLOAD_MB", "2"),
            ("NEUROPATH_INTRA_THREADS", "4"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.api_keys.len(), 2);
        assert_eq!(config.eeg_model.path, PathBuf::from("/opt/eeg.onnx"));
        assert_eq!(config.eeg_model.sha256.as_deref(), Some("abcdef"));
        assert_eq!(config.runtime.execution_policy, ExecutionPolicy::Serialized);
        assert_eq!(config.runtime.intra_threads, 4);
        assert!(config.reject_degraded);
        assert_eq!(config.eeg_scaling, EegScaling::Fixed(PathBuf::from("/opt/eeg_stats.json")));
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("NEUROPATH_API_KEYS", "k"), ("NEUROPATH_PORT", "eighty")]),
            Err(ConfigError::InvalidValue { var: "NEUROPATH_PORT", .. })
        ));
        assert!(matches!(
            config(&[("NEUROPATH_API_KEYS", "k"), ("NEUROPATH_ALLOW_DEGRADED", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            config(&[("NEUROPATH_API_KEYS", "k"), ("NEUROPATH_EEG_SCALING", "fixed")]).unwrap_err(),
            ConfigError::MissingVar("NEUROPATH_EEG_STATS")
        );
    }
}
