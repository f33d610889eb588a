use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Artifact storage configuration
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Offline training configuration
    #[serde(default)]
    #[validate(nested)]
    pub training: TrainingSettings,

    /// Append-only prediction log
    #[serde(default)]
    pub prediction_log: PredictionLogConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("HEART_RISK_CONFIG")
            .unwrap_or_else(|_| "config/heart-risk.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layering defaults, the given file (if present) and environment
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: HEART_RISK_)
            .add_source(
                config::Environment::with_prefix("HEART_RISK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()
            .and_then(|loaded| {
                loaded
                    .validate()
                    .map_err(|e| config::ConfigError::Message(e.to_string()))?;
                Ok(loaded)
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding the encoder, scaler and model artifacts
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingSettings {
    /// Raw dataset (CSV)
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Severity target column (0 = no disease)
    #[serde(default = "default_target_column")]
    #[validate(length(min = 1))]
    pub target_column: String,

    /// Administrative columns dropped before cleaning
    #[serde(default = "default_drop_columns")]
    pub drop_columns: Vec<String>,

    /// Held-out proportion
    #[serde(default = "default_test_size")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_size: f64,

    /// Seed shared by the split and the ensemble
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of trees in the ensemble
    #[serde(default = "default_n_trees")]
    #[validate(range(min = 1))]
    pub n_trees: usize,

    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<u16>,

    #[serde(default = "default_min_samples_split")]
    #[validate(range(min = 2))]
    pub min_samples_split: usize,

    #[serde(default = "default_min_samples_leaf")]
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            target_column: default_target_column(),
            drop_columns: default_drop_columns(),
            test_size: default_test_size(),
            seed: default_seed(),
            n_trees: default_n_trees(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionLogConfig {
    /// CSV file receiving one row per completed prediction
    #[serde(default = "default_prediction_log_path")]
    pub path: PathBuf,
}

impl Default for PredictionLogConfig {
    fn default() -> Self {
        Self {
            path: default_prediction_log_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("heart.csv")
}

fn default_target_column() -> String {
    "num".to_string()
}

fn default_drop_columns() -> Vec<String> {
    vec!["id".to_string(), "dataset".to_string()]
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_n_trees() -> usize {
    100
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_prediction_log_path() -> PathBuf {
    PathBuf::from("prediction_logs.csv")
}

fn default_log_level() -> String {
    "info".to_string()
}
