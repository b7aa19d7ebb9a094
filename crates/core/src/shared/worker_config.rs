use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{DEFAULT_BATCH_SIZE, DEFAULT_WHISPER_MODEL};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({expected})")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Execution device the models are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn is_gpu(self) -> bool {
        matches!(self, Device::Cuda)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            _ => Err(ConfigError::InvalidValue {
                key: "DEVICE",
                value: s.to_string(),
                expected: "cuda or cpu",
            }),
        }
    }
}

/// Numeric precision the recognition model runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeType {
    Float16,
    Float32,
    Int8,
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeType::Float16 => write!(f, "float16"),
            ComputeType::Float32 => write!(f, "float32"),
            ComputeType::Int8 => write!(f, "int8"),
        }
    }
}

impl FromStr for ComputeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float16" | "fp16" => Ok(ComputeType::Float16),
            "float32" | "fp32" => Ok(ComputeType::Float32),
            "int8" => Ok(ComputeType::Int8),
            _ => Err(ConfigError::InvalidValue {
                key: "COMPUTE_TYPE",
                value: s.to_string(),
                expected: "float16, float32 or int8",
            }),
        }
    }
}

/// Process-wide worker configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub device: Device,
    pub compute_type: ComputeType,
    /// Credential forwarded when fetching the diarization model.
    pub hf_token: Option<String>,
    pub batch_size: usize,
    pub whisper_model: String,
    pub cache_models: bool,
    /// Directory searched for pre-downloaded model files.
    pub model_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            device: Device::Cuda,
            compute_type: ComputeType::Float16,
            hf_token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            cache_models: false,
            model_dir: None,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("DEVICE") {
            config.device = v.parse()?;
        }
        if let Some(v) = get("COMPUTE_TYPE") {
            config.compute_type = v.parse()?;
        }
        config.hf_token = get("HF_TOKEN").or_else(|| get("YOUR_HF_TOKEN"));
        if let Some(v) = get("BATCH_SIZE") {
            config.batch_size = match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "BATCH_SIZE",
                        value: v,
                        expected: "a positive integer",
                    })
                }
            };
        }
        if let Some(v) = get("WHISPER_MODEL") {
            config.whisper_model = v.trim().to_string();
        }
        if let Some(v) = get("CACHE_MODELS") {
            config.cache_models = parse_bool("CACHE_MODELS", &v)?;
        }
        config.model_dir = get("MODEL_DIR").map(PathBuf::from);

        Ok(config)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}
