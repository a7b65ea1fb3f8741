//! Runtime configuration loaded from an optional TOML file and the environment.
//!
//! Every flow receives the section it needs explicitly; nothing reads global
//! state after `AppCfg::load` returns.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::{PassError, PassResult};

/// Public archive with the math and Portuguese course tables.
pub const UCI_URL: &str = "https://archive.ics.uci.edu/static/public/320/student+performance.zip";

/// Snapshot of configuration values consumed by the pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub data: DataCfg,
    pub training: TrainingCfg,
    pub tracking: TrackingCfg,
    pub registry: RegistryCfg,
    pub server: ServerCfg,
    pub logging: LoggingCfg,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCfg {
    pub url: String,
    pub base_dir: PathBuf,
    pub test_size: f64,
    pub seed: u64,
    pub download_attempts: usize,
    pub retry_delay_secs: u64,
}

impl Default for DataCfg {
    fn default() -> Self {
        Self {
            url: UCI_URL.to_string(),
            base_dir: PathBuf::from("data/passcompass"),
            test_size: 0.2,
            seed: 42,
            download_attempts: 5,
            retry_delay_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingCfg {
    pub data_path: PathBuf,
    pub target: String,
    pub acc_min: f64,
    pub max_evals: usize,
    pub experiment: String,
    pub tag: String,
    pub seed: u64,
    pub val_size: f64,
}

impl Default for TrainingCfg {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/train.csv"),
            target: "pass".to_string(),
            acc_min: 0.78,
            max_evals: 25,
            experiment: "passcompass-training".to_string(),
            tag: "logreg".to_string(),
            seed: 42,
            val_size: 0.2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingCfg {
    pub root: PathBuf,
}

impl Default for TrackingCfg {
    fn default() -> Self {
        Self {
            root: PathBuf::from("mlruns"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryCfg {
    pub root: PathBuf,
    pub model_name: String,
    pub stage: String,
}

impl Default for RegistryCfg {
    fn default() -> Self {
        Self {
            root: PathBuf::from("mlruns/registry"),
            model_name: "passcompass_students".to_string(),
            stage: "Staging".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
    pub host: String,
    pub port: u16,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingCfg {
    /// `EnvFilter` directive, e.g. `info` or `passcompass=debug`.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl AppCfg {
    /// Load configuration from `path` (when given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> PassResult<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Parse a TOML file; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> PassResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| PassError::io(path, source))?;
        Self::from_toml(&text).map_err(|message| PassError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("PASSCOMPASS_DATA_DIR") {
            self.data.base_dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup("PASSCOMPASS_TRACKING_ROOT") {
            let root = PathBuf::from(root);
            // The registry follows the tracking root unless it was placed elsewhere.
            if self.registry.root == self.tracking.root.join("registry") {
                self.registry.root = root.join("registry");
            }
            self.tracking.root = root;
        }
        if let Some(root) = lookup("PASSCOMPASS_REGISTRY_ROOT") {
            self.registry.root = PathBuf::from(root);
        }
        if let Some(name) = lookup("PASSCOMPASS_MODEL_NAME") {
            self.registry.model_name = name;
        }
        if let Some(stage) = lookup("PASSCOMPASS_MODEL_STAGE") {
            self.registry.stage = stage;
        }
        if let Some(level) = lookup("PASSCOMPASS_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppCfg::from_toml(
            r#"
            [training]
            acc_min = 0.8

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.training.acc_min, 0.8);
        assert_eq!(cfg.training.max_evals, 25);
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.data.url, UCI_URL);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AppCfg::default();
        cfg.apply_env(|key| match key {
            "PASSCOMPASS_MODEL_STAGE" => Some("Production".to_string()),
            "PASSCOMPASS_TRACKING_ROOT" => Some("/tmp/runs".to_string()),
            _ => None,
        });
        assert_eq!(cfg.registry.stage, "Production");
        assert_eq!(cfg.tracking.root, PathBuf::from("/tmp/runs"));
        assert_eq!(cfg.registry.root, PathBuf::from("/tmp/runs/registry"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn registry_root_override_wins_over_tracking_root() {
        let mut cfg = AppCfg::default();
        cfg.apply_env(|key| match key {
            "PASSCOMPASS_TRACKING_ROOT" => Some("/srv/runs".to_string()),
            "PASSCOMPASS_REGISTRY_ROOT" => Some("/srv/models".to_string()),
            _ => None,
        });
        assert_eq!(cfg.tracking.root, PathBuf::from("/srv/runs"));
        assert_eq!(cfg.registry.root, PathBuf::from("/srv/models"));
    }

    #[test]
    fn registry_root_from_file_survives_tracking_override() {
        let mut cfg = AppCfg::from_toml(
            r#"
            [registry]
            root = "/data/registry"
            "#,
        )
        .unwrap();
        cfg.apply_env(|key| (key == "PASSCOMPASS_TRACKING_ROOT").then(|| "/srv/runs".to_string()));
        assert_eq!(cfg.tracking.root, PathBuf::from("/srv/runs"));
        assert_eq!(cfg.registry.root, PathBuf::from("/data/registry"));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[training\nacc_min = ").unwrap();
        let err = AppCfg::from_file(&path).unwrap_err();
        assert!(matches!(err, PassError::Config { .. }));
    }
}
