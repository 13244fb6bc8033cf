use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::drift::DEFAULT_Z_THRESHOLD;
use crate::explain::DISPLAY_THRESHOLD_MINS;
use crate::forest::ForestParams;

/// Env var naming an optional JSON config file.
pub const CONFIG_ENV: &str = "DELIVERY_CONFIG";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub stats_path: PathBuf,
    pub data_path: PathBuf,
    pub bind_addr: String,
    pub forest: ForestParams,
    pub test_fraction: f64,
    pub drift_threshold: f64,
    pub display_threshold: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/delivery_model.bin"),
            stats_path: PathBuf::from("models/training_stats.json"),
            data_path: PathBuf::from("data/berlin_delivery_data.csv"),
            bind_addr: "0.0.0.0:8080".to_string(),
            forest: ForestParams::default(),
            test_fraction: 0.2,
            drift_threshold: DEFAULT_Z_THRESHOLD,
            display_threshold: DISPLAY_THRESHOLD_MINS,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).with_context(|| format!("config file not found: {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&data).with_context(|| format!("invalid config JSON in {}", path.display()))?;
        anyhow::ensure!(
            cfg.test_fraction > 0.0 && cfg.test_fraction < 1.0,
            "test_fraction must be in (0, 1), got {}",
            cfg.test_fraction
        );
        Ok(cfg)
    }

    /// Defaults, or the file named by `DELIVERY_CONFIG`, then per-path env overrides.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(p) => Self::load(Path::new(&p))?,
            None => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("MODEL_PATH") {
            self.model_path = v.into();
        }
        if let Some(v) = get("STATS_PATH") {
            self.stats_path = v.into();
        }
        if let Some(v) = get("DATA_PATH") {
            self.data_path = v.into();
        }
        if let Some(v) = get("BIND_ADDR") {
            self.bind_addr = v;
        }
    }
}
