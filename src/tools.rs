//! Tool functions handed to the agent layer.
//!
//! Each tool takes plain arguments and returns a plain string (or number),
//! with failures rendered as `Error: ...` text instead of faults, since the
//! caller relays the result verbatim.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::drift::{check_drift, format_drift};
use crate::encoder::encode_trip;
use crate::error::{CoreError, CoreResult};
use crate::explain::{format_report, Explainer};
use crate::geo::haversine_km;
use crate::model::DurationModel;
use crate::types::{AttributionReport, BaselineStatistics, DriftReport};

pub use crate::pii::anonymize_pii;

pub const DEFAULT_TRAFFIC_ARG: &str = "Medium";
pub const DEFAULT_EXPERIENCE_ARG: &str = "Senior";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
}

pub const TOOL_SPECS: [ToolSpec; 6] = [
    ToolSpec {
        name: "predict_delivery_time",
        description: "Predicts delivery duration in minutes from vehicle_type, weather, distance_km, \
                      traffic_level (default Medium) and driver_experience (default Senior). \
                      Handles fuzzy inputs such as 'Rain' for 'Rainy'.",
    },
    ToolSpec {
        name: "explain_delivery_prediction",
        description: "Explains why the model predicted a delivery time, as a base time plus per-factor impacts.",
    },
    ToolSpec {
        name: "check_data_drift",
        description: "Checks whether today's delivery durations (minutes) drifted from the training baseline.",
    },
    ToolSpec {
        name: "calculate_delivery_distance",
        description: "Haversine distance in km between two GPS points (lat1, lon1, lat2, lon2).",
    },
    ToolSpec {
        name: "get_weather_risk",
        description: "Historical Berlin weather for a YYYY-MM-DD date: Sunny, Rainy or Cloudy.",
    },
    ToolSpec {
        name: "anonymize_pii",
        description: "Redacts email addresses and customer ids from free text before analysis.",
    },
];

/// Process-wide loaded state: estimator, explainer and baseline statistics.
/// Built once and never mutated; a reload builds a fresh `Toolbox`.
pub struct Toolbox {
    model: Option<Arc<DurationModel>>,
    explainer: Option<Explainer>,
    baseline: CoreResult<BaselineStatistics>,
    drift_threshold: f64,
    display_threshold: f64,
}

impl Toolbox {
    /// Load everything the config points at. Missing pieces are logged and
    /// reported by the tools that need them.
    pub fn load(cfg: &AppConfig) -> Self {
        let model = match DurationModel::load(&cfg.model_path) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!("model not found: {:#}", e);
                None
            }
        };
        let baseline = BaselineStatistics::load(&cfg.stats_path);
        if let Err(e) = &baseline {
            tracing::warn!("{}", e);
        }
        Self::assemble(model, baseline, cfg)
    }

    pub fn assemble(model: Option<DurationModel>, baseline: CoreResult<BaselineStatistics>, cfg: &AppConfig) -> Self {
        let model = model.map(Arc::new);
        let explainer = model.as_ref().and_then(|m| match Explainer::new(Arc::clone(m)) {
            Ok(ex) => Some(ex),
            Err(e) => {
                tracing::warn!("could not build explainer: {}", e);
                None
            }
        });
        Self {
            model,
            explainer,
            baseline,
            drift_threshold: cfg.drift_threshold,
            display_threshold: cfg.display_threshold,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn has_explainer(&self) -> bool {
        self.explainer.is_some()
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_ok()
    }

    pub fn predict(&self, vehicle: &str, weather: &str, distance_km: f64, traffic: &str, experience: &str) -> CoreResult<f64> {
        let model = self.model.as_ref().ok_or(CoreError::ModelUnavailable)?;
        model.predict(&encode_trip(vehicle, weather, distance_km, traffic, experience))
    }

    pub fn explain(
        &self,
        vehicle: &str,
        weather: &str,
        distance_km: f64,
        traffic: &str,
        experience: &str,
    ) -> CoreResult<AttributionReport> {
        let explainer = self.explainer.as_ref().ok_or(CoreError::ExplainerUnavailable)?;
        explainer.explain(&encode_trip(vehicle, weather, distance_km, traffic, experience))
    }

    pub fn drift(&self, durations: &[f64]) -> CoreResult<DriftReport> {
        let baseline = self.baseline.as_ref().map_err(Clone::clone)?;
        check_drift(durations, baseline, self.drift_threshold)
    }

    pub fn predict_delivery_time(
        &self,
        vehicle: &str,
        weather: &str,
        distance_km: f64,
        traffic: &str,
        experience: &str,
    ) -> String {
        match self.predict(vehicle, weather, distance_km, traffic, experience) {
            Ok(minutes) => format!("{:.1} minutes", minutes),
            Err(e) => format!("Error: {e}"),
        }
    }

    pub fn explain_delivery_prediction(
        &self,
        vehicle: &str,
        weather: &str,
        distance_km: f64,
        traffic: &str,
        experience: &str,
    ) -> String {
        match self.explain(vehicle, weather, distance_km, traffic, experience) {
            Ok(report) => format_report(&report, self.display_threshold),
            Err(e) => format!("Error: {e}"),
        }
    }

    pub fn check_data_drift(&self, durations: &[f64]) -> String {
        match self.drift(durations) {
            Ok(report) => format_drift(&report),
            Err(e) => format!("Error checking drift: {e}"),
        }
    }
}

/// Haversine distance rounded to 10 m.
pub fn calculate_delivery_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    (haversine_km(lat1, lon1, lat2, lon2) * 100.0).round() / 100.0
}

/// Berlin winters are wet and July is dry; everything else reads as cloudy.
pub fn get_weather_risk(date: &str) -> String {
    let date = date.trim();
    let month = NaiveDate::parse_from_str(date.get(..10).unwrap_or(date), "%Y-%m-%d")
        .map(|d| d.month())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", date.get(..7)?), "%Y-%m-%d").ok().map(|d| d.month()));
    let label = match month {
        Some(1) | Some(2) => "Rainy",
        Some(7) => "Sunny",
        _ => "Cloudy",
    };
    label.to_string()
}
