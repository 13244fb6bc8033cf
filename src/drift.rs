//! Drift check of recent delivery durations against the training baseline.

use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::types::{BaselineStatistics, DriftReport};

/// |z| above this many baseline standard deviations counts as drift.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

impl BaselineStatistics {
    /// Summary of the full label distribution; `std_duration` is the sample (n-1) deviation.
    pub fn from_durations(durations: &[f64]) -> CoreResult<Self> {
        if durations.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        let n = durations.len() as f64;
        let mean = durations.iter().sum::<f64>() / n;
        let std = if durations.len() < 2 {
            0.0
        } else {
            (durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };
        Ok(Self {
            mean_duration: mean,
            std_duration: std,
            description: "Baseline delivery stats from training data".to_string(),
        })
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::BaselineUnavailable(format!("{}: {}", path.display(), e)))?;
        let stats: Self = serde_json::from_str(&text)
            .map_err(|e| CoreError::MalformedBaseline(format!("{}: {}", path.display(), e)))?;
        stats.validate()?;
        Ok(stats)
    }

    fn validate(&self) -> CoreResult<()> {
        if !self.mean_duration.is_finite() {
            return Err(CoreError::MalformedBaseline(format!("mean_duration = {}", self.mean_duration)));
        }
        if !self.std_duration.is_finite() || self.std_duration <= 0.0 {
            return Err(CoreError::MalformedBaseline(format!("std_duration = {}", self.std_duration)));
        }
        Ok(())
    }
}

/// z = (batch mean - baseline mean) / baseline std, flagged when |z| > `threshold`.
pub fn check_drift(durations: &[f64], baseline: &BaselineStatistics, threshold: f64) -> CoreResult<DriftReport> {
    if durations.is_empty() {
        return Err(CoreError::EmptyBatch);
    }
    baseline.validate()?;
    if let Some(bad) = durations.iter().find(|d| !d.is_finite()) {
        return Err(CoreError::NonFiniteInput(format!("duration {bad}")));
    }
    let current_mean = durations.iter().sum::<f64>() / durations.len() as f64;
    let z_score = (current_mean - baseline.mean_duration) / baseline.std_duration;
    Ok(DriftReport {
        baseline_mean: baseline.mean_duration,
        current_mean,
        z_score,
        drift_detected: z_score.abs() > threshold,
    })
}

pub fn format_drift(report: &DriftReport) -> String {
    let verdict = if report.drift_detected {
        "Drift detected. Model may be invalid. Retrain recommended."
    } else {
        "Data is stable. Model is healthy."
    };
    format!(
        "Baseline Mean: {:.1} | Today's Mean: {:.1}\nZ-Score: {:.2}\n{}",
        report.baseline_mean, report.current_mean, report.z_score, verdict
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> BaselineStatistics {
        BaselineStatistics { mean_duration: 90.0, std_duration: 10.0, description: String::new() }
    }

    #[test]
    fn test_drift_detected() {
        let r = check_drift(&[110.0, 120.0, 115.0], &baseline(), DEFAULT_Z_THRESHOLD).unwrap();
        assert_eq!(r.current_mean, 115.0);
        assert!((r.z_score - 2.5).abs() < 1e-12);
        assert!(r.drift_detected);
        assert!(format_drift(&r).ends_with("Retrain recommended."));
    }

    #[test]
    fn test_stable() {
        let r = check_drift(&[90.0, 100.0], &baseline(), DEFAULT_Z_THRESHOLD).unwrap();
        assert!((r.z_score - 0.5).abs() < 1e-12);
        assert!(!r.drift_detected);
        assert_eq!(
            format_drift(&r),
            "Baseline Mean: 90.0 | Today's Mean: 95.0\nZ-Score: 0.50\nData is stable. Model is healthy."
        );
    }

    #[test]
    fn test_exactly_two_is_stable() {
        let r = check_drift(&[70.0], &baseline(), DEFAULT_Z_THRESHOLD).unwrap();
        assert_eq!(r.z_score, -2.0);
        assert!(!r.drift_detected);
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(check_drift(&[], &baseline(), 2.0), Err(CoreError::EmptyBatch));
    }

    #[test]
    fn test_zero_std_is_malformed() {
        let b = BaselineStatistics { std_duration: 0.0, ..baseline() };
        assert!(matches!(check_drift(&[1.0], &b, 2.0), Err(CoreError::MalformedBaseline(_))));
    }

    #[test]
    fn test_from_durations_sample_std() {
        let s = BaselineStatistics::from_durations(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.mean_duration, 5.0);
        assert!((s.std_duration - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = BaselineStatistics::load(&dir.path().join("training_stats.json"));
        assert!(matches!(missing, Err(CoreError::BaselineUnavailable(_))));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"mean_duration": 90.0}"#).unwrap();
        assert!(matches!(BaselineStatistics::load(&path), Err(CoreError::MalformedBaseline(_))));
    }

    #[test]
    fn test_load_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_stats.json");
        std::fs::write(
            &path,
            r#"{"mean_duration": 42.5, "std_duration": 12.0, "description": "Baseline delivery stats from training data"}"#,
        )
        .unwrap();
        let s = BaselineStatistics::load(&path).unwrap();
        assert_eq!(s.mean_duration, 42.5);
        assert_eq!(s.std_duration, 12.0);
    }

    #[test]
    fn test_load_without_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_stats.json");
        std::fs::write(&path, r#"{"mean_duration": 30.0, "std_duration": 8.0}"#).unwrap();
        let s = BaselineStatistics::load(&path).unwrap();
        assert_eq!((s.mean_duration, s.std_duration), (30.0, 8.0));
        assert!(s.description.is_empty());
    }
}
