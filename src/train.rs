//! Offline training: corpus -> forest + baseline statistics on disk.

use anyhow::{ensure, Context, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::io::Write;
use std::path::Path;

use crate::config::AppConfig;
use crate::forest::{ForestParams, RandomForest};
use crate::generator::read_corpus;
use crate::model::DurationModel;
use crate::persist::write_atomic;
use crate::types::{BaselineStatistics, EncodedFeatureVector, TripRecord};

pub struct TrainingOutcome {
    pub model: DurationModel,
    pub baseline: BaselineStatistics,
    /// Mean absolute error on the held-out partition, in minutes.
    pub mae: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// Corpus labels are canonical already, so no fuzzy matching here.
pub fn encode_record(r: &TripRecord) -> EncodedFeatureVector {
    EncodedFeatureVector::new(r.distance_km, r.vehicle_type, r.weather, r.traffic_level, r.driver_experience)
}

/// Shuffle `0..n` with `seed` and hold out `ceil(n * test_fraction)` indices.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    // absorb rounding in n * fraction before taking the ceiling
    let n_test = ((n as f64) * test_fraction - 1e-9).ceil() as usize;
    let train = idx.split_off(n_test.min(n));
    (train, idx)
}

pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum::<f64>() / n as f64
}

/// Fit and evaluate in memory. The baseline covers every label, not just the training split.
pub fn fit(records: &[TripRecord], params: &ForestParams, test_fraction: f64) -> Result<TrainingOutcome> {
    ensure!(records.len() >= 2, "need at least two trips to train, got {}", records.len());
    let x: Vec<Vec<f64>> = records.iter().map(|r| encode_record(r).to_array().to_vec()).collect();
    let y: Vec<f64> = records.iter().map(|r| f64::from(r.delivery_duration_mins)).collect();

    let (train_idx, test_idx) = train_test_split(records.len(), test_fraction, params.seed);
    ensure!(!train_idx.is_empty() && !test_idx.is_empty(), "split left an empty partition");
    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

    tracing::info!("training starts: {} train / {} test rows, {} trees", train_idx.len(), test_idx.len(), params.n_trees);
    let model = DurationModel::new(RandomForest::fit(&x_train, &y_train, params)?)?;

    let predicted: Vec<f64> = test_idx.iter().map(|&i| model.forest().predict(&x[i])).collect();
    let actual: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();
    let mae = mean_absolute_error(&predicted, &actual);
    tracing::info!("average error: ±{:.2} mins", mae);

    let baseline = BaselineStatistics::from_durations(&y)?;
    Ok(TrainingOutcome { model, baseline, mae, n_train: train_idx.len(), n_test: test_idx.len() })
}

pub fn save_baseline(path: &Path, stats: &BaselineStatistics) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    write_atomic(path, |f| {
        f.write_all(json.as_bytes())?;
        Ok(())
    })
    .with_context(|| format!("failed to save baseline stats to {}", path.display()))
}

/// Full training run: read the corpus, fit, then replace baseline and model on disk.
///
/// Each file is renamed into place on its own; the pair is not swapped as one
/// unit. The baseline goes first, so a failure there leaves the old model
/// and baseline together.
pub fn train_from_config(cfg: &AppConfig) -> Result<TrainingOutcome> {
    let records = read_corpus(&cfg.data_path)?;
    tracing::info!("loaded {} rows from {}", records.len(), cfg.data_path.display());

    let outcome = fit(&records, &cfg.forest, cfg.test_fraction)?;
    save_baseline(&cfg.stats_path, &outcome.baseline)?;
    tracing::info!(
        "baseline stats saved to {} (mean {:.1}, std {:.1})",
        cfg.stats_path.display(),
        outcome.baseline.mean_duration,
        outcome.baseline.std_duration
    );
    outcome.model.save(&cfg.model_path)?;
    tracing::info!("model saved to {}", cfg.model_path.display());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Experience, Traffic, Vehicle, Weather};

    #[test]
    fn test_split_sizes_and_disjoint() {
        let (train, test) = train_test_split(101, 0.2, 42);
        assert_eq!(test.len(), 21);
        assert_eq!(train.len(), 80);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..101).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 42));
        assert_ne!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 43));
    }

    #[test]
    fn test_mae() {
        assert_eq!(mean_absolute_error(&[1.0, 5.0], &[2.0, 2.0]), 2.0);
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
    }

    #[test]
    fn test_encode_record_uses_canonical_codes() {
        let r = TripRecord {
            order_id: "ORD-1000".into(),
            pickup_district: "Mitte".into(),
            pickup_lat: 52.52,
            pickup_lon: 13.40,
            dropoff_district: "Pankow".into(),
            dropoff_lat: 52.56,
            dropoff_lon: 13.40,
            distance_km: 4.4,
            vehicle_type: Vehicle::Scooter,
            weather: Weather::Snow,
            traffic_level: Traffic::Low,
            driver_experience: Experience::Expert,
            timestamp: "2026-03-01 08:15:00".into(),
            delivery_duration_mins: 12,
        };
        let enc = encode_record(&r);
        assert_eq!(enc.to_array(), [4.4, 3.0, 0.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_fit_rejects_tiny_corpus() {
        assert!(fit(&[], &ForestParams::default(), 0.2).is_err());
    }
}
