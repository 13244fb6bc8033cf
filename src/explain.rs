//! Exact Shapley attribution for the forest.
//!
//! For every tree, the value of a feature coalition `S` is the tree's
//! expected output when the features in `S` are fixed to the input and the
//! rest are integrated out by training cover. The Shapley values of that
//! game are computed exactly by enumerating all coalitions (the encoder has
//! six features, so 64 per tree), then averaged over the forest. Shapley
//! efficiency gives `base + sum(contributions) == prediction` per tree, and
//! averaging is linear, so it holds for the forest too.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::forest::RegressionTree;
use crate::model::DurationModel;
use crate::types::{AttributionReport, Contribution, EncodedFeatureVector, FEATURE_NAMES};

/// Contributions at or below this many minutes are left out of the text report.
pub const DISPLAY_THRESHOLD_MINS: f64 = 0.1;

pub struct Explainer {
    model: Arc<DurationModel>,
    /// `weights[s]` is the Shapley weight for a coalition of size `s`.
    weights: Vec<f64>,
    base_value: f64,
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

impl Explainer {
    pub fn new(model: Arc<DurationModel>) -> CoreResult<Self> {
        let m = model.forest().n_features();
        if m == 0 || m > 16 {
            return Err(CoreError::IncompatibleArtifact(format!("cannot enumerate {m} features")));
        }
        let weights = (0..m)
            .map(|s| factorial(s) * factorial(m - s - 1) / factorial(m))
            .collect();
        let base_value = model.forest().expected_value();
        tracing::info!("explainer ready; base value {:.2} mins", base_value);
        Ok(Self { model, weights, base_value })
    }

    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    fn tree_shapley(&self, tree: &RegressionTree, x: &[f64], phi: &mut [f64]) {
        let m = phi.len();
        let values: Vec<f64> = (0..1u32 << m).map(|s| tree.conditional_expectation(x, s)).collect();
        for (i, p) in phi.iter_mut().enumerate() {
            let bit = 1u32 << i;
            for s in (0..1u32 << m).filter(|s| s & bit == 0) {
                let w = self.weights[s.count_ones() as usize];
                *p += w * (values[(s | bit) as usize] - values[s as usize]);
            }
        }
    }

    /// Attribute the prediction for `x` across `FEATURE_NAMES`.
    pub fn explain(&self, x: &EncodedFeatureVector) -> CoreResult<AttributionReport> {
        let prediction = self.model.predict(x)?;
        let row = x.to_array();
        let trees = self.model.forest().trees();

        let mut phi = vec![0.0; row.len()];
        for tree in trees {
            self.tree_shapley(tree, &row, &mut phi);
        }
        let n = trees.len() as f64;
        let contributions = FEATURE_NAMES
            .iter()
            .zip(phi)
            .map(|(name, total)| Contribution { feature: name.to_string(), minutes: total / n })
            .collect();

        let report = AttributionReport { base_value: self.base_value, prediction, contributions };
        tracing::debug!(
            "explained prediction {:.2}; reconstructed {:.2}",
            prediction,
            report.reconstructed()
        );
        Ok(report)
    }
}

/// Text form of a report, showing only contributions above `threshold` minutes.
pub fn format_report(report: &AttributionReport, threshold: f64) -> String {
    let mut out = format!("Base Delivery Time (Avg): {:.1} mins\n", report.base_value);
    out.push_str("Impact of factors:\n");
    for c in report.contributions.iter().filter(|c| c.minutes.abs() > threshold) {
        let sign = if c.minutes > 0.0 { "+" } else { "" };
        let _ = writeln!(out, "- {}: {}{:.1} mins", c.feature, sign, c.minutes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestParams, RandomForest};

    fn synthetic_model() -> Arc<DurationModel> {
        // y = 3*distance + 4*traffic + 2*van
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..600 {
            let d = (i % 20) as f64 * 0.5;
            let t = (i % 3) as f64;
            let van = ((i / 7) % 2) as f64;
            x.push(vec![d, (i % 4) as f64, t, ((i / 3) % 3) as f64, 0.0, van]);
            y.push(3.0 * d + 4.0 * t + 2.0 * van);
        }
        let forest = RandomForest::fit(&x, &y, &ForestParams { n_trees: 10, ..Default::default() }).unwrap();
        Arc::new(DurationModel::new(forest).unwrap())
    }

    fn input(distance_km: f64, traffic_code: u8, van: u8) -> EncodedFeatureVector {
        EncodedFeatureVector { distance_km, weather_code: 1, traffic_code, exp_code: 1, scooter: 0, van }
    }

    #[test]
    fn test_additivity() {
        let model = synthetic_model();
        let explainer = Explainer::new(model.clone()).unwrap();
        for x in [input(0.0, 0, 0), input(4.5, 2, 1), input(9.5, 1, 0), input(30.0, 2, 1)] {
            let report = explainer.explain(&x).unwrap();
            let pred = model.predict(&x).unwrap();
            assert_eq!(report.prediction, pred);
            assert!((report.reconstructed() - pred).abs() < 1e-9, "{} vs {}", report.reconstructed(), pred);
        }
    }

    #[test]
    fn test_unused_feature_gets_nothing() {
        let explainer = Explainer::new(synthetic_model()).unwrap();
        let report = explainer.explain(&input(6.0, 2, 1)).unwrap();
        // scooter is constant in training, so no tree ever splits on it
        assert_eq!(report.contributions[4].feature, "vehicle_type_Scooter");
        assert_eq!(report.contributions[4].minutes, 0.0);
    }

    #[test]
    fn test_directions_match_signal() {
        let explainer = Explainer::new(synthetic_model()).unwrap();
        let long_busy = explainer.explain(&input(9.5, 2, 1)).unwrap();
        assert!(long_busy.contributions[0].minutes > 5.0);
        assert!(long_busy.contributions[2].minutes > 1.0);
        let short_quiet = explainer.explain(&input(0.0, 0, 0)).unwrap();
        assert!(short_quiet.contributions[0].minutes < -5.0);
    }

    #[test]
    fn test_format_hides_small_contributions() {
        let report = AttributionReport {
            base_value: 30.04,
            prediction: 41.0,
            contributions: vec![
                Contribution { feature: "distance_km".into(), minutes: 12.0 },
                Contribution { feature: "weather_code".into(), minutes: 0.05 },
                Contribution { feature: "exp_code".into(), minutes: -1.04 },
            ],
        };
        let text = format_report(&report, DISPLAY_THRESHOLD_MINS);
        assert_eq!(
            text,
            "Base Delivery Time (Avg): 30.0 mins\nImpact of factors:\n- distance_km: +12.0 mins\n- exp_code: -1.0 mins\n"
        );
    }
}
