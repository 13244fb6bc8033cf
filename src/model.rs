use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::forest::RandomForest;
use crate::types::{EncodedFeatureVector, FEATURE_NAMES, N_FEATURES};

/// On-disk form of a trained estimator: the forest plus the column order it expects.
#[derive(Serialize, Deserialize)]
struct ModelArtifact {
    feature_names: Vec<String>,
    forest: RandomForest,
}

/// Trained duration estimator. Immutable once built or loaded.
#[derive(Debug, Clone)]
pub struct DurationModel {
    forest: RandomForest,
}

impl DurationModel {
    pub fn new(forest: RandomForest) -> CoreResult<Self> {
        if forest.n_features() != N_FEATURES {
            return Err(CoreError::IncompatibleArtifact(format!(
                "forest expects {} features, encoder produces {}",
                forest.n_features(),
                N_FEATURES
            )));
        }
        forest.validate().map_err(CoreError::IncompatibleArtifact)?;
        Ok(Self { forest })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open model at {}", path.display()))?;
        let artifact: ModelArtifact = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("failed to decode model artifact {}", path.display()))?;

        if artifact.feature_names != FEATURE_NAMES {
            bail!(CoreError::IncompatibleArtifact(format!(
                "feature order {:?} does not match {:?}",
                artifact.feature_names, FEATURE_NAMES
            )));
        }
        let model = Self::new(artifact.forest)?;
        tracing::info!(
            "loaded model from {}; {} trees over {:?}",
            path.display(),
            model.forest.trees().len(),
            FEATURE_NAMES
        );
        Ok(model)
    }

    /// Write the artifact next to `path` and rename it into place, so a
    /// concurrent reader sees either the old model or the new one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let artifact = ModelArtifact {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            forest: self.forest.clone(),
        };
        crate::persist::write_atomic(path, |file| {
            let mut w = BufWriter::new(file);
            bincode::serialize_into(&mut w, &artifact)?;
            w.flush()?;
            Ok(())
        })
        .with_context(|| format!("failed to save model to {}", path.display()))
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Point estimate in minutes.
    pub fn predict(&self, x: &EncodedFeatureVector) -> CoreResult<f64> {
        if !x.distance_km.is_finite() {
            return Err(CoreError::NonFiniteInput(format!("distance_km = {}", x.distance_km)));
        }
        Ok(self.forest.predict(&x.to_array()))
    }
}
