//! Posture classification
//!
//! The classifier itself is an opaque, pre-trained artifact: anything that
//! maps an 18-wide feature vector to a posture code satisfies
//! [`PostureClassifier`]. This module extracts feature vectors from
//! observations, applies the configured policy for rows with missing
//! features, and provides the bundled nearest-centroid artifact format.

use crate::error::PostureError;
use crate::posture::PostureCode;
use crate::types::{ClassifiedObservation, FeatureVector, Observation, FEATURE_COLUMNS, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Model kind tag accepted in artifact files
pub const NEAREST_CENTROID_MODEL: &str = "nearest_centroid";

/// Trait for posture classifiers.
///
/// Implementations must be stateless per call; one instance is shared
/// read-only for the life of the process.
pub trait PostureClassifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> PostureCode;
}

impl<F> PostureClassifier for F
where
    F: Fn(&FeatureVector) -> PostureCode + Send + Sync,
{
    fn predict(&self, features: &FeatureVector) -> PostureCode {
        self(features)
    }
}

/// What to do with a row that lacks one of the classifier inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMissingPolicy {
    /// Drop the row from the classified table
    Skip,
    /// Keep the row, labelled with the `Unavailable` placeholder code
    #[default]
    AbortRow,
    /// Fail the whole batch
    AbortBatch,
}

/// Row that could not be classified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFeature {
    pub source_row: usize,
    pub column: &'static str,
}

/// Output of the classifier adapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedTable {
    pub rows: Vec<ClassifiedObservation>,
    /// Rows dropped under [`FeatureMissingPolicy::Skip`]
    pub skipped: Vec<MissingFeature>,
    /// Rows kept as `Unavailable` under [`FeatureMissingPolicy::AbortRow`]
    pub unavailable: Vec<MissingFeature>,
}

/// Applies a classifier to every observation of a table
pub struct ClassifierAdapter<'a> {
    classifier: &'a dyn PostureClassifier,
    policy: FeatureMissingPolicy,
}

impl<'a> ClassifierAdapter<'a> {
    pub fn new(classifier: &'a dyn PostureClassifier, policy: FeatureMissingPolicy) -> Self {
        Self { classifier, policy }
    }

    /// Assign a posture code to each observation, in input order
    pub fn classify(&self, observations: &[Observation]) -> Result<ClassifiedTable, PostureError> {
        let mut table = ClassifiedTable {
            rows: Vec::with_capacity(observations.len()),
            ..Default::default()
        };

        for observation in observations {
            let code = match extract_features(observation) {
                Ok(features) => self.classifier.predict(&features),
                Err(missing) => match self.policy {
                    FeatureMissingPolicy::AbortBatch => {
                        return Err(PostureError::FeatureMissing {
                            row: missing.source_row,
                            column: missing.column,
                        });
                    }
                    FeatureMissingPolicy::Skip => {
                        debug!(
                            row = missing.source_row,
                            column = missing.column,
                            "Skipping row with missing feature"
                        );
                        table.skipped.push(missing);
                        continue;
                    }
                    FeatureMissingPolicy::AbortRow => {
                        warn!(
                            row = missing.source_row,
                            column = missing.column,
                            "Row missing feature, labelled unavailable"
                        );
                        table.unavailable.push(missing);
                        PostureCode::unavailable()
                    }
                },
            };

            table.rows.push(ClassifiedObservation {
                observation: observation.clone(),
                code,
            });
        }

        Ok(table)
    }
}

/// Collect the classifier inputs of one observation in model order.
///
/// Fails with the first missing column.
pub fn extract_features(observation: &Observation) -> Result<FeatureVector, MissingFeature> {
    let mut values = [0.0; FEATURE_COUNT];
    for ((slot, value), column) in values
        .iter_mut()
        .zip(observation.features.iter())
        .zip(FEATURE_COLUMNS)
    {
        *slot = value.ok_or(MissingFeature {
            source_row: observation.source_row,
            column,
        })?;
    }
    Ok(FeatureVector(values))
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    model: String,
    centroids: Vec<CentroidSpec>,
    #[serde(default)]
    scale: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct CentroidSpec {
    code: String,
    features: Vec<f64>,
}

/// Nearest-centroid posture model.
///
/// Each posture is represented by one or more reference feature vectors;
/// a sample gets the code of the closest reference (Euclidean distance over
/// features divided by `scale`). Equal distances resolve to the earlier
/// centroid.
#[derive(Debug, Clone)]
pub struct NearestCentroidModel {
    centroids: Vec<(PostureCode, [f64; FEATURE_COUNT])>,
    scale: [f64; FEATURE_COUNT],
}

impl NearestCentroidModel {
    pub fn new(centroids: Vec<(PostureCode, [f64; FEATURE_COUNT])>) -> Result<Self, PostureError> {
        if centroids.is_empty() {
            return Err(PostureError::Model("model has no centroids".to_string()));
        }
        Ok(Self {
            centroids,
            scale: [1.0; FEATURE_COUNT],
        })
    }

    /// Divide each feature by a positive scale before measuring distance
    pub fn with_scale(mut self, scale: [f64; FEATURE_COUNT]) -> Result<Self, PostureError> {
        if let Some(bad) = scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(PostureError::Model(format!(
                "scale for {} must be positive",
                FEATURE_COLUMNS[bad]
            )));
        }
        self.scale = scale;
        Ok(self)
    }

    /// Parse a model artifact from JSON
    pub fn from_json(json: &str) -> Result<Self, PostureError> {
        let file: ModelFile = serde_json::from_str(json)?;
        if file.model != NEAREST_CENTROID_MODEL {
            return Err(PostureError::Model(format!(
                "unsupported model kind {:?}",
                file.model
            )));
        }

        let centroids = file
            .centroids
            .into_iter()
            .map(|c| Ok((PostureCode::new(c.code), to_array(&c.features, "centroid")?)))
            .collect::<Result<Vec<_>, PostureError>>()?;

        let model = Self::new(centroids)?;
        match file.scale {
            Some(scale) => model.with_scale(to_array(&scale, "scale")?),
            None => Ok(model),
        }
    }

    /// Load a model artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PostureError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let model = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            centroids = model.centroids.len(),
            "Posture model loaded"
        );
        Ok(model)
    }

    pub fn centroid_count(&self) -> usize {
        self.centroids.len()
    }

    fn distance(&self, a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
        a.iter()
            .zip(b.iter())
            .zip(self.scale.iter())
            .map(|((x, y), s)| ((x - y) / s).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl PostureClassifier for NearestCentroidModel {
    fn predict(&self, features: &FeatureVector) -> PostureCode {
        let mut best = &self.centroids[0];
        let mut best_distance = self.distance(&features.0, &best.1);
        for candidate in &self.centroids[1..] {
            let d = self.distance(&features.0, &candidate.1);
            if d < best_distance {
                best = candidate;
                best_distance = d;
            }
        }
        best.0.clone()
    }
}

/// Load a classifier artifact for shared use
pub fn load_classifier(path: impl AsRef<Path>) -> Result<Arc<dyn PostureClassifier>, PostureError> {
    Ok(Arc::new(NearestCentroidModel::load(path)?))
}

fn to_array(values: &[f64], what: &str) -> Result<[f64; FEATURE_COUNT], PostureError> {
    <[f64; FEATURE_COUNT]>::try_from(values).map_err(|_| {
        PostureError::Model(format!(
            "{} has {} features, expected {}",
            what,
            values.len(),
            FEATURE_COUNT
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn observation(source_row: usize, features: [Option<f64>; FEATURE_COUNT]) -> Observation {
        Observation {
            source_row,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, source_row as u32).unwrap(),
            features,
            mpu_temp: None,
            humidity: None,
            dht_temp: None,
        }
    }

    fn full(value: f64) -> [Option<f64>; FEATURE_COUNT] {
        [Some(value); FEATURE_COUNT]
    }

    fn gap_at(index: usize) -> [Option<f64>; FEATURE_COUNT] {
        let mut features = full(1.0);
        features[index] = None;
        features
    }

    fn threshold(features: &FeatureVector) -> PostureCode {
        if features.0[0] > 5.0 {
            PostureCode::new("B")
        } else {
            PostureCode::new("A")
        }
    }

    #[test]
    fn test_closure_classifier() {
        let observations = vec![observation(0, full(1.0)), observation(1, full(9.0))];
        let adapter = ClassifierAdapter::new(&threshold, FeatureMissingPolicy::AbortBatch);

        let table = adapter.classify(&observations).unwrap();

        let codes: Vec<&str> = table.rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);
        assert!(table.skipped.is_empty());
        assert!(table.unavailable.is_empty());
    }

    #[test]
    fn test_extract_features_names_first_gap() {
        let err = extract_features(&observation(7, gap_at(12))).unwrap_err();
        assert_eq!(
            err,
            MissingFeature {
                source_row: 7,
                column: "AccelX"
            }
        );
    }

    #[test]
    fn test_policy_skip() {
        let observations = vec![observation(0, full(1.0)), observation(1, gap_at(0))];
        let adapter = ClassifierAdapter::new(&threshold, FeatureMissingPolicy::Skip);

        let table = adapter.classify(&observations).unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.skipped.len(), 1);
        assert_eq!(table.skipped[0].column, "FSR0");
    }

    #[test]
    fn test_policy_abort_row() {
        let observations = vec![observation(0, gap_at(17)), observation(1, full(1.0))];
        let adapter = ClassifierAdapter::new(&threshold, FeatureMissingPolicy::AbortRow);

        let table = adapter.classify(&observations).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].code, PostureCode::unavailable());
        assert_eq!(table.rows[1].code.as_str(), "A");
        assert_eq!(table.unavailable[0].column, "GyroZ");
    }

    #[test]
    fn test_policy_abort_batch() {
        let observations = vec![observation(0, full(1.0)), observation(3, gap_at(5))];
        let adapter = ClassifierAdapter::new(&threshold, FeatureMissingPolicy::AbortBatch);

        let err = adapter.classify(&observations).unwrap_err();

        assert!(matches!(
            err,
            PostureError::FeatureMissing {
                row: 3,
                column: "FSR5"
            }
        ));
    }

    #[test]
    fn test_nearest_centroid_prediction() {
        let model = NearestCentroidModel::new(vec![
            (PostureCode::new("A"), [0.0; FEATURE_COUNT]),
            (PostureCode::new("B"), [10.0; FEATURE_COUNT]),
        ])
        .unwrap();

        assert_eq!(model.predict(&FeatureVector([1.0; FEATURE_COUNT])).as_str(), "A");
        assert_eq!(model.predict(&FeatureVector([8.0; FEATURE_COUNT])).as_str(), "B");
        // equidistant goes to the earlier centroid
        assert_eq!(model.predict(&FeatureVector([5.0; FEATURE_COUNT])).as_str(), "A");
    }

    #[test]
    fn test_scale_changes_distance() {
        let mut far_fsr0 = [0.0; FEATURE_COUNT];
        far_fsr0[0] = 100.0;
        let mut far_accel = [0.0; FEATURE_COUNT];
        far_accel[12] = 1.0;

        let mut sample = [0.0; FEATURE_COUNT];
        sample[0] = 60.0;
        sample[12] = 1.0;

        let unscaled = NearestCentroidModel::new(vec![
            (PostureCode::new("A"), far_fsr0),
            (PostureCode::new("C"), far_accel),
        ])
        .unwrap();
        assert_eq!(unscaled.predict(&FeatureVector(sample)).as_str(), "A");

        let mut scale = [1.0; FEATURE_COUNT];
        scale[0] = 1000.0;
        let scaled = unscaled.with_scale(scale).unwrap();
        assert_eq!(scaled.predict(&FeatureVector(sample)).as_str(), "C");
    }

    #[test]
    fn test_model_from_json() {
        let json = format!(
            r#"{{"model": "nearest_centroid", "centroids": [
                {{"code": "A", "features": {a}}},
                {{"code": "K", "features": {k}}}
            ]}}"#,
            a = serde_json::to_string(&[0.0; FEATURE_COUNT]).unwrap(),
            k = serde_json::to_string(&[50.0; FEATURE_COUNT]).unwrap(),
        );

        let model = NearestCentroidModel::from_json(&json).unwrap();

        assert_eq!(model.centroid_count(), 2);
        assert_eq!(model.predict(&FeatureVector([45.0; FEATURE_COUNT])).as_str(), "K");
    }

    #[test]
    fn test_model_rejects_bad_artifacts() {
        let wrong_kind = r#"{"model": "random_forest", "centroids": []}"#;
        assert!(matches!(
            NearestCentroidModel::from_json(wrong_kind),
            Err(PostureError::Model(_))
        ));

        let empty = r#"{"model": "nearest_centroid", "centroids": []}"#;
        assert!(matches!(
            NearestCentroidModel::from_json(empty),
            Err(PostureError::Model(_))
        ));

        let short = r#"{"model": "nearest_centroid", "centroids": [{"code": "A", "features": [1, 2, 3]}]}"#;
        let err = NearestCentroidModel::from_json(short).unwrap_err();
        assert!(err.to_string().contains("expected 18"));

        let model = NearestCentroidModel::new(vec![(PostureCode::new("A"), [0.0; FEATURE_COUNT])])
            .unwrap();
        assert!(model.with_scale([0.0; FEATURE_COUNT]).is_err());

        assert!(matches!(
            NearestCentroidModel::from_json("not valid json"),
            Err(PostureError::Json(_))
        ));
    }
}
