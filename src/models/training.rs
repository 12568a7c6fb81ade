//! Training data structures
//!
//! The feature matrix the KG extractor materializes, the categorical
//! encoders that make it numeric, and the metric bundles the trainer emits.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap};

/// Model family the target property calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Classification,
    Regression,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Regression => "regression",
        }
    }
}

/// Encoder kind; one-hot is reserved for callers that expand columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    Label,
    Onehot,
}

/// Deterministic label encoder.
///
/// Values are assigned codes in first-occurrence order, so re-encoding the
/// same column always produces the same mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    #[serde(rename = "type")]
    pub kind: EncoderKind,
    /// Insertion-ordered unique values; a value's code is its index
    pub unique_values: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Encoder {
    pub fn new_label() -> Self {
        Self { kind: EncoderKind::Label, unique_values: Vec::new(), index: HashMap::new() }
    }

    /// Build an encoder over a column in one pass
    pub fn fit(values: &[String]) -> Self {
        let mut enc = Self::new_label();
        for v in values {
            enc.encode(v);
        }
        enc
    }

    /// Encode a value, registering it on first sight
    pub fn encode(&mut self, value: &str) -> f64 {
        if let Some(&i) = self.index.get(value) {
            return i as f64;
        }
        let i = self.unique_values.len();
        self.unique_values.push(value.to_string());
        self.index.insert(value.to_string(), i);
        i as f64
    }

    /// Encode without registering; `None` for unseen values
    pub fn transform(&self, value: &str) -> Option<f64> {
        self.index.get(value).map(|&i| i as f64)
    }

    /// Reverse mapping from code back to label
    pub fn decode(&self, code: f64) -> Option<&str> {
        let i = code.round();
        if i < 0.0 {
            return None;
        }
        self.unique_values.get(i as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.unique_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique_values.is_empty()
    }

    /// Rebuild the lookup index after deserialization
    pub fn rebuild_index(&mut self) {
        self.index = self
            .unique_values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
    }
}

/// Target column of a training dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "values")]
pub enum TargetValues {
    /// Regression target, parsed numeric
    Numeric(Vec<f64>),
    /// Classification target, kept as string labels
    Labels(Vec<String>),
}

impl TargetValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// ML-ready tabular dataset materialized from the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDataset {
    /// N x F feature matrix, fully numeric after encoding
    pub features: Vec<Vec<f64>>,
    pub target: TargetValues,
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub entity_ids: Vec<String>,
    pub model_type: ModelType,
    /// Encoders for categorical feature columns, keyed by property label
    pub feature_encoders: BTreeMap<String, Encoder>,
    pub target_encoder: Option<Encoder>,
    pub sample_count: usize,
    pub feature_count: usize,
    /// Non-fatal notes, e.g. numeric parse failures coerced to 0.0
    pub warnings: Vec<String>,
}

/// Per-class precision/recall/F1
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Classification evaluation bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub per_class: BTreeMap<String, ClassMetrics>,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub total_samples: usize,
    pub correct_predictions: usize,
    /// confusion_matrix[actual][predicted] = count
    pub confusion_matrix: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Regression evaluation bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub total_samples: usize,
}

/// Metrics for whichever model family was trained
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum EvaluationMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl EvaluationMetrics {
    pub fn as_classification(&self) -> Option<&ClassificationMetrics> {
        match self {
            Self::Classification(m) => Some(m),
            Self::Regression(_) => None,
        }
    }

    pub fn as_regression(&self) -> Option<&RegressionMetrics> {
        match self {
            Self::Regression(m) => Some(m),
            Self::Classification(_) => None,
        }
    }
}

/// Trained model registry row (`classifier_models` table)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub id: String,
    pub name: String,
    pub ontology_id: i64,
    pub target_class: String,
    pub algorithm: String,
    pub hyperparameters: String,
    pub feature_columns: String,
    pub class_labels: Option<String>,
    pub train_accuracy: Option<f64>,
    pub validate_accuracy: Option<f64>,
    pub precision_score: Option<f64>,
    pub recall_score: Option<f64>,
    pub f1_score: Option<f64>,
    pub confusion_matrix: Option<String>,
    pub model_artifact_path: String,
    pub model_size_bytes: i64,
    pub training_rows: i64,
    pub validation_rows: i64,
    pub feature_importance: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Per-target outcome reported by the auto-trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModelInfo {
    pub model_id: String,
    pub target_property: String,
    pub model_type: ModelType,
    pub algorithm: String,
    pub validate_score: f64,
    pub training_rows: usize,
    pub feature_count: usize,
}

/// Per-target failure reported by the auto-trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedModelInfo {
    pub target_property: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_first_occurrence_order() {
        let values: Vec<String> =
            ["b", "a", "c", "a", "b"].iter().map(|s| s.to_string()).collect();
        let enc = Encoder::fit(&values);
        assert_eq!(enc.unique_values, vec!["b", "a", "c"]);
        assert_eq!(enc.transform("b"), Some(0.0));
        assert_eq!(enc.transform("a"), Some(1.0));
        assert_eq!(enc.transform("c"), Some(2.0));
        assert_eq!(enc.transform("z"), None);
        assert_eq!(enc.decode(1.0), Some("a"));
        assert_eq!(enc.decode(7.0), None);
    }

    #[test]
    fn test_encoder_index_rebuild() {
        let values: Vec<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let enc = Encoder::fit(&values);
        let json = serde_json::to_string(&enc).unwrap();
        let mut back: Encoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transform("y"), None); // index not serialized
        back.rebuild_index();
        assert_eq!(back.transform("y"), Some(1.0));
        assert_eq!(back.decode(0.0), Some("x"));
    }
}
