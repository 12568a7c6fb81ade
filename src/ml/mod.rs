//! Model training engine
//!
//! Decision trees, bagged forests, the train/validate pipeline and the
//! auto-trainer that drives all of it from ontology analysis. All of this
//! is pure synchronous computation; only the auto-trainer touches I/O.

pub mod auto_trainer;
pub mod forest;
pub mod trainer;
pub mod tree;

pub use auto_trainer::{AutoTrainOptions, AutoTrainSummary, AutoTrainer};
pub use forest::RandomForest;
pub use trainer::{Trainer, TrainerConfig, TrainingResult};
pub use tree::DecisionTree;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PlatformError, Result};
use crate::models::ModelType;

/// Tree growth limits shared by single trees and forest members
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self { max_depth: 10, min_samples_split: 2, min_samples_leaf: 1 }
    }
}

/// A trained model of either family, as stored in and loaded from artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum TrainedModel {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl TrainedModel {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::DecisionTree(_) => "decision_tree",
            Self::RandomForest(_) => "random_forest",
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Self::DecisionTree(t) => t.model_type,
            Self::RandomForest(f) => f.model_type,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            Self::DecisionTree(t) => &t.feature_names,
            Self::RandomForest(f) => &f.feature_names,
        }
    }

    /// Classification: predicted label and confidence
    pub fn predict(&self, x: &[f64]) -> Result<(String, f64)> {
        match self {
            Self::DecisionTree(t) => t.predict(x),
            Self::RandomForest(f) => f.predict(x),
        }
    }

    /// Classification: probability per class, summing to 1
    pub fn predict_proba(&self, x: &[f64]) -> Result<BTreeMap<String, f64>> {
        match self {
            Self::DecisionTree(t) => t.predict_proba(x),
            Self::RandomForest(f) => f.predict_proba(x),
        }
    }

    /// Regression: point prediction
    pub fn predict_value(&self, x: &[f64]) -> Result<f64> {
        match self {
            Self::DecisionTree(t) => t.predict_value(x),
            Self::RandomForest(f) => f.predict_value(x),
        }
    }

    /// Regression: (prediction, lower, upper)
    pub fn predict_interval(&self, x: &[f64]) -> Result<(f64, f64, f64)> {
        match self {
            Self::DecisionTree(t) => t.predict_interval(x),
            Self::RandomForest(f) => f.predict_interval(x),
        }
    }

    /// Importance per feature, normalized to sum to 1 when any splits exist
    pub fn feature_importance(&self) -> Vec<f64> {
        match self {
            Self::DecisionTree(t) => t.feature_importance(),
            Self::RandomForest(f) => f.feature_importance(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        match &model {
            Self::DecisionTree(t) => t.validate()?,
            Self::RandomForest(f) => f.validate()?,
        }
        Ok(model)
    }

    /// Read a persisted artifact back from disk and validate it
    pub fn load_artifact(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PlatformError::Backend(format!("cannot read model artifact {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

/// Shape checks shared by both fit paths
pub(crate) fn check_training_shapes(
    x: &[Vec<f64>],
    y_len: usize,
    feature_names: &[String],
) -> Result<()> {
    if x.is_empty() {
        return Err(PlatformError::Training("training data is empty".to_string()));
    }
    if x.len() != y_len {
        return Err(PlatformError::Validation(format!(
            "feature matrix has {} rows but target has {}",
            x.len(),
            y_len
        )));
    }
    let width = feature_names.len();
    if width == 0 {
        return Err(PlatformError::Validation("feature_names is empty".to_string()));
    }
    if let Some(row) = x.iter().find(|row| row.len() != width) {
        return Err(PlatformError::Validation(format!(
            "feature row has {} values, expected {}",
            row.len(),
            width
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trained_model_json_roundtrip_with_tag() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let y: Vec<String> =
            ["a", "a", "b", "b"].iter().map(|s| s.to_string()).collect();
        let names = vec!["f".to_string()];

        let mut tree = DecisionTree::classifier(TreeParams::default());
        tree.fit_classification(&x, &y, &names).unwrap();
        let model = TrainedModel::DecisionTree(tree);

        let json = model.to_json().unwrap();
        assert!(json.contains("\"algorithm\":\"decision_tree\""));

        let restored = TrainedModel::from_json(&json).unwrap();
        assert_eq!(restored.algorithm(), "decision_tree");
        assert_eq!(restored.predict(&[1.5]).unwrap(), model.predict(&[1.5]).unwrap());
    }

    #[test]
    fn test_from_json_rejects_invalid_model() {
        // A classification tree without classes fails validation on load
        let json = r#"{"algorithm":"random_forest","trees":[],"tree_features":[],
            "num_trees":0,"max_depth":10,"min_samples_split":2,"min_samples_leaf":1,
            "max_features":0,"num_features":0,"bootstrap":true,"oob_score":0.0,
            "feature_names":[],"classes":[],"model_type":"classification","random_seed":42}"#;
        assert!(TrainedModel::from_json(json).is_err());
    }

    #[test]
    fn test_check_training_shapes() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(check_training_shapes(&[vec![1.0, 2.0]], 1, &names).is_ok());
        assert!(check_training_shapes(&[], 0, &names).is_err());
        assert!(check_training_shapes(&[vec![1.0]], 1, &names).is_err());
        assert!(check_training_shapes(&[vec![1.0, 2.0]], 2, &names).is_err());
    }
}
