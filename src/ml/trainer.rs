//! Train/validate pipeline
//!
//! Splits a dataset, fits the chosen model family, and scores both
//! partitions. Classification reports accuracy and per-class
//! precision/recall/F1 with macro averages; regression reports MAE, RMSE
//! and R².

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::forest::{ForestParams, RandomForest};
use super::tree::DecisionTree;
use super::{TrainedModel, TreeParams, check_training_shapes};
use crate::error::Result;
use crate::models::{
    ClassMetrics, ClassificationMetrics, EvaluationMetrics, ModelType, RegressionMetrics,
};

/// Which model family to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    DecisionTree,
    RandomForest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub algorithm: Algorithm,
    pub tree: TreeParams,
    pub num_trees: usize,
    /// Fraction of samples used for training, in (0, 1]
    pub train_test_split: f64,
    pub shuffle: bool,
    /// Per-class proportional split; classification only
    pub stratify: bool,
    pub random_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RandomForest,
            tree: TreeParams::default(),
            num_trees: 100,
            train_test_split: 0.8,
            shuffle: true,
            stratify: true,
            random_seed: 42,
        }
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    pub model: TrainedModel,
    pub model_type: ModelType,
    pub training_rows: usize,
    pub validation_rows: usize,
    pub train_metrics: EvaluationMetrics,
    pub validate_metrics: EvaluationMetrics,
    /// Importance per feature name
    pub feature_importance: BTreeMap<String, f64>,
    pub training_duration_ms: u64,
    pub model_info: serde_json::Value,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn train_classification(
        &self,
        x: &[Vec<f64>],
        y: &[String],
        feature_names: &[String],
    ) -> Result<TrainingResult> {
        check_training_shapes(x, y.len(), feature_names)?;
        let started = Instant::now();

        let (train_idx, validate_idx) = self.split_classification(x.len(), y)?;

        let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let train_y: Vec<String> = train_idx.iter().map(|&i| y[i].clone()).collect();

        let model = match self.config.algorithm {
            Algorithm::DecisionTree => {
                let mut tree = DecisionTree::classifier(self.config.tree);
                tree.fit_classification(&train_x, &train_y, feature_names)?;
                TrainedModel::DecisionTree(tree)
            },
            Algorithm::RandomForest => {
                let mut forest = RandomForest::classifier(ForestParams {
                    num_trees: self.config.num_trees,
                    tree: self.config.tree,
                    random_seed: self.config.random_seed,
                });
                forest.fit_classification(&train_x, &train_y, feature_names)?;
                TrainedModel::RandomForest(forest)
            },
        };

        let train_metrics = self.score_classification(&model, x, y, &train_idx)?;
        let validate_metrics = self.score_classification(&model, x, y, &validate_idx)?;
        let feature_importance = named_importance(&model, feature_names);

        Ok(TrainingResult {
            model_info: model_info(&model, &self.config),
            model_type: ModelType::Classification,
            training_rows: train_idx.len(),
            validation_rows: validate_idx.len(),
            train_metrics: EvaluationMetrics::Classification(train_metrics),
            validate_metrics: EvaluationMetrics::Classification(validate_metrics),
            feature_importance,
            training_duration_ms: started.elapsed().as_millis() as u64,
            model,
        })
    }

    pub fn train_regression(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        feature_names: &[String],
    ) -> Result<TrainingResult> {
        check_training_shapes(x, y.len(), feature_names)?;
        let started = Instant::now();

        // Stratification is ignored for regression
        let (train_idx, validate_idx) = self.split_plain(x.len())?;

        let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let train_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

        let model = match self.config.algorithm {
            Algorithm::DecisionTree => {
                let mut tree = DecisionTree::regressor(self.config.tree);
                tree.fit_regression(&train_x, &train_y, feature_names)?;
                TrainedModel::DecisionTree(tree)
            },
            Algorithm::RandomForest => {
                let mut forest = RandomForest::regressor(ForestParams {
                    num_trees: self.config.num_trees,
                    tree: self.config.tree,
                    random_seed: self.config.random_seed,
                });
                forest.fit_regression(&train_x, &train_y, feature_names)?;
                TrainedModel::RandomForest(forest)
            },
        };

        let train_metrics = self.score_regression(&model, x, y, &train_idx)?;
        let validate_metrics = self.score_regression(&model, x, y, &validate_idx)?;
        let feature_importance = named_importance(&model, feature_names);

        Ok(TrainingResult {
            model_info: model_info(&model, &self.config),
            model_type: ModelType::Regression,
            training_rows: train_idx.len(),
            validation_rows: validate_idx.len(),
            train_metrics: EvaluationMetrics::Regression(train_metrics),
            validate_metrics: EvaluationMetrics::Regression(validate_metrics),
            feature_importance,
            training_duration_ms: started.elapsed().as_millis() as u64,
            model,
        })
    }

    // ------------------------------------------------------------------
    // Splitting
    // ------------------------------------------------------------------

    fn split_plain(&self, n: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.random_seed);
            indices.shuffle(&mut rng);
        }

        let cut = ((self.config.train_test_split * n as f64).round() as usize).min(n);
        let (train, validate) = indices.split_at(cut);
        Ok(balance(train.to_vec(), validate.to_vec(), n))
    }

    /// Per-class proportional split: take ⌈p·n_c⌉ of each class into
    /// training, interleaved back together
    fn split_classification(&self, n: usize, y: &[String]) -> Result<(Vec<usize>, Vec<usize>)> {
        if !self.config.stratify {
            return self.split_plain(n);
        }

        let mut per_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, label) in y.iter().enumerate() {
            per_class.entry(label.as_str()).or_default().push(i);
        }

        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        let mut train = Vec::new();
        let mut validate = Vec::new();
        for indices in per_class.values_mut() {
            if self.config.shuffle {
                indices.shuffle(&mut rng);
            }
            let take = ((self.config.train_test_split * indices.len() as f64).ceil() as usize)
                .min(indices.len());
            train.extend_from_slice(&indices[..take]);
            validate.extend_from_slice(&indices[take..]);
        }

        Ok(balance(train, validate, n))
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    fn score_classification(
        &self,
        model: &TrainedModel,
        x: &[Vec<f64>],
        y: &[String],
        indices: &[usize],
    ) -> Result<ClassificationMetrics> {
        let mut actual = Vec::with_capacity(indices.len());
        let mut predicted = Vec::with_capacity(indices.len());
        for &i in indices {
            actual.push(y[i].clone());
            predicted.push(model.predict(&x[i])?.0);
        }
        Ok(classification_metrics(&actual, &predicted))
    }

    fn score_regression(
        &self,
        model: &TrainedModel,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
    ) -> Result<RegressionMetrics> {
        let mut actual = Vec::with_capacity(indices.len());
        let mut predicted = Vec::with_capacity(indices.len());
        for &i in indices {
            actual.push(y[i]);
            predicted.push(model.predict_value(&x[i])?);
        }
        Ok(regression_metrics(&actual, &predicted))
    }
}

/// Both partitions must be non-empty whenever two samples exist
fn balance(mut train: Vec<usize>, mut validate: Vec<usize>, n: usize) -> (Vec<usize>, Vec<usize>) {
    if n >= 2 {
        if validate.is_empty()
            && let Some(moved) = train.pop()
        {
            validate.push(moved);
        }
        if train.is_empty()
            && let Some(moved) = validate.pop()
        {
            train.push(moved);
        }
    }
    (train, validate)
}

/// Accuracy, per-class precision/recall/F1, macro averages and the
/// confusion matrix. Undefined ratios (empty denominators) score 0.
pub fn classification_metrics(actual: &[String], predicted: &[String]) -> ClassificationMetrics {
    let total = actual.len();
    let mut correct = 0usize;
    let mut confusion: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for (a, p) in actual.iter().zip(predicted.iter()) {
        if a == p {
            correct += 1;
        }
        *confusion
            .entry(a.clone())
            .or_default()
            .entry(p.clone())
            .or_insert(0) += 1;
    }

    // Classes present in the true labels drive the macro averages
    let mut classes: Vec<&String> = Vec::new();
    for a in actual {
        if !classes.contains(&a) {
            classes.push(a);
        }
    }

    let mut per_class = BTreeMap::new();
    let mut macro_precision = 0.0;
    let mut macro_recall = 0.0;
    let mut macro_f1 = 0.0;

    for class in &classes {
        let tp = confusion
            .get(*class)
            .and_then(|row| row.get(*class))
            .copied()
            .unwrap_or(0) as f64;
        let fn_ = confusion
            .get(*class)
            .map(|row| row.values().sum::<usize>())
            .unwrap_or(0) as f64
            - tp;
        let fp = confusion
            .values()
            .filter_map(|row| row.get(*class))
            .sum::<usize>() as f64
            - tp;

        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        macro_precision += precision;
        macro_recall += recall;
        macro_f1 += f1;
        per_class.insert((*class).clone(), ClassMetrics { precision, recall, f1 });
    }

    let k = classes.len().max(1) as f64;
    ClassificationMetrics {
        accuracy: if total > 0 { correct as f64 / total as f64 } else { 0.0 },
        per_class,
        macro_precision: macro_precision / k,
        macro_recall: macro_recall / k,
        macro_f1: macro_f1 / k,
        total_samples: total,
        correct_predictions: correct,
        confusion_matrix: confusion,
    }
}

/// MAE, RMSE and R²; R² is 0 when the target has no variance
pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> RegressionMetrics {
    let n = actual.len();
    if n == 0 {
        return RegressionMetrics { mae: 0.0, rmse: 0.0, r2: 0.0, total_samples: 0 };
    }

    let mean = actual.iter().sum::<f64>() / n as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut ss_tot = 0.0;
    for (a, p) in actual.iter().zip(predicted.iter()) {
        abs_sum += (a - p).abs();
        sq_sum += (a - p).powi(2);
        ss_tot += (a - mean).powi(2);
    }

    RegressionMetrics {
        mae: abs_sum / n as f64,
        rmse: (sq_sum / n as f64).sqrt(),
        r2: if ss_tot > 0.0 { 1.0 - sq_sum / ss_tot } else { 0.0 },
        total_samples: n,
    }
}

fn named_importance(model: &TrainedModel, feature_names: &[String]) -> BTreeMap<String, f64> {
    feature_names
        .iter()
        .cloned()
        .zip(model.feature_importance())
        .collect()
}

fn model_info(model: &TrainedModel, config: &TrainerConfig) -> serde_json::Value {
    serde_json::json!({
        "algorithm": model.algorithm(),
        "max_depth": config.tree.max_depth,
        "min_samples_split": config.tree.min_samples_split,
        "min_samples_leaf": config.tree.min_samples_leaf,
        "num_trees": if matches!(model, TrainedModel::RandomForest(_)) {
            Some(config.num_trees)
        } else {
            None
        },
        "train_test_split": config.train_test_split,
        "shuffle": config.shuffle,
        "stratify": config.stratify,
        "random_seed": config.random_seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(counts: &[(&str, usize)]) -> Vec<String> {
        let mut y = Vec::new();
        for (label, count) in counts {
            for _ in 0..*count {
                y.push(label.to_string());
            }
        }
        y
    }

    fn separable_dataset(per_class: usize) -> (Vec<Vec<f64>>, Vec<String>) {
        let mut x = Vec::new();
        for i in 0..per_class {
            x.push(vec![i as f64 * 0.1, 1.0]);
        }
        for i in 0..per_class {
            x.push(vec![10.0 + i as f64 * 0.1, 1.0]);
        }
        let y = labels(&[("low", per_class), ("high", per_class)]);
        (x, y)
    }

    #[test]
    fn test_split_sizes_sum_to_n() {
        let trainer = Trainer::new(TrainerConfig::default());
        let (train, validate) = trainer.split_plain(10).unwrap();
        assert_eq!(train.len() + validate.len(), 10);
        assert!(!train.is_empty());
        assert!(!validate.is_empty());
    }

    #[test]
    fn test_split_both_sides_nonempty_for_two_samples() {
        let trainer = Trainer::new(TrainerConfig {
            train_test_split: 1.0,
            ..TrainerConfig::default()
        });
        let (train, validate) = trainer.split_plain(2).unwrap();
        assert_eq!(train.len(), 1);
        assert_eq!(validate.len(), 1);
    }

    #[test]
    fn test_stratified_split_preserves_ratios() {
        let trainer = Trainer::new(TrainerConfig::default());
        let y = labels(&[("a", 10), ("b", 10)]);
        let (train, validate) = trainer.split_classification(20, &y).unwrap();
        assert_eq!(train.len() + validate.len(), 20);

        let train_a = train.iter().filter(|&&i| y[i] == "a").count() as f64;
        let ratio = train_a / train.len() as f64;
        assert!((ratio - 0.5).abs() <= 0.2, "per-class ratio drifted: {}", ratio);
    }

    #[test]
    fn test_classification_pipeline_with_tree() {
        let (x, y) = separable_dataset(10);
        let names = vec!["value".to_string(), "bias".to_string()];
        let trainer = Trainer::new(TrainerConfig {
            algorithm: Algorithm::DecisionTree,
            ..TrainerConfig::default()
        });
        let result = trainer.train_classification(&x, &y, &names).unwrap();

        assert_eq!(result.training_rows + result.validation_rows, 20);
        let train = result.train_metrics.as_classification().unwrap();
        assert_eq!(train.accuracy, 1.0);
        let validate = result.validate_metrics.as_classification().unwrap();
        assert!(validate.accuracy >= 0.75);
        assert!((result.feature_importance.values().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_regression_pipeline_with_forest() {
        // y = 2x, forty points
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| 2.0 * i as f64).collect();
        let names = vec!["x".to_string()];
        let trainer = Trainer::new(TrainerConfig {
            algorithm: Algorithm::RandomForest,
            num_trees: 10,
            ..TrainerConfig::default()
        });
        let result = trainer.train_regression(&x, &y, &names).unwrap();

        let train = result.train_metrics.as_regression().unwrap();
        assert!(train.r2 > 0.9, "train R² was {}", train.r2);
        assert!(train.rmse < 10.0);
    }

    #[test]
    fn test_classification_metrics_perfect() {
        let actual = labels(&[("a", 2), ("b", 2)]);
        let metrics = classification_metrics(&actual, &actual.clone());
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.macro_f1, 1.0);
        assert_eq!(metrics.correct_predictions, 4);
        assert_eq!(metrics.confusion_matrix["a"]["a"], 2);
    }

    #[test]
    fn test_classification_metrics_mixed() {
        let actual: Vec<String> = labels(&[("a", 2), ("b", 2)]);
        let predicted: Vec<String> =
            ["a", "b", "b", "b"].iter().map(|s| s.to_string()).collect();
        let metrics = classification_metrics(&actual, &predicted);

        assert_eq!(metrics.accuracy, 0.75);
        // a: tp=1 fp=0 fn=1 -> precision 1, recall 0.5
        let a = &metrics.per_class["a"];
        assert_eq!(a.precision, 1.0);
        assert_eq!(a.recall, 0.5);
        // b: tp=2 fp=1 fn=0 -> precision 2/3, recall 1
        let b = &metrics.per_class["b"];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(b.recall, 1.0);
        assert_eq!(metrics.confusion_matrix["a"]["b"], 1);
    }

    #[test]
    fn test_undefined_ratios_score_zero() {
        // "c" never predicted: precision undefined -> 0
        let actual: Vec<String> = labels(&[("c", 2)]);
        let predicted: Vec<String> = labels(&[("d", 2)]);
        let metrics = classification_metrics(&actual, &predicted);
        assert_eq!(metrics.per_class["c"].precision, 0.0);
        assert_eq!(metrics.per_class["c"].recall, 0.0);
        assert_eq!(metrics.per_class["c"].f1, 0.0);
    }

    #[test]
    fn test_regression_metrics_values() {
        let actual = vec![1.0, 2.0, 3.0];
        let predicted = vec![1.0, 2.0, 4.0];
        let metrics = regression_metrics(&actual, &predicted);
        assert!((metrics.mae - 1.0 / 3.0).abs() < 1e-9);
        assert!((metrics.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-9);
        // ss_tot = 2, ss_res = 1
        assert!((metrics.r2 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_regression_r2_zero_variance() {
        let metrics = regression_metrics(&[5.0, 5.0], &[4.0, 6.0]);
        assert_eq!(metrics.r2, 0.0);
    }
}
