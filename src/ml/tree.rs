//! Decision tree
//!
//! One recursive splitter serves both model families: Gini gain for
//! classification, variance reduction for regression. Nodes are a tagged
//! sum, so an internal node always has both children and a leaf can never
//! half-exist. Thresholds are midpoints between consecutive unique feature
//! values; the first improving candidate wins ties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{TreeParams, check_training_shapes};
use crate::error::{PlatformError, Result};
use crate::models::ModelType;

/// Regression nodes with variance below this stop splitting
const MIN_VARIANCE: f64 = 1e-7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Internal {
        feature_index: usize,
        feature_name: String,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        samples_count: usize,
        depth: usize,
    },
    ClassLeaf {
        class: String,
        class_counts: BTreeMap<String, usize>,
        confidence: f64,
        samples_count: usize,
    },
    ValueLeaf {
        /// Mean of the training samples that landed here
        value: f64,
        /// The samples themselves, kept for interval estimation
        values: Vec<f64>,
        samples_count: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub feature_names: Vec<String>,
    /// Class labels in first-occurrence order; empty for regression
    pub classes: Vec<String>,
    pub num_features: usize,
    pub num_classes: usize,
    pub model_type: ModelType,
}

impl DecisionTree {
    pub fn classifier(params: TreeParams) -> Self {
        Self::new(params, ModelType::Classification)
    }

    pub fn regressor(params: TreeParams) -> Self {
        Self::new(params, ModelType::Regression)
    }

    fn new(params: TreeParams, model_type: ModelType) -> Self {
        Self {
            root: None,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            feature_names: Vec::new(),
            classes: Vec::new(),
            num_features: 0,
            num_classes: 0,
            model_type,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    // ------------------------------------------------------------------
    // Training
    // ------------------------------------------------------------------

    pub fn fit_classification(
        &mut self,
        x: &[Vec<f64>],
        y: &[String],
        feature_names: &[String],
    ) -> Result<()> {
        if self.model_type != ModelType::Classification {
            return Err(PlatformError::Validation(
                "fit_classification called on a regression tree".to_string(),
            ));
        }
        check_training_shapes(x, y.len(), feature_names)?;

        // Labels become codes in first-occurrence order
        let mut classes: Vec<String> = Vec::new();
        let codes: Vec<usize> = y
            .iter()
            .map(|label| match classes.iter().position(|c| c == label) {
                Some(i) => i,
                None => {
                    classes.push(label.clone());
                    classes.len() - 1
                },
            })
            .collect();

        self.feature_names = feature_names.to_vec();
        self.num_features = feature_names.len();
        self.num_classes = classes.len();
        self.classes = classes;

        let indices: Vec<usize> = (0..x.len()).collect();
        self.root = Some(self.grow_classification(x, &codes, &indices, 0));
        Ok(())
    }

    pub fn fit_regression(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        feature_names: &[String],
    ) -> Result<()> {
        if self.model_type != ModelType::Regression {
            return Err(PlatformError::Validation(
                "fit_regression called on a classification tree".to_string(),
            ));
        }
        check_training_shapes(x, y.len(), feature_names)?;

        self.feature_names = feature_names.to_vec();
        self.num_features = feature_names.len();

        let indices: Vec<usize> = (0..x.len()).collect();
        self.root = Some(self.grow_regression(x, y, &indices, 0));
        Ok(())
    }

    fn grow_classification(
        &self,
        x: &[Vec<f64>],
        codes: &[usize],
        indices: &[usize],
        depth: usize,
    ) -> TreeNode {
        let counts = self.class_counts(codes, indices);
        let distinct = counts.iter().filter(|&&c| c > 0).count();

        if depth >= self.max_depth || indices.len() < self.min_samples_split || distinct <= 1 {
            return self.class_leaf(&counts, indices.len());
        }

        let Some(split) = self.best_split_classification(x, codes, indices, &counts) else {
            return self.class_leaf(&counts, indices.len());
        };

        let (left_idx, right_idx) = partition(x, indices, split.feature, split.threshold);
        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return self.class_leaf(&counts, indices.len());
        }

        TreeNode::Internal {
            feature_index: split.feature,
            feature_name: self.feature_names[split.feature].clone(),
            threshold: split.threshold,
            left: Box::new(self.grow_classification(x, codes, &left_idx, depth + 1)),
            right: Box::new(self.grow_classification(x, codes, &right_idx, depth + 1)),
            samples_count: indices.len(),
            depth,
        }
    }

    fn grow_regression(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        depth: usize,
    ) -> TreeNode {
        let parent_var = variance(y, indices);

        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || parent_var < MIN_VARIANCE
        {
            return value_leaf(y, indices);
        }

        let Some(split) = self.best_split_regression(x, y, indices, parent_var) else {
            return value_leaf(y, indices);
        };

        let (left_idx, right_idx) = partition(x, indices, split.feature, split.threshold);
        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return value_leaf(y, indices);
        }

        TreeNode::Internal {
            feature_index: split.feature,
            feature_name: self.feature_names[split.feature].clone(),
            threshold: split.threshold,
            left: Box::new(self.grow_regression(x, y, &left_idx, depth + 1)),
            right: Box::new(self.grow_regression(x, y, &right_idx, depth + 1)),
            samples_count: indices.len(),
            depth,
        }
    }

    /// Sweep each feature's sorted values, scoring the midpoint between
    /// consecutive uniques by Gini gain. Features and thresholds are
    /// visited in ascending order and only a strictly better gain replaces
    /// the incumbent, so the first improver wins ties.
    fn best_split_classification(
        &self,
        x: &[Vec<f64>],
        codes: &[usize],
        indices: &[usize],
        counts: &[usize],
    ) -> Option<Split> {
        let n = indices.len();
        let parent_gini = gini(counts, n);
        let mut best: Option<Split> = None;

        for feature in 0..self.num_features {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_counts = vec![0usize; self.num_classes];
            let mut right_counts = counts.to_vec();

            let mut moved = 0usize;
            while moved < order.len() {
                let value = x[order[moved]][feature];
                while moved < order.len() && x[order[moved]][feature] == value {
                    let code = codes[order[moved]];
                    left_counts[code] += 1;
                    right_counts[code] -= 1;
                    moved += 1;
                }
                if moved == order.len() {
                    break;
                }

                let next = x[order[moved]][feature];
                let threshold = (value + next) / 2.0;
                let n_left = moved;
                let n_right = n - moved;
                let gain = parent_gini
                    - (n_left as f64 / n as f64) * gini(&left_counts, n_left)
                    - (n_right as f64 / n as f64) * gini(&right_counts, n_right);

                if gain > 0.0 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(Split { feature, threshold, gain });
                }
            }
        }

        best
    }

    /// Same sweep with variance reduction, tracked through running sums
    fn best_split_regression(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        parent_var: f64,
    ) -> Option<Split> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let mut best: Option<Split> = None;

        for feature in 0..self.num_features {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            let mut moved = 0usize;
            while moved < order.len() {
                let value = x[order[moved]][feature];
                while moved < order.len() && x[order[moved]][feature] == value {
                    left_sum += y[order[moved]];
                    left_sq += y[order[moved]] * y[order[moved]];
                    moved += 1;
                }
                if moved == order.len() {
                    break;
                }

                let next = x[order[moved]][feature];
                let threshold = (value + next) / 2.0;
                let n_left = moved;
                let n_right = n - moved;
                let var_left = var_from_sums(left_sum, left_sq, n_left);
                let var_right = var_from_sums(total_sum - left_sum, total_sq - left_sq, n_right);
                let gain = parent_var
                    - (n_left as f64 / n as f64) * var_left
                    - (n_right as f64 / n as f64) * var_right;

                if gain > 0.0 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(Split { feature, threshold, gain });
                }
            }
        }

        best
    }

    fn class_counts(&self, codes: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes];
        for &i in indices {
            counts[codes[i]] += 1;
        }
        counts
    }

    fn class_leaf(&self, counts: &[usize], samples: usize) -> TreeNode {
        let (majority, majority_count) =
            counts.iter().enumerate().fold((0usize, 0usize), |acc, (code, &count)| {
                if count > acc.1 { (code, count) } else { acc }
            });

        let class_counts: BTreeMap<String, usize> = counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(code, &count)| (self.classes[code].clone(), count))
            .collect();

        TreeNode::ClassLeaf {
            class: self.classes[majority].clone(),
            class_counts,
            confidence: if samples > 0 { majority_count as f64 / samples as f64 } else { 0.0 },
            samples_count: samples,
        }
    }

    // ------------------------------------------------------------------
    // Prediction
    // ------------------------------------------------------------------

    fn descend(&self, x: &[f64]) -> Result<&TreeNode> {
        let mut node = self
            .root
            .as_ref()
            .ok_or_else(|| PlatformError::Training("model is not fitted".to_string()))?;

        if x.len() != self.num_features {
            return Err(PlatformError::Validation(format!(
                "input has {} features, model expects {}",
                x.len(),
                self.num_features
            )));
        }

        loop {
            match node {
                TreeNode::Internal { feature_index, threshold, left, right, .. } => {
                    node = if x[*feature_index] <= *threshold { left } else { right };
                },
                leaf => return Ok(leaf),
            }
        }
    }

    /// Classification: (label, leaf confidence)
    pub fn predict(&self, x: &[f64]) -> Result<(String, f64)> {
        if self.model_type != ModelType::Classification {
            return Err(PlatformError::Validation(
                "predict called on a regression tree".to_string(),
            ));
        }
        match self.descend(x)? {
            TreeNode::ClassLeaf { class, confidence, .. } => Ok((class.clone(), *confidence)),
            _ => Err(PlatformError::Training("tree has a leaf of the wrong kind".to_string())),
        }
    }

    /// Classification: leaf class counts normalized to probabilities, with
    /// an entry for every class the tree knows
    pub fn predict_proba(&self, x: &[f64]) -> Result<BTreeMap<String, f64>> {
        if self.model_type != ModelType::Classification {
            return Err(PlatformError::Validation(
                "predict_proba called on a regression tree".to_string(),
            ));
        }
        match self.descend(x)? {
            TreeNode::ClassLeaf { class_counts, samples_count, .. } => {
                let total = (*samples_count).max(1) as f64;
                let mut proba: BTreeMap<String, f64> =
                    self.classes.iter().map(|c| (c.clone(), 0.0)).collect();
                for (class, count) in class_counts {
                    proba.insert(class.clone(), *count as f64 / total);
                }
                Ok(proba)
            },
            _ => Err(PlatformError::Training("tree has a leaf of the wrong kind".to_string())),
        }
    }

    /// Regression: leaf mean
    pub fn predict_value(&self, x: &[f64]) -> Result<f64> {
        if self.model_type != ModelType::Regression {
            return Err(PlatformError::Validation(
                "predict_value called on a classification tree".to_string(),
            ));
        }
        match self.descend(x)? {
            TreeNode::ValueLeaf { value, .. } => Ok(*value),
            _ => Err(PlatformError::Training("tree has a leaf of the wrong kind".to_string())),
        }
    }

    /// Regression: mean plus or minus two leaf standard deviations. Leaves
    /// with a single sample yield a zero-width interval.
    pub fn predict_interval(&self, x: &[f64]) -> Result<(f64, f64, f64)> {
        if self.model_type != ModelType::Regression {
            return Err(PlatformError::Validation(
                "predict_interval called on a classification tree".to_string(),
            ));
        }
        match self.descend(x)? {
            TreeNode::ValueLeaf { value, values, .. } => {
                if values.len() < 2 {
                    return Ok((*value, *value, *value));
                }
                let mean = *value;
                let var =
                    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
                let spread = 2.0 * var.sqrt();
                Ok((mean, mean - spread, mean + spread))
            },
            _ => Err(PlatformError::Training("tree has a leaf of the wrong kind".to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Importance per feature: each internal node credits its sample count
    /// to its splitting feature, normalized to sum to 1
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.num_features];
        if let Some(root) = &self.root {
            accumulate_importance(root, &mut importance);
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            for value in &mut importance {
                *value /= total;
            }
        }
        importance
    }

    pub fn num_nodes(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Internal { left, right, .. } => 1 + count(left) + count(right),
                _ => 1,
            }
        }
        self.root.as_ref().map(count).unwrap_or(0)
    }

    /// Structural checks applied after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.num_features != self.feature_names.len() {
            return Err(PlatformError::Validation(format!(
                "num_features {} does not match {} feature names",
                self.num_features,
                self.feature_names.len()
            )));
        }
        if self.model_type == ModelType::Classification {
            if self.classes.is_empty() {
                return Err(PlatformError::Validation(
                    "classification tree has no classes".to_string(),
                ));
            }
            if self.num_classes != self.classes.len() {
                return Err(PlatformError::Validation(format!(
                    "num_classes {} does not match {} classes",
                    self.num_classes,
                    self.classes.len()
                )));
            }
        }
        Ok(())
    }
}

fn partition(
    x: &[Vec<f64>],
    indices: &[usize],
    feature: usize,
    threshold: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in indices {
        if x[i][feature] <= threshold {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    (left, right)
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n as f64;
            p * p
        })
        .sum::<f64>()
}

fn variance(y: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
    indices.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / indices.len() as f64
}

fn var_from_sums(sum: f64, sq: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let mean = sum / n as f64;
    (sq / n as f64 - mean * mean).max(0.0)
}

fn value_leaf(y: &[f64], indices: &[usize]) -> TreeNode {
    let values: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
    let mean =
        if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 };
    TreeNode::ValueLeaf { value: mean, samples_count: values.len(), values }
}

fn accumulate_importance(node: &TreeNode, importance: &mut [f64]) {
    if let TreeNode::Internal { feature_index, samples_count, left, right, .. } = node {
        importance[*feature_index] += *samples_count as f64;
        accumulate_importance(left, importance);
        accumulate_importance(right, importance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nine-row iris fixture, three rows per class
    pub(crate) fn iris_small() -> (Vec<Vec<f64>>, Vec<String>, Vec<String>) {
        let x = vec![
            vec![5.1, 3.5, 1.4, 0.2],
            vec![4.9, 3.0, 1.4, 0.2],
            vec![4.7, 3.2, 1.3, 0.2],
            vec![7.0, 3.2, 4.7, 1.4],
            vec![6.4, 3.2, 4.5, 1.5],
            vec![6.9, 3.1, 4.9, 1.5],
            vec![6.3, 3.3, 6.0, 2.5],
            vec![5.8, 2.7, 5.1, 1.9],
            vec![7.1, 3.0, 5.9, 2.1],
        ];
        let y: Vec<String> = ["setosa", "setosa", "setosa", "versicolor", "versicolor",
            "versicolor", "virginica", "virginica", "virginica"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let names: Vec<String> =
            ["sepal_length", "sepal_width", "petal_length", "petal_width"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        (x, y, names)
    }

    fn housing() -> (Vec<Vec<f64>>, Vec<f64>, Vec<String>) {
        let x = vec![
            vec![1000.0, 2.0],
            vec![1500.0, 3.0],
            vec![2000.0, 4.0],
            vec![1200.0, 2.0],
            vec![1800.0, 3.0],
            vec![2500.0, 5.0],
            vec![1100.0, 2.0],
            vec![1700.0, 3.0],
        ];
        let y = vec![100.0, 150.0, 200.0, 120.0, 180.0, 250.0, 110.0, 170.0];
        let names: Vec<String> = ["sqft", "bedrooms"].iter().map(|s| s.to_string()).collect();
        (x, y, names)
    }

    fn params(max_depth: usize) -> TreeParams {
        TreeParams { max_depth, min_samples_split: 2, min_samples_leaf: 1 }
    }

    #[test]
    fn test_iris_classification() {
        let (x, y, names) = iris_small();
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &names).unwrap();

        assert_eq!(tree.predict(&[5.0, 3.4, 1.5, 0.2]).unwrap().0, "setosa");
        assert_eq!(tree.predict(&[6.5, 3.0, 4.6, 1.4]).unwrap().0, "versicolor");
        assert_eq!(tree.predict(&[6.7, 3.1, 5.6, 2.4]).unwrap().0, "virginica");
        assert!(tree.num_nodes() >= 5);

        let importance = tree.feature_importance();
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_classes_in_first_occurrence_order() {
        let (x, y, names) = iris_small();
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &names).unwrap();
        assert_eq!(tree.classes, vec!["setosa", "versicolor", "virginica"]);
        assert_eq!(tree.num_classes, 3);
    }

    #[test]
    fn test_predicted_label_always_known() {
        let (x, y, names) = iris_small();
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &names).unwrap();
        for row in &x {
            let (label, confidence) = tree.predict(row).unwrap();
            assert!(tree.classes.contains(&label));
            assert!((0.0..=1.0).contains(&confidence));
        }
    }

    #[test]
    fn test_predict_proba_sums_to_one() {
        let (x, y, names) = iris_small();
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &names).unwrap();

        let proba = tree.predict_proba(&[5.0, 3.4, 1.5, 0.2]).unwrap();
        assert_eq!(proba.len(), 3);
        assert!((proba.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_housing_regression() {
        let (x, y, names) = housing();
        let mut tree = DecisionTree::regressor(params(10));
        tree.fit_regression(&x, &y, &names).unwrap();

        let low = tree.predict_value(&[1000.0, 2.0]).unwrap();
        assert!((80.0..=120.0).contains(&low), "predicted {}", low);
        let high = tree.predict_value(&[2000.0, 4.0]).unwrap();
        assert!((170.0..=230.0).contains(&high), "predicted {}", high);
    }

    #[test]
    fn test_regression_output_bounded_by_training_leaves() {
        let (x, y, names) = housing();
        let mut tree = DecisionTree::regressor(params(10));
        tree.fit_regression(&x, &y, &names).unwrap();

        for probe in [[900.0, 1.0], [3000.0, 6.0], [1650.0, 3.0]] {
            let value = tree.predict_value(&probe).unwrap();
            assert!((100.0..=250.0).contains(&value));
        }
    }

    #[test]
    fn test_interval_zero_width_for_single_sample_leaf() {
        let (x, y, names) = housing();
        let mut tree = DecisionTree::regressor(params(10));
        tree.fit_regression(&x, &y, &names).unwrap();

        // Deep tree isolates every sample; all leaves are singletons
        let (mean, low, high) = tree.predict_interval(&[1000.0, 2.0]).unwrap();
        assert_eq!(mean, low);
        assert_eq!(mean, high);
    }

    #[test]
    fn test_interval_spreads_for_shallow_tree() {
        let (x, y, names) = housing();
        let mut tree =
            DecisionTree::regressor(TreeParams { max_depth: 1, ..Default::default() });
        tree.fit_regression(&x, &y, &names).unwrap();

        let (mean, low, high) = tree.predict_interval(&[1000.0, 2.0]).unwrap();
        assert!(low < mean && mean < high);
    }

    #[test]
    fn test_serialization_roundtrip_preserves_predictions() {
        let (x, y, names) = iris_small();
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &names).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let restored: DecisionTree = serde_json::from_str(&json).unwrap();
        restored.validate().unwrap();

        for row in &x {
            assert_eq!(tree.predict(row).unwrap(), restored.predict(row).unwrap());
            assert_eq!(tree.predict_proba(row).unwrap(), restored.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn test_regression_roundtrip_bit_exact() {
        let (x, y, names) = housing();
        let mut tree = DecisionTree::regressor(params(10));
        tree.fit_regression(&x, &y, &names).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let restored: DecisionTree = serde_json::from_str(&json).unwrap();

        for row in &x {
            assert_eq!(
                tree.predict_value(row).unwrap().to_bits(),
                restored.predict_value(row).unwrap().to_bits()
            );
        }
    }

    #[test]
    fn test_empty_training_data_rejected() {
        let mut tree = DecisionTree::classifier(params(5));
        let err = tree
            .fit_classification(&[], &[], &["f".to_string()])
            .unwrap_err();
        assert!(matches!(err, PlatformError::Training(_)));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut tree = DecisionTree::classifier(params(5));
        let err = tree
            .fit_classification(
                &[vec![1.0, 2.0]],
                &["a".to_string()],
                &["only_one".to_string()],
            )
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));

        let err = tree
            .fit_classification(
                &[vec![1.0], vec![2.0]],
                &["a".to_string()],
                &["f".to_string()],
            )
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[test]
    fn test_predict_wrong_width_rejected() {
        let (x, y, names) = iris_small();
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &names).unwrap();
        assert!(matches!(
            tree.predict(&[1.0, 2.0]),
            Err(PlatformError::Validation(_))
        ));
    }

    #[test]
    fn test_predict_unfitted_rejected() {
        let tree = DecisionTree::classifier(params(5));
        assert!(matches!(
            tree.predict(&[1.0, 2.0, 3.0, 4.0]),
            Err(PlatformError::Training(_))
        ));
    }

    #[test]
    fn test_predict_wrong_mode_rejected() {
        let (x, y, names) = housing();
        let mut tree = DecisionTree::regressor(params(10));
        tree.fit_regression(&x, &y, &names).unwrap();
        assert!(matches!(
            tree.predict(&[1000.0, 2.0]),
            Err(PlatformError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_variance_target_yields_single_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![5.0, 5.0, 5.0];
        let mut tree = DecisionTree::regressor(params(10));
        tree.fit_regression(&x, &y, &["f".to_string()]).unwrap();
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict_value(&[9.0]).unwrap(), 5.0);
    }

    #[test]
    fn test_thresholds_are_midpoints() {
        let x = vec![vec![1.0], vec![3.0]];
        let y: Vec<String> = vec!["a".to_string(), "b".to_string()];
        let mut tree = DecisionTree::classifier(params(5));
        tree.fit_classification(&x, &y, &["f".to_string()]).unwrap();

        match tree.root().unwrap() {
            TreeNode::Internal { threshold, .. } => assert_eq!(*threshold, 2.0),
            other => panic!("expected an internal root, got {:?}", other),
        }
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let y: Vec<String> =
            vec!["a".to_string(), "b".to_string(), "b".to_string(), "b".to_string()];
        let mut tree = DecisionTree::classifier(TreeParams {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 2,
        });
        tree.fit_classification(&x, &y, &["f".to_string()]).unwrap();

        // The best split isolates the single "a", which min_samples_leaf
        // forbids; lower-gain splits are not reconsidered, the node
        // becomes a leaf outright
        match tree.root().unwrap() {
            TreeNode::ClassLeaf { class, .. } => assert_eq!(class, "b"),
            other => panic!("expected a leaf root, got {:?}", other),
        }
    }
}
