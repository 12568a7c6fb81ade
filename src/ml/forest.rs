//! Random forest
//!
//! Bagged ensemble of decision trees. Every tree trains on a bootstrap
//! sample projected onto its own random √F feature subset, in its own
//! worker with no shared mutable state; finished trees land in
//! preallocated slots under a mutex. The captured seed makes the whole
//! ensemble reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{TreeParams, check_training_shapes, tree::DecisionTree};
use crate::error::{PlatformError, Result};
use crate::models::ModelType;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForestParams {
    pub num_trees: usize,
    pub tree: TreeParams,
    pub random_seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self { num_trees: 100, tree: TreeParams::default(), random_seed: 42 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Per-tree feature subsets, indices into the full feature space.
    /// Inputs are remapped through these before descending a tree.
    tree_features: Vec<Vec<usize>>,
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
    pub num_features: usize,
    pub bootstrap: bool,
    pub oob_score: f64,
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    pub model_type: ModelType,
    pub random_seed: u64,
}

/// Everything a single worker needs, cloned before fan-out
enum TreeTarget {
    Labels(Vec<String>),
    Values(Vec<f64>),
}

impl RandomForest {
    pub fn classifier(params: ForestParams) -> Self {
        Self::new(params, ModelType::Classification)
    }

    pub fn regressor(params: ForestParams) -> Self {
        Self::new(params, ModelType::Regression)
    }

    fn new(params: ForestParams, model_type: ModelType) -> Self {
        Self {
            trees: Vec::new(),
            tree_features: Vec::new(),
            num_trees: params.num_trees,
            max_depth: params.tree.max_depth,
            min_samples_split: params.tree.min_samples_split,
            min_samples_leaf: params.tree.min_samples_leaf,
            max_features: 0,
            num_features: 0,
            bootstrap: true,
            oob_score: 0.0,
            feature_names: Vec::new(),
            classes: Vec::new(),
            model_type,
            random_seed: params.random_seed,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
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
                "fit_classification called on a regression forest".to_string(),
            ));
        }
        check_training_shapes(x, y.len(), feature_names)?;

        // Class order is first occurrence over the full training set, so
        // every tree agrees on it regardless of its bootstrap draw
        let mut classes: Vec<String> = Vec::new();
        for label in y {
            if !classes.contains(label) {
                classes.push(label.clone());
            }
        }
        self.classes = classes;

        self.fit_ensemble(x, TreeTarget::Labels(y.to_vec()), feature_names)?;

        // Ensemble score on the training set stands in for the OOB estimate
        let mut correct = 0usize;
        for (row, label) in x.iter().zip(y.iter()) {
            if self.predict(row)?.0 == *label {
                correct += 1;
            }
        }
        self.oob_score = correct as f64 / x.len() as f64;
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
                "fit_regression called on a classification forest".to_string(),
            ));
        }
        check_training_shapes(x, y.len(), feature_names)?;

        self.fit_ensemble(x, TreeTarget::Values(y.to_vec()), feature_names)?;

        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (row, actual) in x.iter().zip(y.iter()) {
            let predicted = self.predict_value(row)?;
            ss_res += (actual - predicted).powi(2);
            ss_tot += (actual - mean).powi(2);
        }
        self.oob_score = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
        Ok(())
    }

    /// Parallel fan-out: T workers, each training on its own bootstrap
    /// draw and feature subset, writing into its preallocated slot.
    fn fit_ensemble(
        &mut self,
        x: &[Vec<f64>],
        y: TreeTarget,
        feature_names: &[String],
    ) -> Result<()> {
        let n = x.len();
        let num_features = feature_names.len();
        self.feature_names = feature_names.to_vec();
        self.num_features = num_features;
        self.max_features = ((num_features as f64).sqrt().floor() as usize).max(1);

        // Seeds are drawn up front so the ensemble is deterministic no
        // matter how the workers are scheduled
        let mut master = StdRng::seed_from_u64(self.random_seed);
        let seeds: Vec<u64> = (0..self.num_trees).map(|_| master.random()).collect();

        let slots: Mutex<Vec<Option<(DecisionTree, Vec<usize>)>>> =
            Mutex::new((0..self.num_trees).map(|_| None).collect());
        let first_error: Mutex<Option<PlatformError>> = Mutex::new(None);

        let params = self.tree_params();
        let model_type = self.model_type;
        let max_features = self.max_features;

        std::thread::scope(|scope| {
            for (tree_index, &seed) in seeds.iter().enumerate() {
                let slots = &slots;
                let first_error = &first_error;
                let y = &y;
                scope.spawn(move || {
                    let result = train_one_tree(
                        x,
                        y,
                        feature_names,
                        params,
                        model_type,
                        max_features,
                        n,
                        num_features,
                        seed,
                    );
                    match result {
                        Ok(trained) => {
                            slots.lock().expect("forest slot lock")[tree_index] = Some(trained);
                        },
                        Err(e) => {
                            let mut guard = first_error.lock().expect("forest error lock");
                            if guard.is_none() {
                                *guard = Some(e);
                            }
                        },
                    }
                });
            }
        });

        if let Some(e) = first_error.into_inner().expect("forest error lock") {
            return Err(PlatformError::Training(format!("ensemble worker failed: {}", e)));
        }

        let slots = slots.into_inner().expect("forest slot lock");
        self.trees = Vec::with_capacity(self.num_trees);
        self.tree_features = Vec::with_capacity(self.num_trees);
        for slot in slots {
            let (tree, features) = slot.ok_or_else(|| {
                PlatformError::Training("ensemble worker produced no tree".to_string())
            })?;
            self.trees.push(tree);
            self.tree_features.push(features);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Prediction
    // ------------------------------------------------------------------

    fn check_input(&self, x: &[f64]) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PlatformError::Training("model is not fitted".to_string()));
        }
        if x.len() != self.feature_names.len() {
            return Err(PlatformError::Validation(format!(
                "input has {} features, model expects {}",
                x.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }

    fn project(&self, tree_index: usize, x: &[f64]) -> Vec<f64> {
        self.tree_features[tree_index].iter().map(|&f| x[f]).collect()
    }

    /// Classification: majority vote; confidence is the winning share
    pub fn predict(&self, x: &[f64]) -> Result<(String, f64)> {
        if self.model_type != ModelType::Classification {
            return Err(PlatformError::Validation(
                "predict called on a regression forest".to_string(),
            ));
        }
        self.check_input(x)?;

        let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, tree) in self.trees.iter().enumerate() {
            let projected = self.project(i, x);
            let (label, _) = tree.predict(&projected)?;
            let class = self
                .classes
                .iter()
                .find(|c| **c == label)
                .map(|c| c.as_str())
                .unwrap_or_else(|| self.classes[0].as_str());
            *votes.entry(class).or_insert(0) += 1;
        }

        // Ties resolve to the earliest class in first-occurrence order
        let mut winner = self.classes[0].as_str();
        let mut winner_votes = 0usize;
        for class in &self.classes {
            let count = votes.get(class.as_str()).copied().unwrap_or(0);
            if count > winner_votes {
                winner = class.as_str();
                winner_votes = count;
            }
        }

        Ok((winner.to_string(), winner_votes as f64 / self.trees.len() as f64))
    }

    /// Classification: normalized vote distribution with an entry for
    /// every class, unseen ones at zero
    pub fn predict_proba(&self, x: &[f64]) -> Result<BTreeMap<String, f64>> {
        if self.model_type != ModelType::Classification {
            return Err(PlatformError::Validation(
                "predict_proba called on a regression forest".to_string(),
            ));
        }
        self.check_input(x)?;

        let mut proba: BTreeMap<String, f64> =
            self.classes.iter().map(|c| (c.clone(), 0.0)).collect();
        for (i, tree) in self.trees.iter().enumerate() {
            let projected = self.project(i, x);
            let (label, _) = tree.predict(&projected)?;
            if let Some(share) = proba.get_mut(&label) {
                *share += 1.0;
            }
        }
        let total = self.trees.len() as f64;
        for share in proba.values_mut() {
            *share /= total;
        }
        Ok(proba)
    }

    /// Regression: mean of the tree outputs
    pub fn predict_value(&self, x: &[f64]) -> Result<f64> {
        if self.model_type != ModelType::Regression {
            return Err(PlatformError::Validation(
                "predict_value called on a classification forest".to_string(),
            ));
        }
        self.check_input(x)?;

        let mut sum = 0.0;
        for (i, tree) in self.trees.iter().enumerate() {
            sum += tree.predict_value(&self.project(i, x))?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Regression: mean with a 1.96-sigma band over the tree predictions
    pub fn predict_interval(&self, x: &[f64]) -> Result<(f64, f64, f64)> {
        if self.model_type != ModelType::Regression {
            return Err(PlatformError::Validation(
                "predict_interval called on a classification forest".to_string(),
            ));
        }
        self.check_input(x)?;

        let mut predictions = Vec::with_capacity(self.trees.len());
        for (i, tree) in self.trees.iter().enumerate() {
            predictions.push(tree.predict_value(&self.project(i, x))?);
        }
        let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;
        let var = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>()
            / predictions.len() as f64;
        let spread = 1.96 * var.sqrt();
        Ok((mean, mean - spread, mean + spread))
    }

    /// Per-tree importances remapped to the full feature space, averaged
    /// over the ensemble and renormalized
    pub fn feature_importance(&self) -> Vec<f64> {
        let num_features = self.feature_names.len();
        let mut importance = vec![0.0; num_features];
        for (i, tree) in self.trees.iter().enumerate() {
            for (local, share) in tree.feature_importance().iter().enumerate() {
                importance[self.tree_features[i][local]] += share;
            }
        }
        for value in &mut importance {
            *value /= self.trees.len().max(1) as f64;
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            for value in &mut importance {
                *value /= total;
            }
        }
        importance
    }

    /// Structural checks applied after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PlatformError::Validation("forest has no trees".to_string()));
        }
        if !self.trees.iter().any(|t| t.is_fitted()) {
            return Err(PlatformError::Validation("forest has no fitted trees".to_string()));
        }
        if self.trees.len() != self.tree_features.len() {
            return Err(PlatformError::Validation(
                "tree and feature-subset counts differ".to_string(),
            ));
        }
        if self.num_features != self.feature_names.len() {
            return Err(PlatformError::Validation(format!(
                "num_features {} does not match {} feature names",
                self.num_features,
                self.feature_names.len()
            )));
        }
        if self.model_type == ModelType::Classification && self.classes.is_empty() {
            return Err(PlatformError::Validation(
                "classification forest has no classes".to_string(),
            ));
        }
        Ok(())
    }
}

/// One worker's unit of work: bootstrap, project, fit
#[allow(clippy::too_many_arguments)]
fn train_one_tree(
    x: &[Vec<f64>],
    y: &TreeTarget,
    feature_names: &[String],
    params: TreeParams,
    model_type: ModelType,
    max_features: usize,
    n: usize,
    num_features: usize,
    seed: u64,
) -> Result<(DecisionTree, Vec<usize>)> {
    let mut rng = StdRng::seed_from_u64(seed);

    // Bootstrap sample of size n, with replacement
    let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();

    // Feature subset: uniform without replacement from a full shuffle
    let mut all_features: Vec<usize> = (0..num_features).collect();
    all_features.shuffle(&mut rng);
    let subset: Vec<usize> = all_features.into_iter().take(max_features).collect();

    let projected_x: Vec<Vec<f64>> = sample
        .iter()
        .map(|&i| subset.iter().map(|&f| x[i][f]).collect())
        .collect();
    let projected_names: Vec<String> =
        subset.iter().map(|&f| feature_names[f].clone()).collect();

    let tree = match (model_type, y) {
        (ModelType::Classification, TreeTarget::Labels(labels)) => {
            let projected_y: Vec<String> = sample.iter().map(|&i| labels[i].clone()).collect();
            let mut tree = DecisionTree::classifier(params);
            tree.fit_classification(&projected_x, &projected_y, &projected_names)?;
            tree
        },
        (ModelType::Regression, TreeTarget::Values(values)) => {
            let projected_y: Vec<f64> = sample.iter().map(|&i| values[i]).collect();
            let mut tree = DecisionTree::regressor(params);
            tree.fit_regression(&projected_x, &projected_y, &projected_names)?;
            tree
        },
        _ => {
            return Err(PlatformError::Training(
                "target kind does not match the forest's model type".to_string(),
            ));
        },
    };

    Ok((tree, subset))
}
