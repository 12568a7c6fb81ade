//! Auto-trainer
//!
//! Walks the analyzer's capability report and trains a model for every
//! qualifying target: extract from the graph, validate, train, write the
//! artifact, record the registry row. Per-target failures are collected,
//! never fatal; monitoring bootstrap failure is logged and the batch still
//! succeeds.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trainer::{Algorithm, Trainer, TrainerConfig, TrainingResult};
use super::TreeParams;
use crate::analyzer::{KgDataExtractor, MlCapabilities, MlTarget, OntologyAnalyzer};
use crate::analyzer::kg_extractor::validate_dataset;
use crate::config::TrainingConfig;
use crate::error::{PlatformError, Result};
use crate::models::{
    EvaluationMetrics, FailedModelInfo, ModelType, TargetValues, TrainedModelInfo,
    TrainingDataset,
};
use crate::monitoring::MonitoringService;
use crate::services::store::{ModelStore, NewModel, OntologyStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTrainOptions {
    /// Targets below this analyzer confidence are skipped
    pub min_confidence: f64,
    /// Train every target regardless of confidence
    pub force_all: bool,
    /// Bootstrap monitoring configuration for time-series metrics
    pub enable_monitoring: bool,
    /// Restrict the batch to one model family
    pub regression_only: bool,
    pub classification_only: bool,
    pub algorithm: Algorithm,
}

impl Default for AutoTrainOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            force_all: false,
            enable_monitoring: false,
            regression_only: false,
            classification_only: false,
            algorithm: Algorithm::RandomForest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTrainSummary {
    pub ontology_id: i64,
    pub trained: Vec<TrainedModelInfo>,
    pub failed: Vec<FailedModelInfo>,
    pub monitoring_job_id: Option<i64>,
    pub duration_ms: u64,
}

pub struct AutoTrainer {
    analyzer: OntologyAnalyzer,
    kg_extractor: KgDataExtractor,
    model_store: ModelStore,
    ontology_store: OntologyStore,
    monitoring_service: MonitoringService,
    config: TrainingConfig,
}

impl AutoTrainer {
    pub fn new(
        analyzer: OntologyAnalyzer,
        kg_extractor: KgDataExtractor,
        model_store: ModelStore,
        ontology_store: OntologyStore,
        monitoring_service: MonitoringService,
        config: TrainingConfig,
    ) -> Self {
        Self { analyzer, kg_extractor, model_store, ontology_store, monitoring_service, config }
    }

    /// Train models for every qualifying target of an ontology
    pub async fn train_from_ontology(
        &self,
        ontology_id: i64,
        options: &AutoTrainOptions,
    ) -> Result<AutoTrainSummary> {
        let started = Instant::now();
        let ontology = self.ontology_store.get_ontology(ontology_id).await?;
        let capabilities = self.analyzer.analyze_capabilities(ontology_id).await?;

        let mut summary = AutoTrainSummary {
            ontology_id,
            trained: Vec::new(),
            failed: Vec::new(),
            monitoring_job_id: None,
            duration_ms: 0,
        };

        for target in self.select_targets(&capabilities, options) {
            match self.train_target(ontology_id, target, options).await {
                Ok(info) => {
                    tracing::info!(
                        "Trained {} model for '{}' (validate score {:.3})",
                        info.algorithm,
                        target.property_label,
                        info.validate_score
                    );
                    summary.trained.push(info);
                },
                Err(e) => {
                    tracing::warn!("Training failed for '{}': {}", target.property_label, e);
                    summary.failed.push(FailedModelInfo {
                        target_property: target.property_uri.clone(),
                        reason: e.to_string(),
                    });
                },
            }
        }

        if options.enable_monitoring && !capabilities.time_series_metrics.is_empty() {
            // Monitoring setup is best-effort relative to training
            match self
                .monitoring_service
                .bootstrap_monitoring(ontology_id, &ontology.name, &capabilities)
                .await
            {
                Ok(job) => summary.monitoring_job_id = job.map(|j| j.id),
                Err(e) => {
                    tracing::error!("Monitoring bootstrap failed for {}: {}", ontology_id, e);
                },
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Auto-training for ontology {} finished: {} trained, {} failed in {}ms",
            ontology_id,
            summary.trained.len(),
            summary.failed.len(),
            summary.duration_ms
        );
        Ok(summary)
    }

    /// Parse a free-form goal and train accordingly
    pub async fn train_for_goal(
        &self,
        ontology_id: i64,
        goal_text: &str,
    ) -> Result<AutoTrainSummary> {
        let options = parse_goal(goal_text);
        tracing::info!(
            "Goal '{}' parsed as regression_only={} classification_only={} monitoring={} force_all={}",
            goal_text,
            options.regression_only,
            options.classification_only,
            options.enable_monitoring,
            options.force_all
        );
        self.train_from_ontology(ontology_id, &options).await
    }

    fn select_targets<'a>(
        &self,
        capabilities: &'a MlCapabilities,
        options: &AutoTrainOptions,
    ) -> Vec<&'a MlTarget> {
        let mut targets: Vec<&MlTarget> = Vec::new();
        if !options.classification_only {
            targets.extend(capabilities.regression_targets.iter());
        }
        if !options.regression_only {
            targets.extend(capabilities.classification_targets.iter());
        }
        targets
            .into_iter()
            .filter(|t| options.force_all || t.confidence >= options.min_confidence)
            .collect()
    }

    async fn train_target(
        &self,
        ontology_id: i64,
        target: &MlTarget,
        options: &AutoTrainOptions,
    ) -> Result<TrainedModelInfo> {
        if target.suggested_features.is_empty() {
            return Err(PlatformError::InsufficientData(format!(
                "target '{}' has no candidate features",
                target.property_label
            )));
        }

        let dataset = self
            .kg_extractor
            .extract_training_data(ontology_id, &target.property_uri, &target.suggested_features)
            .await?;
        for warning in &dataset.warnings {
            tracing::warn!("Dataset for '{}': {}", target.property_label, warning);
        }
        validate_dataset(&dataset)?;

        let trainer = Trainer::new(TrainerConfig {
            algorithm: options.algorithm,
            tree: TreeParams {
                max_depth: self.config.max_depth,
                min_samples_split: self.config.min_samples_split,
                min_samples_leaf: self.config.min_samples_leaf,
            },
            num_trees: self.config.num_trees,
            train_test_split: self.config.train_test_split,
            shuffle: self.config.shuffle,
            stratify: dataset.model_type == ModelType::Classification,
            random_seed: self.config.random_seed,
        });

        let result = match (&dataset.model_type, &dataset.target) {
            (ModelType::Classification, TargetValues::Labels(labels)) => {
                trainer.train_classification(&dataset.features, labels, &dataset.feature_names)?
            },
            (ModelType::Regression, TargetValues::Numeric(values)) => {
                trainer.train_regression(&dataset.features, values, &dataset.feature_names)?
            },
            _ => {
                return Err(PlatformError::Training(
                    "dataset target does not match its model type".to_string(),
                ));
            },
        };

        self.persist_model(ontology_id, target, &dataset, result).await
    }

    async fn persist_model(
        &self,
        ontology_id: i64,
        target: &MlTarget,
        dataset: &TrainingDataset,
        result: TrainingResult,
    ) -> Result<TrainedModelInfo> {
        let artifact = result.model.to_json()?;
        let artifact_name = format!("{}.json", Uuid::new_v4());
        let artifact_path = Path::new(&self.config.models_dir).join(&artifact_name);

        if let Some(parent) = artifact_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PlatformError::Backend(format!("cannot create models dir: {}", e))
            })?;
        }
        tokio::fs::write(&artifact_path, artifact.as_bytes())
            .await
            .map_err(|e| PlatformError::Backend(format!("cannot write model artifact: {}", e)))?;

        let validate_score = match &result.validate_metrics {
            EvaluationMetrics::Classification(m) => m.accuracy,
            EvaluationMetrics::Regression(m) => m.r2,
        };
        let train_score = match &result.train_metrics {
            EvaluationMetrics::Classification(m) => m.accuracy,
            EvaluationMetrics::Regression(m) => m.r2,
        };

        let (precision, recall, f1, confusion, class_labels) = match &result.validate_metrics {
            EvaluationMetrics::Classification(m) => (
                Some(m.macro_precision),
                Some(m.macro_recall),
                Some(m.macro_f1),
                Some(serde_json::to_value(&m.confusion_matrix)?),
                dataset.target_encoder.as_ref().map(|e| e.unique_values.clone()),
            ),
            EvaluationMetrics::Regression(_) => (None, None, None, None, None),
        };

        let record = self
            .model_store
            .insert_model(NewModel {
                name: format!("{} ({})", target.property_label, result.model.algorithm()),
                ontology_id,
                target_class: target.property_uri.clone(),
                algorithm: result.model.algorithm().to_string(),
                hyperparameters: result.model_info.clone(),
                feature_columns: dataset.feature_names.clone(),
                class_labels,
                train_accuracy: Some(train_score),
                validate_accuracy: Some(validate_score),
                precision_score: precision,
                recall_score: recall,
                f1_score: f1,
                confusion_matrix: confusion,
                model_artifact_path: artifact_path.to_string_lossy().into_owned(),
                model_size_bytes: artifact.len() as i64,
                training_rows: result.training_rows as i64,
                validation_rows: result.validation_rows as i64,
                feature_importance: serde_json::to_value(&result.feature_importance)?,
            })
            .await?;

        Ok(TrainedModelInfo {
            model_id: record.id,
            target_property: target.property_uri.clone(),
            model_type: dataset.model_type,
            algorithm: result.model.algorithm().to_string(),
            validate_score,
            training_rows: result.training_rows,
            feature_count: dataset.feature_count,
        })
    }
}

/// Keyword goal parsing; the documented mapping is contract
pub fn parse_goal(goal_text: &str) -> AutoTrainOptions {
    let goal = goal_text.to_lowercase();
    let mut options = AutoTrainOptions::default();

    let predictive = goal.contains("predict") || goal.contains("forecast");
    let money_like = ["price", "cost", "revenue", "sales", "profit", "amount", "value"]
        .iter()
        .any(|k| goal.contains(k));
    let class_like = ["category", "class", "type", "status"]
        .iter()
        .any(|k| goal.contains(k));

    if predictive && money_like {
        options.regression_only = true;
    } else if predictive && class_like {
        options.classification_only = true;
    }

    if goal.contains("monitor") || goal.contains("alert") || goal.contains("watch") {
        options.enable_monitoring = true;
    }

    if goal.contains("all") || goal.contains("everything") {
        options.force_all = true;
        options.min_confidence = 0.0;
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goal_regression() {
        let options = parse_goal("Predict the price of our products");
        assert!(options.regression_only);
        assert!(!options.classification_only);
        assert!(!options.enable_monitoring);
    }

    #[test]
    fn test_parse_goal_classification() {
        let options = parse_goal("forecast the category of new items");
        assert!(options.classification_only);
        assert!(!options.regression_only);
    }

    #[test]
    fn test_parse_goal_monitoring() {
        let options = parse_goal("watch stock and alert me");
        assert!(options.enable_monitoring);
    }

    #[test]
    fn test_parse_goal_force_all() {
        let options = parse_goal("train everything you can");
        assert!(options.force_all);
        assert_eq!(options.min_confidence, 0.0);
    }

    #[test]
    fn test_parse_goal_plain_text_defaults() {
        let options = parse_goal("do something useful");
        assert!(!options.regression_only);
        assert!(!options.classification_only);
        assert!(!options.force_all);
        assert_eq!(options.min_confidence, 0.6);
    }

    #[test]
    fn test_parse_goal_money_wins_over_class() {
        // Both keyword families present; regression wins by order
        let options = parse_goal("predict price by category");
        assert!(options.regression_only);
        assert!(!options.classification_only);
    }
}
