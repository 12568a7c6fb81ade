//! Trained model registry persistence
//!
//! The serialized model lives on disk under `models_dir`; the row carries
//! metrics and metadata. Inserting a model for a target deactivates older
//! models for the same target (newest wins).

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::models::ClassifierModel;

/// New-model parameters, produced by the auto-trainer
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub ontology_id: i64,
    pub target_class: String,
    pub algorithm: String,
    pub hyperparameters: serde_json::Value,
    pub feature_columns: Vec<String>,
    pub class_labels: Option<Vec<String>>,
    pub train_accuracy: Option<f64>,
    pub validate_accuracy: Option<f64>,
    pub precision_score: Option<f64>,
    pub recall_score: Option<f64>,
    pub f1_score: Option<f64>,
    pub confusion_matrix: Option<serde_json::Value>,
    pub model_artifact_path: String,
    pub model_size_bytes: i64,
    pub training_rows: i64,
    pub validation_rows: i64,
    pub feature_importance: serde_json::Value,
}

pub struct ModelStore {
    pool: SqlitePool,
}

impl ModelStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_model(&self, new: NewModel) -> Result<ClassifierModel> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE classifier_models SET is_active = 0 WHERE ontology_id = ? AND target_class = ?",
        )
        .bind(new.ontology_id)
        .bind(&new.target_class)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO classifier_models
               (id, name, ontology_id, target_class, algorithm, hyperparameters, feature_columns,
                class_labels, train_accuracy, validate_accuracy, precision_score, recall_score,
                f1_score, confusion_matrix, model_artifact_path, model_size_bytes,
                training_rows, validation_rows, feature_importance, is_active)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.ontology_id)
        .bind(&new.target_class)
        .bind(&new.algorithm)
        .bind(serde_json::to_string(&new.hyperparameters)?)
        .bind(serde_json::to_string(&new.feature_columns)?)
        .bind(match &new.class_labels {
            Some(labels) => Some(serde_json::to_string(labels)?),
            None => None,
        })
        .bind(new.train_accuracy)
        .bind(new.validate_accuracy)
        .bind(new.precision_score)
        .bind(new.recall_score)
        .bind(new.f1_score)
        .bind(match &new.confusion_matrix {
            Some(m) => Some(serde_json::to_string(m)?),
            None => None,
        })
        .bind(&new.model_artifact_path)
        .bind(new.model_size_bytes)
        .bind(new.training_rows)
        .bind(new.validation_rows)
        .bind(serde_json::to_string(&new.feature_importance)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_model(&id).await
    }

    pub async fn get_model(&self, id: &str) -> Result<ClassifierModel> {
        sqlx::query_as::<_, ClassifierModel>("SELECT * FROM classifier_models WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlatformError::NotFound("model", id.to_string()))
    }

    pub async fn list_models(&self, ontology_id: i64) -> Result<Vec<ClassifierModel>> {
        Ok(sqlx::query_as::<_, ClassifierModel>(
            "SELECT * FROM classifier_models WHERE ontology_id = ? ORDER BY created_at DESC",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The active model for a target property, if any
    pub async fn get_active_model(
        &self,
        ontology_id: i64,
        target_class: &str,
    ) -> Result<Option<ClassifierModel>> {
        Ok(sqlx::query_as::<_, ClassifierModel>(
            r#"SELECT * FROM classifier_models
               WHERE ontology_id = ? AND target_class = ? AND is_active = 1
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(ontology_id)
        .bind(target_class)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn delete_model(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM classifier_models WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("model", id.to_string()));
        }
        Ok(())
    }
}
