//! Extraction job and entity persistence

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::models::{ExtractedEntity, ExtractedEntityRow, ExtractionJob, JobStatus};

/// New-job parameters
#[derive(Debug, Clone)]
pub struct NewExtractionJob {
    pub ontology_id: i64,
    pub pipeline_id: Option<String>,
    pub job_name: String,
    pub extraction_type: String,
    pub source_type: String,
    pub source_path: Option<String>,
}

pub struct ExtractionStore {
    pool: SqlitePool,
}

impl ExtractionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a job row in `pending` state and return it
    pub async fn create_job(&self, new: NewExtractionJob) -> Result<ExtractionJob> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"INSERT INTO extraction_jobs
               (id, ontology_id, pipeline_id, job_name, status, extraction_type, source_type, source_path)
               VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(new.ontology_id)
        .bind(&new.pipeline_id)
        .bind(&new.job_name)
        .bind(&new.extraction_type)
        .bind(&new.source_type)
        .bind(&new.source_path)
        .execute(&self.pool)
        .await?;

        self.get_job(&id).await
    }

    pub async fn get_job(&self, id: &str) -> Result<ExtractionJob> {
        sqlx::query_as::<_, ExtractionJob>("SELECT * FROM extraction_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlatformError::NotFound("extraction job", id.to_string()))
    }

    pub async fn list_jobs(&self, ontology_id: i64) -> Result<Vec<ExtractionJob>> {
        Ok(sqlx::query_as::<_, ExtractionJob>(
            "SELECT * FROM extraction_jobs WHERE ontology_id = ? ORDER BY created_at DESC",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Move a job to `running` and stamp `started_at`
    pub async fn mark_running(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE extraction_jobs SET status = 'running', started_at = CURRENT_TIMESTAMP
               WHERE id = ? AND status = 'pending'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("extraction job", id.to_string()));
        }
        Ok(())
    }

    /// Terminal success: record counts and stamp `completed_at`
    pub async fn mark_completed(&self, id: &str, entities: i64, triples: i64) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE extraction_jobs SET
               status = 'completed', completed_at = CURRENT_TIMESTAMP,
               entities_extracted = ?, triples_generated = ?
               WHERE id = ?"#,
        )
        .bind(entities)
        .bind(triples)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("extraction job", id.to_string()));
        }
        Ok(())
    }

    /// Terminal failure: record the message and stamp `completed_at`
    pub async fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE extraction_jobs SET
               status = 'failed', completed_at = CURRENT_TIMESTAMP, error_message = ?
               WHERE id = ?"#,
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("extraction job", id.to_string()));
        }
        Ok(())
    }

    pub async fn job_status(&self, id: &str) -> Result<Option<JobStatus>> {
        let job = self.get_job(id).await?;
        Ok(match job.status.as_str() {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        })
    }

    pub async fn insert_entity(&self, job_id: &str, entity: &ExtractedEntity) -> Result<i64> {
        let result = sqlx::query(
            r#"INSERT INTO extracted_entities
               (job_id, entity_uri, entity_type, entity_label, confidence, source_text, properties)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(job_id)
        .bind(&entity.uri)
        .bind(&entity.type_uri)
        .bind(&entity.label)
        .bind(entity.confidence)
        .bind(&entity.source_text)
        .bind(serde_json::to_string(&entity.properties)?)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_entities(&self, job_id: &str) -> Result<Vec<ExtractedEntityRow>> {
        Ok(sqlx::query_as::<_, ExtractedEntityRow>(
            "SELECT * FROM extracted_entities WHERE job_id = ? ORDER BY id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Entity count across all jobs of an ontology; the analyzer's
    /// `total_data_points` input
    pub async fn count_entities(&self, ontology_id: i64) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM extracted_entities e
               JOIN extraction_jobs j ON j.id = e.job_id
               WHERE j.ontology_id = ?"#,
        )
        .bind(ontology_id)
        .fetch_one(&self.pool)
        .await?)
    }
}
