//! Monitoring rule, job, run and alert persistence

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{PlatformError, Result};
use crate::models::{AnomalyEvent, MonitoringAlert, MonitoringJob, MonitoringJobRun, MonitoringRule};

/// New-rule parameters
#[derive(Debug, Clone)]
pub struct NewRule {
    pub ontology_id: i64,
    pub entity_id: Option<String>,
    pub metric_name: String,
    pub rule_type: String,
    pub condition: serde_json::Value,
    pub severity: String,
    pub alert_channels: Vec<String>,
}

/// New-job parameters
#[derive(Debug, Clone)]
pub struct NewMonitoringJob {
    pub name: String,
    pub ontology_id: i64,
    pub description: String,
    pub cron_expr: String,
    pub metrics: Vec<String>,
    pub rule_ids: Vec<i64>,
}

pub struct MonitoringStore {
    pool: SqlitePool,
}

impl MonitoringStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    pub async fn create_rule(&self, new: NewRule) -> Result<MonitoringRule> {
        let result = sqlx::query(
            r#"INSERT INTO monitoring_rules
               (ontology_id, entity_id, metric_name, rule_type, condition, severity, alert_channels)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new.ontology_id)
        .bind(&new.entity_id)
        .bind(&new.metric_name)
        .bind(&new.rule_type)
        .bind(serde_json::to_string(&new.condition)?)
        .bind(&new.severity)
        .bind(serde_json::to_string(&new.alert_channels)?)
        .execute(&self.pool)
        .await?;

        self.get_rule(result.last_insert_rowid()).await
    }

    pub async fn get_rule(&self, id: i64) -> Result<MonitoringRule> {
        sqlx::query_as::<_, MonitoringRule>("SELECT * FROM monitoring_rules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlatformError::NotFound("monitoring rule", id.to_string()))
    }

    /// Enabled rules matching a metric. Rules without an entity scope apply
    /// to every entity; entity-scoped rules only to their own.
    pub async fn get_monitoring_rules(
        &self,
        ontology_id: i64,
        entity_id: Option<&str>,
        metric_name: &str,
    ) -> Result<Vec<MonitoringRule>> {
        let rows = match entity_id {
            Some(entity_id) => {
                sqlx::query_as::<_, MonitoringRule>(
                    r#"SELECT * FROM monitoring_rules
                       WHERE ontology_id = ? AND metric_name = ? AND is_enabled = 1
                         AND (entity_id IS NULL OR entity_id = ?)
                       ORDER BY id ASC"#,
                )
                .bind(ontology_id)
                .bind(metric_name)
                .bind(entity_id)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, MonitoringRule>(
                    r#"SELECT * FROM monitoring_rules
                       WHERE ontology_id = ? AND metric_name = ? AND is_enabled = 1
                         AND entity_id IS NULL
                       ORDER BY id ASC"#,
                )
                .bind(ontology_id)
                .bind(metric_name)
                .fetch_all(&self.pool)
                .await?
            },
        };
        Ok(rows)
    }

    pub async fn list_rules(&self, ontology_id: i64) -> Result<Vec<MonitoringRule>> {
        Ok(sqlx::query_as::<_, MonitoringRule>(
            "SELECT * FROM monitoring_rules WHERE ontology_id = ? ORDER BY id ASC",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn set_rule_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let result = sqlx::query("UPDATE monitoring_rules SET is_enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("monitoring rule", id.to_string()));
        }
        Ok(())
    }

    pub async fn delete_rule(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM monitoring_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("monitoring rule", id.to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    pub async fn create_job(&self, new: NewMonitoringJob) -> Result<MonitoringJob> {
        let result = sqlx::query(
            r#"INSERT INTO monitoring_jobs (name, ontology_id, description, cron_expr, metrics, rules)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&new.name)
        .bind(new.ontology_id)
        .bind(&new.description)
        .bind(&new.cron_expr)
        .bind(serde_json::to_string(&new.metrics)?)
        .bind(serde_json::to_string(&new.rule_ids)?)
        .execute(&self.pool)
        .await?;

        self.get_job(result.last_insert_rowid()).await
    }

    pub async fn get_job(&self, id: i64) -> Result<MonitoringJob> {
        sqlx::query_as::<_, MonitoringJob>("SELECT * FROM monitoring_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlatformError::NotFound("monitoring job", id.to_string()))
    }

    pub async fn list_enabled_jobs(&self) -> Result<Vec<MonitoringJob>> {
        Ok(sqlx::query_as::<_, MonitoringJob>(
            "SELECT * FROM monitoring_jobs WHERE is_enabled = 1 ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list_jobs(&self, ontology_id: i64) -> Result<Vec<MonitoringJob>> {
        Ok(sqlx::query_as::<_, MonitoringJob>(
            "SELECT * FROM monitoring_jobs WHERE ontology_id = ? ORDER BY id ASC",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn update_last_run(&self, id: i64, status: &str, alerts: i64) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE monitoring_jobs SET
               last_run_status = ?, last_run_alerts = ?, updated_at = CURRENT_TIMESTAMP
               WHERE id = ?"#,
        )
        .bind(status)
        .bind(alerts)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("monitoring job", id.to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Runs and alert history
    // ------------------------------------------------------------------

    pub async fn record_run(
        &self,
        job_id: i64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        status: &str,
        metrics_checked: i64,
        alerts_created: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"INSERT INTO monitoring_job_runs
               (job_id, started_at, completed_at, status, metrics_checked, alerts_created)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(job_id)
        .bind(started_at)
        .bind(completed_at)
        .bind(status)
        .bind(metrics_checked)
        .bind(alerts_created)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_runs(&self, job_id: i64) -> Result<Vec<MonitoringJobRun>> {
        Ok(sqlx::query_as::<_, MonitoringJobRun>(
            "SELECT * FROM monitoring_job_runs WHERE job_id = ? ORDER BY started_at DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn insert_alert(&self, event: &AnomalyEvent) -> Result<i64> {
        let result = sqlx::query(
            r#"INSERT INTO monitoring_alerts
               (ontology_id, entity_id, metric_name, alert_type, severity, message, value, threshold)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.ontology_id)
        .bind(&event.entity_id)
        .bind(&event.metric_name)
        .bind(&event.alert_type)
        .bind(&event.severity)
        .bind(&event.message)
        .bind(event.value)
        .bind(event.threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_alerts(&self, ontology_id: i64, limit: i64) -> Result<Vec<MonitoringAlert>> {
        Ok(sqlx::query_as::<_, MonitoringAlert>(
            r#"SELECT * FROM monitoring_alerts WHERE ontology_id = ?
               ORDER BY created_at DESC LIMIT ?"#,
        )
        .bind(ontology_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
