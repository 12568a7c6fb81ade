//! Time-series persistence
//!
//! Points are appended as they arrive; reads always return ascending
//! timestamp order, which the analyzers still re-check defensively.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{TimeSeries, TimeSeriesPoint};

pub struct TimeSeriesStore {
    pool: SqlitePool,
}

impl TimeSeriesStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append_point(
        &self,
        ontology_id: i64,
        entity_id: Option<&str>,
        metric_name: &str,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO time_series_data (ontology_id, entity_id, metric_name, timestamp, value)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(ontology_id)
        .bind(entity_id)
        .bind(metric_name)
        .bind(timestamp)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Points in `[start, end]`, ascending. `entity_id = None` selects the
    /// ontology-level series.
    pub async fn query_time_series(
        &self,
        ontology_id: i64,
        entity_id: Option<&str>,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeries> {
        let points = match entity_id {
            Some(entity_id) => {
                sqlx::query_as::<_, TimeSeriesPoint>(
                    r#"SELECT timestamp, value FROM time_series_data
                       WHERE ontology_id = ? AND entity_id = ? AND metric_name = ?
                         AND timestamp >= ? AND timestamp <= ?
                       ORDER BY timestamp ASC"#,
                )
                .bind(ontology_id)
                .bind(entity_id)
                .bind(metric_name)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, TimeSeriesPoint>(
                    r#"SELECT timestamp, value FROM time_series_data
                       WHERE ontology_id = ? AND entity_id IS NULL AND metric_name = ?
                         AND timestamp >= ? AND timestamp <= ?
                       ORDER BY timestamp ASC"#,
                )
                .bind(ontology_id)
                .bind(metric_name)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            },
        };

        Ok(TimeSeries {
            entity_id: entity_id.map(|s| s.to_string()),
            metric_name: metric_name.to_string(),
            points,
            metadata: serde_json::Value::Null,
        })
    }

    /// Distinct metric names recorded for an ontology
    pub async fn list_metrics(&self, ontology_id: i64) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT metric_name FROM time_series_data WHERE ontology_id = ? ORDER BY metric_name",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
