//! Monitoring job executor
//!
//! Runs one configured job: windowed history per metric, rule evaluation,
//! a run row recording what happened. Per-metric failures are logged and
//! skipped; only failing to load the job itself fails the run. The
//! in-process `MonitoringTick` sweeps enabled jobs on an interval; the
//! production trigger (cron) stays external and calls the same entry
//! point.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::MonitoringConfig;
use crate::error::Result;
use crate::models::MonitoringJob;
use crate::monitoring::rules::RuleEngine;
use crate::services::store::{MonitoringStore, TimeSeriesStore};

/// Outcome of one job execution
#[derive(Debug, Clone)]
pub struct JobRunSummary {
    pub job_id: i64,
    pub metrics_checked: usize,
    pub anomalies_detected: usize,
}

pub struct MonitoringExecutor {
    monitoring_store: MonitoringStore,
    timeseries_store: TimeSeriesStore,
    rule_engine: Arc<RuleEngine>,
    config: MonitoringConfig,
}

impl MonitoringExecutor {
    pub fn new(
        monitoring_store: MonitoringStore,
        timeseries_store: TimeSeriesStore,
        rule_engine: Arc<RuleEngine>,
        config: MonitoringConfig,
    ) -> Self {
        Self { monitoring_store, timeseries_store, rule_engine, config }
    }

    /// Execute one monitoring job end to end
    pub async fn execute_monitoring_job(&self, job_id: i64) -> Result<JobRunSummary> {
        let job = self.monitoring_store.get_job(job_id).await?;
        let started_at = Utc::now();

        let mut metrics_checked = 0usize;
        let mut anomalies = 0usize;

        for metric_name in job.metric_names() {
            match self.check_metric(&job, &metric_name).await {
                Ok(Some(count)) => {
                    metrics_checked += 1;
                    anomalies += count;
                },
                Ok(None) => {
                    tracing::debug!(
                        "Job {}: metric '{}' has no recent points, skipping",
                        job_id,
                        metric_name
                    );
                },
                Err(e) => {
                    // One bad metric never takes down its siblings
                    tracing::error!(
                        "Job {}: metric '{}' evaluation failed: {}",
                        job_id,
                        metric_name,
                        e
                    );
                },
            }
        }

        let completed_at = Utc::now();
        self.monitoring_store
            .record_run(
                job_id,
                started_at,
                completed_at,
                "success",
                metrics_checked as i64,
                anomalies as i64,
            )
            .await?;
        self.monitoring_store
            .update_last_run(job_id, "success", anomalies as i64)
            .await?;

        tracing::info!(
            "Monitoring job {} checked {} metric(s), {} anomaly(ies)",
            job_id,
            metrics_checked,
            anomalies
        );

        Ok(JobRunSummary { job_id, metrics_checked, anomalies_detected: anomalies })
    }

    /// Evaluate one metric; `None` means there was nothing to evaluate
    async fn check_metric(&self, job: &MonitoringJob, metric_name: &str) -> Result<Option<usize>> {
        let end = Utc::now();
        let start = end - Duration::days(self.config.history_days);

        let series = self
            .timeseries_store
            .query_time_series(job.ontology_id, None, metric_name, start, end)
            .await?;

        let Some(current_value) = series.last_value() else {
            return Ok(None);
        };

        let events = self
            .rule_engine
            .evaluate_rules(job.ontology_id, None, metric_name, current_value, &series)
            .await?;

        if self.config.record_alerts {
            for event in &events {
                if let Err(e) = self.monitoring_store.insert_alert(event).await {
                    tracing::error!("Failed to record alert history: {}", e);
                }
            }
        }

        Ok(Some(events.len()))
    }
}

/// In-process trigger loop: sweeps every enabled job each tick until told
/// to stop
pub struct MonitoringTick {
    executor: Arc<MonitoringExecutor>,
    store: MonitoringStore,
    interval: std::time::Duration,
    shutdown: Arc<Notify>,
}

impl MonitoringTick {
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        store: MonitoringStore,
        interval: std::time::Duration,
    ) -> Self {
        Self { executor, store, interval, shutdown: Arc::new(Notify::new()) }
    }

    /// Handle the host uses to stop the loop; `notify_one` takes effect at
    /// the next select point even if the tick is mid-wait
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Tick until shutdown. Sweep failures are logged and the loop keeps
    /// going; the first tick fires immediately.
    pub async fn run(self) {
        tracing::info!("Monitoring tick started ({:?} interval)", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!("Monitoring sweep failed: {}", e);
                    }
                },
                _ = self.shutdown.notified() => {
                    tracing::info!("Monitoring tick stopped");
                    break;
                },
            }
        }
    }

    async fn sweep(&self) -> Result<()> {
        let jobs = self.store.list_enabled_jobs().await?;
        tracing::debug!("Monitoring sweep over {} enabled job(s)", jobs.len());
        for job in jobs {
            if let Err(e) = self.executor.execute_monitoring_job(job.id).await {
                tracing::error!("Monitoring job {} failed: {}", job.id, e);
            }
        }
        Ok(())
    }
}
