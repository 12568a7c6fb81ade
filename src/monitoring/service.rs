//! Monitoring bootstrap
//!
//! Turns the analyzer's rule suggestions into persisted monitoring
//! configuration: one rule row per suggestion and one job per ontology
//! covering every suggested time-series metric.

use crate::analyzer::MlCapabilities;
use crate::error::Result;
use crate::models::MonitoringJob;
use crate::services::store::{MonitoringStore, NewMonitoringJob, NewRule};

/// Default schedule for bootstrapped jobs: hourly
const DEFAULT_CRON: &str = "0 * * * *";

pub struct MonitoringService {
    store: MonitoringStore,
}

impl MonitoringService {
    pub fn new(store: MonitoringStore) -> Self {
        Self { store }
    }

    /// Persist the suggested rules and create the ontology's monitoring
    /// job. Returns `None` when there is nothing worth monitoring.
    pub async fn bootstrap_monitoring(
        &self,
        ontology_id: i64,
        ontology_name: &str,
        capabilities: &MlCapabilities,
    ) -> Result<Option<MonitoringJob>> {
        if capabilities.time_series_metrics.is_empty() {
            return Ok(None);
        }

        let mut rule_ids = Vec::with_capacity(capabilities.monitoring_rules.len());
        for suggestion in &capabilities.monitoring_rules {
            let rule = self
                .store
                .create_rule(NewRule {
                    ontology_id,
                    entity_id: None,
                    metric_name: suggestion.metric_name.clone(),
                    rule_type: suggestion.rule_type.clone(),
                    condition: suggestion.condition.clone(),
                    severity: suggestion.severity.clone(),
                    alert_channels: Vec::new(),
                })
                .await?;
            rule_ids.push(rule.id);
        }

        let metrics: Vec<String> = capabilities
            .time_series_metrics
            .iter()
            .map(|m| m.metric_name.clone())
            .collect();

        let job = self
            .store
            .create_job(NewMonitoringJob {
                name: format!("{} monitoring", ontology_name),
                ontology_id,
                description: format!(
                    "Auto-created monitoring for {} metric(s)",
                    metrics.len()
                ),
                cron_expr: DEFAULT_CRON.to_string(),
                metrics,
                rule_ids,
            })
            .await?;

        tracing::info!(
            "Bootstrapped monitoring job {} for ontology {} with {} rule(s)",
            job.id,
            ontology_id,
            capabilities.monitoring_rules.len()
        );
        Ok(Some(job))
    }
}
