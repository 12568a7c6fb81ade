//! Monitoring configuration rows, time-series and anomaly events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Rule families the engine evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Threshold,
    Trend,
    Anomaly,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Trend => "trend",
            Self::Anomaly => "anomaly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "threshold" => Some(Self::Threshold),
            "trend" => Some(Self::Trend),
            "anomaly" => Some(Self::Anomaly),
            _ => None,
        }
    }
}

/// Alert severity, ordered lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Monitoring rule row; `condition` is the rule dialect JSON
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonitoringRule {
    pub id: i64,
    pub ontology_id: i64,
    pub entity_id: Option<String>,
    pub metric_name: String,
    pub rule_type: String,
    pub condition: String,
    pub severity: String,
    pub is_enabled: bool,
    pub alert_channels: String,
    pub created_at: DateTime<Utc>,
}

impl MonitoringRule {
    pub fn rule_type(&self) -> Option<RuleType> {
        RuleType::parse(&self.rule_type)
    }

    pub fn severity(&self) -> Severity {
        Severity::parse(&self.severity).unwrap_or(Severity::Medium)
    }
}

/// Monitoring job row; `metrics` and `rules` are JSON arrays
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonitoringJob {
    pub id: i64,
    pub name: String,
    pub ontology_id: i64,
    pub description: String,
    pub cron_expr: String,
    pub metrics: String,
    pub rules: String,
    pub is_enabled: bool,
    pub last_run_status: Option<String>,
    pub last_run_alerts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoringJob {
    pub fn metric_names(&self) -> Vec<String> {
        serde_json::from_str(&self.metrics).unwrap_or_default()
    }

    pub fn rule_ids(&self) -> Vec<i64> {
        serde_json::from_str(&self.rules).unwrap_or_default()
    }
}

/// One recorded execution of a monitoring job
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonitoringJobRun {
    pub id: i64,
    pub job_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub metrics_checked: i64,
    pub alerts_created: i64,
}

/// Alert history row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MonitoringAlert {
    pub id: i64,
    pub ontology_id: i64,
    pub entity_id: Option<String>,
    pub metric_name: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub value: f64,
    pub threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// One (timestamp, value) observation of a metric
#[derive(Debug, Clone, Copy, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A metric's history, optionally scoped to one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub entity_id: Option<String>,
    pub metric_name: String,
    /// Ordered ascending by timestamp when produced by storage; analyzers
    /// re-sort defensively before use
    pub points: Vec<TimeSeriesPoint>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl TimeSeries {
    pub fn new(metric_name: impl Into<String>, points: Vec<TimeSeriesPoint>) -> Self {
        Self {
            entity_id: None,
            metric_name: metric_name.into(),
            points,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

/// Payload of an `anomaly.detected` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub ontology_id: i64,
    pub entity_id: Option<String>,
    pub metric_name: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub value: f64,
    pub threshold: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_job_metric_parsing() {
        let job = MonitoringJob {
            id: 1,
            name: "hourly".to_string(),
            ontology_id: 1,
            description: String::new(),
            cron_expr: "0 * * * *".to_string(),
            metrics: r#"["stock_level","price"]"#.to_string(),
            rules: "[3,7]".to_string(),
            is_enabled: true,
            last_run_status: None,
            last_run_alerts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(job.metric_names(), vec!["stock_level", "price"]);
        assert_eq!(job.rule_ids(), vec![3, 7]);
    }
}
