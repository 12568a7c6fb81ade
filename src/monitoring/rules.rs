//! Rule engine
//!
//! One condition JSON per rule, one key per condition. Threshold rules
//! compare the current value, trend rules look back through the analyzer,
//! anomaly rules check whether the newest z-score outlier is the value
//! being evaluated. Firing rules publish `anomaly.detected` events in rule
//! order.

use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::events::EventBus;
use crate::models::{AnomalyEvent, MonitoringRule, RuleType, TimeSeries};
use crate::services::store::MonitoringStore;
use crate::timeseries::{AnomalyMethod, TimeSeriesAnalyzer};

/// Trend rules need this much history
const MIN_TREND_POINTS: usize = 3;
/// Anomaly rules need this much history
const MIN_ANOMALY_POINTS: usize = 5;
/// Default z-score threshold when the condition omits one
const DEFAULT_Z_THRESHOLD: f64 = 3.0;
/// Default trend lookback when the condition omits a window
const DEFAULT_TREND_WINDOW_DAYS: i64 = 30;
/// The newest anomaly must be within this fraction of the current value
const ANOMALY_VALUE_TOLERANCE: f64 = 0.01;

/// Parsed rule condition dialect. Exactly one operator key is meaningful
/// per rule; the rest stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleCondition {
    #[serde(rename = "<")]
    pub lt: Option<f64>,
    #[serde(rename = ">")]
    pub gt: Option<f64>,
    #[serde(rename = "<=")]
    pub le: Option<f64>,
    #[serde(rename = ">=")]
    pub ge: Option<f64>,
    /// Fires when the value is OUTSIDE this inclusive range
    pub between: Option<[f64; 2]>,
    pub change_percent: Option<f64>,
    /// "increasing" or "decreasing"; absent matches either
    pub direction: Option<String>,
    pub window_minutes: Option<f64>,
    pub z_score: Option<f64>,
}

impl RuleCondition {
    fn parse(rule: &MonitoringRule) -> Result<Self> {
        serde_json::from_str(&rule.condition).map_err(|e| {
            PlatformError::Validation(format!(
                "rule {} has a malformed condition: {}",
                rule.id, e
            ))
        })
    }

    fn window_days(&self) -> i64 {
        match self.window_minutes {
            Some(minutes) if minutes > 0.0 => ((minutes / (60.0 * 24.0)).round() as i64).max(1),
            _ => DEFAULT_TREND_WINDOW_DAYS,
        }
    }
}

pub struct RuleEngine {
    store: MonitoringStore,
    analyzer: TimeSeriesAnalyzer,
    bus: EventBus,
}

impl RuleEngine {
    pub fn new(store: MonitoringStore, analyzer: TimeSeriesAnalyzer, bus: EventBus) -> Self {
        Self { store, analyzer, bus }
    }

    /// Evaluate every enabled rule for the metric and publish one event per
    /// firing rule, in rule order. Returns the published events.
    pub async fn evaluate_rules(
        &self,
        ontology_id: i64,
        entity_id: Option<&str>,
        metric_name: &str,
        current_value: f64,
        series: &TimeSeries,
    ) -> Result<Vec<AnomalyEvent>> {
        let rules = self
            .store
            .get_monitoring_rules(ontology_id, entity_id, metric_name)
            .await?;

        let mut events = Vec::new();
        for rule in &rules {
            if let Some(event) = self.evaluate_rule(rule, current_value, series)? {
                tracing::info!(
                    "Rule {} fired on {} (value {}): {}",
                    rule.id,
                    metric_name,
                    current_value,
                    event.message
                );
                self.bus.publish_anomaly("rule_engine", &event);
                events.push(event);
            }
        }

        Ok(events)
    }

    fn evaluate_rule(
        &self,
        rule: &MonitoringRule,
        current_value: f64,
        series: &TimeSeries,
    ) -> Result<Option<AnomalyEvent>> {
        let condition = RuleCondition::parse(rule)?;
        let rule_type = rule.rule_type().ok_or_else(|| {
            PlatformError::Validation(format!(
                "rule {} has unknown type '{}'",
                rule.id, rule.rule_type
            ))
        })?;

        let fired = match rule_type {
            RuleType::Threshold => evaluate_threshold(&condition, current_value),
            RuleType::Trend => self.evaluate_trend(&condition, series)?,
            RuleType::Anomaly => self.evaluate_anomaly(&condition, current_value, series),
        };

        Ok(fired.map(|(message, threshold)| AnomalyEvent {
            ontology_id: rule.ontology_id,
            entity_id: rule.entity_id.clone(),
            metric_name: rule.metric_name.clone(),
            alert_type: rule.rule_type.clone(),
            severity: rule.severity.clone(),
            message,
            value: current_value,
            threshold,
        }))
    }

    fn evaluate_trend(
        &self,
        condition: &RuleCondition,
        series: &TimeSeries,
    ) -> Result<Option<(String, Option<f64>)>> {
        if series.points.len() < MIN_TREND_POINTS {
            return Ok(None);
        }
        let Some(change_threshold) = condition.change_percent else {
            return Err(PlatformError::Validation(
                "trend rule condition is missing 'change_percent'".to_string(),
            ));
        };

        let trend = self.analyzer.detect_trend(series, condition.window_days())?;

        let direction_matches = match condition.direction.as_deref() {
            Some(wanted) => trend.direction.as_str() == wanted,
            None => matches!(
                trend.direction,
                crate::timeseries::TrendDirection::Increasing
                    | crate::timeseries::TrendDirection::Decreasing
            ),
        };

        if direction_matches && trend.percent_change.abs() >= change_threshold {
            return Ok(Some((
                format!(
                    "{} trend of {:.1}% over {} days exceeds {:.1}%",
                    trend.direction.as_str(),
                    trend.percent_change,
                    condition.window_days(),
                    change_threshold
                ),
                Some(change_threshold),
            )));
        }
        Ok(None)
    }

    fn evaluate_anomaly(
        &self,
        condition: &RuleCondition,
        current_value: f64,
        series: &TimeSeries,
    ) -> Option<(String, Option<f64>)> {
        if series.points.len() < MIN_ANOMALY_POINTS {
            return None;
        }
        let threshold = condition.z_score.unwrap_or(DEFAULT_Z_THRESHOLD);
        let anomalies = self
            .analyzer
            .detect_anomalies(series, AnomalyMethod::ZScore { threshold });

        let newest = anomalies.last()?;
        let tolerance = current_value.abs().max(f64::EPSILON) * ANOMALY_VALUE_TOLERANCE;
        if (newest.value - current_value).abs() <= tolerance
            && newest.deviation.abs() >= threshold
        {
            return Some((
                format!(
                    "value {:.3} deviates {:.2} sigma from the mean {:.3}",
                    newest.value, newest.deviation, newest.expected
                ),
                Some(threshold),
            ));
        }
        None
    }
}

/// Threshold comparison; the condition key names the alarming region
fn evaluate_threshold(
    condition: &RuleCondition,
    current_value: f64,
) -> Option<(String, Option<f64>)> {
    if let Some(bound) = condition.lt
        && current_value < bound
    {
        return Some((format!("value {} is below {}", current_value, bound), Some(bound)));
    }
    if let Some(bound) = condition.gt
        && current_value > bound
    {
        return Some((format!("value {} is above {}", current_value, bound), Some(bound)));
    }
    if let Some(bound) = condition.le
        && current_value <= bound
    {
        return Some((format!("value {} is at or below {}", current_value, bound), Some(bound)));
    }
    if let Some(bound) = condition.ge
        && current_value >= bound
    {
        return Some((format!("value {} is at or above {}", current_value, bound), Some(bound)));
    }
    if let Some([low, high]) = condition.between
        && (current_value < low || current_value > high)
    {
        return Some((
            format!("value {} is outside [{}, {}]", current_value, low, high),
            Some(if current_value < low { low } else { high }),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(json: &str) -> RuleCondition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_threshold_less_than() {
        let c = condition(r#"{"<": 5}"#);
        assert!(evaluate_threshold(&c, 3.0).is_some());
        assert!(evaluate_threshold(&c, 5.0).is_none());
        assert!(evaluate_threshold(&c, 7.0).is_none());
    }

    #[test]
    fn test_threshold_operators() {
        assert!(evaluate_threshold(&condition(r#"{">": 10}"#), 11.0).is_some());
        assert!(evaluate_threshold(&condition(r#"{">": 10}"#), 10.0).is_none());
        assert!(evaluate_threshold(&condition(r#"{"<=": 10}"#), 10.0).is_some());
        assert!(evaluate_threshold(&condition(r#"{">=": 10}"#), 10.0).is_some());
    }

    #[test]
    fn test_threshold_between_fires_outside() {
        let c = condition(r#"{"between": [10, 20]}"#);
        assert!(evaluate_threshold(&c, 5.0).is_some());
        assert!(evaluate_threshold(&c, 25.0).is_some());
        assert!(evaluate_threshold(&c, 10.0).is_none());
        assert!(evaluate_threshold(&c, 15.0).is_none());
        assert!(evaluate_threshold(&c, 20.0).is_none());
    }

    #[test]
    fn test_threshold_event_carries_bound() {
        let c = condition(r#"{"<": 5}"#);
        let (message, threshold) = evaluate_threshold(&c, 3.0).unwrap();
        assert_eq!(threshold, Some(5.0));
        assert!(message.contains("below 5"));
    }

    #[test]
    fn test_condition_window_days() {
        assert_eq!(condition(r#"{"change_percent": 10}"#).window_days(), 30);
        assert_eq!(
            condition(r#"{"change_percent": 10, "window_minutes": 1440}"#).window_days(),
            1
        );
        assert_eq!(
            condition(r#"{"change_percent": 10, "window_minutes": 14400}"#).window_days(),
            10
        );
    }

    #[test]
    fn test_malformed_condition_is_error() {
        let rule = MonitoringRule {
            id: 9,
            ontology_id: 1,
            entity_id: None,
            metric_name: "m".to_string(),
            rule_type: "threshold".to_string(),
            condition: "{not json".to_string(),
            severity: "high".to_string(),
            is_enabled: true,
            alert_channels: "[]".to_string(),
            created_at: chrono::Utc::now(),
        };
        let err = RuleCondition::parse(&rule).unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
        assert!(err.to_string().contains("rule 9"));
    }
}
