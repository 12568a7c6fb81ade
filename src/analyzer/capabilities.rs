//! ML capability inference
//!
//! Property ranges decide the model family: XSD numerics become regression
//! targets, strings/booleans/object ranges become classification targets.
//! Label keywords mark the numeric ones that behave like time-series
//! metrics worth monitoring.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ModelType, OntologyProperty, PropertyKind};
use crate::services::store::{ExtractionStore, OntologyStore};
use crate::utils::normalize_field_name;

/// Labels that smell like a continuously sampled metric
const TIME_SERIES_KEYWORDS: [&str; 17] = [
    "stock", "level", "quantity", "count", "amount", "price", "cost", "value", "revenue",
    "sales", "rate", "speed", "throughput", "latency", "usage", "utilization", "capacity",
];

/// Labels that boost confidence that a model over this property is useful
const CONFIDENCE_KEYWORDS: [&str; 16] = [
    "price", "cost", "revenue", "sales", "profit", "quantity", "amount", "total", "value",
    "rating", "score", "rank", "category", "class", "type", "status",
];

/// Confidence never exceeds this, the data may still disagree
const CONFIDENCE_CAP: f64 = 0.95;

/// One trainable target and its suggested feature set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlTarget {
    pub property_uri: String,
    pub property_label: String,
    pub model_type: ModelType,
    /// URIs of properties sharing a domain with the target
    pub suggested_features: Vec<String>,
    pub confidence: f64,
}

/// A numeric property that reads as a monitorable metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesMetric {
    pub property_uri: String,
    pub property_label: String,
    /// Normalized label, the name time-series points are recorded under
    pub metric_name: String,
}

/// Rule template the analyzer proposes for a metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedRule {
    pub metric_name: String,
    pub rule_type: String,
    pub condition: serde_json::Value,
    pub severity: String,
    pub description: String,
}

/// Everything the analyzer learned about an ontology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlCapabilities {
    pub regression_targets: Vec<MlTarget>,
    pub classification_targets: Vec<MlTarget>,
    pub time_series_metrics: Vec<TimeSeriesMetric>,
    pub monitoring_rules: Vec<SuggestedRule>,
    pub summary: String,
    pub total_data_points: i64,
}

pub struct OntologyAnalyzer {
    ontology_store: OntologyStore,
    extraction_store: ExtractionStore,
}

impl OntologyAnalyzer {
    pub fn new(ontology_store: OntologyStore, extraction_store: ExtractionStore) -> Self {
        Self { ontology_store, extraction_store }
    }

    pub async fn analyze_capabilities(&self, ontology_id: i64) -> Result<MlCapabilities> {
        let properties = self.ontology_store.get_ontology_properties(ontology_id).await?;
        let total_data_points = self.extraction_store.count_entities(ontology_id).await?;

        let capabilities = analyze_properties(&properties, total_data_points);
        tracing::info!(
            "Ontology {}: {} regression targets, {} classification targets, {} time-series metrics",
            ontology_id,
            capabilities.regression_targets.len(),
            capabilities.classification_targets.len(),
            capabilities.time_series_metrics.len()
        );
        Ok(capabilities)
    }
}

/// Pure capability analysis over a property list
pub fn analyze_properties(
    properties: &[OntologyProperty],
    total_data_points: i64,
) -> MlCapabilities {
    let mut capabilities = MlCapabilities {
        regression_targets: Vec::new(),
        classification_targets: Vec::new(),
        time_series_metrics: Vec::new(),
        monitoring_rules: Vec::new(),
        summary: String::new(),
        total_data_points,
    };

    for property in properties {
        if property.kind() == PropertyKind::Annotation || property.deprecated {
            continue;
        }

        let features = suggested_features(property, properties);

        if property.has_numeric_range() {
            let confidence = target_confidence(property, total_data_points, features.len());
            capabilities.regression_targets.push(MlTarget {
                property_uri: property.uri.clone(),
                property_label: property.label.clone(),
                model_type: ModelType::Regression,
                suggested_features: features,
                confidence,
            });

            let label_lower = property.label.to_lowercase();
            if TIME_SERIES_KEYWORDS.iter().any(|k| label_lower.contains(k)) {
                let metric_name = normalize_field_name(&property.label);
                capabilities
                    .monitoring_rules
                    .extend(suggest_rules(&metric_name, &label_lower));
                capabilities.time_series_metrics.push(TimeSeriesMetric {
                    property_uri: property.uri.clone(),
                    property_label: property.label.clone(),
                    metric_name,
                });
            }
        } else if property.has_categorical_range() {
            let confidence = target_confidence(property, total_data_points, features.len());
            capabilities.classification_targets.push(MlTarget {
                property_uri: property.uri.clone(),
                property_label: property.label.clone(),
                model_type: ModelType::Classification,
                suggested_features: features,
                confidence,
            });
        }
    }

    capabilities.summary = format!(
        "{} regression target(s), {} classification target(s), {} time-series metric(s) over {} data points",
        capabilities.regression_targets.len(),
        capabilities.classification_targets.len(),
        capabilities.time_series_metrics.len(),
        total_data_points
    );
    capabilities
}

/// Features for a target: every other non-annotation property whose domain
/// overlaps. Empty domains overlap with anything.
fn suggested_features(
    target: &OntologyProperty,
    properties: &[OntologyProperty],
) -> Vec<String> {
    let target_domains = target.domain_uris();

    properties
        .iter()
        .filter(|p| p.uri != target.uri)
        .filter(|p| p.kind() != PropertyKind::Annotation && !p.deprecated)
        .filter(|p| {
            let domains = p.domain_uris();
            domains.is_empty()
                || target_domains.is_empty()
                || domains.iter().any(|d| target_domains.contains(d))
        })
        .map(|p| p.uri.clone())
        .collect()
}

/// Heuristic confidence: data volume, feature availability and a label that
/// names a business quantity all add up, capped below certainty.
fn target_confidence(
    property: &OntologyProperty,
    total_data_points: i64,
    feature_count: usize,
) -> f64 {
    let mut confidence: f64 = 0.5;

    if total_data_points > 100 {
        confidence += 0.1;
    }
    if total_data_points > 500 {
        confidence += 0.1;
    }
    if total_data_points > 1000 {
        confidence += 0.05;
    }

    if feature_count >= 3 {
        confidence += 0.1;
    }
    if feature_count >= 5 {
        confidence += 0.05;
    }

    let label_lower = property.label.to_lowercase();
    if CONFIDENCE_KEYWORDS.iter().any(|k| label_lower.contains(k)) {
        confidence += 0.1;
    }

    confidence.min(CONFIDENCE_CAP)
}

/// Default rule templates for a numeric monitoring candidate
fn suggest_rules(metric_name: &str, label_lower: &str) -> Vec<SuggestedRule> {
    let mut rules = Vec::new();

    if ["stock", "inventory", "level"].iter().any(|k| label_lower.contains(k)) {
        rules.push(SuggestedRule {
            metric_name: metric_name.to_string(),
            rule_type: "threshold".to_string(),
            condition: serde_json::json!({"<": 5}),
            severity: "high".to_string(),
            description: format!("Alert when {} drops below 5", metric_name),
        });
    }

    if ["price", "cost"].iter().any(|k| label_lower.contains(k)) {
        rules.push(SuggestedRule {
            metric_name: metric_name.to_string(),
            rule_type: "trend".to_string(),
            condition: serde_json::json!({"change_percent": 15, "direction": "increasing"}),
            severity: "medium".to_string(),
            description: format!("Alert when {} rises more than 15%", metric_name),
        });
    }

    rules.push(SuggestedRule {
        metric_name: metric_name.to_string(),
        rule_type: "anomaly".to_string(),
        condition: serde_json::json!({"z_score": 3}),
        severity: "medium".to_string(),
        description: format!("Alert on statistical anomalies in {}", metric_name),
    });

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(uri: &str, label: &str, range: &str, domain: &str) -> OntologyProperty {
        OntologyProperty {
            id: 0,
            ontology_id: 1,
            uri: uri.to_string(),
            label: label.to_string(),
            property_type: "datatype".to_string(),
            domain: domain.to_string(),
            range: range.to_string(),
            description: None,
            deprecated: false,
        }
    }

    const XSD_DECIMAL: &str = r#"["http://www.w3.org/2001/XMLSchema#decimal"]"#;
    const XSD_STRING: &str = r#"["http://www.w3.org/2001/XMLSchema#string"]"#;
    const PRODUCT_DOMAIN: &str = r#"["http://ex.org/Product"]"#;

    #[test]
    fn test_numeric_property_is_regression_target() {
        let props = vec![property("http://ex.org/hasWeight", "weight", XSD_DECIMAL, "[]")];
        let caps = analyze_properties(&props, 0);
        assert_eq!(caps.regression_targets.len(), 1);
        assert!(caps.classification_targets.is_empty());
        // "weight" is not a time-series keyword
        assert!(caps.time_series_metrics.is_empty());
    }

    #[test]
    fn test_string_property_is_classification_target() {
        let props = vec![property("http://ex.org/hasCategory", "category", XSD_STRING, "[]")];
        let caps = analyze_properties(&props, 0);
        assert_eq!(caps.classification_targets.len(), 1);
        assert!(caps.regression_targets.is_empty());
    }

    #[test]
    fn test_annotation_properties_skipped() {
        let mut prop = property("http://ex.org/note", "note", XSD_STRING, "[]");
        prop.property_type = "annotation".to_string();
        let caps = analyze_properties(&[prop], 0);
        assert!(caps.classification_targets.is_empty());
    }

    #[test]
    fn test_time_series_metric_also_regression_target() {
        let props =
            vec![property("http://ex.org/stockLevel", "stock level", XSD_DECIMAL, "[]")];
        let caps = analyze_properties(&props, 0);
        assert_eq!(caps.regression_targets.len(), 1);
        assert_eq!(caps.time_series_metrics.len(), 1);
        assert_eq!(caps.time_series_metrics[0].metric_name, "stock_level");
        // stock → threshold rule, plus the universal z-score rule
        let types: Vec<&str> =
            caps.monitoring_rules.iter().map(|r| r.rule_type.as_str()).collect();
        assert!(types.contains(&"threshold"));
        assert!(types.contains(&"anomaly"));
    }

    #[test]
    fn test_price_metric_gets_trend_rule() {
        let props = vec![property("http://ex.org/hasPrice", "price", XSD_DECIMAL, "[]")];
        let caps = analyze_properties(&props, 0);
        let trend = caps
            .monitoring_rules
            .iter()
            .find(|r| r.rule_type == "trend")
            .unwrap();
        assert_eq!(trend.condition["change_percent"], 15);
        assert_eq!(trend.condition["direction"], "increasing");
        assert_eq!(trend.severity, "medium");
    }

    #[test]
    fn test_suggested_features_respect_domains() {
        let props = vec![
            property("http://ex.org/hasPrice", "price", XSD_DECIMAL, PRODUCT_DOMAIN),
            property("http://ex.org/hasWeight", "weight", XSD_DECIMAL, PRODUCT_DOMAIN),
            property(
                "http://ex.org/hasSalary",
                "salary",
                XSD_DECIMAL,
                r#"["http://ex.org/Employee"]"#,
            ),
            property("http://ex.org/hasNote", "note", XSD_STRING, "[]"),
        ];
        let caps = analyze_properties(&props, 0);
        let price = caps
            .regression_targets
            .iter()
            .find(|t| t.property_label == "price")
            .unwrap();
        // weight shares the Product domain, note has an open domain;
        // salary's Employee domain does not overlap
        assert!(price.suggested_features.contains(&"http://ex.org/hasWeight".to_string()));
        assert!(price.suggested_features.contains(&"http://ex.org/hasNote".to_string()));
        assert!(!price.suggested_features.contains(&"http://ex.org/hasSalary".to_string()));
    }

    #[test]
    fn test_confidence_formula() {
        // base 0.5 + keyword 0.1, no data, fewer than 3 features
        let props = vec![property("http://ex.org/hasPrice", "price", XSD_DECIMAL, "[]")];
        let caps = analyze_properties(&props, 0);
        assert!((caps.regression_targets[0].confidence - 0.6).abs() < 1e-9);

        // 600 points: +0.1 +0.1; still under 1000
        let caps = analyze_properties(&props, 600);
        assert!((caps.regression_targets[0].confidence - 0.8).abs() < 1e-9);

        // 2000 points: +0.25 total from volume
        let caps = analyze_properties(&props, 2000);
        assert!((caps.regression_targets[0].confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_capped() {
        let mut props = vec![property("http://ex.org/hasPrice", "price", XSD_DECIMAL, "[]")];
        for i in 0..6 {
            props.push(property(
                &format!("http://ex.org/f{}", i),
                &format!("feature {}", i),
                XSD_DECIMAL,
                "[]",
            ));
        }
        let caps = analyze_properties(&props, 5000);
        let price = caps
            .regression_targets
            .iter()
            .find(|t| t.property_label == "price")
            .unwrap();
        // 0.5 + 0.25 + 0.15 + 0.1 would be 1.0, capped at 0.95
        assert!((price.confidence - CONFIDENCE_CAP).abs() < 1e-9);
    }

    #[test]
    fn test_every_time_series_metric_is_regression_target() {
        let props = vec![
            property("http://ex.org/stock", "stock level", XSD_DECIMAL, "[]"),
            property("http://ex.org/hasPrice", "price", XSD_DECIMAL, "[]"),
            property("http://ex.org/hasCategory", "category", XSD_STRING, "[]"),
        ];
        let caps = analyze_properties(&props, 0);
        for metric in &caps.time_series_metrics {
            assert!(
                caps.regression_targets
                    .iter()
                    .any(|t| t.property_uri == metric.property_uri)
            );
        }
    }
}
