//! Knowledge-graph data extraction
//!
//! Composes one SPARQL SELECT over (target, features, domain class),
//! materializes the bindings into a numeric feature matrix with label
//! encoding for categorical columns, and validates the result is big
//! enough to train on. Rows missing any value are dropped, not imputed.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PlatformError, Result};
use crate::models::{Encoder, ModelType, OntologyProperty, TargetValues, TrainingDataset};
use crate::services::graph::{GraphClient, SparqlResults};
use crate::services::store::OntologyStore;
use crate::utils::normalize_field_name;

/// Hard cap on rows pulled from the graph per extraction
const QUERY_LIMIT: usize = 10_000;

/// Minimum samples to train a regression model
const MIN_REGRESSION_SAMPLES: usize = 30;
/// Minimum samples to train a classification model
const MIN_CLASSIFICATION_SAMPLES: usize = 50;
/// Samples must be at least this multiple of the feature count
const SAMPLES_PER_FEATURE: usize = 3;

/// A property bound to its SPARQL variable name
#[derive(Debug, Clone)]
struct PropertyColumn {
    property: OntologyProperty,
    var: String,
}

pub struct KgDataExtractor {
    graph: Arc<GraphClient>,
    ontology_store: OntologyStore,
}

impl KgDataExtractor {
    pub fn new(graph: Arc<GraphClient>, ontology_store: OntologyStore) -> Self {
        Self { graph, ontology_store }
    }

    /// Pull a training dataset for one target out of the ontology's graph
    pub async fn extract_training_data(
        &self,
        ontology_id: i64,
        target_uri: &str,
        feature_uris: &[String],
    ) -> Result<TrainingDataset> {
        if feature_uris.is_empty() {
            return Err(PlatformError::Validation(
                "at least one feature property is required".to_string(),
            ));
        }

        let ontology = self.ontology_store.get_ontology(ontology_id).await?;
        let target = self.ontology_store.get_property_by_uri(ontology_id, target_uri).await?;

        let mut features = Vec::with_capacity(feature_uris.len());
        for uri in feature_uris {
            features.push(self.ontology_store.get_property_by_uri(ontology_id, uri).await?);
        }

        let columns = assign_variables(&features);
        let target_column =
            PropertyColumn { var: unique_var(&target, &columns), property: target };

        let query = build_query(&ontology.tdb2_graph, &target_column, &columns);
        let results = self.graph.query_sparql(&query).await?;

        materialize(&results, &target_column, &columns)
    }
}

/// Derive collision-free SPARQL variable names from property labels
fn assign_variables(features: &[OntologyProperty]) -> Vec<PropertyColumn> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    features
        .iter()
        .map(|property| {
            let base = variable_name(&property.label);
            let var = match seen.get_mut(&base) {
                Some(count) => {
                    let var = format!("{}_{}", base, *count);
                    *count += 1;
                    var
                },
                None => {
                    seen.insert(base.clone(), 1);
                    base
                },
            };
            PropertyColumn { property: property.clone(), var }
        })
        .collect()
}

fn unique_var(target: &OntologyProperty, columns: &[PropertyColumn]) -> String {
    let mut var = variable_name(&target.label);
    while columns.iter().any(|c| c.var == var) {
        var.push('_');
    }
    var
}

/// Normalized label, prefixed when it would start with a digit
fn variable_name(label: &str) -> String {
    let normalized = normalize_field_name(label);
    if normalized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("v_{}", normalized)
    } else {
        normalized
    }
}

fn build_query(
    graph_uri: &str,
    target: &PropertyColumn,
    features: &[PropertyColumn],
) -> String {
    let mut vars = String::from("?entity");
    for column in features {
        vars.push_str(&format!(" ?{}", column.var));
    }
    vars.push_str(&format!(" ?{}", target.var));

    let mut body = String::new();
    if let Some(domain_class) = target.property.domain_uris().first() {
        body.push_str(&format!("    ?entity a <{}> .\n", domain_class));
    }
    for column in features {
        body.push_str(&format!("    ?entity <{}> ?{} .\n", column.property.uri, column.var));
    }
    body.push_str(&format!("    ?entity <{}> ?{} .\n", target.property.uri, target.var));

    format!(
        "SELECT {}\nWHERE {{ GRAPH <{}> {{\n{}}} }} LIMIT {}",
        vars, graph_uri, body, QUERY_LIMIT
    )
}

/// Turn raw bindings into the encoded training dataset
fn materialize(
    results: &SparqlResults,
    target: &PropertyColumn,
    features: &[PropertyColumn],
) -> Result<TrainingDataset> {
    let model_type = if target.property.has_numeric_range() {
        ModelType::Regression
    } else {
        ModelType::Classification
    };

    // Complete raw rows only; anything missing a value is dropped
    let mut raw_rows: Vec<(String, Vec<String>, String)> = Vec::new();
    let mut incomplete = 0usize;
    for binding in &results.bindings {
        let Some(entity) = binding.get("entity") else {
            incomplete += 1;
            continue;
        };
        let mut feature_values = Vec::with_capacity(features.len());
        let mut complete = true;
        for column in features {
            match binding.get(&column.var) {
                Some(value) => feature_values.push(value.value.clone()),
                None => {
                    complete = false;
                    break;
                },
            }
        }
        let target_value = binding.get(&target.var);
        if !complete || target_value.is_none() {
            incomplete += 1;
            continue;
        }
        raw_rows.push((
            entity.value.clone(),
            feature_values,
            target_value.map(|v| v.value.clone()).unwrap_or_default(),
        ));
    }

    if raw_rows.is_empty() {
        return Err(PlatformError::InsufficientData(format!(
            "no complete rows for target '{}' ({} bindings dropped)",
            target.property.label, incomplete
        )));
    }

    let mut warnings = Vec::new();
    if incomplete > 0 {
        warnings.push(format!("{} bindings dropped for missing values", incomplete));
    }

    // Encode features column by column
    let mut encoders: BTreeMap<String, Encoder> = BTreeMap::new();
    let mut parse_failures: BTreeMap<String, usize> = BTreeMap::new();
    let mut matrix: Vec<Vec<f64>> = vec![Vec::with_capacity(features.len()); raw_rows.len()];

    for (j, column) in features.iter().enumerate() {
        if column.property.has_numeric_range() {
            for (i, (_, feature_values, _)) in raw_rows.iter().enumerate() {
                let parsed = feature_values[j].trim().parse::<f64>().unwrap_or_else(|_| {
                    *parse_failures.entry(column.property.label.clone()).or_insert(0) += 1;
                    0.0
                });
                matrix[i].push(parsed);
            }
        } else {
            let mut encoder = Encoder::new_label();
            for (i, (_, feature_values, _)) in raw_rows.iter().enumerate() {
                matrix[i].push(encoder.encode(feature_values[j].trim()));
            }
            encoders.insert(column.property.label.clone(), encoder);
        }
    }

    for (label, failures) in &parse_failures {
        warnings.push(format!(
            "{} value(s) in numeric feature '{}' failed to parse and were coerced to 0.0",
            failures, label
        ));
    }

    // Target column: numeric vector for regression, labels plus a reverse
    // encoder for classification
    let (target_values, target_encoder, matrix, entity_ids) = match model_type {
        ModelType::Regression => {
            let mut values = Vec::with_capacity(raw_rows.len());
            let mut kept_matrix = Vec::with_capacity(raw_rows.len());
            let mut entity_ids = Vec::with_capacity(raw_rows.len());
            let mut dropped = 0usize;
            for (i, (entity, _, target_raw)) in raw_rows.iter().enumerate() {
                match target_raw.trim().parse::<f64>() {
                    Ok(v) => {
                        values.push(v);
                        kept_matrix.push(matrix[i].clone());
                        entity_ids.push(entity.clone());
                    },
                    Err(_) => dropped += 1,
                }
            }
            if dropped > 0 {
                warnings.push(format!("{} rows dropped for unparseable numeric targets", dropped));
            }
            if values.is_empty() {
                return Err(PlatformError::InsufficientData(format!(
                    "no numeric values for target '{}'",
                    target.property.label
                )));
            }
            (TargetValues::Numeric(values), None, kept_matrix, entity_ids)
        },
        ModelType::Classification => {
            let labels: Vec<String> =
                raw_rows.iter().map(|(_, _, t)| t.trim().to_string()).collect();
            let encoder = Encoder::fit(&labels);
            let entity_ids: Vec<String> =
                raw_rows.iter().map(|(e, _, _)| e.clone()).collect();
            (TargetValues::Labels(labels), Some(encoder), matrix, entity_ids)
        },
    };

    let sample_count = matrix.len();
    Ok(TrainingDataset {
        features: matrix,
        target: target_values,
        feature_names: features.iter().map(|c| c.property.label.clone()).collect(),
        target_name: target.property.label.clone(),
        entity_ids,
        model_type,
        feature_encoders: encoders,
        target_encoder,
        sample_count,
        feature_count: features.len(),
        warnings,
    })
}

/// Reject datasets too small or too narrow to train on
pub fn validate_dataset(dataset: &TrainingDataset) -> Result<()> {
    if dataset.sample_count == 0 {
        return Err(PlatformError::InsufficientData("dataset is empty".to_string()));
    }

    let minimum = match dataset.model_type {
        ModelType::Regression => MIN_REGRESSION_SAMPLES,
        ModelType::Classification => MIN_CLASSIFICATION_SAMPLES,
    };
    if dataset.sample_count < minimum {
        return Err(PlatformError::InsufficientData(format!(
            "{} samples for {} target '{}', need at least {}",
            dataset.sample_count,
            dataset.model_type.as_str(),
            dataset.target_name,
            minimum
        )));
    }

    if dataset.sample_count < SAMPLES_PER_FEATURE * dataset.feature_count {
        return Err(PlatformError::InsufficientData(format!(
            "{} samples is too few for {} features (need {} per feature)",
            dataset.sample_count, dataset.feature_count, SAMPLES_PER_FEATURE
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::graph::SparqlValue;
    use std::collections::HashMap;

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

    const NUMERIC: &str = r#"["http://www.w3.org/2001/XMLSchema#decimal"]"#;
    const STRING: &str = r#"["http://www.w3.org/2001/XMLSchema#string"]"#;

    fn binding(pairs: &[(&str, &str)]) -> HashMap<String, SparqlValue> {
        pairs
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    SparqlValue {
                        value_type: "literal".to_string(),
                        value: v.to_string(),
                        datatype: None,
                    },
                )
            })
            .collect()
    }

    fn columns(props: Vec<OntologyProperty>) -> Vec<PropertyColumn> {
        assign_variables(&props)
    }

    #[test]
    fn test_build_query_shape() {
        let features = columns(vec![
            property("http://ex.org/hasWeight", "weight", NUMERIC, ""),
            property("http://ex.org/hasCategory", "category", STRING, ""),
        ]);
        let target = PropertyColumn {
            property: property(
                "http://ex.org/hasPrice",
                "price",
                NUMERIC,
                r#"["http://ex.org/Product"]"#,
            ),
            var: "price".to_string(),
        };
        let query = build_query("http://ex.org/g", &target, &features);

        assert!(query.starts_with("SELECT ?entity ?weight ?category ?price"));
        assert!(query.contains("GRAPH <http://ex.org/g>"));
        assert!(query.contains("?entity a <http://ex.org/Product> ."));
        assert!(query.contains("?entity <http://ex.org/hasWeight> ?weight ."));
        assert!(query.contains("?entity <http://ex.org/hasPrice> ?price ."));
        assert!(query.ends_with("LIMIT 10000"));
    }

    #[test]
    fn test_build_query_omits_class_clause_without_domain() {
        let features = columns(vec![property("http://ex.org/f", "f", NUMERIC, "")]);
        let target = PropertyColumn {
            property: property("http://ex.org/t", "t", NUMERIC, "[]"),
            var: "t".to_string(),
        };
        let query = build_query("http://ex.org/g", &target, &features);
        assert!(!query.contains("?entity a <"));
    }

    #[test]
    fn test_variable_name_digit_prefix() {
        assert_eq!(variable_name("price"), "price");
        assert_eq!(variable_name("30 day total"), "v_30_day_total");
    }

    #[test]
    fn test_materialize_regression() {
        let features = columns(vec![
            property("http://ex.org/hasWeight", "weight", NUMERIC, ""),
            property("http://ex.org/hasCategory", "category", STRING, ""),
        ]);
        let target = PropertyColumn {
            property: property("http://ex.org/hasPrice", "price", NUMERIC, "[]"),
            var: "price".to_string(),
        };

        let results = SparqlResults {
            variables: vec![],
            bindings: vec![
                binding(&[
                    ("entity", "http://ex.org/e1"),
                    ("weight", "1.5"),
                    ("category", "laptop"),
                    ("price", "999.0"),
                ]),
                binding(&[
                    ("entity", "http://ex.org/e2"),
                    ("weight", "0.2"),
                    ("category", "mouse"),
                    ("price", "29.0"),
                ]),
                // missing weight: dropped
                binding(&[
                    ("entity", "http://ex.org/e3"),
                    ("category", "mouse"),
                    ("price", "19.0"),
                ]),
            ],
        };

        let ds = materialize(&results, &target, &features).unwrap();
        assert_eq!(ds.sample_count, 2);
        assert_eq!(ds.feature_count, 2);
        assert_eq!(ds.model_type, ModelType::Regression);
        assert_eq!(ds.features[0].len(), 2);
        assert_eq!(ds.features[0][0], 1.5);
        // categorical column label-encoded in first-occurrence order
        assert_eq!(ds.features[0][1], 0.0);
        assert_eq!(ds.features[1][1], 1.0);
        assert!(ds.feature_encoders.contains_key("category"));
        assert!(ds.target_encoder.is_none());
        assert!(matches!(&ds.target, TargetValues::Numeric(v) if v == &vec![999.0, 29.0]));
        assert_eq!(ds.entity_ids, vec!["http://ex.org/e1", "http://ex.org/e2"]);
        assert!(ds.warnings.iter().any(|w| w.contains("dropped")));
    }

    #[test]
    fn test_materialize_classification_builds_target_encoder() {
        let features = columns(vec![property("http://ex.org/hasWeight", "weight", NUMERIC, "")]);
        let target = PropertyColumn {
            property: property("http://ex.org/hasCategory", "category", STRING, "[]"),
            var: "category".to_string(),
        };

        let results = SparqlResults {
            variables: vec![],
            bindings: vec![
                binding(&[("entity", "e1"), ("weight", "1.0"), ("category", "b")]),
                binding(&[("entity", "e2"), ("weight", "2.0"), ("category", "a")]),
                binding(&[("entity", "e3"), ("weight", "3.0"), ("category", "b")]),
            ],
        };

        let ds = materialize(&results, &target, &features).unwrap();
        assert_eq!(ds.model_type, ModelType::Classification);
        let encoder = ds.target_encoder.as_ref().unwrap();
        assert_eq!(encoder.unique_values, vec!["b", "a"]);
        assert!(matches!(&ds.target, TargetValues::Labels(l) if l.len() == 3));
    }

    #[test]
    fn test_materialize_numeric_parse_failure_coerces_with_warning() {
        let features = columns(vec![property("http://ex.org/hasWeight", "weight", NUMERIC, "")]);
        let target = PropertyColumn {
            property: property("http://ex.org/hasPrice", "price", NUMERIC, "[]"),
            var: "price".to_string(),
        };
        let results = SparqlResults {
            variables: vec![],
            bindings: vec![binding(&[("entity", "e1"), ("weight", "n/a"), ("price", "10")])],
        };
        let ds = materialize(&results, &target, &features).unwrap();
        assert_eq!(ds.features[0][0], 0.0);
        assert!(ds.warnings.iter().any(|w| w.contains("coerced to 0.0")));
    }

    #[test]
    fn test_materialize_no_complete_rows_is_insufficient_data() {
        let features = columns(vec![property("http://ex.org/hasWeight", "weight", NUMERIC, "")]);
        let target = PropertyColumn {
            property: property("http://ex.org/hasPrice", "price", NUMERIC, "[]"),
            var: "price".to_string(),
        };
        let results = SparqlResults {
            variables: vec![],
            bindings: vec![binding(&[("entity", "e1"), ("price", "10")])],
        };
        let err = materialize(&results, &target, &features).unwrap_err();
        assert!(matches!(err, PlatformError::InsufficientData(_)));
    }

    #[test]
    fn test_validate_dataset_minimums() {
        let make = |n: usize, f: usize, model_type: ModelType| TrainingDataset {
            features: vec![vec![0.0; f]; n],
            target: match model_type {
                ModelType::Regression => TargetValues::Numeric(vec![0.0; n]),
                ModelType::Classification => {
                    TargetValues::Labels(vec!["a".to_string(); n])
                },
            },
            feature_names: (0..f).map(|i| format!("f{}", i)).collect(),
            target_name: "t".to_string(),
            entity_ids: (0..n).map(|i| format!("e{}", i)).collect(),
            model_type,
            feature_encoders: BTreeMap::new(),
            target_encoder: None,
            sample_count: n,
            feature_count: f,
            warnings: vec![],
        };

        assert!(validate_dataset(&make(29, 2, ModelType::Regression)).is_err());
        assert!(validate_dataset(&make(30, 2, ModelType::Regression)).is_ok());
        assert!(validate_dataset(&make(49, 2, ModelType::Classification)).is_err());
        assert!(validate_dataset(&make(50, 2, ModelType::Classification)).is_ok());
        // 3x features rule: 40 samples cannot carry 15 features
        assert!(validate_dataset(&make(40, 15, ModelType::Regression)).is_err());
    }

    #[test]
    fn test_variable_collision_dedup() {
        let cols = columns(vec![
            property("http://ex.org/a", "total value", NUMERIC, ""),
            property("http://ex.org/b", "total-value", NUMERIC, ""),
        ]);
        assert_eq!(cols[0].var, "total_value");
        assert_eq!(cols[1].var, "total_value_1");
    }
}
