//! Deterministic extractor
//!
//! Maps tabular fields onto ontology properties by fuzzy label matching and
//! emits one typed entity per data row. No model calls, fully reproducible:
//! the same input and ontology always produce the same triples.

use std::collections::BTreeMap;

use super::{ExtractionResult, OntologyContext, SourceData, SourceType};
use crate::error::{PlatformError, Result};
use crate::models::vocab;
use crate::models::{ExtractedEntity, Triple};
use crate::utils::{normalize_field_name, similarity};

/// Minimum fuzzy score for accepting an ontology property match
const MATCH_THRESHOLD: f64 = 0.6;

/// Confidence assigned to synthesized (unmatched) property URIs
const SYNTHESIZED_CONFIDENCE: f64 = 0.5;

/// Columns whose values drive per-row entity typing
const TYPE_COLUMNS: [&str; 2] = ["type", "class"];

/// Columns preferred as the entity label, in order
const LABEL_COLUMNS: [&str; 4] = ["name", "label", "title", "id"];

/// Resolved mapping of one input field to a property URI
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub field: String,
    pub property_uri: String,
    pub score: f64,
    pub synthesized: bool,
}

#[derive(Debug, Default)]
struct Table {
    fields: Vec<String>,
    rows: Vec<BTreeMap<String, String>>,
    warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DeterministicExtractor {
    /// Explicit field -> property URI overrides; fuzzy matching fills the rest
    explicit_mappings: BTreeMap<String, String>,
}

impl DeterministicExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(explicit_mappings: BTreeMap<String, String>) -> Self {
        Self { explicit_mappings }
    }

    pub fn validate_config(&self, data: &SourceData) -> Result<()> {
        if !data.source_type.is_structured() {
            return Err(PlatformError::Validation(format!(
                "deterministic extractor requires csv or json input, got {}",
                data.source_type.as_str()
            )));
        }
        if data.content.trim().is_empty() {
            return Err(PlatformError::Validation("extraction input is empty".to_string()));
        }
        Ok(())
    }

    pub fn extract(&self, data: &SourceData, ctx: &OntologyContext) -> Result<ExtractionResult> {
        self.validate_config(data)?;

        let table = match data.source_type {
            SourceType::Csv => parse_csv(&data.content)?,
            SourceType::Json => parse_json(&data.content)?,
            _ => unreachable!("validate_config rejects unstructured input"),
        };

        let mappings = self.map_fields(&table.fields, ctx);
        let mut result = ExtractionResult {
            extraction_type: "deterministic".to_string(),
            confidence: 1.0,
            warnings: table.warnings,
            ..Default::default()
        };

        for (row_index, row) in table.rows.iter().enumerate() {
            let entity_uri = format!("{}/entity_{}", ctx.base_uri(), row_index + 1);
            let type_uri = resolve_entity_type(row, ctx);

            let mut entity = ExtractedEntity {
                uri: entity_uri.clone(),
                type_uri: type_uri.clone(),
                label: None,
                properties: BTreeMap::new(),
                confidence: 1.0,
                source_text: None,
            };

            result.triples.push(Triple::uri(
                &entity_uri,
                vocab::RDF_TYPE,
                &type_uri,
                ctx.graph_uri(),
            ));

            for mapping in &mappings {
                let Some(value) = row.get(&mapping.field) else {
                    continue;
                };
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }

                let datatype = infer_xsd_datatype(value);
                result.triples.push(Triple::literal(
                    &entity_uri,
                    &mapping.property_uri,
                    value,
                    datatype,
                    ctx.graph_uri(),
                ));
                entity
                    .properties
                    .insert(mapping.property_uri.clone(), value.to_string());
            }

            if let Some(label) = pick_label(row, &table.fields) {
                result.triples.push(Triple::plain(
                    &entity_uri,
                    vocab::RDFS_LABEL,
                    &label,
                    ctx.graph_uri(),
                ));
                entity.label = Some(label);
            }

            result.entities.push(entity);
        }

        Ok(result.finalize())
    }

    /// Resolve every input field to a property URI: explicit overrides win,
    /// then the best fuzzy match above the threshold, then a synthesized
    /// URI in the ontology's namespace.
    pub fn map_fields(&self, fields: &[String], ctx: &OntologyContext) -> Vec<FieldMapping> {
        fields
            .iter()
            .map(|field| {
                if let Some(uri) = self.explicit_mappings.get(field) {
                    return FieldMapping {
                        field: field.clone(),
                        property_uri: uri.clone(),
                        score: 1.0,
                        synthesized: false,
                    };
                }

                let normalized = normalize_field_name(field);
                let best = ctx
                    .properties
                    .iter()
                    .map(|prop| {
                        let label_score = similarity(&normalized, &prop.label.to_lowercase());
                        let local_score = similarity(&normalized, prop.local_name());
                        (prop, label_score.max(local_score))
                    })
                    .max_by(|a, b| a.1.total_cmp(&b.1));

                match best {
                    Some((prop, score)) if score > MATCH_THRESHOLD => FieldMapping {
                        field: field.clone(),
                        property_uri: prop.uri.clone(),
                        score,
                        synthesized: false,
                    },
                    _ => {
                        tracing::debug!(
                            "No ontology property matches field '{}', synthesizing URI",
                            field
                        );
                        FieldMapping {
                            field: field.clone(),
                            property_uri: format!("{}/prop_{}", ctx.base_uri(), normalized),
                            score: SYNTHESIZED_CONFIDENCE,
                            synthesized: true,
                        }
                    },
                }
            })
            .collect()
    }
}

fn parse_csv(content: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let fields: Vec<String> = reader
        .headers()
        .map_err(|e| PlatformError::Extraction(format!("invalid CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if fields.is_empty() {
        return Err(PlatformError::Extraction("CSV input has no header row".to_string()));
    }

    let mut table = Table { fields, ..Default::default() };
    for (i, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| PlatformError::Extraction(format!("invalid CSV row: {}", e)))?;

        if record.len() != table.fields.len() {
            table.warnings.push(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                record.len(),
                table.fields.len()
            ));
        }

        let row: BTreeMap<String, String> = table
            .fields
            .iter()
            .enumerate()
            .filter_map(|(j, field)| {
                record.get(j).map(|cell| (field.clone(), cell.to_string()))
            })
            .collect();
        table.rows.push(row);
    }

    Ok(table)
}

fn parse_json(content: &str) -> Result<Table> {
    let parsed: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| PlatformError::Extraction(format!("invalid JSON input: {}", e)))?;

    let array = parsed
        .as_array()
        .ok_or_else(|| PlatformError::Extraction("JSON input must be an array".to_string()))?;

    let mut table = Table::default();

    // Field list comes from the first object's keys
    if let Some(first) = array.first().and_then(|v| v.as_object()) {
        table.fields = first.keys().cloned().collect();
    }

    for (i, item) in array.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| {
            PlatformError::Extraction(format!("JSON array element {} is not an object", i))
        })?;

        let mut row = BTreeMap::new();
        for field in &table.fields {
            if let Some(value) = object.get(field) {
                row.insert(field.clone(), json_value_to_string(value));
            }
        }

        let extra = object.keys().filter(|k| !table.fields.contains(k)).count();
        if extra > 0 {
            table
                .warnings
                .push(format!("row {} has {} fields not present in the first object", i + 1, extra));
        }

        table.rows.push(row);
    }

    Ok(table)
}

fn json_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Per-row entity type: a `type`/`class` column value resolved against the
/// ontology, else the first ontology class, else `owl:Thing`.
fn resolve_entity_type(row: &BTreeMap<String, String>, ctx: &OntologyContext) -> String {
    for column in TYPE_COLUMNS {
        if let Some(value) = row.get(column).map(|v| v.trim())
            && !value.is_empty()
        {
            if let Some(class) = ctx.find_class_by_label(value) {
                return class.uri.clone();
            }
            if let Some(class) = ctx.find_class_by_uri_suffix(value) {
                return class.uri.clone();
            }
        }
    }

    ctx.classes
        .first()
        .map(|c| c.uri.clone())
        .unwrap_or_else(|| vocab::OWL_THING.to_string())
}

/// XSD datatype by trial parse
fn infer_xsd_datatype(value: &str) -> &'static str {
    let lower = value.to_ascii_lowercase();
    if lower == "true" || lower == "false" {
        return vocab::XSD_BOOLEAN;
    }
    if value.parse::<i64>().is_ok() {
        return vocab::XSD_INTEGER;
    }
    if value.parse::<f64>().is_ok() {
        return vocab::XSD_DECIMAL;
    }
    vocab::XSD_STRING
}

/// Entity label: first of the well-known label columns, else the first
/// non-empty field in column order
fn pick_label(row: &BTreeMap<String, String>, fields: &[String]) -> Option<String> {
    for column in LABEL_COLUMNS {
        if let Some(value) = row.get(column).map(|v| v.trim())
            && !value.is_empty()
        {
            return Some(value.to_string());
        }
    }
    fields
        .iter()
        .filter_map(|f| row.get(f))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ontology, OntologyClass, OntologyProperty};

    fn product_context() -> OntologyContext {
        OntologyContext {
            ontology: Ontology {
                id: 1,
                name: "products".to_string(),
                description: String::new(),
                version: "1.0.0".to_string(),
                file_path: None,
                tdb2_graph: "http://example.org/graphs/products".to_string(),
                format: "turtle".to_string(),
                status: "active".to_string(),
                auto_version: false,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
                created_by: None,
                metadata: "{}".to_string(),
            },
            classes: vec![OntologyClass {
                id: 1,
                ontology_id: 1,
                uri: "http://example.org/onto/Product".to_string(),
                label: "Product".to_string(),
                description: None,
                parent_uris: "[]".to_string(),
                deprecated: false,
            }],
            properties: vec![
                property(1, "http://example.org/onto/hasName", "name"),
                property(2, "http://example.org/onto/hasPrice", "price"),
                property(3, "http://example.org/onto/hasCategory", "category"),
            ],
        }
    }

    fn property(id: i64, uri: &str, label: &str) -> OntologyProperty {
        OntologyProperty {
            id,
            ontology_id: 1,
            uri: uri.to_string(),
            label: label.to_string(),
            property_type: "datatype".to_string(),
            domain: "[]".to_string(),
            range: r#"["http://www.w3.org/2001/XMLSchema#string"]"#.to_string(),
            description: None,
            deprecated: false,
        }
    }

    #[test]
    fn test_csv_extraction_counts_and_datatypes() {
        let ctx = product_context();
        let data = SourceData {
            source_type: SourceType::Csv,
            content: "name,price,category\nLaptop,999.99,Electronics\nMouse,29.99,Electronics"
                .to_string(),
        };

        let result = DeterministicExtractor::new().extract(&data, &ctx).unwrap();

        assert_eq!(result.entities_extracted, 2);
        assert_eq!(result.confidence, 1.0);

        let type_triples: Vec<_> = result
            .triples
            .iter()
            .filter(|t| t.predicate == vocab::RDF_TYPE)
            .collect();
        assert_eq!(type_triples.len(), 2);
        assert!(type_triples.iter().all(|t| t.object == "http://example.org/onto/Product"));

        let label_triples: Vec<_> = result
            .triples
            .iter()
            .filter(|t| t.predicate == vocab::RDFS_LABEL)
            .collect();
        assert_eq!(label_triples.len(), 2);
        assert_eq!(label_triples[0].object, "Laptop");

        let property_triples: Vec<_> = result
            .triples
            .iter()
            .filter(|t| t.predicate.contains("/onto/has"))
            .collect();
        assert_eq!(property_triples.len(), 6);

        let price = property_triples
            .iter()
            .find(|t| t.predicate.ends_with("hasPrice"))
            .unwrap();
        assert_eq!(price.datatype.as_deref(), Some(vocab::XSD_DECIMAL));

        let name = property_triples
            .iter()
            .find(|t| t.predicate.ends_with("hasName"))
            .unwrap();
        assert_eq!(name.datatype.as_deref(), Some(vocab::XSD_STRING));
    }

    #[test]
    fn test_entity_uris_are_one_based() {
        let ctx = product_context();
        let data = SourceData {
            source_type: SourceType::Json,
            content: r#"[{"name": "A"}, {"name": "B"}]"#.to_string(),
        };
        let result = DeterministicExtractor::new().extract(&data, &ctx).unwrap();
        assert_eq!(result.entities[0].uri, "http://example.org/graphs/products/entity_1");
        assert_eq!(result.entities[1].uri, "http://example.org/graphs/products/entity_2");
    }

    #[test]
    fn test_unmatched_field_synthesizes_property() {
        let ctx = product_context();
        let mappings = DeterministicExtractor::new()
            .map_fields(&["Warehouse Zone".to_string()], &ctx);
        assert_eq!(mappings.len(), 1);
        assert!(mappings[0].synthesized);
        assert_eq!(
            mappings[0].property_uri,
            "http://example.org/graphs/products/prop_warehouse_zone"
        );
        assert_eq!(mappings[0].score, SYNTHESIZED_CONFIDENCE);
    }

    #[test]
    fn test_explicit_mapping_wins() {
        let ctx = product_context();
        let mut explicit = BTreeMap::new();
        explicit.insert("sku".to_string(), "http://example.org/onto/hasName".to_string());
        let mappings = DeterministicExtractor::with_mappings(explicit)
            .map_fields(&["sku".to_string()], &ctx);
        assert_eq!(mappings[0].property_uri, "http://example.org/onto/hasName");
        assert!(!mappings[0].synthesized);
    }

    #[test]
    fn test_type_column_drives_entity_type() {
        let mut ctx = product_context();
        ctx.classes.push(OntologyClass {
            id: 2,
            ontology_id: 1,
            uri: "http://example.org/onto/Accessory".to_string(),
            label: "Accessory".to_string(),
            description: None,
            parent_uris: "[]".to_string(),
            deprecated: false,
        });

        let data = SourceData {
            source_type: SourceType::Csv,
            content: "name,type\nMouse,accessory".to_string(),
        };
        let result = DeterministicExtractor::new().extract(&data, &ctx).unwrap();
        assert_eq!(result.entities[0].type_uri, "http://example.org/onto/Accessory");
    }

    #[test]
    fn test_row_length_mismatch_warns() {
        let ctx = product_context();
        let data = SourceData {
            source_type: SourceType::Csv,
            content: "name,price\nLaptop".to_string(),
        };
        let result = DeterministicExtractor::new().extract(&data, &ctx).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("row 1"));
    }

    #[test]
    fn test_empty_values_skipped() {
        let ctx = product_context();
        let data = SourceData {
            source_type: SourceType::Csv,
            content: "name,price\nLaptop,".to_string(),
        };
        let result = DeterministicExtractor::new().extract(&data, &ctx).unwrap();
        assert!(!result.triples.iter().any(|t| t.predicate.ends_with("hasPrice")));
    }

    #[test]
    fn test_boolean_and_integer_datatypes() {
        assert_eq!(infer_xsd_datatype("true"), vocab::XSD_BOOLEAN);
        assert_eq!(infer_xsd_datatype("FALSE"), vocab::XSD_BOOLEAN);
        assert_eq!(infer_xsd_datatype("42"), vocab::XSD_INTEGER);
        assert_eq!(infer_xsd_datatype("42.5"), vocab::XSD_DECIMAL);
        assert_eq!(infer_xsd_datatype("hello"), vocab::XSD_STRING);
    }

    #[test]
    fn test_rejects_unstructured_input() {
        let ctx = product_context();
        let data =
            SourceData { source_type: SourceType::Text, content: "free text".to_string() };
        assert!(DeterministicExtractor::new().extract(&data, &ctx).is_err());
    }
}
