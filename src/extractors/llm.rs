//! LLM extractor
//!
//! Prompts a chat model with the ontology schema and the raw input, and
//! parses the structured JSON it returns. Responses are validated against
//! the ontology; unknown types and predicates are reported as warnings but
//! never silently dropped.

use serde::Deserialize;
use std::sync::Arc;

use super::{ExtractionResult, OntologyContext, SourceData};
use crate::error::{PlatformError, Result};
use crate::models::vocab;
use crate::models::{ExtractedEntity, Triple};
use crate::services::llm_client::ChatModel;

/// Predicates that are always legal regardless of the ontology
const RESERVED_PREDICATES: [&str; 3] = [vocab::RDF_TYPE, vocab::RDFS_LABEL, vocab::RDFS_COMMENT];

/// Triple as returned by the model, before graph assignment
#[derive(Debug, Clone, Deserialize)]
struct LlmTriple {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    predicate: String,
    #[serde(default)]
    object: String,
    #[serde(default)]
    datatype: Option<String>,
}

/// The JSON document the model is asked to produce
#[derive(Debug, Deserialize)]
struct LlmExtractionPayload {
    #[serde(default)]
    entities: Vec<ExtractedEntity>,
    #[serde(default)]
    triples: Vec<LlmTriple>,
    #[serde(default)]
    warnings: Vec<String>,
}

pub struct LlmExtractor {
    client: Arc<dyn ChatModel>,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn ChatModel>) -> Self {
        Self { client }
    }

    pub fn validate_config(&self, data: &SourceData) -> Result<()> {
        if data.content.trim().is_empty() {
            return Err(PlatformError::Validation("extraction input is empty".to_string()));
        }
        Ok(())
    }

    pub async fn extract(
        &self,
        data: &SourceData,
        ctx: &OntologyContext,
    ) -> Result<ExtractionResult> {
        self.validate_config(data)?;

        let system_prompt = build_system_prompt(ctx);
        let user_prompt = build_user_prompt(data, ctx);

        let raw = self.client.complete(&system_prompt, &user_prompt).await?;
        let cleaned = strip_code_fences(&raw);

        let payload: LlmExtractionPayload = serde_json::from_str(cleaned).map_err(|e| {
            PlatformError::Extraction(format!(
                "LLM returned malformed extraction JSON: {}. Content: {}",
                e,
                cleaned.chars().take(400).collect::<String>()
            ))
        })?;

        Ok(assemble_result(payload, ctx))
    }
}

/// Turn the parsed payload into a validated `ExtractionResult`
fn assemble_result(payload: LlmExtractionPayload, ctx: &OntologyContext) -> ExtractionResult {
    let mut result = ExtractionResult {
        extraction_type: "llm".to_string(),
        warnings: payload.warnings,
        ..Default::default()
    };

    let discarded_entities = payload
        .entities
        .iter()
        .filter(|e| e.uri.trim().is_empty() || e.type_uri.trim().is_empty())
        .count();
    if discarded_entities > 0 {
        result
            .warnings
            .push(format!("discarded {} entities with empty URIs", discarded_entities));
    }

    result.entities = payload
        .entities
        .into_iter()
        .filter(|e| !e.uri.trim().is_empty() && !e.type_uri.trim().is_empty())
        .map(|mut e| {
            e.confidence = e.confidence.clamp(0.0, 1.0);
            e
        })
        .collect();

    let discarded_triples = payload
        .triples
        .iter()
        .filter(|t| t.subject.trim().is_empty() || t.predicate.trim().is_empty())
        .count();
    if discarded_triples > 0 {
        result
            .warnings
            .push(format!("discarded {} triples with empty subjects or predicates", discarded_triples));
    }

    for triple in payload.triples {
        if triple.subject.trim().is_empty() || triple.predicate.trim().is_empty() {
            continue;
        }
        result.triples.push(Triple {
            subject: triple.subject,
            predicate: triple.predicate,
            object: triple.object,
            datatype: triple.datatype,
            language: None,
            graph: ctx.graph_uri().to_string(),
        });
    }

    // Every entity carries at least its type triple, plus a label when given
    let existing: std::collections::HashSet<String> =
        result.triples.iter().map(|t| t.key()).collect();
    let mut implied = Vec::new();
    for entity in &result.entities {
        let type_triple =
            Triple::uri(&entity.uri, vocab::RDF_TYPE, &entity.type_uri, ctx.graph_uri());
        if !existing.contains(&type_triple.key()) {
            implied.push(type_triple);
        }
        if let Some(label) = &entity.label {
            let label_triple = Triple::plain(&entity.uri, vocab::RDFS_LABEL, label, ctx.graph_uri());
            if !existing.contains(&label_triple.key()) {
                implied.push(label_triple);
            }
        }
    }
    result.triples.extend(implied);

    // Validation pass: unknown types and predicates are reported, not removed
    for entity in &result.entities {
        if !ctx.has_class(&entity.type_uri) && entity.type_uri != vocab::OWL_THING {
            result
                .warnings
                .push(format!("entity {} has unknown type {}", entity.uri, entity.type_uri));
        }
    }
    for triple in &result.triples {
        let known = RESERVED_PREDICATES.contains(&triple.predicate.as_str())
            || ctx.has_property(&triple.predicate);
        if !known {
            result
                .warnings
                .push(format!("triple references unknown predicate {}", triple.predicate));
        }
    }

    result.confidence = if result.entities.is_empty() {
        0.0
    } else {
        result.entities.iter().map(|e| e.confidence).sum::<f64>() / result.entities.len() as f64
    };

    result.finalize()
}

fn build_system_prompt(ctx: &OntologyContext) -> String {
    format!(
        "You are an information extraction engine. Extract entities and RDF triples \
         from the user's data using ONLY the ontology below.\n\n\
         Classes:\n{}\n\nProperties:\n{}\n\n\
         Respond with a single JSON object of the shape:\n\
         {{\"entities\": [{{\"uri\", \"type_uri\", \"label\", \"properties\", \"confidence\", \"source_text\"}}],\n\
         \"triples\": [{{\"subject\", \"predicate\", \"object\", \"datatype\"}}],\n\
         \"warnings\": []}}\n\
         Entity URIs must start with {}/. Confidence is a number in [0, 1]. \
         Do not wrap the JSON in markdown.",
        format_classes(ctx),
        format_properties(ctx),
        ctx.base_uri()
    )
}

fn build_user_prompt(data: &SourceData, ctx: &OntologyContext) -> String {
    format!(
        "Source type: {}\nOntology graph: {}\n\nData:\n{}",
        data.source_type.as_str(),
        ctx.graph_uri(),
        data.content
    )
}

fn format_classes(ctx: &OntologyContext) -> String {
    if ctx.classes.is_empty() {
        return "  (none)".to_string();
    }
    ctx.classes
        .iter()
        .map(|c| format!("  - <{}> \"{}\"", c.uri, c.label))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_properties(ctx: &OntologyContext) -> String {
    if ctx.properties.is_empty() {
        return "  (none)".to_string();
    }
    ctx.properties
        .iter()
        .map(|p| {
            format!("  - <{}> \"{}\" ({}, range: {})", p.uri, p.label, p.property_type, p.range)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip a surrounding markdown code fence, with or without a language tag
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct CannedModel {
        response: String,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    fn context() -> OntologyContext {
        OntologyContext {
            ontology: crate::models::Ontology {
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
            classes: vec![crate::models::OntologyClass {
                id: 1,
                ontology_id: 1,
                uri: "http://example.org/onto/Product".to_string(),
                label: "Product".to_string(),
                description: None,
                parent_uris: "[]".to_string(),
                deprecated: false,
            }],
            properties: vec![crate::models::OntologyProperty {
                id: 1,
                ontology_id: 1,
                uri: "http://example.org/onto/hasPrice".to_string(),
                label: "price".to_string(),
                property_type: "datatype".to_string(),
                domain: "[]".to_string(),
                range: r#"["http://www.w3.org/2001/XMLSchema#decimal"]"#.to_string(),
                description: None,
                deprecated: false,
            }],
        }
    }

    fn fenced(inner: &str) -> String {
        format!("```json\n{}\n```", inner)
    }

    #[tokio::test]
    async fn test_extract_parses_fenced_response() {
        let response = fenced(
            r#"{
                "entities": [
                    {"uri": "http://example.org/graphs/products/entity_1",
                     "type_uri": "http://example.org/onto/Product",
                     "label": "Laptop", "properties": {}, "confidence": 0.9}
                ],
                "triples": [
                    {"subject": "http://example.org/graphs/products/entity_1",
                     "predicate": "http://example.org/onto/hasPrice",
                     "object": "999.99",
                     "datatype": "http://www.w3.org/2001/XMLSchema#decimal"}
                ],
                "warnings": []
            }"#,
        );
        let extractor = LlmExtractor::new(Arc::new(CannedModel { response }));
        let data = SourceData {
            source_type: super::super::SourceType::Text,
            content: "Laptop costs 999.99".to_string(),
        };
        let result = extractor.extract(&data, &context()).await.unwrap();

        assert_eq!(result.entities_extracted, 1);
        assert!((result.confidence - 0.9).abs() < 1e-9);
        // The model's triple plus the implied type and label triples
        assert_eq!(result.triples_generated, 3);
        assert!(result.triples.iter().any(|t| t.predicate == vocab::RDF_TYPE));
        assert!(result.triples.iter().any(|t| t.predicate == vocab::RDFS_LABEL));
        assert!(result.triples.iter().all(|t| t.graph == "http://example.org/graphs/products"));
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_empty_uris_discarded_with_warning() {
        let response = fenced(
            r#"{"entities": [{"uri": "", "type_uri": "http://example.org/onto/Product"}],
                "triples": [{"subject": "", "predicate": "p", "object": "o"}]}"#,
        );
        let extractor = LlmExtractor::new(Arc::new(CannedModel { response }));
        let data = SourceData {
            source_type: super::super::SourceType::Text,
            content: "x".to_string(),
        };
        let result = extractor.extract(&data, &context()).await.unwrap();
        assert_eq!(result.entities_extracted, 0);
        assert_eq!(result.triples_generated, 0);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_predicate_reported_not_removed() {
        let response = fenced(
            r#"{"entities": [
                    {"uri": "http://example.org/graphs/products/entity_1",
                     "type_uri": "http://example.org/onto/Product", "confidence": 1.0}
                ],
                "triples": [
                    {"subject": "http://example.org/graphs/products/entity_1",
                     "predicate": "http://example.org/onto/hasWeight",
                     "object": "2.5"}
                ]}"#,
        );
        let extractor = LlmExtractor::new(Arc::new(CannedModel { response }));
        let data = SourceData {
            source_type: super::super::SourceType::Text,
            content: "x".to_string(),
        };
        let result = extractor.extract(&data, &context()).await.unwrap();
        assert!(result.triples.iter().any(|t| t.predicate.ends_with("hasWeight")));
        assert!(result.warnings.iter().any(|w| w.contains("hasWeight")));
    }

    #[tokio::test]
    async fn test_malformed_response_is_extraction_error() {
        let extractor =
            LlmExtractor::new(Arc::new(CannedModel { response: "not json".to_string() }));
        let data = SourceData {
            source_type: super::super::SourceType::Text,
            content: "x".to_string(),
        };
        let err = extractor.extract(&data, &context()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_confidence_is_mean_of_entities() {
        let response = fenced(
            r#"{"entities": [
                {"uri": "http://e/1", "type_uri": "http://example.org/onto/Product", "confidence": 1.0},
                {"uri": "http://e/2", "type_uri": "http://example.org/onto/Product", "confidence": 0.5}
            ]}"#,
        );
        let extractor = LlmExtractor::new(Arc::new(CannedModel { response }));
        let data = SourceData {
            source_type: super::super::SourceType::Text,
            content: "x".to_string(),
        };
        let result = extractor.extract(&data, &context()).await.unwrap();
        assert!((result.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```json\n{}\n```  "), "{}");
    }

    #[test]
    fn test_system_prompt_lists_schema() {
        let prompt = build_system_prompt(&context());
        assert!(prompt.contains("http://example.org/onto/Product"));
        assert!(prompt.contains("http://example.org/onto/hasPrice"));
        assert!(prompt.contains("entities"));
    }

    #[tokio::test]
    async fn test_properties_deserialization_default() {
        // Entities without a properties key parse with an empty map
        let payload: LlmExtractionPayload = serde_json::from_str(
            r#"{"entities": [{"uri": "u", "type_uri": "t"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.entities[0].properties, BTreeMap::new());
        assert_eq!(payload.entities[0].confidence, 1.0);
    }
}
