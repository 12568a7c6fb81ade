//! Hybrid extractor
//!
//! Deterministic first. When that pass looks weak (few entities, low
//! confidence, or many warnings) the LLM runs over the same raw input and
//! its results are merged in - deterministic output stays authoritative,
//! the LLM only fills gaps.

use std::collections::HashSet;
use std::sync::Arc;

use super::{
    DeterministicExtractor, ExtractionResult, LlmExtractor, OntologyContext, SourceData,
};
use crate::error::{PlatformError, Result};
use crate::services::llm_client::ChatModel;

/// Deterministic passes below this entity count get LLM enhancement
const MIN_ENTITIES: usize = 5;
/// ...or below this confidence
const MIN_CONFIDENCE: f64 = 0.7;
/// ...or above this warning count
const MAX_WARNINGS: usize = 3;

/// LLM-sourced entities are discounted by this factor on merge
const LLM_CONFIDENCE_PENALTY: f64 = 0.9;

pub struct HybridExtractor {
    deterministic: DeterministicExtractor,
    llm: LlmExtractor,
}

impl HybridExtractor {
    pub fn new(client: Arc<dyn ChatModel>) -> Self {
        Self { deterministic: DeterministicExtractor::new(), llm: LlmExtractor::new(client) }
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

        if !data.source_type.is_structured() {
            // Unstructured input goes straight to the model
            let mut result = self.llm.extract(data, ctx).await?;
            result.extraction_type = "hybrid".to_string();
            return Ok(result);
        }

        let deterministic = self.deterministic.extract(data, ctx)?;

        if !needs_enhancement(&deterministic) {
            let mut result = deterministic;
            result.extraction_type = "hybrid".to_string();
            return Ok(result);
        }

        tracing::info!(
            "Deterministic pass is weak ({} entities, confidence {:.2}, {} warnings), enhancing with LLM",
            deterministic.entities_extracted,
            deterministic.confidence,
            deterministic.warnings.len()
        );

        match self.llm.extract(data, ctx).await {
            Ok(llm) => Ok(merge(deterministic, llm)),
            Err(e) => {
                // Enhancement is best-effort; the deterministic result stands
                tracing::warn!("LLM enhancement failed, keeping deterministic result: {}", e);
                let mut result = deterministic;
                result.extraction_type = "hybrid".to_string();
                result.warnings.push(format!("llm enhancement failed: {}", e));
                Ok(result)
            },
        }
    }
}

fn needs_enhancement(result: &ExtractionResult) -> bool {
    result.entities_extracted < MIN_ENTITIES
        || result.confidence < MIN_CONFIDENCE
        || result.warnings.len() > MAX_WARNINGS
}

/// Merge LLM output into the deterministic result. Entities collide on URI,
/// triples on (subject, predicate, object); first writer wins and the
/// deterministic side writes first.
fn merge(deterministic: ExtractionResult, llm: ExtractionResult) -> ExtractionResult {
    let det_confidence = deterministic.confidence;
    let llm_confidence = llm.confidence;

    let mut merged = deterministic;
    merged.extraction_type = "hybrid".to_string();

    let known_uris: HashSet<String> = merged.entities.iter().map(|e| e.uri.clone()).collect();
    for mut entity in llm.entities {
        if known_uris.contains(&entity.uri) {
            continue;
        }
        entity.confidence = (entity.confidence * LLM_CONFIDENCE_PENALTY).clamp(0.0, 1.0);
        merged.entities.push(entity);
    }

    let known_triples: HashSet<String> = merged.triples.iter().map(|t| t.key()).collect();
    for triple in llm.triples {
        if known_triples.contains(&triple.key()) {
            continue;
        }
        merged.triples.push(triple);
    }

    merged.warnings.extend(llm.warnings);
    merged.confidence = 0.7 * det_confidence + 0.3 * llm_confidence;

    merged.finalize()
}
