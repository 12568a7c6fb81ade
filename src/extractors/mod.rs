//! Ontology-guided entity extraction
//!
//! Three extractor families share one contract: structured data in,
//! `(entities, triples)` out, everything referencing ontology property URIs
//! or the reserved `rdf:type` / `rdfs:label` / `rdfs:comment` predicates.
//! The choice is a closed sum - deterministic field mapping, LLM prompting,
//! or the hybrid that runs the first and tops up with the second.

pub mod deterministic;
pub mod hybrid;
pub mod llm;

pub use deterministic::DeterministicExtractor;
pub use hybrid::HybridExtractor;
pub use llm::LlmExtractor;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ExtractedEntity, Ontology, OntologyClass, OntologyProperty, Triple};

/// What kind of payload an extraction input is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Csv,
    Json,
    Text,
    Html,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Text => "text",
            Self::Html => "html",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "text" | "txt" => Some(Self::Text),
            "html" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Csv | Self::Json)
    }
}

/// Raw input handed to an extractor
#[derive(Debug, Clone)]
pub struct SourceData {
    pub source_type: SourceType,
    pub content: String,
}

/// Ontology snapshot every extractor works against
#[derive(Debug, Clone)]
pub struct OntologyContext {
    pub ontology: Ontology,
    pub classes: Vec<OntologyClass>,
    pub properties: Vec<OntologyProperty>,
}

impl OntologyContext {
    pub fn graph_uri(&self) -> &str {
        &self.ontology.tdb2_graph
    }

    /// Base URI synthesized entity and property URIs hang off
    pub fn base_uri(&self) -> &str {
        self.ontology.tdb2_graph.trim_end_matches('/')
    }

    pub fn find_class_by_label(&self, label: &str) -> Option<&OntologyClass> {
        self.classes
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(label))
    }

    pub fn find_class_by_uri_suffix(&self, suffix: &str) -> Option<&OntologyClass> {
        self.classes
            .iter()
            .find(|c| c.uri.ends_with(&format!("/{}", suffix)))
    }

    pub fn has_class(&self, uri: &str) -> bool {
        self.classes.iter().any(|c| c.uri == uri)
    }

    pub fn has_property(&self, uri: &str) -> bool {
        self.properties.iter().any(|p| p.uri == uri)
    }
}

/// Shared extraction output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entities: Vec<ExtractedEntity>,
    pub triples: Vec<Triple>,
    pub entities_extracted: usize,
    pub triples_generated: usize,
    /// Aggregate confidence in [0, 1]
    pub confidence: f64,
    pub extraction_type: String,
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    pub fn finalize(mut self) -> Self {
        self.entities_extracted = self.entities.len();
        self.triples_generated = self.triples.len();
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

/// The closed extractor sum. Dispatch is by variant, never by runtime type
/// inspection.
pub enum EntityExtractor {
    Deterministic(DeterministicExtractor),
    Llm(LlmExtractor),
    Hybrid(HybridExtractor),
}

impl EntityExtractor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deterministic(_) => "deterministic",
            Self::Llm(_) => "llm",
            Self::Hybrid(_) => "hybrid",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Deterministic(_) => {
                "Maps structured fields onto ontology properties by fuzzy label matching"
            },
            Self::Llm(_) => "Prompts a chat model to extract typed entities from any text",
            Self::Hybrid(_) => {
                "Runs the deterministic extractor and enhances weak results with the LLM"
            },
        }
    }

    /// Whether this extractor can take the given source type
    pub fn supports(&self, source_type: SourceType) -> bool {
        match self {
            Self::Deterministic(_) => source_type.is_structured(),
            Self::Llm(_) => true,
            Self::Hybrid(_) => true,
        }
    }

    /// Check input shape before extraction
    pub fn validate_config(&self, data: &SourceData) -> Result<()> {
        match self {
            Self::Deterministic(e) => e.validate_config(data),
            Self::Llm(e) => e.validate_config(data),
            Self::Hybrid(e) => e.validate_config(data),
        }
    }

    pub async fn extract(
        &self,
        data: &SourceData,
        ctx: &OntologyContext,
    ) -> Result<ExtractionResult> {
        match self {
            Self::Deterministic(e) => e.extract(data, ctx),
            Self::Llm(e) => e.extract(data, ctx).await,
            Self::Hybrid(e) => e.extract(data, ctx).await,
        }
    }
}
