//! Extraction job rows and in-flight extraction structures

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Job lifecycle status; transitions are monotonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Which extractor family a job uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    Deterministic,
    Llm,
    Hybrid,
}

impl ExtractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Llm => "llm",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deterministic" => Some(Self::Deterministic),
            "llm" => Some(Self::Llm),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Extraction job row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: String,
    pub ontology_id: i64,
    pub pipeline_id: Option<String>,
    pub job_name: String,
    pub status: String,
    pub extraction_type: String,
    pub source_type: String,
    pub source_path: Option<String>,
    pub entities_extracted: i64,
    pub triples_generated: i64,
    pub error_message: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub metadata: String,
}

impl ExtractionJob {
    pub fn extraction_type(&self) -> Option<ExtractionType> {
        ExtractionType::parse(&self.extraction_type)
    }
}

/// Entity produced by an extractor, before persistence.
///
/// Every entity yields at least its `rdf:type` triple; labeled entities also
/// yield `rdfs:label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub uri: String,
    pub type_uri: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Property URI -> raw value
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source_text: Option<String>,
}

fn default_confidence() -> f64 {
    1.0
}

/// Persisted entity row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExtractedEntityRow {
    pub id: i64,
    pub job_id: String,
    pub entity_uri: String,
    pub entity_type: String,
    pub entity_label: Option<String>,
    pub confidence: f64,
    pub source_text: Option<String>,
    pub properties: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_extraction_type_roundtrip() {
        for t in [ExtractionType::Deterministic, ExtractionType::Llm, ExtractionType::Hybrid] {
            assert_eq!(ExtractionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ExtractionType::parse("other"), None);
    }
}
