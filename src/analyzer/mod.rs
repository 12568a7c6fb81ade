//! Ontology analysis
//!
//! Reads the persisted schema and decides what the platform can learn from
//! it: which properties are regression or classification targets, which
//! look like monitorable time-series metrics, and which rules to suggest.

pub mod capabilities;
pub mod kg_extractor;

pub use capabilities::{
    MlCapabilities, MlTarget, OntologyAnalyzer, SuggestedRule, TimeSeriesMetric,
};
pub use kg_extractor::KgDataExtractor;
