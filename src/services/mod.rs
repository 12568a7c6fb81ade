//! Service layer
//!
//! Stores own the database, clients own the remote endpoints, and the
//! lifecycle services compose them.

pub mod extraction_service;
pub mod graph;
pub mod llm_client;
pub mod ontology_service;
pub mod store;

pub use extraction_service::ExtractionService;
pub use graph::{GraphClient, SparqlResults, SparqlValue};
pub use llm_client::{ChatModel, OpenAiChatClient};
pub use ontology_service::{OntologyService, OntologyUpload};
pub use store::{ExtractionStore, ModelStore, MonitoringStore, OntologyStore, TimeSeriesStore};
