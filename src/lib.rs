//! Ontoflow Library
//!
//! Ontology-driven data platform core: data extraction onto RDF
//! ontologies, capability analysis, model training from the knowledge
//! graph, and rule-based monitoring over time-series.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod analyzer;
pub mod config;
pub mod datasets;
pub mod db;
pub mod error;
pub mod events;
pub mod extractors;
pub mod ml;
pub mod models;
pub mod monitoring;
pub mod services;
pub mod timeseries;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{PlatformError, Result};
pub use events::{EventBus, PlatformEvent};
pub use ml::{AutoTrainer, RandomForest, Trainer};
pub use ml::tree::DecisionTree;
pub use services::{
    ExtractionService, GraphClient, OntologyService, OntologyStore,
};

#[cfg(test)]
mod tests;

/// Application shared state
///
/// Rust's type system is the DI container: every service is built once in
/// `AppState::build` and shared behind an Arc.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub bus: events::EventBus,

    pub graph: Arc<services::GraphClient>,
    pub ontology_service: Arc<services::OntologyService>,
    pub extraction_service: Arc<services::ExtractionService>,
    pub analyzer: Arc<analyzer::OntologyAnalyzer>,
    pub auto_trainer: Arc<ml::AutoTrainer>,
    pub monitoring_executor: Arc<monitoring::MonitoringExecutor>,
}

impl AppState {
    /// Wire every service from configuration and an open pool
    pub fn build(config: &Config, db: SqlitePool) -> Self {
        let bus = events::EventBus::default();
        let graph = Arc::new(services::GraphClient::new(config.graph.clone()));

        let chat_model: Option<Arc<dyn services::ChatModel>> = if config.llm.enabled {
            Some(Arc::new(services::OpenAiChatClient::new(config.llm.clone())))
        } else {
            None
        };

        let ontology_service = Arc::new(services::OntologyService::new(
            services::OntologyStore::new(db.clone()),
            graph.clone(),
        ));

        let extraction_service = Arc::new(services::ExtractionService::new(
            services::OntologyStore::new(db.clone()),
            services::ExtractionStore::new(db.clone()),
            graph.clone(),
            chat_model,
        ));

        let analyzer = Arc::new(analyzer::OntologyAnalyzer::new(
            services::OntologyStore::new(db.clone()),
            services::ExtractionStore::new(db.clone()),
        ));

        let auto_trainer = Arc::new(ml::AutoTrainer::new(
            analyzer::OntologyAnalyzer::new(
                services::OntologyStore::new(db.clone()),
                services::ExtractionStore::new(db.clone()),
            ),
            analyzer::KgDataExtractor::new(graph.clone(), services::OntologyStore::new(db.clone())),
            services::ModelStore::new(db.clone()),
            services::OntologyStore::new(db.clone()),
            monitoring::MonitoringService::new(services::MonitoringStore::new(db.clone())),
            config.training.clone(),
        ));

        let rule_engine = Arc::new(monitoring::RuleEngine::new(
            services::MonitoringStore::new(db.clone()),
            timeseries::TimeSeriesAnalyzer::default(),
            bus.clone(),
        ));

        let monitoring_executor = Arc::new(monitoring::MonitoringExecutor::new(
            services::MonitoringStore::new(db.clone()),
            services::TimeSeriesStore::new(db.clone()),
            rule_engine,
            config.monitoring.clone(),
        ));

        Self {
            db,
            bus,
            graph,
            ontology_service,
            extraction_service,
            analyzer,
            auto_trainer,
            monitoring_executor,
        }
    }
}
