//! Extraction job lifecycle
//!
//! Drives one job from pending to a terminal state: load the ontology
//! context, run the configured extractor, push triples to the graph store
//! and entities to the database. Failures land on the job row; triple
//! inserts are idempotent so a re-run of a failed job converges.

use std::sync::Arc;

use crate::datasets::adapters::{AdapterConfig, ExtractContext, extract_dataset};
use crate::error::{PlatformError, Result};
use crate::extractors::{
    DeterministicExtractor, EntityExtractor, HybridExtractor, LlmExtractor, OntologyContext,
    SourceData, SourceType,
};
use crate::models::{ExtractionJob, ExtractionType, OntologyStatus};
use crate::services::graph::GraphClient;
use crate::services::llm_client::ChatModel;
use crate::services::store::{ExtractionStore, NewExtractionJob, OntologyStore};

pub struct ExtractionService {
    ontology_store: OntologyStore,
    extraction_store: ExtractionStore,
    graph: Arc<GraphClient>,
    chat_model: Option<Arc<dyn ChatModel>>,
}

impl ExtractionService {
    pub fn new(
        ontology_store: OntologyStore,
        extraction_store: ExtractionStore,
        graph: Arc<GraphClient>,
        chat_model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        Self { ontology_store, extraction_store, graph, chat_model }
    }

    /// Insert a pending job row
    pub async fn submit_job(&self, new: NewExtractionJob) -> Result<ExtractionJob> {
        let job = self.extraction_store.create_job(new).await?;
        tracing::info!("Extraction job {} ({}) submitted", job.id, job.job_name);
        Ok(job)
    }

    /// Run a pending job to completion.
    ///
    /// `inline_content` overrides the job's `source_path`; exactly one of
    /// the two must provide the input.
    pub async fn run_extraction(
        &self,
        job_id: &str,
        inline_content: Option<String>,
    ) -> Result<ExtractionJob> {
        let job = self.extraction_store.get_job(job_id).await?;
        self.extraction_store.mark_running(job_id).await?;

        match self.execute(&job, inline_content).await {
            Ok((entities, triples)) => {
                self.extraction_store
                    .mark_completed(job_id, entities as i64, triples as i64)
                    .await?;
                self.ontology_store
                    .update_status(job.ontology_id, OntologyStatus::Active.as_str())
                    .await?;
                tracing::info!(
                    "Extraction job {} completed: {} entities, {} triples",
                    job_id,
                    entities,
                    triples
                );
                self.extraction_store.get_job(job_id).await
            },
            Err(e) => {
                tracing::error!("Extraction job {} failed: {}", job_id, e);
                self.extraction_store.mark_failed(job_id, &e.to_string()).await?;
                Err(e)
            },
        }
    }

    /// Ingest through a data adapter, then extract from the tabularized
    /// rows. The job must use source type `json`; the adapter's rows are
    /// serialized as a JSON array of objects for the extractor.
    pub async fn run_adapter_extraction(
        &self,
        job_id: &str,
        adapter_config: &AdapterConfig,
    ) -> Result<ExtractionJob> {
        match extract_dataset(&ExtractContext::default(), adapter_config).await {
            Ok(dataset) => {
                tracing::info!(
                    "Adapter ingestion for job {}: {} rows, {} columns",
                    job_id,
                    dataset.row_count,
                    dataset.column_count
                );
                let rows = serde_json::to_string(&dataset.rows)?;
                self.run_extraction(job_id, Some(rows)).await
            },
            Err(e) => {
                tracing::error!("Adapter ingestion for job {} failed: {}", job_id, e);
                self.extraction_store.mark_failed(job_id, &e.to_string()).await?;
                Err(e)
            },
        }
    }

    async fn execute(
        &self,
        job: &ExtractionJob,
        inline_content: Option<String>,
    ) -> Result<(usize, usize)> {
        let ctx = self.load_context(job.ontology_id).await?;

        let source_type = SourceType::parse(&job.source_type).ok_or_else(|| {
            PlatformError::Validation(format!("unknown source type '{}'", job.source_type))
        })?;

        let content = match inline_content {
            Some(content) => content,
            None => {
                let path = job.source_path.as_deref().ok_or_else(|| {
                    PlatformError::Validation(
                        "job has neither inline content nor a source path".to_string(),
                    )
                })?;
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    PlatformError::Extraction(format!("failed to read {}: {}", path, e))
                })?
            },
        };

        let data = SourceData { source_type, content };
        let extractor = self.select_extractor(job)?;
        extractor.validate_config(&data)?;

        let result = extractor.extract(&data, &ctx).await?;

        for warning in &result.warnings {
            tracing::warn!("Extraction job {}: {}", job.id, warning);
        }

        // Triples first; a graph failure leaves the job failed with no
        // entity rows to clean up
        self.graph.insert_triples(&result.triples).await?;

        for entity in &result.entities {
            self.extraction_store.insert_entity(&job.id, entity).await?;
        }

        Ok((result.entities.len(), result.triples.len()))
    }

    async fn load_context(&self, ontology_id: i64) -> Result<OntologyContext> {
        let ontology = self.ontology_store.get_ontology(ontology_id).await?;
        let classes = self.ontology_store.get_ontology_classes(ontology_id).await?;
        let properties = self.ontology_store.get_ontology_properties(ontology_id).await?;
        Ok(OntologyContext { ontology, classes, properties })
    }

    /// Pick the extractor for the job's type. A hybrid request without a
    /// configured chat model degrades to deterministic.
    fn select_extractor(&self, job: &ExtractionJob) -> Result<EntityExtractor> {
        let requested = job.extraction_type().ok_or_else(|| {
            PlatformError::Validation(format!(
                "unknown extraction type '{}'",
                job.extraction_type
            ))
        })?;

        Ok(match requested {
            ExtractionType::Deterministic => {
                EntityExtractor::Deterministic(DeterministicExtractor::new())
            },
            ExtractionType::Llm => {
                let client = self.chat_model.clone().ok_or_else(|| {
                    PlatformError::Extraction(
                        "llm extraction requested but no chat model is configured".to_string(),
                    )
                })?;
                EntityExtractor::Llm(LlmExtractor::new(client))
            },
            ExtractionType::Hybrid => match self.chat_model.clone() {
                Some(client) => EntityExtractor::Hybrid(HybridExtractor::new(client)),
                None => {
                    tracing::warn!(
                        "Job {} requested hybrid extraction without a chat model, using deterministic",
                        job.id
                    );
                    EntityExtractor::Deterministic(DeterministicExtractor::new())
                },
            },
        })
    }
}
