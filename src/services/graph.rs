//! Graph store client
//!
//! Thin HTTP client for a SPARQL 1.1 endpoint with named-graph support
//! (Fuseki dataset layout). Ontology serializations go in through the Graph
//! Store Protocol; extracted triples through `INSERT DATA`; reads through
//! the query endpoint as SPARQL JSON results.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::GraphConfig;
use crate::error::{PlatformError, Result};
use crate::models::{OntologyFormat, Triple};

/// One bound value in a SPARQL result row
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlValue {
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// Tabular SPARQL SELECT result
#[derive(Debug, Clone, Default)]
pub struct SparqlResults {
    pub variables: Vec<String>,
    pub bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlJsonResponse {
    head: SparqlHead,
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<HashMap<String, SparqlValue>>,
}

pub struct GraphClient {
    http_client: Client,
    config: GraphConfig,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build HTTP client for graph store: {}", e);
                Client::default()
            });

        Self { http_client, config }
    }

    fn query_url(&self) -> String {
        format!("{}{}", self.config.endpoint_url.trim_end_matches('/'), self.config.query_path)
    }

    fn update_url(&self) -> String {
        format!("{}{}", self.config.endpoint_url.trim_end_matches('/'), self.config.update_path)
    }

    fn data_url(&self, graph_uri: &str) -> String {
        format!(
            "{}{}?graph={}",
            self.config.endpoint_url.trim_end_matches('/'),
            self.config.data_path,
            urlencoding::encode(graph_uri)
        )
    }

    /// Replace a named graph with an ontology serialization
    pub async fn load_ontology(
        &self,
        graph_uri: &str,
        content: &[u8],
        format: OntologyFormat,
    ) -> Result<()> {
        let response = self
            .http_client
            .put(self.data_url(graph_uri))
            .header("Content-Type", format.content_type())
            .body(content.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Backend(format!(
                "graph load into <{}> failed with {}: {}",
                graph_uri, status, body
            )));
        }

        tracing::info!("Loaded ontology serialization into graph <{}>", graph_uri);
        Ok(())
    }

    /// Insert triples into their named graphs.
    ///
    /// `INSERT DATA` is idempotent at the triple level, so re-running a
    /// failed extraction converges instead of duplicating.
    pub async fn insert_triples(&self, triples: &[Triple]) -> Result<()> {
        if triples.is_empty() {
            return Ok(());
        }

        // Group per graph so one update covers each
        let mut per_graph: HashMap<&str, Vec<&Triple>> = HashMap::new();
        for triple in triples {
            per_graph.entry(triple.graph.as_str()).or_default().push(triple);
        }

        let mut update = String::from("INSERT DATA {\n");
        for (graph, graph_triples) in &per_graph {
            update.push_str(&format!("  GRAPH <{}> {{\n", graph));
            for triple in graph_triples {
                update.push_str("    ");
                update.push_str(&format_triple(triple));
                update.push('\n');
            }
            update.push_str("  }\n");
        }
        update.push('}');

        self.execute_update(&update).await?;
        tracing::debug!("Inserted {} triples across {} graph(s)", triples.len(), per_graph.len());
        Ok(())
    }

    /// Drop every triple in a named graph
    pub async fn clear_graph(&self, graph_uri: &str) -> Result<()> {
        self.execute_update(&format!("CLEAR SILENT GRAPH <{}>", graph_uri))
            .await?;
        tracing::info!("Cleared graph <{}>", graph_uri);
        Ok(())
    }

    /// Execute a read-only SPARQL query and return tabular bindings
    pub async fn query_sparql(&self, query: &str) -> Result<SparqlResults> {
        tracing::debug!("SPARQL query: {}", query);

        let response = self
            .http_client
            .post(self.query_url())
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Backend(format!(
                "SPARQL query failed with {}: {}",
                status, body
            )));
        }

        let parsed: SparqlJsonResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Backend(format!("malformed SPARQL results: {}", e)))?;

        Ok(SparqlResults { variables: parsed.head.vars, bindings: parsed.results.bindings })
    }

    async fn execute_update(&self, update: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.update_url())
            .header("Content-Type", "application/sparql-update")
            .body(update.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Backend(format!(
                "SPARQL update failed with {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Render one triple in SPARQL/N-Triples syntax
fn format_triple(triple: &Triple) -> String {
    format!("<{}> <{}> {} .", triple.subject, triple.predicate, format_object(triple))
}

fn format_object(triple: &Triple) -> String {
    if let Some(datatype) = &triple.datatype {
        format!("\"{}\"^^<{}>", escape_literal(&triple.object), datatype)
    } else if let Some(language) = &triple.language {
        format!("\"{}\"@{}", escape_literal(&triple.object), language)
    } else if triple.object.starts_with("http://") || triple.object.starts_with("https://") {
        format!("<{}>", triple.object)
    } else {
        format!("\"{}\"", escape_literal(&triple.object))
    }
}

fn escape_literal(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
