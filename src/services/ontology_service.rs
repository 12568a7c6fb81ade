//! Ontology registry service
//!
//! Owns the ontology lifecycle: accept an uploaded serialization, push it
//! into its named graph, read the schema (classes, properties, domains,
//! ranges) back out via SPARQL, and persist it for the analyzer. Deleting
//! an ontology clears its graph and cascades through the database.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Ontology, OntologyFormat};
use crate::services::graph::GraphClient;
use crate::services::store::{NewClass, NewOntology, NewProperty, OntologyStore};
use crate::utils::normalize_field_name;

const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
const OWL_ANNOTATION_PROPERTY: &str = "http://www.w3.org/2002/07/owl#AnnotationProperty";
const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";

/// Upload request, decoupled from any transport
#[derive(Debug, Clone)]
pub struct OntologyUpload {
    pub name: String,
    pub description: String,
    pub version: String,
    pub format: OntologyFormat,
    pub content: Vec<u8>,
    pub file_path: Option<String>,
    pub created_by: Option<String>,
    /// Named graph override; synthesized from the name when absent
    pub graph_uri: Option<String>,
}

pub struct OntologyService {
    store: OntologyStore,
    graph: Arc<GraphClient>,
    /// Namespace synthesized graph URIs live under
    graph_namespace: String,
}

impl OntologyService {
    pub fn new(store: OntologyStore, graph: Arc<GraphClient>) -> Self {
        Self { store, graph, graph_namespace: "http://ontoflow.io/graphs".to_string() }
    }

    /// Register an ontology: insert the row, load the serialization into
    /// its named graph, then parse and persist the schema.
    pub async fn upload_ontology(&self, upload: OntologyUpload) -> Result<Ontology> {
        let graph_uri = upload.graph_uri.clone().unwrap_or_else(|| {
            format!("{}/{}", self.graph_namespace, normalize_field_name(&upload.name))
        });

        let ontology = self
            .store
            .create_ontology(NewOntology {
                name: upload.name.clone(),
                description: upload.description.clone(),
                version: upload.version.clone(),
                file_path: upload.file_path.clone(),
                graph_uri: graph_uri.clone(),
                format: upload.format.as_str().to_string(),
                created_by: upload.created_by.clone(),
            })
            .await?;

        if let Err(e) = self
            .graph
            .load_ontology(&graph_uri, &upload.content, upload.format)
            .await
        {
            // The registry row is useless without its graph
            self.store.delete_ontology(ontology.id).await.ok();
            return Err(e);
        }

        self.refresh_schema(ontology.id).await?;

        tracing::info!("Ontology '{}' registered with graph <{}>", upload.name, graph_uri);
        self.store.get_ontology(ontology.id).await
    }

    /// Re-read classes and properties from the named graph
    pub async fn refresh_schema(&self, ontology_id: i64) -> Result<()> {
        let ontology = self.store.get_ontology(ontology_id).await?;
        let graph_uri = &ontology.tdb2_graph;

        let classes = self.read_classes(graph_uri).await?;
        let properties = self.read_properties(graph_uri).await?;

        tracing::info!(
            "Parsed {} classes and {} properties from <{}>",
            classes.len(),
            properties.len(),
            graph_uri
        );

        self.store.replace_schema(ontology_id, &classes, &properties).await
    }

    /// Drop the named graph, then the registry row (cascading)
    pub async fn delete_ontology(&self, ontology_id: i64) -> Result<()> {
        let ontology = self.store.get_ontology(ontology_id).await?;
        self.graph.clear_graph(&ontology.tdb2_graph).await?;
        self.store.delete_ontology(ontology_id).await?;
        tracing::info!("Ontology {} deleted", ontology_id);
        Ok(())
    }

    async fn read_classes(&self, graph_uri: &str) -> Result<Vec<NewClass>> {
        let query = format!(
            r#"SELECT ?class ?label ?comment ?deprecated WHERE {{ GRAPH <{g}> {{
  {{ ?class a <{owl}> }} UNION {{ ?class a <{rdfs}> }}
  OPTIONAL {{ ?class <http://www.w3.org/2000/01/rdf-schema#label> ?label }}
  OPTIONAL {{ ?class <http://www.w3.org/2000/01/rdf-schema#comment> ?comment }}
  OPTIONAL {{ ?class <http://www.w3.org/2002/07/owl#deprecated> ?deprecated }}
}} }}"#,
            g = graph_uri,
            owl = OWL_CLASS,
            rdfs = RDFS_CLASS
        );
        let results = self.graph.query_sparql(&query).await?;

        let mut classes: BTreeMap<String, NewClass> = BTreeMap::new();
        for binding in &results.bindings {
            let Some(uri) = binding.get("class").map(|v| v.value.clone()) else {
                continue;
            };
            let entry = classes.entry(uri.clone()).or_insert_with(|| NewClass {
                label: local_name(&uri).to_string(),
                uri,
                description: None,
                parent_uris: Vec::new(),
                deprecated: false,
            });
            if let Some(label) = binding.get("label") {
                entry.label = label.value.clone();
            }
            if let Some(comment) = binding.get("comment") {
                entry.description = Some(comment.value.clone());
            }
            if let Some(flag) = binding.get("deprecated") {
                entry.deprecated = flag.value == "true";
            }
        }

        // Parent edges in a second pass
        let query = format!(
            "SELECT ?class ?parent WHERE {{ GRAPH <{}> {{ ?class <{}> ?parent }} }}",
            graph_uri, RDFS_SUBCLASS_OF
        );
        let results = self.graph.query_sparql(&query).await?;
        for binding in &results.bindings {
            if let (Some(class), Some(parent)) = (binding.get("class"), binding.get("parent"))
                && let Some(entry) = classes.get_mut(&class.value)
                && !entry.parent_uris.contains(&parent.value)
            {
                entry.parent_uris.push(parent.value.clone());
            }
        }

        Ok(classes.into_values().collect())
    }

    async fn read_properties(&self, graph_uri: &str) -> Result<Vec<NewProperty>> {
        let query = format!(
            r#"SELECT ?prop ?kind ?label ?comment ?domain ?range ?deprecated WHERE {{ GRAPH <{g}> {{
  ?prop a ?kind .
  FILTER (?kind IN (<{dt}>, <{obj}>, <{ann}>, <{rdf}>))
  OPTIONAL {{ ?prop <http://www.w3.org/2000/01/rdf-schema#label> ?label }}
  OPTIONAL {{ ?prop <http://www.w3.org/2000/01/rdf-schema#comment> ?comment }}
  OPTIONAL {{ ?prop <http://www.w3.org/2000/01/rdf-schema#domain> ?domain }}
  OPTIONAL {{ ?prop <http://www.w3.org/2000/01/rdf-schema#range> ?range }}
  OPTIONAL {{ ?prop <http://www.w3.org/2002/07/owl#deprecated> ?deprecated }}
}} }}"#,
            g = graph_uri,
            dt = OWL_DATATYPE_PROPERTY,
            obj = OWL_OBJECT_PROPERTY,
            ann = OWL_ANNOTATION_PROPERTY,
            rdf = RDF_PROPERTY
        );
        let results = self.graph.query_sparql(&query).await?;

        let mut properties: BTreeMap<String, NewProperty> = BTreeMap::new();
        for binding in &results.bindings {
            let Some(uri) = binding.get("prop").map(|v| v.value.clone()) else {
                continue;
            };
            let entry = properties.entry(uri.clone()).or_insert_with(|| NewProperty {
                label: local_name(&uri).to_string(),
                uri,
                property_type: "datatype".to_string(),
                domain: Vec::new(),
                range: Vec::new(),
                description: None,
                deprecated: false,
            });

            if let Some(kind) = binding.get("kind") {
                entry.property_type = property_kind(&kind.value).to_string();
            }
            if let Some(label) = binding.get("label") {
                entry.label = label.value.clone();
            }
            if let Some(comment) = binding.get("comment") {
                entry.description = Some(comment.value.clone());
            }
            if let Some(domain) = binding.get("domain")
                && !entry.domain.contains(&domain.value)
            {
                entry.domain.push(domain.value.clone());
            }
            if let Some(range) = binding.get("range")
                && !entry.range.contains(&range.value)
            {
                entry.range.push(range.value.clone());
            }
            if let Some(flag) = binding.get("deprecated") {
                entry.deprecated = flag.value == "true";
            }
        }

        Ok(properties.into_values().collect())
    }
}

fn property_kind(type_uri: &str) -> &'static str {
    match type_uri {
        OWL_OBJECT_PROPERTY => "object",
        OWL_ANNOTATION_PROPERTY => "annotation",
        _ => "datatype",
    }
}

fn local_name(uri: &str) -> &str {
    uri.rsplit(['#', '/']).next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_kind_mapping() {
        assert_eq!(property_kind(OWL_OBJECT_PROPERTY), "object");
        assert_eq!(property_kind(OWL_ANNOTATION_PROPERTY), "annotation");
        assert_eq!(property_kind(OWL_DATATYPE_PROPERTY), "datatype");
        assert_eq!(property_kind(RDF_PROPERTY), "datatype");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://ex.org/onto#Product"), "Product");
        assert_eq!(local_name("http://ex.org/onto/hasPrice"), "hasPrice");
    }
}
