//! Ontology registry types
//!
//! An ontology is a named set of classes and properties, stored both as rows
//! here and as a named graph in the triple store under `tdb2_graph`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Well-known RDF vocabulary URIs
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
    pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
}

/// Serialization format of an uploaded ontology file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OntologyFormat {
    Turtle,
    RdfXml,
    NTriples,
    JsonLd,
}

impl OntologyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Turtle => "turtle",
            Self::RdfXml => "rdfxml",
            Self::NTriples => "ntriples",
            Self::JsonLd => "jsonld",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "turtle" | "ttl" => Some(Self::Turtle),
            "rdfxml" | "rdf" | "xml" => Some(Self::RdfXml),
            "ntriples" | "nt" => Some(Self::NTriples),
            "jsonld" | "json-ld" => Some(Self::JsonLd),
            _ => None,
        }
    }

    /// MIME type used when pushing the serialization to the graph store
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Turtle => "text/turtle",
            Self::RdfXml => "application/rdf+xml",
            Self::NTriples => "application/n-triples",
            Self::JsonLd => "application/ld+json",
        }
    }
}

/// Ontology lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OntologyStatus {
    Uploaded,
    Active,
    Archived,
}

impl OntologyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

/// Ontology registry row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Ontology {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub version: String,
    pub file_path: Option<String>,
    /// URI of the named graph holding this ontology's triples
    pub tdb2_graph: String,
    pub format: String,
    pub status: String,
    pub auto_version: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub created_by: Option<String>,
    pub metadata: String,
}

impl Ontology {
    pub fn format(&self) -> Option<OntologyFormat> {
        OntologyFormat::parse(&self.format)
    }
}

/// Class declared by an ontology
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OntologyClass {
    pub id: i64,
    pub ontology_id: i64,
    pub uri: String,
    pub label: String,
    pub description: Option<String>,
    /// JSON array of parent class URIs
    pub parent_uris: String,
    pub deprecated: bool,
}

impl OntologyClass {
    pub fn parents(&self) -> Vec<String> {
        serde_json::from_str(&self.parent_uris).unwrap_or_default()
    }

    /// Local name, the URI fragment after the last `#` or `/`
    pub fn local_name(&self) -> &str {
        local_name_of(&self.uri)
    }
}

/// Property kind as declared in the ontology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Datatype,
    Object,
    Annotation,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datatype => "datatype",
            Self::Object => "object",
            Self::Annotation => "annotation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "datatype" => Some(Self::Datatype),
            "object" => Some(Self::Object),
            "annotation" => Some(Self::Annotation),
            _ => None,
        }
    }
}

/// Property declared by an ontology
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OntologyProperty {
    pub id: i64,
    pub ontology_id: i64,
    pub uri: String,
    pub label: String,
    pub property_type: String,
    /// JSON array of domain class URIs
    pub domain: String,
    /// JSON array of range URIs (XSD datatypes or class URIs)
    pub range: String,
    pub description: Option<String>,
    pub deprecated: bool,
}

impl OntologyProperty {
    pub fn kind(&self) -> PropertyKind {
        PropertyKind::parse(&self.property_type).unwrap_or(PropertyKind::Datatype)
    }

    pub fn domain_uris(&self) -> Vec<String> {
        serde_json::from_str(&self.domain).unwrap_or_default()
    }

    pub fn range_uris(&self) -> Vec<String> {
        serde_json::from_str(&self.range).unwrap_or_default()
    }

    pub fn local_name(&self) -> &str {
        local_name_of(&self.uri)
    }

    /// True when any range URI is an XSD numeric datatype
    pub fn has_numeric_range(&self) -> bool {
        self.range_uris().iter().any(|r| is_numeric_xsd(r))
    }

    /// True when any range URI is an XSD date/dateTime datatype
    pub fn has_temporal_range(&self) -> bool {
        self.range_uris()
            .iter()
            .any(|r| r == vocab::XSD_DATETIME || r == vocab::XSD_DATE)
    }

    /// Categorical means string/boolean-typed or object-valued (non-XSD range)
    pub fn has_categorical_range(&self) -> bool {
        self.range_uris().iter().any(|r| {
            r == vocab::XSD_STRING || r == vocab::XSD_BOOLEAN || !r.starts_with(vocab::XSD_NS)
        })
    }
}

/// XSD datatypes that are treated as numeric for ML purposes
pub fn is_numeric_xsd(uri: &str) -> bool {
    let Some(local) = uri.strip_prefix(vocab::XSD_NS) else {
        return false;
    };
    matches!(local, "decimal" | "float" | "integer" | "double" | "int" | "long")
}

fn local_name_of(uri: &str) -> &str {
    uri.rsplit(['#', '/']).next().unwrap_or(uri)
}

/// One RDF statement, bound for the named graph `graph`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// Literal datatype URI; `None` for URI objects and plain literals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub graph: String,
}

impl Triple {
    /// URI-object statement
    pub fn uri(subject: &str, predicate: &str, object: &str, graph: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            datatype: None,
            language: None,
            graph: graph.to_string(),
        }
    }

    /// Plain-literal statement (no datatype, no language tag)
    pub fn plain(subject: &str, predicate: &str, object: &str, graph: &str) -> Self {
        Self::uri(subject, predicate, object, graph)
    }

    /// Typed-literal statement
    pub fn literal(subject: &str, predicate: &str, object: &str, datatype: &str, graph: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            datatype: Some(datatype.to_string()),
            language: None,
            graph: graph.to_string(),
        }
    }

    pub fn is_literal(&self) -> bool {
        self.datatype.is_some() || self.language.is_some()
    }

    /// Dedup key over (subject, predicate, object)
    pub fn key(&self) -> String {
        format!("{}\u{1}{}\u{1}{}", self.subject, self.predicate, self.object)
    }
}
