// Common test utilities and helpers

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::time::Duration;

use crate::services::store::{NewClass, NewOntology, NewProperty, OntologyStore};

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("Failed to enable foreign keys");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// Seed a product ontology with one class and a small property set
pub async fn seed_product_ontology(pool: &SqlitePool) -> i64 {
    let store = OntologyStore::new(pool.clone());
    let ontology = store
        .create_ontology(NewOntology {
            name: "products".to_string(),
            description: "test ontology".to_string(),
            version: "1.0.0".to_string(),
            file_path: None,
            graph_uri: "http://example.org/graphs/products".to_string(),
            format: "turtle".to_string(),
            created_by: None,
        })
        .await
        .expect("Failed to create ontology");

    let classes = vec![NewClass {
        uri: "http://example.org/onto/Product".to_string(),
        label: "Product".to_string(),
        description: None,
        parent_uris: vec![],
        deprecated: false,
    }];
    let properties = vec![
        property("http://example.org/onto/hasPrice", "price", XSD_DECIMAL),
        property("http://example.org/onto/stockLevel", "stock level", XSD_DECIMAL),
        property("http://example.org/onto/hasCategory", "category", XSD_STRING),
    ];
    store
        .replace_schema(ontology.id, &classes, &properties)
        .await
        .expect("Failed to seed schema");

    ontology.id
}

fn property(uri: &str, label: &str, range: &str) -> NewProperty {
    NewProperty {
        uri: uri.to_string(),
        label: label.to_string(),
        property_type: "datatype".to_string(),
        domain: vec!["http://example.org/onto/Product".to_string()],
        range: vec![range.to_string()],
        description: None,
        deprecated: false,
    }
}
