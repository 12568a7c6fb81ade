use super::common::{create_test_db, seed_product_ontology};
use crate::error::PlatformError;
use crate::models::ExtractedEntity;
use crate::services::store::{
    ExtractionStore, ModelStore, NewExtractionJob, NewModel, NewOntology, OntologyStore,
    TimeSeriesStore,
};
use chrono::{Duration, Utc};

#[tokio::test]
async fn test_ontology_crud_and_schema() {
    let pool = create_test_db().await;
    let ontology_id = seed_product_ontology(&pool).await;
    let store = OntologyStore::new(pool.clone());

    let ontology = store.get_ontology(ontology_id).await.unwrap();
    assert_eq!(ontology.name, "products");
    assert_eq!(ontology.status, "uploaded");

    let classes = store.get_ontology_classes(ontology_id).await.unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].label, "Product");

    let properties = store.get_ontology_properties(ontology_id).await.unwrap();
    assert_eq!(properties.len(), 3);
    let price = store
        .get_property_by_uri(ontology_id, "http://example.org/onto/hasPrice")
        .await
        .unwrap();
    assert!(price.has_numeric_range());

    store.update_status(ontology_id, "active").await.unwrap();
    let active = store.list_ontologies(Some("active")).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_ontology_duplicate_name_conflicts() {
    let pool = create_test_db().await;
    seed_product_ontology(&pool).await;
    let store = OntologyStore::new(pool.clone());

    let err = store
        .create_ontology(NewOntology {
            name: "products".to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            file_path: None,
            graph_uri: "http://example.org/graphs/other".to_string(),
            format: "turtle".to_string(),
            created_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Conflict(_)));
}

#[tokio::test]
async fn test_missing_ontology_is_not_found() {
    let pool = create_test_db().await;
    let store = OntologyStore::new(pool.clone());
    assert!(matches!(
        store.get_ontology(404).await.unwrap_err(),
        PlatformError::NotFound("ontology", _)
    ));
}

#[tokio::test]
async fn test_delete_cascades_to_schema_and_jobs() {
    let pool = create_test_db().await;
    let ontology_id = seed_product_ontology(&pool).await;
    let ontology_store = OntologyStore::new(pool.clone());
    let extraction_store = ExtractionStore::new(pool.clone());

    let job = extraction_store
        .create_job(NewExtractionJob {
            ontology_id,
            pipeline_id: None,
            job_name: "seed".to_string(),
            extraction_type: "deterministic".to_string(),
            source_type: "csv".to_string(),
            source_path: None,
        })
        .await
        .unwrap();

    ontology_store.delete_ontology(ontology_id).await.unwrap();

    assert!(extraction_store.get_job(&job.id).await.is_err());
    let classes = ontology_store.get_ontology_classes(ontology_id).await.unwrap();
    assert!(classes.is_empty());
}

#[tokio::test]
async fn test_extraction_job_lifecycle() {
    let pool = create_test_db().await;
    let ontology_id = seed_product_ontology(&pool).await;
    let store = ExtractionStore::new(pool.clone());

    let job = store
        .create_job(NewExtractionJob {
            ontology_id,
            pipeline_id: None,
            job_name: "load products".to_string(),
            extraction_type: "deterministic".to_string(),
            source_type: "csv".to_string(),
            source_path: Some("/tmp/products.csv".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(job.status, "pending");
    assert!(job.started_at.is_none());

    store.mark_running(&job.id).await.unwrap();
    let running = store.get_job(&job.id).await.unwrap();
    assert_eq!(running.status, "running");
    assert!(running.started_at.is_some());
    assert!(running.completed_at.is_none());

    // A second mark_running must not re-enter
    assert!(store.mark_running(&job.id).await.is_err());

    let entity = ExtractedEntity {
        uri: "http://example.org/graphs/products/entity_1".to_string(),
        type_uri: "http://example.org/onto/Product".to_string(),
        label: Some("Laptop".to_string()),
        properties: Default::default(),
        confidence: 1.0,
        source_text: None,
    };
    store.insert_entity(&job.id, &entity).await.unwrap();

    store.mark_completed(&job.id, 1, 4).await.unwrap();
    let done = store.get_job(&job.id).await.unwrap();
    assert_eq!(done.status, "completed");
    assert_eq!(done.entities_extracted, 1);
    assert_eq!(done.triples_generated, 4);
    assert!(done.completed_at.is_some());

    assert_eq!(store.count_entities(ontology_id).await.unwrap(), 1);
    let entities = store.list_entities(&job.id).await.unwrap();
    assert_eq!(entities[0].entity_label.as_deref(), Some("Laptop"));
}

#[tokio::test]
async fn test_failed_job_records_message() {
    let pool = create_test_db().await;
    let ontology_id = seed_product_ontology(&pool).await;
    let store = ExtractionStore::new(pool.clone());

    let job = store
        .create_job(NewExtractionJob {
            ontology_id,
            pipeline_id: None,
            job_name: "bad".to_string(),
            extraction_type: "llm".to_string(),
            source_type: "text".to_string(),
            source_path: None,
        })
        .await
        .unwrap();
    store.mark_running(&job.id).await.unwrap();
    store.mark_failed(&job.id, "provider unavailable").await.unwrap();

    let failed = store.get_job(&job.id).await.unwrap();
    assert_eq!(failed.status, "failed");
    assert_eq!(failed.error_message.as_deref(), Some("provider unavailable"));
    assert!(failed.completed_at.is_some());
}

#[tokio::test]
async fn test_time_series_ordering_and_window() {
    let pool = create_test_db().await;
    let ontology_id = seed_product_ontology(&pool).await;
    let store = TimeSeriesStore::new(pool.clone());

    let now = Utc::now();
    // Insert out of order; reads must come back ascending
    for offset in [3i64, 1, 2, 5, 4] {
        store
            .append_point(
                ontology_id,
                None,
                "stock_level",
                now - Duration::days(offset),
                offset as f64,
            )
            .await
            .unwrap();
    }

    let series = store
        .query_time_series(
            ontology_id,
            None,
            "stock_level",
            now - Duration::days(30),
            now,
        )
        .await
        .unwrap();
    assert_eq!(series.points.len(), 5);
    let timestamps: Vec<_> = series.points.iter().map(|p| p.timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
    assert_eq!(series.last_value(), Some(1.0));

    // Window excludes old points
    let windowed = store
        .query_time_series(
            ontology_id,
            None,
            "stock_level",
            now - Duration::days(2) - Duration::hours(1),
            now,
        )
        .await
        .unwrap();
    assert_eq!(windowed.points.len(), 2);

    assert_eq!(store.list_metrics(ontology_id).await.unwrap(), vec!["stock_level"]);
}

#[tokio::test]
async fn test_model_store_newest_wins_activation() {
    let pool = create_test_db().await;
    let ontology_id = seed_product_ontology(&pool).await;
    let store = ModelStore::new(pool.clone());

    let new_model = |name: &str| NewModel {
        name: name.to_string(),
        ontology_id,
        target_class: "http://example.org/onto/hasPrice".to_string(),
        algorithm: "random_forest".to_string(),
        hyperparameters: serde_json::json!({"num_trees": 10}),
        feature_columns: vec!["stock level".to_string()],
        class_labels: None,
        train_accuracy: Some(0.9),
        validate_accuracy: Some(0.8),
        precision_score: None,
        recall_score: None,
        f1_score: None,
        confusion_matrix: None,
        model_artifact_path: format!("/tmp/{}.json", name),
        model_size_bytes: 128,
        training_rows: 80,
        validation_rows: 20,
        feature_importance: serde_json::json!({"stock level": 1.0}),
    };

    let first = store.insert_model(new_model("v1")).await.unwrap();
    let second = store.insert_model(new_model("v2")).await.unwrap();

    assert!(second.is_active);
    let reloaded_first = store.get_model(&first.id).await.unwrap();
    assert!(!reloaded_first.is_active);

    let active = store
        .get_active_model(ontology_id, "http://example.org/onto/hasPrice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, second.id);

    let all = store.list_models(ontology_id).await.unwrap();
    assert_eq!(all.len(), 2);
}
