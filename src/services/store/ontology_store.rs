//! Ontology registry persistence

use sqlx::SqlitePool;

use super::map_insert_err;
use crate::error::{PlatformError, Result};
use crate::models::{Ontology, OntologyClass, OntologyProperty};

/// New-ontology parameters
#[derive(Debug, Clone)]
pub struct NewOntology {
    pub name: String,
    pub description: String,
    pub version: String,
    pub file_path: Option<String>,
    pub graph_uri: String,
    pub format: String,
    pub created_by: Option<String>,
}

/// Parsed class ready for persistence
#[derive(Debug, Clone)]
pub struct NewClass {
    pub uri: String,
    pub label: String,
    pub description: Option<String>,
    pub parent_uris: Vec<String>,
    pub deprecated: bool,
}

/// Parsed property ready for persistence
#[derive(Debug, Clone)]
pub struct NewProperty {
    pub uri: String,
    pub label: String,
    pub property_type: String,
    pub domain: Vec<String>,
    pub range: Vec<String>,
    pub description: Option<String>,
    pub deprecated: bool,
}

pub struct OntologyStore {
    pool: SqlitePool,
}

impl OntologyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_ontology(&self, new: NewOntology) -> Result<Ontology> {
        let result = sqlx::query(
            r#"INSERT INTO ontologies (name, description, version, file_path, tdb2_graph, format, created_by)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.version)
        .bind(&new.file_path)
        .bind(&new.graph_uri)
        .bind(&new.format)
        .bind(&new.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "ontology"))?;

        self.get_ontology(result.last_insert_rowid()).await
    }

    pub async fn get_ontology(&self, id: i64) -> Result<Ontology> {
        sqlx::query_as::<_, Ontology>("SELECT * FROM ontologies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlatformError::NotFound("ontology", id.to_string()))
    }

    pub async fn get_ontology_by_name(&self, name: &str) -> Result<Option<Ontology>> {
        Ok(sqlx::query_as::<_, Ontology>("SELECT * FROM ontologies WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_ontologies(&self, status: Option<&str>) -> Result<Vec<Ontology>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, Ontology>(
                    "SELECT * FROM ontologies WHERE status = ? ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, Ontology>("SELECT * FROM ontologies ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            },
        };
        Ok(rows)
    }

    pub async fn update_status(&self, id: i64, status: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE ontologies SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("ontology", id.to_string()));
        }
        Ok(())
    }

    /// Delete an ontology; classes, properties, jobs and entities cascade
    pub async fn delete_ontology(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM ontologies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::NotFound("ontology", id.to_string()));
        }
        Ok(())
    }

    /// Replace the parsed schema of an ontology in one transaction
    pub async fn replace_schema(
        &self,
        ontology_id: i64,
        classes: &[NewClass],
        properties: &[NewProperty],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM ontology_classes WHERE ontology_id = ?")
            .bind(ontology_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM ontology_properties WHERE ontology_id = ?")
            .bind(ontology_id)
            .execute(&mut *tx)
            .await?;

        for class in classes {
            sqlx::query(
                r#"INSERT INTO ontology_classes (ontology_id, uri, label, description, parent_uris, deprecated)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(ontology_id)
            .bind(&class.uri)
            .bind(&class.label)
            .bind(&class.description)
            .bind(serde_json::to_string(&class.parent_uris)?)
            .bind(class.deprecated)
            .execute(&mut *tx)
            .await?;
        }

        for prop in properties {
            sqlx::query(
                r#"INSERT INTO ontology_properties (ontology_id, uri, label, property_type, domain, range, description, deprecated)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(ontology_id)
            .bind(&prop.uri)
            .bind(&prop.label)
            .bind(&prop.property_type)
            .bind(serde_json::to_string(&prop.domain)?)
            .bind(serde_json::to_string(&prop.range)?)
            .bind(&prop.description)
            .bind(prop.deprecated)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_ontology_classes(&self, ontology_id: i64) -> Result<Vec<OntologyClass>> {
        Ok(sqlx::query_as::<_, OntologyClass>(
            "SELECT * FROM ontology_classes WHERE ontology_id = ? ORDER BY id ASC",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_ontology_properties(&self, ontology_id: i64) -> Result<Vec<OntologyProperty>> {
        Ok(sqlx::query_as::<_, OntologyProperty>(
            "SELECT * FROM ontology_properties WHERE ontology_id = ? ORDER BY id ASC",
        )
        .bind(ontology_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_property_by_uri(
        &self,
        ontology_id: i64,
        uri: &str,
    ) -> Result<OntologyProperty> {
        sqlx::query_as::<_, OntologyProperty>(
            "SELECT * FROM ontology_properties WHERE ontology_id = ? AND uri = ?",
        )
        .bind(ontology_id)
        .bind(uri)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PlatformError::NotFound("property", uri.to_string()))
    }
}
