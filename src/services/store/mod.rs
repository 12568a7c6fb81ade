//! Persistence interface
//!
//! One store per aggregate, each owning a pool clone. Missing primary keys
//! surface as `NotFound`, duplicate unique constraints as `Conflict`.

mod extraction_store;
mod model_store;
mod monitoring_store;
mod ontology_store;
mod timeseries_store;

pub use extraction_store::{ExtractionStore, NewExtractionJob};
pub use model_store::{ModelStore, NewModel};
pub use monitoring_store::{MonitoringStore, NewMonitoringJob, NewRule};
pub use ontology_store::{NewClass, NewOntology, NewProperty, OntologyStore};
pub use timeseries_store::TimeSeriesStore;

use crate::error::PlatformError;

/// Map a sqlx error to `Conflict` when it is a unique-constraint violation
pub(crate) fn map_insert_err(e: sqlx::Error, what: &str) -> PlatformError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return PlatformError::Conflict(format!("{} already exists", what));
    }
    PlatformError::from(e)
}
