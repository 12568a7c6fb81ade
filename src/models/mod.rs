//! Core data model
//!
//! Database row types and the shared in-flight structures that move between
//! the extraction, analysis, training and monitoring subsystems.

pub mod extraction;
pub mod monitoring;
pub mod ontology;
pub mod training;

pub use extraction::*;
pub use monitoring::*;
pub use ontology::*;
pub use training::*;
