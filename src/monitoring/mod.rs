//! Monitoring subsystem
//!
//! Rules evaluate metric history against threshold, trend and anomaly
//! conditions; the executor runs configured jobs over windowed history and
//! records what happened; the service turns analyzer suggestions into
//! persisted monitoring configuration.

pub mod executor;
pub mod rules;
pub mod service;

pub use executor::{MonitoringExecutor, MonitoringTick};
pub use rules::RuleEngine;
pub use service::MonitoringService;
