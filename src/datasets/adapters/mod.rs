// Data Adapter Module
// Purpose: Provide a unified interface from heterogeneous inputs (CSV,
// Excel, JSON, external plugins) to the UnifiedDataset model.

mod csv;
mod excel;
mod json;
mod plugin;

pub use csv::CsvAdapter;
pub use excel::ExcelAdapter;
pub use json::JsonAdapter;
pub use plugin::{InputPlugin, PluginAdapter, PluginData, PluginRegistry};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::datasets::unified::{DataType, UnifiedDataset};
use crate::error::{PlatformError, Result};

/// Adapter configuration, an untyped JSON map. `type` selects the adapter;
/// everything else is adapter-specific.
pub type AdapterConfig = Value;

/// Shared context handed to each extraction
#[derive(Debug, Clone, Default)]
pub struct ExtractContext {
    /// Base directory relative paths are resolved against
    pub base_dir: Option<std::path::PathBuf>,
}

impl ExtractContext {
    pub fn resolve_path(&self, path: &str) -> std::path::PathBuf {
        match &self.base_dir {
            Some(base) if !std::path::Path::new(path).is_absolute() => base.join(path),
            _ => std::path::PathBuf::from(path),
        }
    }
}

/// A pluggable input source producing unified datasets
#[async_trait]
pub trait DataAdapter: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether this adapter can take the config, used as a fallback when no
    /// explicit `type` is present
    fn supports(&self, config: &AdapterConfig) -> bool;

    /// Check required keys before extraction starts
    fn validate_config(&self, config: &AdapterConfig) -> Result<()>;

    async fn extract(&self, ctx: &ExtractContext, config: &AdapterConfig)
    -> Result<UnifiedDataset>;
}

/// Process-wide adapter registry, populated once at startup
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn DataAdapter>>,
}

impl AdapterRegistry {
    fn builtin() -> Self {
        Self {
            adapters: vec![
                Arc::new(CsvAdapter),
                Arc::new(ExcelAdapter),
                Arc::new(JsonAdapter),
                Arc::new(PluginAdapter),
            ],
        }
    }

    /// Resolve by the config's `type` first, then by scanning `supports`
    pub fn resolve(&self, config: &AdapterConfig) -> Result<Arc<dyn DataAdapter>> {
        if let Some(type_name) = config.get("type").and_then(|v| v.as_str()) {
            if let Some(adapter) = self.adapters.iter().find(|a| a.name() == type_name) {
                return Ok(adapter.clone());
            }
            return Err(PlatformError::Validation(format!("unknown adapter type '{}'", type_name)));
        }

        self.adapters
            .iter()
            .find(|a| a.supports(config))
            .cloned()
            .ok_or_else(|| {
                PlatformError::Validation("no adapter supports the given config".to_string())
            })
    }

    pub fn list(&self) -> Vec<(&'static str, &'static str)> {
        self.adapters.iter().map(|a| (a.name(), a.description())).collect()
    }
}

static REGISTRY: Lazy<AdapterRegistry> = Lazy::new(AdapterRegistry::builtin);

pub fn registry() -> &'static AdapterRegistry {
    &REGISTRY
}

/// Validate then run the adapter selected by `config`
pub async fn extract_dataset(
    ctx: &ExtractContext,
    config: &AdapterConfig,
) -> Result<UnifiedDataset> {
    let adapter = registry().resolve(config)?;
    adapter.validate_config(config)?;
    tracing::debug!("Extracting dataset via '{}' adapter", adapter.name());
    adapter.extract(ctx, config).await
}

// ----------------------------------------------------------------------
// Shared config accessors
// ----------------------------------------------------------------------

pub(crate) fn config_str<'a>(config: &'a AdapterConfig, key: &str) -> Option<&'a str> {
    config.get(key).and_then(|v| v.as_str())
}

pub(crate) fn config_limit(config: &AdapterConfig) -> Option<usize> {
    config.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize)
}

/// Parse the optional `type_hints` map (column -> type name)
pub(crate) fn config_type_hints(config: &AdapterConfig) -> Result<BTreeMap<String, DataType>> {
    let mut hints = BTreeMap::new();
    let Some(raw) = config.get("type_hints").and_then(|v| v.as_object()) else {
        return Ok(hints);
    };
    for (column, hint) in raw {
        let name = hint.as_str().ok_or_else(|| {
            PlatformError::Validation(format!("type hint for '{}' must be a string", column))
        })?;
        let data_type = DataType::parse(name).ok_or_else(|| {
            PlatformError::Validation(format!("unknown type hint '{}' for '{}'", name, column))
        })?;
        hints.insert(column.clone(), data_type);
    }
    Ok(hints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_resolves_by_type() {
        let adapter = registry().resolve(&json!({"type": "csv", "path": "x.csv"})).unwrap();
        assert_eq!(adapter.name(), "csv");
    }

    #[test]
    fn test_registry_unknown_type_is_error() {
        let err = registry().resolve(&json!({"type": "parquet"})).unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[test]
    fn test_registry_falls_back_to_supports() {
        let adapter = registry().resolve(&json!({"path": "data.csv"})).unwrap();
        assert_eq!(adapter.name(), "csv");
    }

    #[test]
    fn test_type_hints_parsing() {
        let hints =
            config_type_hints(&json!({"type_hints": {"price": "numeric", "sku": "categorical"}}))
                .unwrap();
        assert_eq!(hints.get("price"), Some(&DataType::Numeric));
        assert_eq!(hints.get("sku"), Some(&DataType::Categorical));

        assert!(config_type_hints(&json!({"type_hints": {"x": "widget"}})).is_err());
    }
}
