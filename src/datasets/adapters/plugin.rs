//! Plugin adapter
//!
//! Bridges named external input plugins into the dataset model. Plugins
//! return a columnar `{columns, rows}` payload which is tabularized the
//! same way file inputs are.

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{AdapterConfig, DataAdapter, ExtractContext, config_limit, config_str, config_type_hints};
use crate::datasets::unified::{UnifiedDataset, build_dataset};
use crate::error::{PlatformError, Result};

/// Columnar payload returned by an input plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// External input source invoked by name
#[async_trait]
pub trait InputPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, params: &Value) -> Result<PluginData>;
}

/// Process-wide plugin registry. Plugins register during startup; lookups
/// after that are read-only.
pub struct PluginRegistry {
    plugins: DashMap<String, Arc<dyn InputPlugin>>,
}

impl PluginRegistry {
    fn new() -> Self {
        Self { plugins: DashMap::new() }
    }

    pub fn register(&self, plugin: Arc<dyn InputPlugin>) {
        let name = plugin.name().to_string();
        tracing::info!("Registered input plugin '{}'", name);
        self.plugins.insert(name, plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InputPlugin>> {
        self.plugins.get(name).map(|entry| entry.value().clone())
    }
}

static PLUGINS: Lazy<PluginRegistry> = Lazy::new(PluginRegistry::new);

pub fn plugin_registry() -> &'static PluginRegistry {
    &PLUGINS
}

#[derive(Debug)]
pub struct PluginAdapter;

#[async_trait]
impl DataAdapter for PluginAdapter {
    fn name(&self) -> &'static str {
        "plugin"
    }

    fn description(&self) -> &'static str {
        "Invokes a named external input plugin"
    }

    fn supports(&self, config: &AdapterConfig) -> bool {
        config_str(config, "plugin").is_some()
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<()> {
        let Some(name) = config_str(config, "plugin") else {
            return Err(PlatformError::Validation(
                "plugin adapter requires 'plugin'".to_string(),
            ));
        };
        if plugin_registry().get(name).is_none() {
            return Err(PlatformError::Extraction(format!("input plugin '{}' not registered", name)));
        }
        Ok(())
    }

    async fn extract(
        &self,
        _ctx: &ExtractContext,
        config: &AdapterConfig,
    ) -> Result<UnifiedDataset> {
        let name = config_str(config, "plugin").unwrap_or_default();
        let plugin = plugin_registry()
            .get(name)
            .ok_or_else(|| {
                PlatformError::Extraction(format!("input plugin '{}' not registered", name))
            })?;

        let params = config.get("params").cloned().unwrap_or(Value::Null);
        let data = plugin.fetch(&params).await?;

        let mut rows = Vec::with_capacity(data.rows.len());
        for cells in &data.rows {
            let mut row = BTreeMap::new();
            for (column, cell) in data.columns.iter().zip(cells.iter()) {
                if !cell.is_null() {
                    row.insert(column.clone(), cell.clone());
                }
            }
            rows.push(row);
        }

        let hints = config_type_hints(config)?;

        Ok(build_dataset(
            name,
            data.columns,
            rows,
            &hints,
            config_limit(config),
            serde_json::json!({"adapter": "plugin", "plugin": name}),
        ))
    }
}
