//! JSON adapter
//!
//! Accepts a file path, inline content (optionally base64-encoded), or a
//! pre-parsed array under `data`. A dotted `record_path` drills into nested
//! objects; the resolved node must be an array of objects.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{AdapterConfig, DataAdapter, ExtractContext, config_limit, config_str, config_type_hints};
use crate::datasets::unified::{UnifiedDataset, build_dataset};
use crate::error::{PlatformError, Result};

#[derive(Debug)]
pub struct JsonAdapter;

impl JsonAdapter {
    /// Walk a dotted path into nested objects
    fn resolve_path<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
        let mut node = root;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node.get(segment).ok_or_else(|| {
                PlatformError::Extraction(format!(
                    "record_path segment '{}' not found in JSON input",
                    segment
                ))
            })?;
        }
        Ok(node)
    }

    fn rows_from_array(node: &Value) -> Result<(Vec<String>, Vec<BTreeMap<String, Value>>)> {
        let array = node.as_array().ok_or_else(|| {
            PlatformError::Extraction("resolved JSON node is not an array".to_string())
        })?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(array.len());

        for (i, item) in array.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                PlatformError::Extraction(format!("JSON array element {} is not an object", i))
            })?;

            let mut row = BTreeMap::new();
            for (key, value) in object {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
                row.insert(key.clone(), value.clone());
            }
            rows.push(row);
        }

        Ok((columns, rows))
    }
}

#[async_trait]
impl DataAdapter for JsonAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn description(&self) -> &'static str {
        "Reads JSON arrays of objects from files, inline content or pre-parsed data"
    }

    fn supports(&self, config: &AdapterConfig) -> bool {
        config.get("data").is_some()
            || config_str(config, "path").is_some_and(|p| p.to_ascii_lowercase().ends_with(".json"))
            || config_str(config, "source_type") == Some("json")
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<()> {
        if config_str(config, "path").is_none()
            && config_str(config, "content").is_none()
            && config.get("data").is_none()
        {
            return Err(PlatformError::Validation(
                "json adapter requires 'path', 'content' or 'data'".to_string(),
            ));
        }
        Ok(())
    }

    async fn extract(
        &self,
        ctx: &ExtractContext,
        config: &AdapterConfig,
    ) -> Result<UnifiedDataset> {
        let (parsed, source) = if let Some(data) = config.get("data") {
            (data.clone(), "inline".to_string())
        } else if let Some(path) = config_str(config, "path") {
            let resolved = ctx.resolve_path(path);
            let raw = tokio::fs::read_to_string(&resolved).await.map_err(|e| {
                PlatformError::Extraction(format!("failed to read {}: {}", resolved.display(), e))
            })?;
            let parsed: Value = serde_json::from_str(&raw)
                .map_err(|e| PlatformError::Extraction(format!("invalid JSON: {}", e)))?;
            (parsed, path.to_string())
        } else {
            let mut content = config_str(config, "content").unwrap_or_default().to_string();
            if config_str(config, "encoding") == Some("base64") {
                let decoded = BASE64.decode(content.trim()).map_err(|e| {
                    PlatformError::Extraction(format!("invalid base64 content: {}", e))
                })?;
                content = String::from_utf8(decoded).map_err(|e| {
                    PlatformError::Extraction(format!("decoded content is not UTF-8: {}", e))
                })?;
            }
            let parsed: Value = serde_json::from_str(&content)
                .map_err(|e| PlatformError::Extraction(format!("invalid JSON: {}", e)))?;
            (parsed, "inline".to_string())
        };

        let node = match config_str(config, "record_path") {
            Some(path) => Self::resolve_path(&parsed, path)?,
            None => &parsed,
        };

        let (columns, rows) = Self::rows_from_array(node)?;
        let hints = config_type_hints(config)?;

        Ok(build_dataset(
            &source,
            columns,
            rows,
            &hints,
            config_limit(config),
            serde_json::json!({"adapter": "json"}),
        ))
    }
}
