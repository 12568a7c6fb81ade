//! CSV adapter
//!
//! Reads a headered CSV file or inline string. Short rows are kept sparse;
//! extra cells are dropped.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{AdapterConfig, DataAdapter, ExtractContext, config_limit, config_str, config_type_hints};
use crate::datasets::unified::{UnifiedDataset, build_dataset};
use crate::error::{PlatformError, Result};

#[derive(Debug)]
pub struct CsvAdapter;

impl CsvAdapter {
    fn delimiter(config: &AdapterConfig) -> u8 {
        config_str(config, "delimiter")
            .and_then(|s| s.bytes().next())
            .unwrap_or(b',')
    }

    fn parse(
        raw: &str,
        delimiter: u8,
    ) -> Result<(Vec<String>, Vec<BTreeMap<String, Value>>)> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(raw.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PlatformError::Extraction(format!("invalid CSV header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.is_empty() {
            return Err(PlatformError::Extraction("CSV input has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| PlatformError::Extraction(format!("invalid CSV row: {}", e)))?;
            let mut row = BTreeMap::new();
            for (i, header) in headers.iter().enumerate() {
                if let Some(cell) = record.get(i) {
                    row.insert(header.clone(), Value::String(cell.to_string()));
                }
            }
            rows.push(row);
        }

        Ok((headers, rows))
    }
}

#[async_trait]
impl DataAdapter for CsvAdapter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn description(&self) -> &'static str {
        "Reads delimited text files or inline CSV content"
    }

    fn supports(&self, config: &AdapterConfig) -> bool {
        config_str(config, "path").is_some_and(|p| p.to_ascii_lowercase().ends_with(".csv"))
            || config_str(config, "source_type") == Some("csv")
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<()> {
        if config_str(config, "path").is_none() && config_str(config, "content").is_none() {
            return Err(PlatformError::Validation(
                "csv adapter requires 'path' or 'content'".to_string(),
            ));
        }
        Ok(())
    }

    async fn extract(
        &self,
        ctx: &ExtractContext,
        config: &AdapterConfig,
    ) -> Result<UnifiedDataset> {
        let (raw, source) = match config_str(config, "path") {
            Some(path) => {
                let resolved = ctx.resolve_path(path);
                let raw = tokio::fs::read_to_string(&resolved).await.map_err(|e| {
                    PlatformError::Extraction(format!(
                        "failed to read {}: {}",
                        resolved.display(),
                        e
                    ))
                })?;
                (raw, path.to_string())
            },
            None => {
                let content = config_str(config, "content").unwrap_or_default().to_string();
                (content, "inline".to_string())
            },
        };

        let (headers, rows) = Self::parse(&raw, Self::delimiter(config))?;
        let hints = config_type_hints(config)?;

        Ok(build_dataset(
            &source,
            headers,
            rows,
            &hints,
            config_limit(config),
            serde_json::json!({"adapter": "csv"}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::unified::DataType;
    use serde_json::json;

    #[tokio::test]
    async fn test_extract_inline_csv() {
        let config = json!({
            "type": "csv",
            "content": "name,price,category\nLaptop,999.99,Electronics\nMouse,29.99,Electronics"
        });
        let ds = CsvAdapter.extract(&ExtractContext::default(), &config).await.unwrap();
        assert_eq!(ds.row_count, 2);
        assert_eq!(ds.column_count, 3);
        assert_eq!(ds.column("price").unwrap().data_type, DataType::Numeric);
        assert_eq!(ds.column("name").unwrap().data_type, DataType::String);
        assert_eq!(ds.rows[0]["name"], json!("Laptop"));
    }

    #[tokio::test]
    async fn test_short_rows_stay_sparse() {
        let config = json!({"type": "csv", "content": "a,b\n1,2\n3"});
        let ds = CsvAdapter.extract(&ExtractContext::default(), &config).await.unwrap();
        assert_eq!(ds.row_count, 2);
        assert!(!ds.rows[1].contains_key("b"));
        assert!(ds.column("b").unwrap().has_nulls);
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let config = json!({"type": "csv", "content": "x;y\n1;2", "delimiter": ";"});
        let ds = CsvAdapter.extract(&ExtractContext::default(), &config).await.unwrap();
        assert_eq!(ds.rows[0]["y"], json!("2"));
    }

    #[test]
    fn test_validate_requires_input() {
        assert!(CsvAdapter.validate_config(&json!({"type": "csv"})).is_err());
        assert!(CsvAdapter.validate_config(&json!({"type": "csv", "path": "a.csv"})).is_ok());
    }
}
