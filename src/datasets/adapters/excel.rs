//! Excel adapter
//!
//! Reads the first worksheet (or the one named by `sheet`) with the first
//! row as the header.

use async_trait::async_trait;
use calamine::{Data, Reader, open_workbook_auto};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{AdapterConfig, DataAdapter, ExtractContext, config_limit, config_str, config_type_hints};
use crate::datasets::unified::{UnifiedDataset, build_dataset};
use crate::error::{PlatformError, Result};

#[derive(Debug)]
pub struct ExcelAdapter;

impl ExcelAdapter {
    fn cell_to_value(cell: &Data) -> Option<Value> {
        match cell {
            Data::Empty => None,
            Data::String(s) => Some(Value::String(s.clone())),
            Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            Data::Int(i) => Some(Value::Number((*i).into())),
            Data::Bool(b) => Some(Value::Bool(*b)),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(|naive| Value::String(naive.format("%Y-%m-%d %H:%M:%S").to_string())),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
            Data::Error(_) => None,
        }
    }
}

#[async_trait]
impl DataAdapter for ExcelAdapter {
    fn name(&self) -> &'static str {
        "excel"
    }

    fn description(&self) -> &'static str {
        "Reads xlsx/xls workbooks, one worksheet at a time"
    }

    fn supports(&self, config: &AdapterConfig) -> bool {
        config_str(config, "path").is_some_and(|p| {
            let lower = p.to_ascii_lowercase();
            lower.ends_with(".xlsx") || lower.ends_with(".xls") || lower.ends_with(".ods")
        })
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<()> {
        if config_str(config, "path").is_none() {
            return Err(PlatformError::Validation("excel adapter requires 'path'".to_string()));
        }
        Ok(())
    }

    async fn extract(
        &self,
        ctx: &ExtractContext,
        config: &AdapterConfig,
    ) -> Result<UnifiedDataset> {
        let path = config_str(config, "path").unwrap_or_default();
        let resolved = ctx.resolve_path(path);

        let mut workbook = open_workbook_auto(&resolved).map_err(|e| {
            PlatformError::Extraction(format!("failed to open {}: {}", resolved.display(), e))
        })?;

        let sheet_name = match config_str(config, "sheet") {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| PlatformError::Extraction("workbook has no sheets".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
            PlatformError::Extraction(format!("failed to read sheet '{}': {}", sheet_name, e))
        })?;

        let mut cell_rows = range.rows();
        let headers: Vec<String> = cell_rows
            .next()
            .ok_or_else(|| {
                PlatformError::Extraction(format!("sheet '{}' is empty", sheet_name))
            })?
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Data::Empty => format!("column_{}", i + 1),
                other => other.to_string(),
            })
            .collect();

        let mut rows = Vec::new();
        for cells in cell_rows {
            let mut row = BTreeMap::new();
            for (header, cell) in headers.iter().zip(cells.iter()) {
                if let Some(value) = Self::cell_to_value(cell) {
                    row.insert(header.clone(), value);
                }
            }
            rows.push(row);
        }

        let hints = config_type_hints(config)?;

        Ok(build_dataset(
            path,
            headers,
            rows,
            &hints,
            config_limit(config),
            serde_json::json!({"adapter": "excel", "sheet": sheet_name}),
        ))
    }
}
