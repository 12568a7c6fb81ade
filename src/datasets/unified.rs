//! In-memory tabular representation shared by every adapter
//!
//! Rows are column->value maps; column metadata carries the inferred type,
//! null accounting, and statistics for numeric columns. After construction
//! the dataset is scanned for time-series structure (a datetime column plus
//! at least one numeric column).

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of leading non-null samples type inference looks at
const TYPE_SAMPLE_SIZE: usize = 10;

/// Column type as inferred from the data (or forced by a type hint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Numeric,
    Integer,
    Datetime,
    Boolean,
    String,
    Categorical,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Categorical => "categorical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "numeric" | "float" | "double" => Some(Self::Numeric),
            "integer" | "int" => Some(Self::Integer),
            "datetime" | "date" => Some(Self::Datetime),
            "boolean" | "bool" => Some(Self::Boolean),
            "string" | "text" => Some(Self::String),
            "categorical" => Some(Self::Categorical),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric | Self::Integer)
    }
}

/// Statistics for a numeric column
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

/// Per-column metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub index: usize,
    pub data_type: DataType,
    pub is_numeric: bool,
    pub is_time_series: bool,
    pub is_datetime: bool,
    pub has_nulls: bool,
    pub null_count: usize,
    /// Defined iff the column is numeric
    pub stats: Option<ColumnStats>,
}

/// Detected time-series structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesInfo {
    pub date_column: String,
    pub metric_columns: Vec<String>,
    pub frequency: String,
    pub is_sorted: bool,
    pub has_gaps: bool,
}

/// The tabular output of every adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedDataset {
    pub source: String,
    pub rows: Vec<BTreeMap<String, Value>>,
    pub columns: Vec<ColumnMetadata>,
    pub row_count: usize,
    pub column_count: usize,
    pub time_series_config: Option<TimeSeriesInfo>,
    pub source_info: Value,
}

impl UnifiedDataset {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Non-null values of one column, in row order
    pub fn column_values(&self, name: &str) -> Vec<&Value> {
        self.rows
            .iter()
            .filter_map(|row| row.get(name).filter(|v| !is_null(v)))
            .collect()
    }
}

/// Assemble a dataset from raw rows: apply the row limit, infer column
/// types (honoring `type_hints`), compute stats and detect time-series
/// structure.
pub fn build_dataset(
    source: &str,
    column_names: Vec<String>,
    mut rows: Vec<BTreeMap<String, Value>>,
    type_hints: &BTreeMap<String, DataType>,
    limit: Option<usize>,
    source_info: Value,
) -> UnifiedDataset {
    if let Some(limit) = limit
        && rows.len() > limit
    {
        rows.truncate(limit);
    }

    let mut columns = Vec::with_capacity(column_names.len());
    for (index, name) in column_names.iter().enumerate() {
        let values: Vec<&Value> = rows.iter().filter_map(|r| r.get(name)).collect();
        let null_count = values.iter().filter(|v| is_null(v)).count()
            + rows.len().saturating_sub(values.len());
        let non_null: Vec<&Value> =
            values.iter().copied().filter(|v| !is_null(v)).collect();

        let data_type = match type_hints.get(name) {
            Some(hint) => *hint,
            None => infer_type(&non_null),
        };

        let stats = if data_type.is_numeric() { compute_stats(&non_null) } else { None };

        columns.push(ColumnMetadata {
            name: name.clone(),
            index,
            data_type,
            is_numeric: data_type.is_numeric(),
            is_time_series: false,
            is_datetime: data_type == DataType::Datetime,
            has_nulls: null_count > 0,
            null_count,
            stats,
        });
    }

    let row_count = rows.len();
    let column_count = columns.len();
    let mut dataset = UnifiedDataset {
        source: source.to_string(),
        rows,
        columns,
        row_count,
        column_count,
        time_series_config: None,
        source_info,
    };
    detect_time_series(&mut dataset);
    dataset
}

/// Majority-rule type inference over the first ten non-null samples
fn infer_type(values: &[&Value]) -> DataType {
    if values.is_empty() {
        return DataType::String;
    }
    let sample: Vec<&Value> = values.iter().take(TYPE_SAMPLE_SIZE).copied().collect();
    let n = sample.len();
    let half = n.div_ceil(2);

    let numeric = sample.iter().filter(|v| as_f64(v).is_some()).count();
    if numeric >= half {
        let all_integers = sample
            .iter()
            .filter_map(|v| as_f64(v))
            .all(|f| f.fract() == 0.0);
        return if all_integers { DataType::Integer } else { DataType::Numeric };
    }

    let datetimes = sample.iter().filter(|v| is_datetime_like(v)).count();
    if datetimes >= half {
        return DataType::Datetime;
    }

    let booleans = sample.iter().filter(|v| is_boolean_like(v)).count();
    if booleans >= half {
        return DataType::Boolean;
    }

    DataType::String
}

fn compute_stats(values: &[&Value]) -> Option<ColumnStats> {
    let nums: Vec<f64> = values.iter().filter_map(|v| as_f64(v)).collect();
    if nums.is_empty() {
        return None;
    }
    let count = nums.len();
    let mean = nums.iter().sum::<f64>() / count as f64;
    let variance = nums.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
    let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(ColumnStats { min, max, mean, std_dev: variance.sqrt(), count })
}

/// Attach time-series structure: the first datetime column becomes the date
/// column, and all numeric columns become metric candidates.
fn detect_time_series(dataset: &mut UnifiedDataset) {
    let date_column = dataset
        .columns
        .iter()
        .find(|c| c.is_datetime)
        .map(|c| c.name.clone());

    let Some(date_column) = date_column else {
        return;
    };

    let metric_columns: Vec<String> = dataset
        .columns
        .iter()
        .filter(|c| c.is_numeric)
        .map(|c| c.name.clone())
        .collect();

    if metric_columns.is_empty() {
        return;
    }

    for column in &mut dataset.columns {
        if metric_columns.contains(&column.name) {
            column.is_time_series = true;
        }
    }

    dataset.time_series_config = Some(TimeSeriesInfo {
        date_column,
        metric_columns,
        frequency: "irregular".to_string(),
        is_sorted: false,
        has_gaps: false,
    });
}

pub(crate) fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_boolean_like(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            s == "true" || s == "false"
        },
        _ => false,
    }
}

// Date shapes the inference recognizes: ISO-8601 date/datetime (with an
// optional zone, covering RFC-3339), YYYY/MM/DD, MM/DD/YYYY, DD-Mon-YYYY,
// and RFC-822 day-month-year.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?)?$")
            .unwrap(),
        Regex::new(r"^\d{4}/\d{2}/\d{2}$").unwrap(),
        Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap(),
        Regex::new(r"^\d{1,2}-[A-Za-z]{3}-\d{4}$").unwrap(),
        Regex::new(r"^([A-Za-z]{3},\s*)?\d{1,2}\s+[A-Za-z]{3}\s+\d{4}(\s+\d{2}:\d{2}(:\d{2})?)?")
            .unwrap(),
    ]
});

fn is_datetime_like(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    DATE_PATTERNS.iter().any(|re| re.is_match(s))
}

/// Parse a date-ish string into a UTC timestamp, for time-series ingestion
pub fn parse_timestamp(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows_from(pairs: Vec<Vec<(&str, Value)>>) -> Vec<BTreeMap<String, Value>> {
        pairs
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
            .collect()
    }

    #[test]
    fn test_infer_numeric_and_integer() {
        let ints = vec![json!("1"), json!("2"), json!("3")];
        let refs: Vec<&Value> = ints.iter().collect();
        assert_eq!(infer_type(&refs), DataType::Integer);

        let floats = vec![json!("1.5"), json!("2"), json!("3.25")];
        let refs: Vec<&Value> = floats.iter().collect();
        assert_eq!(infer_type(&refs), DataType::Numeric);
    }

    #[test]
    fn test_infer_datetime_majority() {
        let values = vec![json!("2024-01-01"), json!("2024-01-02"), json!("n/a")];
        let refs: Vec<&Value> = values.iter().collect();
        assert_eq!(infer_type(&refs), DataType::Datetime);
    }

    #[test]
    fn test_infer_boolean() {
        let values = vec![json!("true"), json!("false"), json!("TRUE")];
        let refs: Vec<&Value> = values.iter().collect();
        assert_eq!(infer_type(&refs), DataType::Boolean);
    }

    #[test]
    fn test_infer_string_fallback() {
        let values = vec![json!("alpha"), json!("beta"), json!("42")];
        let refs: Vec<&Value> = values.iter().collect();
        assert_eq!(infer_type(&refs), DataType::String);
    }

    #[test]
    fn test_build_dataset_counts_and_stats() {
        let rows = rows_from(vec![
            vec![("name", json!("a")), ("price", json!("10"))],
            vec![("name", json!("b")), ("price", json!("20"))],
            vec![("name", json!("c")), ("price", json!(""))],
        ]);
        let ds = build_dataset(
            "test",
            vec!["name".to_string(), "price".to_string()],
            rows,
            &BTreeMap::new(),
            None,
            Value::Null,
        );
        assert_eq!(ds.row_count, 3);
        assert_eq!(ds.column_count, 2);

        let price = ds.column("price").unwrap();
        assert!(price.is_numeric);
        assert!(price.has_nulls);
        assert_eq!(price.null_count, 1);
        let stats = price.stats.unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 20.0);
        assert_eq!(stats.mean, 15.0);

        let name = ds.column("name").unwrap();
        assert!(name.stats.is_none());
    }

    #[test]
    fn test_type_hint_overrides_inference() {
        let rows = rows_from(vec![vec![("code", json!("1"))], vec![("code", json!("2"))]]);
        let mut hints = BTreeMap::new();
        hints.insert("code".to_string(), DataType::Categorical);
        let ds = build_dataset(
            "test",
            vec!["code".to_string()],
            rows,
            &hints,
            None,
            Value::Null,
        );
        assert_eq!(ds.column("code").unwrap().data_type, DataType::Categorical);
    }

    #[test]
    fn test_limit_truncates_after_parsing() {
        let rows = rows_from(vec![
            vec![("x", json!("1"))],
            vec![("x", json!("2"))],
            vec![("x", json!("3"))],
        ]);
        let ds = build_dataset(
            "test",
            vec!["x".to_string()],
            rows,
            &BTreeMap::new(),
            Some(2),
            Value::Null,
        );
        assert_eq!(ds.row_count, 2);
    }

    #[test]
    fn test_time_series_detection() {
        let rows = rows_from(vec![
            vec![("date", json!("2024-01-01")), ("sales", json!("100")), ("region", json!("eu"))],
            vec![("date", json!("2024-01-02")), ("sales", json!("120")), ("region", json!("us"))],
        ]);
        let ds = build_dataset(
            "test",
            vec!["date".to_string(), "sales".to_string(), "region".to_string()],
            rows,
            &BTreeMap::new(),
            None,
            Value::Null,
        );
        let ts = ds.time_series_config.as_ref().unwrap();
        assert_eq!(ts.date_column, "date");
        assert_eq!(ts.metric_columns, vec!["sales"]);
        assert_eq!(ts.frequency, "irregular");
        assert!(ds.column("sales").unwrap().is_time_series);
        assert!(!ds.column("region").unwrap().is_time_series);
    }

    #[test]
    fn test_no_time_series_without_datetime() {
        let rows = rows_from(vec![vec![("sales", json!("100"))]]);
        let ds = build_dataset(
            "test",
            vec!["sales".to_string()],
            rows,
            &BTreeMap::new(),
            None,
            Value::Null,
        );
        assert!(ds.time_series_config.is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("2024/03/01").is_some());
        assert!(parse_timestamp("03/01/2024").is_some());
        assert!(parse_timestamp("1-Mar-2024").is_some());
        assert!(parse_timestamp("2024-03-01T10:30:00Z").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
