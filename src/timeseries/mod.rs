//! Time-series analysis

pub mod analyzer;

pub use analyzer::{
    Aggregation, Anomaly, AnomalyMethod, AnalyzerConfig, Forecast, ForecastPoint,
    SeriesComparison, TimeSeriesAnalyzer, TrendAnalysis, TrendDirection,
};
