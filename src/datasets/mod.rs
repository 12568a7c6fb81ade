//! Unified dataset model and the pluggable adapters that produce it

pub mod adapters;
pub mod unified;

pub use unified::{
    ColumnMetadata, ColumnStats, DataType, TimeSeriesInfo, UnifiedDataset, build_dataset,
};
