pub mod text;

pub use text::{normalize_field_name, similarity};
