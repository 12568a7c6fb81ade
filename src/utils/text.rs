//! Field-name normalization and fuzzy matching helpers

/// Normalize a raw field name for matching and URI synthesis: lower-case,
/// with spaces, dashes, dots and slashes folded to underscores.
pub fn normalize_field_name(field: &str) -> String {
    field
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '.' | '/' => '_',
            other => other,
        })
        .collect()
}

/// Similarity in [0, 1]: `1 - levenshtein / max(|a|, |b|)`
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("Unit Price"), "unit_price");
        assert_eq!(normalize_field_name("stock-level"), "stock_level");
        assert_eq!(normalize_field_name("a.b/c"), "a_b_c");
        assert_eq!(normalize_field_name("  Trimmed  "), "trimmed");
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("price", "price"), 1.0);
        assert!(similarity("price", "prices") > 0.6);
        assert!(similarity("price", "category") < 0.5);
        assert_eq!(similarity("", ""), 1.0);
    }
}
