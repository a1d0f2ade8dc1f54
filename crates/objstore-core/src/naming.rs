//! Index name normalization.

/// Lower-case the first character of `value`, leaving the rest unchanged.
///
/// Index names are declared on the store in this form, so caller-facing
/// names like `"OrderDate"` resolve to the `"orderDate"` index.
pub fn to_camel_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            // Simple case mapping: one char in, one char out
            let lower = first.to_lowercase().next().unwrap_or(first);
            std::iter::once(lower).chain(chars).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_first_char() {
        assert_eq!(to_camel_case("Name"), "name");
        assert_eq!(to_camel_case("OrderDate"), "orderDate");
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(to_camel_case(""), "");
        assert_eq!(to_camel_case("n"), "n");
        assert_eq!(to_camel_case("N"), "n");
    }

    #[test]
    fn test_rest_unchanged() {
        assert_eq!(to_camel_case("URL"), "uRL");
        assert_eq!(to_camel_case("already_lower"), "already_lower");
        assert_eq!(to_camel_case("Émile"), "émile");
    }

    #[test]
    fn test_first_char_maps_to_one_char() {
        assert_eq!(to_camel_case("İx"), "ix");
        assert_eq!(to_camel_case("İ").chars().count(), 1);
    }
}
