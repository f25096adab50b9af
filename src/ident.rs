//! Identifier conversion used when a result column does not directly
//! match any entity field.

/// Converts `snake_case` (or any `_`-separated identifier) to
/// `PascalCase`.
///
/// - Empty input returns empty output.
/// - Fast path when `name` contains no `_`: returned unchanged if the
///   first character is already uppercase, otherwise with only the first
///   character upper-cased.
/// - General path: scans left-to-right; a non-`_` character is
///   upper-cased iff it is the first output character or the immediately
///   preceding input character was `_`. All `_`s are dropped.
///
/// Normative examples: `is_active` → `IsActive`, `created_at` →
/// `CreatedAt`, `my_long_column_name` → `MyLongColumnName`, `id` → `Id`,
/// `""` → `""`.
pub fn snake_to_pascal(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    if !name.contains('_') {
        let mut chars = name.chars();
        let first = chars.next().unwrap();
        if first.is_uppercase() {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len());
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
        return out;
    }

    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for ch in name.chars() {
        if ch == '_' {
            at_word_start = true;
            continue;
        }
        if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normative_examples() {
        assert_eq!(snake_to_pascal("is_active"), "IsActive");
        assert_eq!(snake_to_pascal("created_at"), "CreatedAt");
        assert_eq!(snake_to_pascal("my_long_column_name"), "MyLongColumnName");
        assert_eq!(snake_to_pascal("id"), "Id");
        assert_eq!(snake_to_pascal(""), "");
    }

    #[test]
    fn fast_path_already_pascal_is_unchanged() {
        assert_eq!(snake_to_pascal("Id"), "Id");
        assert_eq!(snake_to_pascal("CreatedAt"), "CreatedAt");
    }

    #[test]
    fn idempotent_on_pascal_case_input() {
        for input in ["is_active", "created_at", "my_long_column_name", "id", ""] {
            let once = snake_to_pascal(input);
            let twice = snake_to_pascal(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn leading_and_repeated_underscores() {
        assert_eq!(snake_to_pascal("_foo"), "Foo");
        assert_eq!(snake_to_pascal("foo__bar"), "FooBar");
    }
}
