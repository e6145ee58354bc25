//! Identifier validation and quoting.
//!
//! Only identifiers matching `[A-Za-z_][A-Za-z0-9_]*` (at most
//! [`MAX_IDENT_LEN`] bytes) are ever placed into SQL text. Anything else is
//! reported as `None`, and callers drop the field instead of failing the
//! request.

use sluice_core::TableRef;

/// Postgres truncates identifiers beyond `NAMEDATALEN - 1`.
pub const MAX_IDENT_LEN: usize = 63;

/// Whether `ident` matches the safe identifier grammar.
pub fn is_safe_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    ident.len() <= MAX_IDENT_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier for verbatim use in SQL, or `None` if it is unsafe.
pub fn quote_ident(ident: &str) -> Option<String> {
    if is_safe_ident(ident) {
        Some(format!("\"{}\"", ident))
    } else {
        None
    }
}

/// `"schema"."table"`, or `None` if either part is unsafe.
pub fn quote_table(table: &TableRef) -> Option<String> {
    Some(format!(
        "{}.{}",
        quote_ident(&table.schema)?,
        quote_ident(&table.table)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_identifiers_are_quoted() {
        assert_eq!(quote_ident("id").as_deref(), Some("\"id\""));
        assert_eq!(quote_ident("_private").as_deref(), Some("\"_private\""));
        assert_eq!(quote_ident("CreatedAt2").as_deref(), Some("\"CreatedAt2\""));
    }

    #[test]
    fn quoting_is_deterministic() {
        assert_eq!(quote_ident("author_id"), quote_ident("author_id"));
    }

    #[test]
    fn unsafe_identifiers_are_rejected() {
        for bad in [
            "",
            "1col",
            "name;drop table users",
            "a\"b",
            "first name",
            "col-name",
            "tab\tle",
            "naïve",
            "a.b",
        ] {
            assert_eq!(quote_ident(bad), None, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn length_bound() {
        let max = "a".repeat(MAX_IDENT_LEN);
        assert!(quote_ident(&max).is_some());
        let over = "a".repeat(MAX_IDENT_LEN + 1);
        assert!(quote_ident(&over).is_none());
    }

    #[test]
    fn table_quoting() {
        assert_eq!(
            quote_table(&TableRef::new("public", "posts")).as_deref(),
            Some("\"public\".\"posts\"")
        );
        assert_eq!(quote_table(&TableRef::new("public", "posts;--")), None);
    }
}
