//! Mapping from column data types to placeholder casts.

/// Types whose values are bound as plain text without a cast.
const TEXT_LIKE: &[&str] = &["text", "character varying", "character", "varchar", "char", "name", "citext"];

/// Normalize a `format_type` string: drop type modifiers such as `(255)` or
/// `(10,2)` and collapse whitespace.
fn normalize(data_type: &str) -> String {
    let mut out = String::with_capacity(data_type.len());
    let mut depth = 0usize;
    for c in data_type.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

/// Cast suffix target for a column type, `None` for text-like columns.
///
/// `timestamp with time zone` becomes `timestamptz` and
/// `timestamp without time zone` becomes `timestamp`, so the result can be
/// written after `::` directly.
pub fn cast_for(data_type: &str) -> Option<String> {
    let normalized = normalize(data_type);
    if normalized.is_empty() {
        return None;
    }
    let (base, array_dims) = match normalized.find("[]") {
        Some(pos) => (normalized[..pos].trim_end().to_string(), normalized[pos..].to_string()),
        None => (normalized.clone(), String::new()),
    };
    if TEXT_LIKE.contains(&base.as_str()) {
        return None;
    }
    if !base
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '.')
    {
        return None;
    }
    let base = match base.as_str() {
        "timestamp with time zone" => "timestamptz".to_string(),
        "timestamp without time zone" => "timestamp".to_string(),
        "time with time zone" => "timetz".to_string(),
        "time without time zone" => "time".to_string(),
        _ => base,
    };
    Some(format!("{}{}", base, array_dims))
}

/// Array-of-column-type cast used by `= ANY($n)`.
pub fn array_cast_for(data_type: &str) -> Option<String> {
    cast_for(data_type).map(|c| format!("{}[]", c))
}

pub fn is_json(data_type: &str) -> bool {
    matches!(normalize(data_type).as_str(), "json" | "jsonb")
}
