/// Spellings folded onto a canonical category name.
const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("bills", "bills & fees"),
    ("bill", "bills & fees"),
    ("personal care", "personal"),
];

/// Lowercase, trim, collapse inner whitespace, then apply the alias table.
pub fn normalize_category(raw: &str) -> String {
    let lower = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    CATEGORY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}
