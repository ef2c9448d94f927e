//! Profile field normalization.

/// Canonicalize a raw profile field value into a GitHub username.
///
/// Surrounding whitespace is removed and the declared capitalization is
/// kept. Missing, empty and whitespace-only values mean "no mapping".
pub fn normalize_github(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Key used for case-insensitive username comparison.
pub fn github_key(username: &str) -> String {
    username.to_lowercase()
}
