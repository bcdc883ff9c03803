//! Input normalization shared by the record kinds.

use crate::error::{VaultError, VaultResult};

pub(crate) const MAX_LANGUAGE_LEN: usize = 50;
pub(crate) const MAX_SOURCE_LEN: usize = 255;
pub(crate) const MAX_SOURCE_URL_LEN: usize = 2048;
pub(crate) const MAX_TAG_NAME_LEN: usize = 100;
pub(crate) const MAX_COLLECTION_NAME_LEN: usize = 255;
pub(crate) const MAX_DESCRIPTION_LEN: usize = 1000;
pub(crate) const MAX_ICON_LEN: usize = 50;

/// Trims an optional field; blank becomes `None`. Length is in characters.
pub(crate) fn optional(field: &str, value: Option<&str>, max: usize) -> VaultResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(VaultError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

/// Trims a required name and checks its length.
pub(crate) fn name(field: &str, value: &str, max: usize) -> VaultResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VaultError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(VaultError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Case-insensitive comparison key. SQLite's `lower()` only folds ASCII, so
/// every stored key and every filter value goes through this instead.
pub(crate) fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Tag names are stored trimmed and lowercased.
pub(crate) fn tag_name(value: &str) -> VaultResult<String> {
    Ok(fold(&name("tag name", value, MAX_TAG_NAME_LEN)?))
}

pub(crate) fn collection_name(value: &str) -> VaultResult<String> {
    name("collection name", value, MAX_COLLECTION_NAME_LEN)
}

/// Accepts `#rgb` or `#rrggbb`.
pub(crate) fn color(value: Option<&str>) -> VaultResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let hex = value.strip_prefix('#').unwrap_or("");
    let valid = matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(VaultError::validation(format!(
            "color must look like #rrggbb, got {value:?}"
        )));
    }
    Ok(Some(value.to_string()))
}

/// Normalizes a list of tag names, dropping duplicates but keeping order.
pub(crate) fn tag_names(values: &[String]) -> VaultResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let normalized = tag_name(value)?;
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    Ok(out)
}

/// Normalizes a list of collection names, deduplicating case-insensitively.
pub(crate) fn collection_names(values: &[String]) -> VaultResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let normalized = collection_name(value)?;
        if !out.iter().any(|n| fold(n) == fold(&normalized)) {
            out.push(normalized);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_trims_and_drops_blank() {
        assert_eq!(optional("x", Some("  a "), 5).unwrap(), Some("a".into()));
        assert_eq!(optional("x", Some("   "), 5).unwrap(), None);
        assert_eq!(optional("x", None, 5).unwrap(), None);
        assert!(optional("x", Some("abcdef"), 5).is_err());
    }

    #[test]
    fn tag_names_are_lowercased_and_deduplicated() {
        let names = tag_names(&["React".into(), " react ".into(), "Hooks".into()]).unwrap();
        assert_eq!(names, vec!["react", "hooks"]);
        assert!(tag_name("   ").is_err());
        assert!(tag_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn collection_names_keep_case() {
        let names = collection_names(&["Work".into(), "work".into()]).unwrap();
        assert_eq!(names, vec!["Work"]);
    }

    #[test]
    fn colors() {
        assert_eq!(color(Some("#6366F1")).unwrap(), Some("#6366F1".into()));
        assert_eq!(color(Some("#abc")).unwrap(), Some("#abc".into()));
        assert!(color(Some("red")).is_err());
        assert!(color(Some("#12345g")).is_err());
        assert_eq!(color(None).unwrap(), None);
    }
}
