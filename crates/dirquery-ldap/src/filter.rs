//! Search filter helpers.

use tracing::warn;

/// Filter used when the caller leaves the search filter unset.
pub const DEFAULT_FILTER: &str = "(objectClass=*)";

/// Deliberately invalid filter returned when neither a candidate nor a
/// template is usable, so malformed input never searches the whole directory
/// with a wildcard.
pub const FALLBACK_FILTER: &str = "(invalidFilter=*)";

/// Resolves a candidate string against a `%s` filter template.
///
/// A candidate that already looks like a filter (contains `=`) is returned
/// unchanged. Otherwise the candidate is substituted for `%s` in the
/// template. When the template does not look like a filter either, the
/// [`FALLBACK_FILTER`] is returned and a warning logged.
#[must_use]
pub fn from_template(template: &str, candidate: &str) -> String {
    if candidate.contains('=') {
        return candidate.to_string();
    }
    if template.contains('=') {
        return template.replace("%s", candidate);
    }
    warn!(template, "search filter template must have RFC 2254 syntax");
    FALLBACK_FILTER.to_string()
}

/// Escapes a value for embedding in a search filter (RFC 4515).
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_candidate_into_template() {
        assert_eq!(from_template("(cn=%s)", "alice"), "(cn=alice)");
    }

    #[test]
    fn keeps_candidate_that_is_already_a_filter() {
        assert_eq!(from_template("(cn=%s)", "(cn=alice)"), "(cn=alice)");
        assert_eq!(from_template("", "uid=alice"), "uid=alice");
    }

    #[test]
    fn falls_back_when_nothing_is_usable() {
        assert_eq!(from_template("", ""), FALLBACK_FILTER);
        assert_eq!(from_template("no filter here", "alice"), FALLBACK_FILTER);
    }

    #[test]
    fn empty_candidate_substitutes_into_template() {
        assert_eq!(from_template("(cn=%s)", ""), "(cn=)");
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_value("a*b"), "a\\2ab");
        assert_eq!(escape_value("(admin)"), "\\28admin\\29");
        assert_eq!(escape_value("back\\slash"), "back\\5cslash");
        assert_eq!(escape_value("plain"), "plain");
    }
}
