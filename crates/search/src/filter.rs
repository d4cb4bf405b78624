/// Build the backend predicate for one query.
///
/// The version constraint is always present. A non-blank caller filter is
/// trimmed, parenthesised and AND-ed onto it; its syntax is left to the
/// backend to judge.
#[must_use]
pub fn compose_filter(version_scope: &str, user_filter: Option<&str>) -> String {
    let base = version_predicate(version_scope);
    match user_filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(extra) => format!("{base} && ({extra})"),
        None => base,
    }
}

/// `version == "<scope>"` with quotes and backslashes escaped.
#[must_use]
pub fn version_predicate(version_scope: &str) -> String {
    let escaped = version_scope.replace('\\', "\\\\").replace('"', "\\\"");
    format!("version == \"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_only_when_filter_absent_or_blank() {
        assert_eq!(compose_filter("v15.0.0", None), r#"version == "v15.0.0""#);
        assert_eq!(compose_filter("v15.0.0", Some("")), r#"version == "v15.0.0""#);
        assert_eq!(compose_filter("v15.0.0", Some("  \t")), r#"version == "v15.0.0""#);
    }

    #[test]
    fn user_filter_is_trimmed_and_and_combined() {
        assert_eq!(
            compose_filter("v15.0.0", Some("  tag == 'api' ")),
            r#"version == "v15.0.0" && (tag == 'api')"#
        );
    }

    #[test]
    fn version_literal_is_escaped() {
        assert_eq!(version_predicate(r#"v"1\"#), r#"version == "v\"1\\""#);
    }
}
