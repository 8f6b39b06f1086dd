use glob::Pattern;

/// Test all shell-style glob patterns (`*`, `?`, `[...]`) against subject.
/// Returns true if any matches. An empty pattern list matches nothing; a
/// syntactically invalid pattern never matches.
pub fn matches_any(subject: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .any(|p| p.matches(subject))
}

/// A selection of `["*"]` with no excludes keeps every table, so jobs can
/// skip the table-listing round trip and fall back to the dump tool's
/// whole-database default.
pub fn selects_whole_database(includes: &[String], excludes: &[String]) -> bool {
    includes.len() == 1 && includes[0] == "*" && excludes.is_empty()
}
