//! Query Builder: turn a client's name and state into a search query.

/// Keyword and site filters OR-ed into every query.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    /// Event/role keywords, e.g. `obituary`, `promoted`.
    pub keywords: Vec<String>,
    /// Domains turned into `site:` restrictions.
    pub sites: Vec<String>,
}

impl QueryFilters {
    /// Filters that add nothing to the query.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Build a query of the form
/// `"<name>" <state> (kw1 OR kw2 ...) (site:a OR site:b ...)`.
///
/// A blank name drops the quoted phrase rather than emitting `""`. Empty
/// keyword or site lists drop their group. Never fails.
pub fn build_query(full_name: &str, state: &str, filters: &QueryFilters) -> String {
    let mut parts: Vec<String> = Vec::new();

    let name = collapse_whitespace(full_name).replace('"', "");
    if !name.is_empty() {
        parts.push(format!("\"{name}\""));
    }

    let state = state.trim();
    if !state.is_empty() {
        parts.push(state.to_string());
    }

    if let Some(group) = or_group(filters.keywords.iter().map(|k| quote_if_phrase(k))) {
        parts.push(group);
    }

    if let Some(group) = or_group(
        filters
            .sites
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| format!("site:{s}")),
    ) {
        parts.push(group);
    }

    parts.join(" ")
}

/// `(a OR b OR c)`, a bare term for a single entry, or `None` when empty.
fn or_group(terms: impl Iterator<Item = String>) -> Option<String> {
    let terms: Vec<String> = terms.filter(|t| !t.is_empty()).collect();
    match terms.len() {
        0 => None,
        1 => Some(terms[0].clone()),
        _ => Some(format!("({})", terms.join(" OR "))),
    }
}

/// Multi-word keywords become exact phrases.
fn quote_if_phrase(keyword: &str) -> String {
    let keyword = collapse_whitespace(keyword).replace('"', "");
    if keyword.contains(' ') {
        format!("\"{keyword}\"")
    } else {
        keyword
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
