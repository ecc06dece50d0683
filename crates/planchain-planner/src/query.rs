//! Query normalization before planning

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("w/o", "without"),
    ("w/", "with"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("etc.", "and so on"),
];

/// Collapse whitespace runs and expand common abbreviations.
pub fn preprocess_query(query: &str) -> String {
    let mut out = query.split_whitespace().collect::<Vec<_>>().join(" ");
    for (abbrev, expansion) in ABBREVIATIONS {
        out = out.replace(abbrev, expansion);
    }
    out
}
