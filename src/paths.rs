//! Name-path string utilities.
//!
//! A name path is a sequence of node names joined by a divider string
//! (default `"///"`), identifying a position in an ontology tree or an
//! answer chain within a label. These helpers are pure functions over
//! path lists and are called by both the encoder and the decoder.
//!
//! Segment names are assumed not to contain the divider; there is no
//! escaping mechanism.

/// The default divider used throughout the crate.
pub const DEFAULT_DIVIDER: &str = "///";

/// Returns the substring of `path` before the first occurrence of
/// `divider`, or the whole path if the divider is absent.
pub fn first_segment<'a>(path: &'a str, divider: &str) -> &'a str {
    match path.find(divider) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Returns `path` with its first segment and the following divider
/// removed. A single-segment path strips to the empty string.
pub fn strip_first_segment<'a>(path: &'a str, divider: &str) -> &'a str {
    match path.find(divider) {
        Some(idx) => &path[idx + divider.len()..],
        None => "",
    }
}

/// Collects the unique first segments of `paths`, preserving first-seen
/// order.
///
/// The legacy implementation deduplicated through an unordered set, which
/// made checklist-answer emission order nondeterministic. Insertion order
/// is strictly more deterministic and is what downstream grouping relies
/// on here.
pub fn unique_first_segments(paths: &[String], divider: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for path in paths {
        let first = first_segment(path, divider);
        if !seen.iter().any(|s| s == first) {
            seen.push(first.to_string());
        }
    }
    seen
}

/// Returns the paths in `paths` whose first segment equals `first`, each
/// with that segment and its trailing divider stripped.
///
/// Matching is on the whole first segment, never a raw prefix: `"color"`
/// is not a parent of `"colors///x"`. A path equal to exactly `first`
/// yields an empty-string child path.
pub fn children_of(first: &str, paths: &[String], divider: &str) -> Vec<String> {
    paths
        .iter()
        .filter(|path| first_segment(path, divider) == first)
        .map(|path| strip_first_segment(path, divider).to_string())
        .collect()
}
