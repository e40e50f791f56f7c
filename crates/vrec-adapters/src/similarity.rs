//! Token-based fuzzy ratios in the `0.0..=1.0` range.
//!
//! All ratios build on normalized Levenshtein similarity and are symmetric in
//! their arguments. An empty side always scores `0.0`.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Plain edit-distance similarity of two strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

/// Similarity after sorting whitespace tokens, so word order does not matter.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let mut ta: Vec<&str> = a.split_whitespace().collect();
    let mut tb: Vec<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    ta.sort_unstable();
    tb.sort_unstable();
    ratio(&ta.join(" "), &tb.join(" "))
}

/// Set-based similarity: shared tokens count fully, so one side being a token
/// subset of the other scores `1.0`.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let common = ta.intersection(&tb).copied().collect::<Vec<_>>();
    let only_a = ta.difference(&tb).copied().collect::<Vec<_>>();
    let only_b = tb.difference(&ta).copied().collect::<Vec<_>>();

    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 1.0;
    }

    let sect = common.join(" ");
    let with_a = join_parts(&sect, &only_a.join(" "));
    let with_b = join_parts(&sect, &only_b.join(" "));

    [
        ratio(&sect, &with_a),
        ratio(&sect, &with_b),
        ratio(&with_a, &with_b),
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

fn join_parts(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}
