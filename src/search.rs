//! In-memory record search.
//!
//! Every strategy here funnels into [`text_matches`]: trim the leaf's string
//! form, fold case unless asked not to, then compare by equality or substring.
//! Traversal of a record uses an explicit stack and an identity set, so deep
//! or cyclic graphs terminate without growing the call stack.

use std::borrow::Cow;
use std::collections::HashSet;

use regex::RegexBuilder;
use tracing::debug;

use crate::pagination::{Pagination, PaginationOptions};
use crate::tree::Value;
use crate::types::{Operator, SearchOptions, SearchResponse, Strategy};

pub const DEFAULT_HIGHLIGHT_CLASS: &str = "search-highlight";

/// Trims the query and folds its case; `None` means "no filter".
fn prepare_term(term: &str, case_sensitive: bool) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        None
    } else if case_sensitive {
        Some(trimmed.to_string())
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Compares one leaf string against a term that was already prepared with the
/// same `case_sensitive` setting.
pub fn text_matches(text: &str, term: &str, case_sensitive: bool, exact: bool) -> bool {
    let text = text.trim();
    let text: Cow<'_, str> = if case_sensitive {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.to_lowercase())
    };
    if exact {
        text == term
    } else {
        text.contains(term)
    }
}

fn value_matches(value: &Value, term: &str, case_sensitive: bool, exact: bool) -> bool {
    value
        .text()
        .is_some_and(|text| text_matches(&text, term, case_sensitive, exact))
}

/// Visits every scalar leaf reachable from `root` until `visit` returns true.
///
/// Each composite node is pushed at most once. Returns whether the visit was
/// cut short.
pub fn walk_leaves<F>(root: &Value, mut visit: F) -> bool
where
    F: FnMut(&Value) -> bool,
{
    let Some(root_id) = root.node_id() else {
        return visit(root);
    };
    let mut visited = HashSet::from([root_id]);
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        let children = match &node {
            Value::Object(map) => map.entries().into_iter().map(|(_, v)| v).collect(),
            Value::Array(arr) => arr.items(),
            _ => Vec::new(),
        };
        for child in children {
            match child.node_id() {
                Some(id) => {
                    if visited.insert(id) {
                        stack.push(child);
                    }
                }
                None => {
                    if visit(&child) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// True when any leaf anywhere in `record` matches the prepared term.
fn deep_match(record: &Value, term: &str, case_sensitive: bool, exact: bool) -> bool {
    walk_leaves(record, |leaf| value_matches(leaf, term, case_sensitive, exact))
}

/// Matches the value found at `path`. Absent paths never match; a composite
/// at the path is searched in depth.
fn path_matches(record: &Value, path: &str, term: &str, case_sensitive: bool, exact: bool) -> bool {
    match record.resolve_path(path) {
        None => false,
        Some(found) if found.is_composite() => deep_match(&found, term, case_sensitive, exact),
        Some(found) => value_matches(&found, term, case_sensitive, exact),
    }
}

fn fields_match(
    record: &Value,
    fields: &[String],
    term: &str,
    case_sensitive: bool,
    exact: bool,
    match_all: bool,
) -> bool {
    let hit = |field: &String| path_matches(record, field, term, case_sensitive, exact);
    if match_all {
        fields.iter().all(hit)
    } else {
        fields.iter().any(hit)
    }
}

fn split_terms(query: &str, case_sensitive: bool) -> Vec<String> {
    query
        .split_whitespace()
        .filter_map(|t| prepare_term(t, case_sensitive))
        .collect()
}

// Each term is a substring test on its own; exact matching does not apply
// to individual words.
fn multi_term_match(record: &Value, terms: &[String], options: &SearchOptions) -> bool {
    let cs = options.case_sensitive;
    let term_hit = |term: &String| match options.field_list() {
        Some(fields) => fields.iter().any(|f| path_matches(record, f, term, cs, false)),
        None => deep_match(record, term, cs, false),
    };
    match options.operator {
        Operator::And => terms.iter().all(term_hit),
        Operator::Or => terms.iter().any(term_hit),
    }
}

/// Decides whether one record passes the search described by `options`.
///
/// An empty or whitespace-only term matches everything.
pub fn matches(record: &Value, term: &str, options: &SearchOptions) -> bool {
    let cs = options.case_sensitive;
    match options.strategy {
        Strategy::Substring => {
            let Some(term) = prepare_term(term, cs) else {
                return true;
            };
            match options.field_list() {
                Some(fields) => {
                    fields_match(record, fields, &term, cs, options.exact_match, options.match_all)
                }
                None => deep_match(record, &term, cs, options.exact_match),
            }
        }
        Strategy::MultiTerm => {
            let terms = split_terms(term, cs);
            terms.is_empty() || multi_term_match(record, &terms, options)
        }
        Strategy::Fuzzy => {
            let Some(term) = prepare_term(term, false) else {
                return true;
            };
            best_similarity(record, &term, options.field_list()) >= options.threshold
        }
    }
}

/// Keeps the records that pass `options`, preserving their relative order
/// (fuzzy results are instead ranked by similarity).
///
/// An empty term returns the input unchanged.
pub fn filter(records: &[Value], term: &str, options: &SearchOptions) -> Vec<Value> {
    if term.trim().is_empty() {
        return records.to_vec();
    }
    let out: Vec<Value> = match options.strategy {
        Strategy::Fuzzy => fuzzy_search(records, term, options.field_list(), options.threshold),
        _ => records
            .iter()
            .filter(|r| matches(r, term, options))
            .cloned()
            .collect(),
    };
    debug!(
        strategy = ?options.strategy,
        total = records.len(),
        kept = out.len(),
        "filtered records"
    );
    out
}

/// Searches every leaf of every record, ignoring `options.fields`.
pub fn deep_search(records: &[Value], term: &str, options: &SearchOptions) -> Vec<Value> {
    let cs = options.case_sensitive;
    let Some(term) = prepare_term(term, cs) else {
        return records.to_vec();
    };
    records
        .iter()
        .filter(|r| deep_match(r, &term, cs, options.exact_match))
        .cloned()
        .collect()
}

/// Searches only the values at the given dotted paths.
pub fn search_by_fields(
    records: &[Value],
    term: &str,
    fields: &[String],
    options: &SearchOptions,
) -> Vec<Value> {
    let cs = options.case_sensitive;
    let Some(term) = prepare_term(term, cs) else {
        return records.to_vec();
    };
    records
        .iter()
        .filter(|r| fields_match(r, fields, &term, cs, options.exact_match, options.match_all))
        .cloned()
        .collect()
}

/// Splits `query` on whitespace and combines per-term results with
/// `options.operator`.
pub fn multi_term_search(records: &[Value], query: &str, options: &SearchOptions) -> Vec<Value> {
    let terms = split_terms(query, options.case_sensitive);
    if terms.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| multi_term_match(r, &terms, options))
        .cloned()
        .collect()
}

/// Candidate strings for fuzzy comparison, lowercased. Empty strings are
/// skipped since every string contains them.
fn fuzzy_candidates(record: &Value, fields: Option<&[String]>) -> Vec<String> {
    let mut out = Vec::new();
    let mut collect = |leaf: &Value| {
        if let Some(text) = leaf.text().filter(|t| !t.is_empty()) {
            out.push(text.to_lowercase());
        }
        false
    };
    match fields {
        Some(fields) => {
            for field in fields {
                if let Some(found) = record.resolve_path(field) {
                    walk_leaves(&found, &mut collect);
                }
            }
        }
        None => {
            walk_leaves(record, &mut collect);
        }
    }
    out
}

fn best_similarity(record: &Value, term: &str, fields: Option<&[String]>) -> f64 {
    fuzzy_candidates(record, fields)
        .iter()
        .map(|candidate| similarity(term, candidate))
        .fold(0.0, f64::max)
}

/// Records whose best field similarity reaches `threshold`, paired with that
/// similarity and ordered from most to least similar. Ties keep input order.
pub fn fuzzy_scores(
    records: &[Value],
    term: &str,
    fields: Option<&[String]>,
    threshold: f64,
) -> Vec<(Value, f64)> {
    let Some(term) = prepare_term(term, false) else {
        return records.iter().map(|r| (r.clone(), 1.0)).collect();
    };
    let mut scored: Vec<(Value, f64)> = records
        .iter()
        .map(|r| (r.clone(), best_similarity(r, &term, fields)))
        .filter(|(_, score)| *score >= threshold)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

/// Typo-tolerant search. `fields` of `None` compares every leaf.
pub fn fuzzy_search(
    records: &[Value],
    term: &str,
    fields: Option<&[String]>,
    threshold: f64,
) -> Vec<Value> {
    fuzzy_scores(records, term, fields, threshold)
        .into_iter()
        .map(|(record, _)| record)
        .collect()
}

/// Similarity in `0.0..=1.0`: 1 when either string contains the other,
/// otherwise the share of the longer string left untouched by the edit
/// distance.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.contains(b) || b.contains(a) {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    (longest - distance) as f64 / longest as f64
}

/// Edit distance with unit cost for insert, delete and substitute.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        table[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1]
            } else {
                1 + table[i - 1][j - 1].min(table[i][j - 1]).min(table[i - 1][j])
            };
        }
    }
    table[a.len()][b.len()]
}

/// Filters `records` and returns the page described by `paging`, together
/// with its page window and info line.
pub fn search_page(
    records: &[Value],
    term: &str,
    options: &SearchOptions,
    paging: PaginationOptions,
) -> SearchResponse {
    let hits = filter(records, term, options);
    let pager = Pagination::new(PaginationOptions {
        total_items: hits.len(),
        ..paging
    });
    let params = pager.params();
    let results: Vec<serde_json::Value> = hits
        .iter()
        .skip(params.skip)
        .take(params.limit)
        .map(Value::to_json)
        .collect();
    let has_more = params.skip + results.len() < hits.len();

    SearchResponse {
        results,
        total_count: hits.len(),
        has_more,
        pages: pager.visible_pages(),
        info: pager.info_text(),
    }
}

/// Wraps every case-insensitive occurrence of `term` in a `<mark>` element.
pub fn highlight(text: &str, term: &str, class: &str) -> String {
    if text.is_empty() || term.is_empty() {
        return text.to_string();
    }
    let Ok(re) = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &regex::Captures<'_>| {
        format!("<mark class=\"{}\">{}</mark>", class, &caps[0])
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Array, Object};
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    fn fields(names: &[&str]) -> Option<Vec<String>> {
        Some(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn nested_case_insensitive_substring() {
        let r = rec(json!({"a": {"b": "Hello"}}));
        assert!(matches(&r, "hello", &SearchOptions::default()));
        assert!(!matches(&r, "bye", &SearchOptions::default()));
    }

    #[test]
    fn case_sensitive_and_exact_flags() {
        let r = rec(json!({"name": "Hello World"}));
        let cs = SearchOptions {
            case_sensitive: true,
            ..Default::default()
        };
        assert!(!matches(&r, "hello", &cs));
        assert!(matches(&r, "Hello", &cs));

        let exact = SearchOptions {
            exact_match: true,
            ..Default::default()
        };
        assert!(!matches(&r, "hello", &exact));
        assert!(matches(&r, "  hello world ", &exact));
    }

    #[test]
    fn numbers_and_booleans_match_by_text() {
        let r = rec(json!({"qty": 42, "active": true, "tags": [1.5, "x"]}));
        let opts = SearchOptions::default();
        assert!(matches(&r, "42", &opts));
        assert!(matches(&r, "true", &opts));
        assert!(matches(&r, "1.5", &opts));
    }

    #[test]
    fn null_never_matches() {
        let r = rec(json!({"a": null}));
        assert!(!matches(&r, "null", &SearchOptions::default()));
    }

    #[test]
    fn cyclic_record_terminates() {
        let root = Object::new();
        let child = Object::new();
        child.insert("parent", root.clone());
        child.insert("label", "inner");
        root.insert("child", child);
        root.insert("self", root.clone());
        let list = Array::new();
        list.push(list.clone());
        root.insert("list", list);

        let r = Value::Object(root);
        assert!(!matches(&r, "x", &SearchOptions::default()));
        assert!(matches(&r, "inner", &SearchOptions::default()));
    }

    #[test]
    fn scalar_record_is_compared_directly() {
        assert!(matches(&Value::from("Alpha"), "alp", &SearchOptions::default()));
    }

    #[test]
    fn empty_term_is_identity() {
        let records = vec![rec(json!({"a": 1})), rec(json!({"a": 2}))];
        let out = filter(&records, "   ", &SearchOptions::default());
        assert_eq!(out, records);
    }

    #[test]
    fn field_scoped_search_ignores_other_fields() {
        let records = vec![
            rec(json!({"user": {"address": {"city": "Hanoi"}}, "note": "paris"})),
            rec(json!({"user": {"address": {"city": "Paris"}}})),
            rec(json!({"user": {}})),
        ];
        let opts = SearchOptions {
            fields: fields(&["user.address.city"]),
            ..Default::default()
        };
        let out = filter(&records, "paris", &opts);
        assert_eq!(out, vec![records[1].clone()]);
    }

    #[test]
    fn field_scoped_match_all() {
        let records = vec![
            rec(json!({"name": "ann", "email": "ann@x.io"})),
            rec(json!({"name": "ann", "email": "bob@x.io"})),
        ];
        let names = vec!["name".to_string(), "email".to_string()];
        let any = SearchOptions::default();
        let all = SearchOptions {
            match_all: true,
            ..Default::default()
        };
        assert_eq!(search_by_fields(&records, "ann", &names, &any).len(), 2);
        assert_eq!(search_by_fields(&records, "ann", &names, &all), vec![records[0].clone()]);
    }

    #[test]
    fn multi_term_and_versus_or() {
        let records = vec![rec(json!({"t": "foo only"})), rec(json!({"t": "foo and bar"}))];
        let and = SearchOptions {
            strategy: Strategy::MultiTerm,
            ..Default::default()
        };
        let or = SearchOptions {
            operator: Operator::Or,
            ..and.clone()
        };
        assert_eq!(filter(&records, "foo bar", &and), vec![records[1].clone()]);
        assert_eq!(filter(&records, "foo bar", &or), records);
        assert_eq!(multi_term_search(&records, "FOO   BAR", &and).len(), 1);
    }

    #[test]
    fn multi_term_with_fields() {
        let records = vec![rec(json!({"name": "foo", "other": "bar"}))];
        let opts = SearchOptions {
            strategy: Strategy::MultiTerm,
            fields: fields(&["name"]),
            ..Default::default()
        };
        assert!(filter(&records, "foo bar", &opts).is_empty());
    }

    #[test]
    fn levenshtein_classics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("hello", "helo"), 1);
    }

    #[test]
    fn similarity_uses_edit_distance_over_longer_length() {
        assert_eq!(similarity("hello", "helo"), 0.8);
        assert_eq!(similarity("hello", "hallo"), 0.8);
        assert_eq!(similarity("hel", "hello"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn fuzzy_threshold_gates_matches() {
        let records = vec![rec(json!({"name": "helo"}))];
        let names = vec!["name".to_string()];
        assert_eq!(fuzzy_search(&records, "hello", Some(&names), 0.6).len(), 1);
        assert!(fuzzy_search(&records, "hello", Some(&names), 0.9).is_empty());
    }

    #[test]
    fn fuzzy_orders_by_best_similarity_stably() {
        let records = vec![
            rec(json!({"name": "jonathan"})),
            rec(json!({"name": "jon"})),
            rec(json!({"name": "jxn"})),
            rec(json!({"name": "joy"})),
        ];
        let opts = SearchOptions {
            strategy: Strategy::Fuzzy,
            threshold: 0.5,
            ..Default::default()
        };
        let out = filter(&records, "jon", &opts);
        // "jonathan" and "jon" contain the term (1.0, input order kept),
        // then "jxn" and "joy" tie at 2/3.
        assert_eq!(out, records);

        let scores = fuzzy_scores(&records, "jon", None, 0.5);
        assert_eq!(scores[0].1, 1.0);
        assert!((scores[3].1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn fuzzy_skips_absent_and_empty_values() {
        let records = vec![rec(json!({"name": ""})), rec(json!({}))];
        let names = vec!["name".to_string()];
        assert!(fuzzy_search(&records, "a", Some(&names), 0.1).is_empty());
        assert!(!matches(&records[0], "a", &SearchOptions {
            strategy: Strategy::Fuzzy,
            fields: Some(names.clone()),
            ..Default::default()
        }));
    }

    #[test]
    fn highlight_wraps_literal_terms() {
        assert_eq!(
            highlight("Price (USD) usd", "usd", DEFAULT_HIGHLIGHT_CLASS),
            "Price (<mark class=\"search-highlight\">USD</mark>) \
             <mark class=\"search-highlight\">usd</mark>"
        );
        assert_eq!(highlight("a.b", ".", "m"), "a<mark class=\"m\">.</mark>b");
        assert_eq!(highlight("text", "", "m"), "text");
    }

    #[test]
    fn deep_records_are_searched_and_dropped() {
        let mut node = Value::from("needle");
        for _ in 0..100_000 {
            let parent = Object::new();
            parent.insert("next", node);
            node = Value::Object(parent);
        }
        let opts = SearchOptions::default();
        assert!(matches(&node, "needle", &opts));
        assert!(!matches(&node, "haystack", &opts));

        let page = search_page(&[node], "needle", &opts, PaginationOptions::default());
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn search_page_slices_filtered_results() {
        let records: Vec<Value> = (1..=25)
            .map(|i| rec(json!({"id": i, "kind": if i % 2 == 0 { "even" } else { "odd" }})))
            .collect();
        let paging = PaginationOptions {
            items_per_page: 5,
            current_page: 3,
            ..PaginationOptions::default()
        };
        let page = search_page(&records, "odd", &SearchOptions::default(), paging);

        assert_eq!(page.total_count, 13);
        assert_eq!(page.results.len(), 3);
        assert_eq!(page.results[0], json!({"id": 21, "kind": "odd"}));
        assert!(!page.has_more);
        assert_eq!(page.info, "Showing 11 - 13 of 13");
        assert_eq!(page.pages.len(), 3);
    }
}
