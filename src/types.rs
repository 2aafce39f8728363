use serde::{Deserialize, Serialize, Serializer};

/// One entry in a page window: a page number or a collapsed range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

impl PageItem {
    pub fn page(&self) -> Option<usize> {
        match self {
            PageItem::Page(n) => Some(*n),
            PageItem::Ellipsis => None,
        }
    }
}

// Pages serialize as numbers and ellipses as "...", the shape a renderer
// consumes directly.
impl Serialize for PageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageItem::Page(n) => serializer.serialize_u64(*n as u64),
            PageItem::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

/// Request parameters for fetching one page from a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageParams {
    pub page: usize,
    pub limit: usize,
    pub skip: usize,
    pub offset: usize,
}

impl PageParams {
    pub fn for_page(page: usize, per_page: usize) -> Self {
        let skip = page.saturating_sub(1) * per_page;
        Self {
            page,
            limit: per_page,
            skip,
            offset: skip,
        }
    }
}

/// Passed to a client pager's render callback alongside the page slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub start_index: usize,
    pub end_index: usize,
}

/// Passed to a client pager's page-change callback alongside the page slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChange {
    pub current_page: usize,
    pub total_pages: usize,
    pub items_per_page: usize,
}

/// How several whitespace-separated terms combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[default]
    And,
    Or,
}

/// Which matcher `filter` runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Whole query as one term, substring or exact.
    #[default]
    Substring,
    /// Query split on whitespace, combined with `operator`.
    MultiTerm,
    /// Edit-distance similarity against `threshold`.
    Fuzzy,
}

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub exact_match: bool,
    /// Field-scoped search: every field must match instead of any.
    pub match_all: bool,
    pub operator: Operator,
    /// Dotted paths to restrict comparison to; `None` searches everything.
    pub fields: Option<Vec<String>>,
    /// Minimum similarity for fuzzy matches, in `0.0..=1.0`.
    pub threshold: f64,
    pub strategy: Strategy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            exact_match: false,
            match_all: false,
            operator: Operator::And,
            fields: None,
            threshold: DEFAULT_FUZZY_THRESHOLD,
            strategy: Strategy::Substring,
        }
    }
}

impl SearchOptions {
    /// The configured fields, treating an empty list as "no restriction".
    pub fn field_list(&self) -> Option<&[String]> {
        self.fields.as_deref().filter(|f| !f.is_empty())
    }
}

/// One page of search results, as printed by the CLI.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<serde_json::Value>,
    pub total_count: usize,
    pub has_more: bool,
    pub pages: Vec<PageItem>,
    pub info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_items_serialize_as_numbers_and_dots() {
        let items = vec![PageItem::Page(1), PageItem::Ellipsis, PageItem::Page(9)];
        assert_eq!(serde_json::to_string(&items).unwrap(), r#"[1,"...",9]"#);
    }

    #[test]
    fn page_params_skip_matches_offset() {
        let p = PageParams::for_page(3, 20);
        assert_eq!(p.skip, 40);
        assert_eq!(p.offset, 40);
        assert_eq!(p.limit, 20);
        assert_eq!(PageParams::for_page(0, 20).skip, 0);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SearchOptions =
            serde_json::from_str(r#"{"caseSensitive": true, "operator": "OR"}"#).unwrap();
        assert!(opts.case_sensitive);
        assert_eq!(opts.operator, Operator::Or);
        assert_eq!(opts.threshold, DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(opts.strategy, Strategy::Substring);
    }

    #[test]
    fn empty_field_list_means_unrestricted() {
        let opts = SearchOptions {
            fields: Some(vec![]),
            ..Default::default()
        };
        assert!(opts.field_list().is_none());
    }
}
