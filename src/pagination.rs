//! Page-window computation and the paging state behind a pagination bar.
//!
//! [`compute_window`] is the pure part. [`Pagination`] tracks paging for data
//! that lives on a backend; [`ClientPager`] owns its data and slices pages
//! out of it.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::CallbackResult;
use crate::types::{PageChange, PageItem, PageMeta, PageParams};

pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;
pub const DEFAULT_MAX_VISIBLE_PAGES: usize = 5;

/// Page labels to show for a list of `total_items`.
///
/// Up to `max_visible` pages are listed verbatim. Past that, a window of
/// `max_visible` pages centred on `current_page` is shown, flanked by the
/// first and last page with `Ellipsis` standing in for skipped ranges.
///
/// The window is clamped to the left edge first and to the right edge
/// second. With an even `max_visible` the centred window is one page wider
/// than `max_visible`; this matches what existing callers render.
///
/// Zero `items_per_page` or `max_visible` are treated as 1 and
/// `current_page` is clamped into range.
pub fn compute_window(
    total_items: usize,
    items_per_page: usize,
    current_page: usize,
    max_visible: usize,
) -> Vec<PageItem> {
    let total = total_items.div_ceil(items_per_page.max(1)) as i64;
    let max = max_visible.max(1) as i64;

    if total <= max {
        return (1..=total).map(|n| PageItem::Page(n as usize)).collect();
    }

    let current = (current_page as i64).clamp(1, total);
    let half = max / 2;
    let mut start = current - half;
    let mut end = current + half;

    if start < 1 {
        start = 1;
        end = max;
    }
    if end > total {
        end = total;
        start = total - max + 1;
    }

    let mut pages = Vec::with_capacity(max as usize + 4);
    if start > 1 {
        pages.push(PageItem::Page(1));
        if start > 2 {
            pages.push(PageItem::Ellipsis);
        }
    }
    for n in start..=end {
        let item = PageItem::Page(n as usize);
        if n > 0 && n <= total && !pages.contains(&item) {
            pages.push(item);
        }
    }
    if end < total {
        if end < total - 1 {
            pages.push(PageItem::Ellipsis);
        }
        pages.push(PageItem::Page(total as usize));
    }
    pages
}

/// Text for the controls a pagination bar renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Labels {
    pub prev: String,
    pub next: String,
    pub first: String,
    pub last: String,
    /// Template with `{start}`, `{end}`, `{total}`, `{page}` and `{pages}`.
    pub info: String,
    pub per_page: String,
    pub go_to: String,
    pub go_btn: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            prev: "Previous".into(),
            next: "Next".into(),
            first: "First".into(),
            last: "Last".into(),
            info: "Showing {start} - {end} of {total}".into(),
            per_page: "Per page:".into(),
            go_to: "Go to:".into(),
            go_btn: "Go".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationOptions {
    pub total_items: usize,
    pub items_per_page: usize,
    pub current_page: usize,
    pub max_visible_pages: usize,
    pub per_page_options: Vec<usize>,
    pub labels: Labels,
    pub disabled: bool,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            total_items: 0,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            current_page: 1,
            max_visible_pages: DEFAULT_MAX_VISIBLE_PAGES,
            per_page_options: vec![10, 20, 50, 100],
            labels: Labels::default(),
            disabled: false,
        }
    }
}

/// Partial change applied by [`Pagination::update`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PaginationUpdate {
    pub total_items: Option<usize>,
    pub current_page: Option<usize>,
    pub items_per_page: Option<usize>,
    pub disabled: Option<bool>,
}

pub type PageChangeFn = Arc<dyn Fn(usize, usize) -> CallbackResult + Send + Sync>;

/// Paging state for a list whose items are fetched page by page.
///
/// The page-change callback receives `(page, items_per_page)` after the
/// state has moved. Callback errors are logged and otherwise ignored.
pub struct Pagination {
    options: PaginationOptions,
    on_page_change: Option<PageChangeFn>,
}

impl Pagination {
    pub fn new(mut options: PaginationOptions) -> Self {
        if options.items_per_page == 0 {
            options.items_per_page = DEFAULT_ITEMS_PER_PAGE;
        }
        if options.max_visible_pages == 0 {
            options.max_visible_pages = DEFAULT_MAX_VISIBLE_PAGES;
        }
        let mut pager = Self {
            options,
            on_page_change: None,
        };
        pager.set_current_page(pager.options.current_page);
        pager
    }

    pub fn with_page_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_page_change = Some(Arc::new(callback));
        self
    }

    pub fn options(&self) -> &PaginationOptions {
        &self.options
    }

    pub fn total_items(&self) -> usize {
        self.options.total_items
    }

    pub fn items_per_page(&self) -> usize {
        self.options.items_per_page
    }

    pub fn total_pages(&self) -> usize {
        self.options.total_items.div_ceil(self.options.items_per_page)
    }

    /// Current page, always within `1..=max(total_pages, 1)`.
    pub fn current_page(&self) -> usize {
        self.options
            .current_page
            .clamp(1, self.total_pages().max(1))
    }

    fn set_current_page(&mut self, page: usize) {
        self.options.current_page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn visible_pages(&self) -> Vec<PageItem> {
        compute_window(
            self.options.total_items,
            self.options.items_per_page,
            self.current_page(),
            self.options.max_visible_pages,
        )
    }

    /// Fills the info label, e.g. "Showing 11 - 20 of 95".
    pub fn info_text(&self) -> String {
        let per_page = self.options.items_per_page;
        let total = self.options.total_items;
        let page = self.current_page();
        let start = if total == 0 { 0 } else { (page - 1) * per_page + 1 };
        let end = (page * per_page).min(total);

        self.options
            .labels
            .info
            .replacen("{start}", &start.to_string(), 1)
            .replacen("{end}", &end.to_string(), 1)
            .replacen("{total}", &total.to_string(), 1)
            .replacen("{page}", &page.to_string(), 1)
            .replacen("{pages}", &self.total_pages().to_string(), 1)
    }

    /// Request parameters for the current page.
    pub fn params(&self) -> PageParams {
        PageParams::for_page(self.current_page(), self.options.items_per_page)
    }

    /// Moves to `page` and fires the page-change callback.
    ///
    /// Returns false, without firing, when disabled, when `page` is out of
    /// range, or when it is already current.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if !self.move_to(page) {
            return false;
        }
        self.notify();
        true
    }

    fn move_to(&mut self, page: usize) -> bool {
        if self.options.disabled
            || page < 1
            || page > self.total_pages()
            || page == self.current_page()
        {
            return false;
        }
        self.set_current_page(page);
        true
    }

    /// Changes the page size, returns to page 1 and fires the callback.
    pub fn set_items_per_page(&mut self, items_per_page: usize) {
        self.resize(items_per_page);
        self.notify();
    }

    fn resize(&mut self, items_per_page: usize) {
        self.options.items_per_page = items_per_page.max(1);
        self.set_current_page(1);
    }

    pub fn update(&mut self, update: PaginationUpdate) {
        if let Some(total) = update.total_items {
            self.options.total_items = total;
        }
        if let Some(page) = update.current_page {
            self.set_current_page(page);
        }
        if let Some(per_page) = update.items_per_page {
            self.options.items_per_page = per_page.max(1);
        }
        if let Some(disabled) = update.disabled {
            self.options.disabled = disabled;
        }
    }

    /// Sets the item count and pulls the current page back into range.
    pub fn set_total_items(&mut self, total: usize) {
        self.options.total_items = total;
        let page = self.options.current_page;
        self.set_current_page(page);
    }

    pub fn disable(&mut self) {
        self.options.disabled = true;
    }

    pub fn enable(&mut self) {
        self.options.disabled = false;
    }

    pub fn is_disabled(&self) -> bool {
        self.options.disabled
    }

    fn notify(&self) {
        if let Some(callback) = &self.on_page_change {
            let page = self.current_page();
            if let Err(err) = callback(page, self.options.items_per_page) {
                error!(page, error = %err, "page change callback failed");
            }
        }
    }
}

pub type RenderFn<T> = Arc<dyn Fn(&[T], &PageMeta) -> CallbackResult + Send + Sync>;
pub type DataPageChangeFn<T> = Arc<dyn Fn(&[T], &PageChange) -> CallbackResult + Send + Sync>;

/// Pagination over data already held in memory.
///
/// The render callback runs whenever the visible slice changes; the
/// page-change callback runs after navigation or a page-size change.
pub struct ClientPager<T> {
    pager: Pagination,
    data: Vec<T>,
    render_items: Option<RenderFn<T>>,
    on_page_change: Option<DataPageChangeFn<T>>,
}

impl<T: Clone> ClientPager<T> {
    /// `options.total_items` is replaced by the length of `data`.
    pub fn new(data: Vec<T>, options: PaginationOptions) -> Self {
        let pager = Pagination::new(PaginationOptions {
            total_items: data.len(),
            ..options
        });
        Self {
            pager,
            data,
            render_items: None,
            on_page_change: None,
        }
    }

    /// Installs the render callback and renders the current page once.
    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&[T], &PageMeta) -> CallbackResult + Send + Sync + 'static,
    {
        self.render_items = Some(Arc::new(render));
        self.render_current_page();
        self
    }

    pub fn with_page_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[T], &PageChange) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_page_change = Some(Arc::new(callback));
        self
    }

    pub fn pager(&self) -> &Pagination {
        &self.pager
    }

    pub fn visible_pages(&self) -> Vec<PageItem> {
        self.pager.visible_pages()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn page_bounds(&self) -> (usize, usize) {
        let per_page = self.pager.items_per_page();
        let start = (self.pager.current_page() - 1) * per_page;
        let end = (start + per_page).min(self.data.len());
        (start.min(end), end)
    }

    pub fn current_page_data(&self) -> &[T] {
        let (start, end) = self.page_bounds();
        &self.data[start..end]
    }

    pub fn page_meta(&self) -> PageMeta {
        let (start, end) = self.page_bounds();
        PageMeta {
            current_page: self.pager.current_page(),
            total_pages: self.pager.total_pages(),
            total_items: self.data.len(),
            start_index: start,
            end_index: end,
        }
    }

    pub fn render_current_page(&self) {
        if let Some(render) = &self.render_items {
            if let Err(err) = render(self.current_page_data(), &self.page_meta()) {
                error!(error = %err, "render callback failed");
            }
        }
    }

    fn notify(&self) {
        if let Some(callback) = &self.on_page_change {
            let change = PageChange {
                current_page: self.pager.current_page(),
                total_pages: self.pager.total_pages(),
                items_per_page: self.pager.items_per_page(),
            };
            if let Err(err) = callback(self.current_page_data(), &change) {
                error!(page = change.current_page, error = %err, "page change callback failed");
            }
        }
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        if !self.pager.move_to(page) {
            return false;
        }
        self.render_current_page();
        self.notify();
        true
    }

    pub fn set_items_per_page(&mut self, items_per_page: usize) {
        self.pager.resize(items_per_page);
        self.render_current_page();
        self.notify();
    }

    /// Replaces the data. With `reset_page` false the current page is kept
    /// when it still exists.
    pub fn set_data(&mut self, data: Vec<T>, reset_page: bool) {
        self.data = data;
        self.pager.set_total_items(self.data.len());
        if reset_page {
            self.pager.set_current_page(1);
        }
        self.render_current_page();
    }

    // Appends never change the visible slice of earlier pages, so no render.
    pub fn add_item(&mut self, item: T) {
        self.data.push(item);
        self.pager.set_total_items(self.data.len());
    }

    pub fn add_items(&mut self, items: impl IntoIterator<Item = T>) {
        self.data.extend(items);
        self.pager.set_total_items(self.data.len());
    }

    pub fn remove_item_at(&mut self, index: usize) -> Option<T> {
        if index >= self.data.len() {
            return None;
        }
        let removed = self.data.remove(index);
        self.pager.set_total_items(self.data.len());
        self.render_current_page();
        Some(removed)
    }

    /// Removes the first item matching `predicate`.
    pub fn remove_item_where<P>(&mut self, predicate: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        let index = self.data.iter().position(predicate)?;
        self.remove_item_at(index)
    }

    /// New pager over the items matching `predicate`, sharing callbacks and
    /// options. This pager is left untouched.
    pub fn filtered<P>(&self, mut predicate: P) -> ClientPager<T>
    where
        P: FnMut(&T) -> bool,
    {
        let data: Vec<T> = self.data.iter().filter(|item| predicate(*item)).cloned().collect();
        let mut pager = ClientPager::new(data, self.pager.options().clone());
        pager.on_page_change = self.on_page_change.clone();
        pager.render_items = self.render_items.clone();
        pager.render_current_page();
        pager
    }

    /// Keeps only the items matching `predicate` and returns to page 1.
    pub fn search<P>(&mut self, mut predicate: P)
    where
        P: FnMut(&T) -> bool,
    {
        let data = self.data.iter().filter(|item| predicate(*item)).cloned().collect();
        self.set_data(data, true);
    }

    pub fn reset_search(&mut self, original: Vec<T>) {
        self.set_data(original, true);
    }

    pub fn sort_by<C>(&mut self, compare: C)
    where
        C: FnMut(&T, &T) -> Ordering,
    {
        self.data.sort_by(compare);
        self.render_current_page();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use PageItem::{Ellipsis as E, Page as P};

    #[test]
    fn small_totals_list_every_page() {
        assert_eq!(compute_window(30, 10, 2, 5), vec![P(1), P(2), P(3)]);
        assert_eq!(compute_window(50, 10, 3, 5), vec![P(1), P(2), P(3), P(4), P(5)]);
        assert!(compute_window(0, 10, 1, 5).is_empty());
    }

    #[test]
    fn centred_window_has_both_ellipses() {
        assert_eq!(
            compute_window(100, 10, 5, 5),
            vec![P(1), E, P(3), P(4), P(5), P(6), P(7), E, P(10)]
        );
    }

    #[test]
    fn left_edge_clamp() {
        assert_eq!(
            compute_window(100, 10, 1, 5),
            vec![P(1), P(2), P(3), P(4), P(5), E, P(10)]
        );
        // Start lands on 2: first page is adjacent, so no ellipsis.
        assert_eq!(
            compute_window(100, 10, 4, 5),
            vec![P(1), P(2), P(3), P(4), P(5), P(6), E, P(10)]
        );
    }

    #[test]
    fn right_edge_clamp() {
        assert_eq!(
            compute_window(100, 10, 10, 5),
            vec![P(1), E, P(6), P(7), P(8), P(9), P(10)]
        );
    }

    #[test]
    fn even_budget_shows_wider_window() {
        assert_eq!(
            compute_window(100, 10, 5, 4),
            vec![P(1), E, P(3), P(4), P(5), P(6), P(7), E, P(10)]
        );
    }

    #[test]
    fn degenerate_inputs_are_coerced() {
        assert_eq!(compute_window(3, 0, 1, 5), vec![P(1), P(2), P(3)]);
        assert_eq!(compute_window(30, 10, 99, 0), vec![P(1), E, P(3)]);
    }

    #[test]
    fn current_page_is_clamped() {
        let pager = Pagination::new(PaginationOptions {
            total_items: 25,
            current_page: 9,
            ..Default::default()
        });
        assert_eq!(pager.total_pages(), 3);
        assert_eq!(pager.current_page(), 3);

        let empty = Pagination::new(PaginationOptions::default());
        assert_eq!(empty.current_page(), 1);
        assert_eq!(empty.info_text(), "Showing 0 - 0 of 0");
    }

    #[test]
    fn info_text_fills_template() {
        let mut labels = Labels::default();
        labels.info = "{start}-{end}/{total} (page {page} of {pages})".into();
        let pager = Pagination::new(PaginationOptions {
            total_items: 95,
            current_page: 10,
            labels,
            ..Default::default()
        });
        assert_eq!(pager.info_text(), "91-95/95 (page 10 of 10)");
    }

    #[test]
    fn go_to_page_fires_callback_after_update() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut pager = Pagination::new(PaginationOptions {
            total_items: 100,
            ..Default::default()
        })
        .with_page_change(move |page, per_page| {
            sink.lock().push((page, per_page));
            Ok(())
        });

        assert!(pager.go_to_page(3));
        assert!(!pager.go_to_page(3));
        assert!(!pager.go_to_page(0));
        assert!(!pager.go_to_page(11));
        pager.set_items_per_page(20);

        assert_eq!(*seen.lock(), vec![(3, 10), (1, 20)]);
        assert_eq!(pager.params(), PageParams::for_page(1, 20));
    }

    #[test]
    fn failing_callback_does_not_undo_navigation() {
        let mut pager = Pagination::new(PaginationOptions {
            total_items: 100,
            ..Default::default()
        })
        .with_page_change(|_, _| Err("backend down".into()));

        assert!(pager.go_to_page(4));
        assert_eq!(pager.current_page(), 4);
    }

    #[test]
    fn disabled_pager_ignores_navigation() {
        let mut pager = Pagination::new(PaginationOptions {
            total_items: 100,
            ..Default::default()
        });
        pager.disable();
        assert!(!pager.go_to_page(2));
        pager.enable();
        assert!(pager.go_to_page(2));
    }

    #[test]
    fn set_total_items_reclamps() {
        let mut pager = Pagination::new(PaginationOptions {
            total_items: 100,
            current_page: 8,
            ..Default::default()
        });
        pager.set_total_items(30);
        assert_eq!(pager.current_page(), 3);
        pager.update(PaginationUpdate {
            total_items: Some(100),
            ..Default::default()
        });
        assert_eq!(pager.current_page(), 3);
    }

    fn numbers(n: usize) -> Vec<usize> {
        (1..=n).collect()
    }

    #[test]
    fn client_pager_slices_pages() {
        let mut pager = ClientPager::new(numbers(23), PaginationOptions::default());
        assert_eq!(pager.current_page_data(), &numbers(10)[..]);
        assert!(pager.go_to_page(3));
        assert_eq!(pager.current_page_data(), &[21, 22, 23]);
        assert_eq!(
            pager.page_meta(),
            PageMeta {
                current_page: 3,
                total_pages: 3,
                total_items: 23,
                start_index: 20,
                end_index: 23,
            }
        );
    }

    #[test]
    fn client_pager_renders_and_notifies() {
        let renders = Arc::new(Mutex::new(Vec::new()));
        let changes = Arc::new(Mutex::new(Vec::new()));
        let (r, c) = (Arc::clone(&renders), Arc::clone(&changes));

        let mut pager = ClientPager::new(numbers(15), PaginationOptions::default())
            .with_render(move |items: &[usize], meta| {
                r.lock().push((items.len(), meta.current_page));
                Ok(())
            })
            .with_page_change(move |items: &[usize], change| {
                c.lock().push((items[0], change.current_page, change.items_per_page));
                Ok(())
            });

        pager.go_to_page(2);
        pager.set_items_per_page(5);

        assert_eq!(*renders.lock(), vec![(10, 1), (5, 2), (5, 1)]);
        assert_eq!(*changes.lock(), vec![(11, 2, 10), (1, 1, 5)]);
    }

    #[test]
    fn client_pager_data_mutation() {
        let mut pager = ClientPager::new(numbers(21), PaginationOptions::default());
        pager.go_to_page(3);
        assert_eq!(pager.remove_item_at(20), Some(21));
        assert_eq!(pager.pager().current_page(), 2);
        assert_eq!(pager.remove_item_at(99), None);

        pager.add_item(100);
        pager.add_items([101, 102]);
        assert_eq!(pager.len(), 23);
        assert_eq!(pager.remove_item_where(|n| *n > 100), Some(101));

        pager.set_data(numbers(40), false);
        assert_eq!(pager.pager().current_page(), 2);
        pager.set_data(numbers(40), true);
        assert_eq!(pager.pager().current_page(), 1);
    }

    #[test]
    fn client_pager_search_and_filter() {
        let original = numbers(30);
        let mut pager = ClientPager::new(original.clone(), PaginationOptions::default());
        pager.go_to_page(2);

        let evens = pager.filtered(|n| n % 2 == 0);
        assert_eq!(evens.len(), 15);
        assert_eq!(pager.len(), 30);

        pager.search(|n| *n > 25);
        assert_eq!(pager.data(), &[26, 27, 28, 29, 30]);
        assert_eq!(pager.pager().current_page(), 1);

        pager.sort_by(|a, b| b.cmp(a));
        assert_eq!(pager.current_page_data()[0], 30);

        pager.reset_search(original);
        assert_eq!(pager.len(), 30);
    }
}
