//! Paging, record search and tabular export helpers for data grids.
//!
//! [`pagination::compute_window`] turns a page count into the list of page
//! buttons to show, [`search`] filters record graphs (deep, field-scoped,
//! multi-term or fuzzy) and [`export`] renders records as CSV or Excel XML.

pub mod config;
pub mod date;
pub mod debounce;
pub mod error;
pub mod export;
pub mod file;
pub mod pagination;
pub mod search;
pub mod tree;
pub mod types;

pub use error::{CallbackResult, Error, Result};
pub use pagination::{compute_window, ClientPager, Pagination, PaginationOptions};
pub use search::{filter, matches};
pub use tree::{Array, Object, Value};
pub use types::{Operator, PageItem, PageParams, SearchOptions, Strategy};
