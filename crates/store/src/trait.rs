use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stagger_core::{Record, StoreResult};

use crate::filter::FilterExpression;

/// Opaque continuation token returned by a scan.
///
/// Callers must treat the contents as uninterpreted and only hand it back to
/// the store that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanCursor(String);

impl ScanCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parameters of one scan call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanRequest {
    /// Applied after items are read; non-matching items are dropped from the page.
    pub filter: Option<FilterExpression>,
    /// Resume position from the previous page.
    pub exclusive_start_key: Option<ScanCursor>,
    /// Maximum number of items to *evaluate* (before filtering) in this call.
    pub limit: Option<usize>,
}

impl ScanRequest {
    pub fn new(filter: FilterExpression) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, cursor: ScanCursor) -> Self {
        self.exclusive_start_key = Some(cursor);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of scan results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanPage {
    pub items: Vec<Record>,
    /// Present iff more items remain to be evaluated.
    pub last_evaluated_key: Option<ScanCursor>,
}

impl ScanPage {
    pub fn has_more(&self) -> bool {
        self.last_evaluated_key.is_some()
    }
}

/// A single table of a key-value store.
///
/// ## Semantics
///
/// `scan()`:
/// - evaluates up to `limit` items after `exclusive_start_key`, in the store's order
/// - returns only the evaluated items matching `filter`, so a page may be empty
///   while `last_evaluated_key` is still present
/// - returns no cursor once the table has been fully evaluated
///
/// `put_item()`:
/// - replaces the whole item with the same primary key (or inserts it)
/// - fails with a classified [`stagger_core::StoreError`]; throttling is
///   reported as `RateLimited`
///
/// Both calls are blocking.
pub trait KvStore: Send + Sync {
    fn table_name(&self) -> &str;

    fn scan(&self, request: &ScanRequest) -> StoreResult<ScanPage>;

    fn put_item(&self, item: &Record) -> StoreResult<()>;
}

impl<S> KvStore for Arc<S>
where
    S: KvStore + ?Sized,
{
    fn table_name(&self) -> &str {
        (**self).table_name()
    }

    fn scan(&self, request: &ScanRequest) -> StoreResult<ScanPage> {
        (**self).scan(request)
    }

    fn put_item(&self, item: &Record) -> StoreResult<()> {
        (**self).put_item(item)
    }
}

impl<S> KvStore for &S
where
    S: KvStore + ?Sized,
{
    fn table_name(&self) -> &str {
        (**self).table_name()
    }

    fn scan(&self, request: &ScanRequest) -> StoreResult<ScanPage> {
        (**self).scan(request)
    }

    fn put_item(&self, item: &Record) -> StoreResult<()> {
        (**self).put_item(item)
    }
}
