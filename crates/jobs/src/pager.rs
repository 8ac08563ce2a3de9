//! Lazy iteration over filtered scan pages.

use stagger_core::Record;
use stagger_store::{FilterExpression, KvStore, ScanRequest};

use crate::error::{SweepError, SweepResult};
use crate::retry::Retrier;

/// `reportTime < cutoff AND attribute_not_exists(ttl)`.
pub fn eligibility_filter(report_time_attribute: &str, ttl_attribute: &str, cutoff_ms: i64) -> FilterExpression {
    FilterExpression::less_than(report_time_attribute, cutoff_ms)
        .and(FilterExpression::attribute_not_exists(ttl_attribute))
}

/// One non-empty page of eligible records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number within the run.
    pub number: u64,
    pub items: Vec<Record>,
    /// Whether the store handed back a continuation cursor.
    pub has_more: bool,
}

/// Single-pass iterator over scan pages.
///
/// Each `next()` issues one scan (through the retrier) resuming from the
/// previous cursor. Iteration ends after a page without a cursor, on a page
/// with no items, or after the first error.
pub struct ScanPager<'a, S: ?Sized> {
    store: &'a S,
    retrier: &'a Retrier,
    request: ScanRequest,
    pages: u64,
    finished: bool,
}

impl<'a, S> ScanPager<'a, S>
where
    S: KvStore + ?Sized,
{
    pub fn new(store: &'a S, retrier: &'a Retrier, filter: FilterExpression, page_limit: Option<usize>) -> Self {
        let mut request = ScanRequest::new(filter);
        request.limit = page_limit;
        Self {
            store,
            retrier,
            request,
            pages: 0,
            finished: false,
        }
    }

    /// Pages yielded so far.
    pub fn pages(&self) -> u64 {
        self.pages
    }
}

impl<S> Iterator for ScanPager<'_, S>
where
    S: KvStore + ?Sized,
{
    type Item = SweepResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let number = self.pages + 1;
        let scanned = self
            .retrier
            .execute("scan", || self.store.scan(&self.request));

        let page = match scanned {
            Ok(page) => page,
            Err(source) => {
                self.finished = true;
                return Some(Err(SweepError::ScanFailed { page: number, source }));
            }
        };

        if page.items.is_empty() {
            self.finished = true;
            return None;
        }

        let has_more = page.has_more();
        match page.last_evaluated_key {
            Some(cursor) => self.request.exclusive_start_key = Some(cursor),
            None => self.finished = true,
        }
        self.pages = number;

        Some(Ok(Page {
            number,
            items: page.items,
            has_more,
        }))
    }
}
