use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use serde_json::Value as JsonValue;
use tracing::debug;

use stagger_core::{Record, StoreError, StoreResult};

use super::r#trait::{KvStore, ScanCursor, ScanPage, ScanRequest};

/// Items evaluated per scan call when the request sets no limit.
pub const DEFAULT_PAGE_SIZE: usize = 1_000;

/// In-memory table keyed by a single string/number attribute.
///
/// Intended for tests/dev. Scans walk items in key order, and failures can be
/// scripted per operation to exercise throttling and partial-failure paths.
#[derive(Debug)]
pub struct InMemoryTable {
    name: String,
    key_attribute: String,
    page_size: usize,
    items: RwLock<BTreeMap<String, Record>>,
    scan_faults: Mutex<VecDeque<StoreError>>,
    put_faults: Mutex<HashMap<String, VecDeque<StoreError>>>,
    scan_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl InMemoryTable {
    pub fn new(name: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_attribute: key_attribute.into(),
            page_size: DEFAULT_PAGE_SIZE,
            items: RwLock::new(BTreeMap::new()),
            scan_faults: Mutex::new(VecDeque::new()),
            put_faults: Mutex::new(HashMap::new()),
            scan_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
        }
    }

    /// Number of items a scan evaluates when the request sets no limit.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed an item directly, bypassing fault injection.
    pub fn insert(&self, item: Record) -> StoreResult<()> {
        let key = self.key_of(&item)?;
        self.write_items()?.insert(key, item);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.items.read().ok()?.get(key).cloned()
    }

    /// All items, in key order.
    pub fn items(&self) -> Vec<Record> {
        self.items
            .read()
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next scan calls fail with these errors, in order.
    pub fn fail_next_scans(&self, errors: impl IntoIterator<Item = StoreError>) {
        if let Ok(mut faults) = self.scan_faults.lock() {
            faults.extend(errors);
        }
    }

    /// The next writes of the item with this key fail with these errors, in order.
    pub fn fail_puts_for(&self, key: impl Into<String>, errors: impl IntoIterator<Item = StoreError>) {
        if let Ok(mut faults) = self.put_faults.lock() {
            faults.entry(key.into()).or_default().extend(errors);
        }
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn key_of(&self, item: &Record) -> StoreResult<String> {
        match item.get(&self.key_attribute) {
            Some(JsonValue::String(s)) => Ok(s.clone()),
            Some(JsonValue::Number(n)) => Ok(n.to_string()),
            _ => Err(StoreError::rejected(
                "ValidationException",
                format!("item is missing key attribute '{}'", self.key_attribute),
            )),
        }
    }

    fn write_items(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Record>>> {
        self.items
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }

    fn next_scan_fault(&self) -> Option<StoreError> {
        self.scan_faults.lock().ok()?.pop_front()
    }

    fn next_put_fault(&self, key: &str) -> Option<StoreError> {
        self.put_faults.lock().ok()?.get_mut(key)?.pop_front()
    }
}

impl KvStore for InMemoryTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn scan(&self, request: &ScanRequest) -> StoreResult<ScanPage> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_scan_fault() {
            return Err(err);
        }

        let items = self
            .items
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;

        let lower = match &request.exclusive_start_key {
            Some(cursor) => Bound::Excluded(cursor.as_str().to_string()),
            None => Bound::Unbounded,
        };
        let limit = request.limit.unwrap_or(self.page_size).max(1);

        let mut evaluated = items.range((lower, Bound::Unbounded));
        let mut matched = Vec::new();
        let mut last_key = None;
        for (key, item) in evaluated.by_ref().take(limit) {
            last_key = Some(key.clone());
            if request.filter.as_ref().is_none_or(|f| f.matches(item)) {
                matched.push(item.clone());
            }
        }

        let last_evaluated_key = if evaluated.next().is_some() {
            last_key.map(ScanCursor::new)
        } else {
            None
        };

        debug!(
            table = %self.name,
            matched = matched.len(),
            has_more = last_evaluated_key.is_some(),
            "scan page"
        );

        Ok(ScanPage {
            items: matched,
            last_evaluated_key,
        })
    }

    fn put_item(&self, item: &Record) -> StoreResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let key = self.key_of(item)?;
        if let Some(err) = self.next_put_fault(&key) {
            return Err(err);
        }
        self.write_items()?.insert(key, item.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterExpression;
    use serde_json::json;

    fn item(id: &str, report_time: i64) -> Record {
        Record::try_from(json!({"id": id, "reportTime": report_time})).unwrap()
    }

    fn seeded(n: usize) -> InMemoryTable {
        let table = InMemoryTable::new("impressions", "id").with_page_size(4);
        for i in 0..n {
            table.insert(item(&format!("item-{i:03}"), i as i64)).unwrap();
        }
        table
    }

    #[test]
    fn scan_pages_until_cursor_is_absent() {
        let table = seeded(10);
        let mut request = ScanRequest::default();
        let mut sizes = Vec::new();

        loop {
            let page = table.scan(&request).unwrap();
            sizes.push(page.items.len());
            match page.last_evaluated_key {
                Some(cursor) => request = request.with_cursor(cursor),
                None => break,
            }
        }

        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(table.scan_calls(), 3);
    }

    #[test]
    fn exact_multiple_of_page_size_ends_without_cursor() {
        let table = seeded(8);
        let first = table.scan(&ScanRequest::default()).unwrap();
        let second = table
            .scan(&ScanRequest::default().with_cursor(first.last_evaluated_key.unwrap()))
            .unwrap();

        assert_eq!(second.items.len(), 4);
        assert!(!second.has_more());
    }

    #[test]
    fn filter_is_applied_after_evaluation() {
        let table = seeded(6);
        let request = ScanRequest::new(FilterExpression::less_than("reportTime", 2));

        let page = table.scan(&request).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more());

        let page = table
            .scan(&request.clone().with_cursor(page.last_evaluated_key.unwrap()))
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more());
    }

    #[test]
    fn put_item_replaces_by_key() {
        let table = seeded(1);
        let tagged = item("item-000", 0).with_attribute("ttl", 99);

        table.put_item(&tagged).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("item-000").unwrap().ttl(), Some(99));
    }

    #[test]
    fn put_item_without_key_is_rejected() {
        let table = seeded(0);
        let err = table
            .put_item(&Record::try_from(json!({"reportTime": 1})).unwrap())
            .unwrap_err();
        assert_eq!(err.code(), "ValidationException");
    }

    #[test]
    fn scripted_faults_are_consumed_in_order() {
        let table = seeded(1);
        table.fail_next_scans([StoreError::rate_limited("scan throttled")]);
        table.fail_puts_for(
            "item-000",
            [
                StoreError::rate_limited("put throttled"),
                StoreError::unavailable("down"),
            ],
        );

        assert!(table.scan(&ScanRequest::default()).unwrap_err().is_rate_limited());
        assert!(table.scan(&ScanRequest::default()).is_ok());

        let record = item("item-000", 0);
        assert!(table.put_item(&record).unwrap_err().is_rate_limited());
        assert_eq!(
            table.put_item(&record).unwrap_err(),
            StoreError::unavailable("down")
        );
        assert!(table.put_item(&record).is_ok());
        assert_eq!(table.put_calls(), 3);
    }
}
