//! Mock remote collection for testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use super::traits::RemoteCollection;
use super::types::{CollectionError, Page, PageCursor, PageRequest, RemoteItem};

/// In-memory implementation of `RemoteCollection` for testing.
///
/// Pages are fixed up front. Individual pages and delete calls can be scripted
/// to fail, and every call is recorded.
#[derive(Clone, Default)]
pub struct MockCollection {
    state: Arc<RwLock<MockState>>,
}

#[derive(Default)]
struct MockState {
    pages: Vec<Vec<RemoteItem>>,
    max_batch_size: usize,
    failing_pages: HashSet<usize>,
    failing_batches: HashSet<usize>,
    fetch_calls: Vec<PageRequest>,
    delete_calls: Vec<Vec<String>>,
    deleted: HashMap<String, usize>,
}

impl MockCollection {
    /// Default hard cap on identifiers per delete call.
    pub const DEFAULT_MAX_BATCH: usize = 100;

    pub fn from_pages(pages: Vec<Vec<RemoteItem>>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                pages,
                max_batch_size: Self::DEFAULT_MAX_BATCH,
                ..MockState::default()
            })),
        }
    }

    pub fn from_items(items: Vec<RemoteItem>, page_size: usize) -> Self {
        let pages = items
            .chunks(page_size.max(1))
            .map(<[RemoteItem]>::to_vec)
            .collect();
        Self::from_pages(pages)
    }

    pub fn with_max_batch_size(self, max_batch_size: usize) -> Self {
        self.write().max_batch_size = max_batch_size;
        self
    }

    /// Make the fetch of the given 1-based page number fail.
    pub fn fail_page(self, page_number: usize) -> Self {
        self.write().failing_pages.insert(page_number);
        self
    }

    /// Make the given 1-based delete call fail.
    pub fn fail_batch(self, call_number: usize) -> Self {
        self.write().failing_batches.insert(call_number);
        self
    }

    pub fn fetch_calls(&self) -> Vec<PageRequest> {
        self.read().fetch_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.read().delete_calls.clone()
    }

    /// How many times `identifier` was part of a successful delete call.
    pub fn deletion_count(&self, identifier: &str) -> usize {
        self.read().deleted.get(identifier).copied().unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        let state = self.read();
        state
            .pages
            .iter()
            .flatten()
            .filter(|item| !state.deleted.contains_key(&item.identifier))
            .count()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().expect("lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().expect("lock poisoned")
    }

    fn page_index(cursor: Option<&PageCursor>) -> Result<usize, CollectionError> {
        match cursor {
            None => Ok(0),
            Some(cursor) => cursor
                .as_str()
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| CollectionError::Decode(format!("unknown cursor {cursor}"))),
        }
    }
}

impl RemoteCollection for MockCollection {
    type Error = CollectionError;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, Self::Error> {
        let mut state = self.write();
        state.fetch_calls.push(request.clone());

        let index = Self::page_index(request.cursor.as_ref())?;
        if state.failing_pages.contains(&(index + 1)) {
            return Err(CollectionError::Transport(format!(
                "simulated failure on page {}",
                index + 1
            )));
        }

        let Some(page) = state.pages.get(index) else {
            return Ok(Page::default());
        };

        let items = page
            .iter()
            .filter(|item| item.path_or_key.starts_with(&request.prefix))
            .filter(|item| !state.deleted.contains_key(&item.identifier))
            .cloned()
            .collect();

        let next_cursor =
            (index + 1 < state.pages.len()).then(|| PageCursor::new(format!("page-{}", index + 1)));

        Ok(Page { items, next_cursor })
    }

    async fn delete_batch(&self, identifiers: &[String]) -> Result<(), Self::Error> {
        let mut state = self.write();
        state.delete_calls.push(identifiers.to_vec());

        let call_number = state.delete_calls.len();
        if state.failing_batches.contains(&call_number) {
            return Err(CollectionError::Status {
                status: 500,
                message: format!("simulated failure on delete call {call_number}"),
            });
        }

        for identifier in identifiers {
            *state.deleted.entry(identifier.clone()).or_default() += 1;
        }
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.read().max_batch_size
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(keys: &[&str]) -> Vec<RemoteItem> {
        keys.iter().map(|k| RemoteItem::keyed(*k)).collect()
    }

    #[tokio::test]
    async fn test_pages_are_chained_by_cursor() {
        let mock = MockCollection::from_items(items(&["a", "b", "c"]), 2);

        let first = mock.fetch_page(&PageRequest::first("", 2)).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let cursor = first.next_cursor.clone().unwrap();

        let second = mock
            .fetch_page(&PageRequest::first("", 2).next(cursor))
            .await
            .unwrap();
        assert_eq!(second.items, items(&["c"]));
        assert!(second.is_last());
        assert_eq!(mock.fetch_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_page_failure() {
        let mock = MockCollection::from_items(items(&["a", "b"]), 1).fail_page(1);
        let result = mock.fetch_page(&PageRequest::first("", 1)).await;
        assert!(matches!(result, Err(CollectionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_delete_is_recorded_and_hides_items() {
        let mock = MockCollection::from_items(items(&["a", "b"]), 10);
        mock.delete_batch(&["a".to_owned()]).await.unwrap();

        assert_eq!(mock.deletion_count("a"), 1);
        assert_eq!(mock.remaining(), 1);

        let page = mock.fetch_page(&PageRequest::first("", 10)).await.unwrap();
        assert_eq!(page.items, items(&["b"]));
    }

    #[tokio::test]
    async fn test_scripted_batch_failure() {
        let mock = MockCollection::from_items(items(&["a", "b"]), 10).fail_batch(2);
        assert!(mock.delete_batch(&["a".to_owned()]).await.is_ok());
        assert!(mock.delete_batch(&["b".to_owned()]).await.is_err());
        assert_eq!(mock.deletion_count("b"), 0);
    }

    #[tokio::test]
    async fn test_prefix_filter_applies_server_side() {
        let mock = MockCollection::from_items(items(&["Home/a.png", "Other/b.png"]), 10);
        let page = mock
            .fetch_page(&PageRequest::first("Home/", 10))
            .await
            .unwrap();
        assert_eq!(page.items, items(&["Home/a.png"]));
    }
}
