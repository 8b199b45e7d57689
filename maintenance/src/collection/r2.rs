//! Cloudflare R2 object collection.

use futures::TryStreamExt as _;
use tracing::{debug, instrument};

use super::traits::RemoteCollection;
use super::types::{CollectionError, Page, PageRequest, RemoteItem};

/// S3 `DeleteObjects` accepts at most this many keys per call.
pub const R2_MAX_DELETE_BATCH: usize = 1000;

pub const R2_MAX_PAGE_SIZE: usize = 1000;

/// Configuration for Cloudflare R2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R2Config {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl R2Config {
    fn endpoint(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// Objects in one R2 bucket, addressed by key.
///
/// Listing is recursive under the requested prefix. The cursor of a page is
/// the last key it returned, resumed with `start_after`.
#[derive(Clone)]
pub struct R2Collection {
    op: opendal::Operator,
}

impl R2Collection {
    pub fn new(config: &R2Config) -> Result<Self, CollectionError> {
        let builder = opendal::services::S3::default()
            .bucket(&config.bucket)
            .region("auto")
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key)
            .endpoint(&config.endpoint());

        let op = opendal::Operator::new(builder)
            .map(|op| op.finish())
            .map_err(|e| CollectionError::Storage(e.to_string()))?;
        Ok(Self { op })
    }
}

/// A listing entry reduced to what paging needs.
#[derive(Debug, Clone)]
struct ListedEntry {
    key: String,
    size: u64,
    is_dir: bool,
}

impl From<&opendal::Entry> for ListedEntry {
    fn from(entry: &opendal::Entry) -> Self {
        Self {
            key: entry.path().to_owned(),
            size: entry.metadata().content_length(),
            is_dir: entry.metadata().is_dir(),
        }
    }
}

/// Keep the first `page_size` objects. A cursor is only handed out when at
/// least one more object follows; it is the last key on the page.
fn split_page(entries: impl IntoIterator<Item = ListedEntry>, page_size: usize) -> Page {
    let mut objects = entries.into_iter().filter(|entry| !entry.is_dir);
    let items: Vec<RemoteItem> = objects
        .by_ref()
        .take(page_size)
        .map(|entry| RemoteItem::keyed(entry.key).with_size(entry.size))
        .collect();
    let has_more = objects.next().is_some();

    let cursor = if has_more {
        items.last().map(|item| item.path_or_key.clone())
    } else {
        None
    };
    match cursor {
        Some(cursor) => Page::with_cursor(items, cursor),
        None => Page::last(items),
    }
}

fn storage_error(e: opendal::Error) -> CollectionError {
    if e.kind() == opendal::ErrorKind::RateLimited {
        CollectionError::RateLimited(e.to_string())
    } else {
        CollectionError::Storage(e.to_string())
    }
}

impl RemoteCollection for R2Collection {
    type Error = CollectionError;

    #[instrument(skip_all, fields(prefix = %request.prefix, cursor = ?request.cursor))]
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, Self::Error> {
        let page_size = request.page_size.clamp(1, R2_MAX_PAGE_SIZE);

        let mut listing = self.op.lister_with(&request.prefix).recursive(true);
        if let Some(cursor) = &request.cursor {
            listing = listing.start_after(cursor.as_str());
        }
        let mut lister = listing.await.map_err(storage_error)?;

        // Read one object past the page to learn whether another page exists.
        let mut entries = Vec::with_capacity(page_size + 1);
        let mut objects = 0;
        while objects <= page_size {
            let Some(entry) = lister.try_next().await.map_err(storage_error)? else {
                break;
            };
            let entry = ListedEntry::from(&entry);
            if !entry.is_dir {
                objects += 1;
            }
            entries.push(entry);
        }

        let page = split_page(entries, page_size);
        debug!(count = page.items.len(), has_more = !page.is_last(), "Fetched R2 page");
        Ok(page)
    }

    #[instrument(skip_all, fields(count = identifiers.len()))]
    async fn delete_batch(&self, identifiers: &[String]) -> Result<(), Self::Error> {
        self.op
            .delete_iter(identifiers.iter().cloned())
            .await
            .map_err(storage_error)
    }

    fn max_batch_size(&self) -> usize {
        R2_MAX_DELETE_BATCH
    }

    fn name(&self) -> &str {
        "r2"
    }
}
