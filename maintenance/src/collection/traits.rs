//! Remote collection trait definitions.

use super::types::{Page, PageRequest};
use std::future::Future;

/// A remote collection that lists by cursor and deletes in batches.
///
/// See [module documentation](super) for the available backends.
pub trait RemoteCollection: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch one page. `request.cursor == None` asks for the first page.
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page, Self::Error>> + Send;

    /// Delete every identifier in one destructive call.
    ///
    /// Callers never pass more than [`max_batch_size`](Self::max_batch_size) identifiers.
    fn delete_batch(
        &self,
        identifiers: &[String],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Hard cap on identifiers per [`delete_batch`](Self::delete_batch) call.
    fn max_batch_size(&self) -> usize;

    /// Short backend name used in logs.
    fn name(&self) -> &str;
}
