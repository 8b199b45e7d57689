//! Remote collections that list by cursor and delete in batches.
//!
//! [`RemoteCollection`] is the seam the bulk mutator drives. Backends:
//!
//! - [`CloudinaryCollection`]: Cloudinary Admin API, 500 per page, 100 per delete.
//! - [`R2Collection`]: Cloudflare R2 through OpenDAL, 1000 per delete.
//! - [`MockCollection`]: in-memory, scriptable failures, for tests.

mod cloudinary;
mod mock;
mod r2;
mod traits;
mod types;

pub use cloudinary::{
    CLOUDINARY_DEFAULT_API_BASE, CLOUDINARY_MAX_DELETE_BATCH, CLOUDINARY_MAX_PAGE_SIZE,
    CloudinaryCollection, CloudinaryConfig,
};
pub use mock::MockCollection;
pub use r2::{R2Collection, R2Config, R2_MAX_DELETE_BATCH, R2_MAX_PAGE_SIZE};
pub use traits::RemoteCollection;
pub use types::{CollectionError, Page, PageCursor, PageRequest, RemoteItem};

#[cfg(test)]
mod tests {
    use super::*;

    async fn first_page<C: RemoteCollection>(collection: &C, prefix: &str) -> Page {
        collection
            .fetch_page(&PageRequest::first(prefix, 10))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_generic_remote_collection_trait() {
        let mock = MockCollection::from_items(vec![RemoteItem::keyed("Home/a.png")], 10);
        let page = first_page(&mock, "Home/").await;
        assert_eq!(page.items.len(), 1);
        assert!(page.is_last());
    }
}
