//! Remote collection types.

use std::fmt;

/// A record owned by a remote collection.
///
/// The toolkit only reads these and asks for their deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    /// Opaque key used for deletion.
    pub identifier: String,
    /// Hierarchical key, e.g. `Home/sub/file.png`.
    pub path_or_key: String,
    pub size_bytes: Option<u64>,
}

impl RemoteItem {
    pub fn new(identifier: impl Into<String>, path_or_key: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            path_or_key: path_or_key.into(),
            size_bytes: None,
        }
    }

    /// An item whose identifier is also its hierarchical key.
    pub fn keyed(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(key.clone(), key)
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

/// Opaque continuation token handed out by a remote listing call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of a single listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Only list items whose key starts with this prefix. Empty lists everything.
    pub prefix: String,
    /// Page-size hint; backends clamp it to what they support.
    pub page_size: usize,
    pub cursor: Option<PageCursor>,
}

impl PageRequest {
    pub fn first(prefix: impl Into<String>, page_size: usize) -> Self {
        Self {
            prefix: prefix.into(),
            page_size,
            cursor: None,
        }
    }

    pub fn next(&self, cursor: PageCursor) -> Self {
        Self {
            cursor: Some(cursor),
            ..self.clone()
        }
    }
}

/// One page of a listing. A present `next_cursor` means more pages follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<RemoteItem>,
    pub next_cursor: Option<PageCursor>,
}

impl Page {
    pub fn last(items: Vec<RemoteItem>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn with_cursor(items: Vec<RemoteItem>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            next_cursor: Some(PageCursor::new(cursor)),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Error type for remote collection calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Rate limited by remote: {0}")]
    RateLimited(String),

    #[error("Could not decode remote response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
