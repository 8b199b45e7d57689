//! Client-side item filters.

use crate::collection::RemoteItem;

/// Keeps items directly under `prefix`: the rest of the key has no `/`.
///
/// With prefix `Home/`, `Home/a.png` matches and `Home/x/b.png` does not.
pub fn direct_children(prefix: impl Into<String>) -> impl Fn(&RemoteItem) -> bool + Send + Sync {
    let prefix = prefix.into();
    move |item| {
        item.path_or_key
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
    }
}

/// Keeps items whose key starts with `prefix`, at any depth.
pub fn under_prefix(prefix: impl Into<String>) -> impl Fn(&RemoteItem) -> bool + Send + Sync {
    let prefix = prefix.into();
    move |item| item.path_or_key.starts_with(prefix.as_str())
}
