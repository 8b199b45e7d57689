//! Command implementations for the Wellspring CLI.
//!
//! Each subcommand is implemented in its own module.

pub mod clear;
pub mod completions;
pub mod list;
pub mod lookup;

use anyhow::{Context as _, Result};
use wellspring_maintenance::bulk::direct_children;
use wellspring_maintenance::collection::{CloudinaryCollection, R2Collection, RemoteItem};
use wellspring_maintenance::config::Config;

pub use clear::run_clear;
pub use completions::generate_completions;
pub use list::run_list;
pub use lookup::{run_item, run_lookup};

use crate::cli::{Backend, Target};

/// Owned item predicate built from [`Target`] flags.
pub type BoxedFilter = Box<dyn Fn(&RemoteItem) -> bool + Send + Sync>;

/// `--direct-children` treats the prefix as a folder, with or without a
/// trailing slash.
pub fn build_filter(target: &Target) -> Option<BoxedFilter> {
    if !target.direct_children {
        return None;
    }
    let folder = if target.prefix.ends_with('/') {
        target.prefix.clone()
    } else {
        format!("{}/", target.prefix)
    };
    Some(Box::new(direct_children(folder)))
}

pub fn cloudinary(config: &Config) -> Result<CloudinaryCollection> {
    CloudinaryCollection::new(config.cloudinary()?.clone(), config.http_timeout())
        .context("Failed to build Cloudinary client")
}

pub fn r2(config: &Config) -> Result<R2Collection> {
    R2Collection::new(config.r2()?).context("Failed to build R2 operator")
}

pub fn target_label(target: &Target) -> String {
    let backend = match target.backend {
        Backend::Cloudinary => "cloudinary",
        Backend::R2 => "r2",
    };
    format!("{backend}:{}", target.prefix)
}

/// Wait for Ctrl-C and trip `token`. Work already applied stays applied.
pub fn cancel_on_ctrl_c(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current call");
            token.cancel();
        }
    });
}
