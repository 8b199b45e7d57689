//! Cloudinary Admin API collection.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::traits::RemoteCollection;
use super::types::{CollectionError, Page, PageCursor, PageRequest, RemoteItem};

/// Largest `max_results` the Admin API accepts for a resource listing.
pub const CLOUDINARY_MAX_PAGE_SIZE: usize = 500;

/// Largest number of public ids accepted by one delete call.
pub const CLOUDINARY_MAX_DELETE_BATCH: usize = 100;

pub const CLOUDINARY_DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// Credentials and addressing for one Cloudinary product environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    /// `image`, `video` or `raw`.
    pub resource_type: String,
    /// Delivery type, usually `upload`.
    pub delivery_type: String,
}

impl CloudinaryConfig {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_base: CLOUDINARY_DEFAULT_API_BASE.to_owned(),
            resource_type: "image".to_owned(),
            delivery_type: "upload".to_owned(),
        }
    }

    /// Parse a `cloudinary://<api_key>:<api_secret>@<cloud_name>` URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url.trim().strip_prefix("cloudinary://")?;
        let (credentials, cloud_name) = rest.rsplit_once('@')?;
        let (api_key, api_secret) = credentials.split_once(':')?;
        let cloud_name = cloud_name.split(['/', '?']).next()?;

        if api_key.is_empty() || api_secret.is_empty() || cloud_name.is_empty() {
            return None;
        }
        Some(Self::new(cloud_name, api_key, api_secret))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    fn resources_url(&self) -> String {
        format!(
            "{}/v1_1/{}/resources/{}/{}",
            self.api_base, self.cloud_name, self.resource_type, self.delivery_type
        )
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    resources: Vec<Resource>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Resource {
    public_id: String,
    bytes: Option<u64>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary assets of one resource type, addressed by public id.
#[derive(Clone)]
pub struct CloudinaryCollection {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryCollection {
    pub fn new(config: CloudinaryConfig, timeout: Duration) -> Result<Self, CollectionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectionError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CollectionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        // Cloudinary signals Admin API quota exhaustion with 420.
        if status.as_u16() == 420 || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CollectionError::RateLimited(message));
        }
        Err(CollectionError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl RemoteCollection for CloudinaryCollection {
    type Error = CollectionError;

    #[instrument(skip_all, fields(prefix = %request.prefix, cursor = ?request.cursor))]
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, Self::Error> {
        let max_results = request.page_size.clamp(1, CLOUDINARY_MAX_PAGE_SIZE).to_string();

        let mut query: Vec<(&str, &str)> = vec![("max_results", max_results.as_str())];
        if !request.prefix.is_empty() {
            query.push(("prefix", request.prefix.as_str()));
        }
        if let Some(cursor) = &request.cursor {
            query.push(("next_cursor", cursor.as_str()));
        }

        let response = self
            .client
            .get(self.config.resources_url())
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&query)
            .send()
            .await
            .map_err(|e| CollectionError::Transport(e.to_string()))?;

        let listing: ListResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CollectionError::Decode(e.to_string()))?;

        debug!(count = listing.resources.len(), "Fetched Cloudinary page");

        let items = listing
            .resources
            .into_iter()
            .map(|resource| {
                let item = RemoteItem::keyed(resource.public_id);
                match resource.bytes {
                    Some(bytes) => item.with_size(bytes),
                    None => item,
                }
            })
            .collect();

        Ok(Page {
            items,
            next_cursor: listing
                .next_cursor
                .filter(|c| !c.is_empty())
                .map(PageCursor::new),
        })
    }

    #[instrument(skip_all, fields(count = identifiers.len()))]
    async fn delete_batch(&self, identifiers: &[String]) -> Result<(), Self::Error> {
        let query: Vec<(&str, &str)> = identifiers
            .iter()
            .map(|id| ("public_ids[]", id.as_str()))
            .collect();

        let response = self
            .client
            .delete(self.config.resources_url())
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&query)
            .send()
            .await
            .map_err(|e| CollectionError::Transport(e.to_string()))?;

        let outcome: DeleteResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CollectionError::Decode(e.to_string()))?;

        let not_found = outcome
            .deleted
            .values()
            .filter(|status| status.as_str() == "not_found")
            .count();
        if not_found > 0 {
            warn!(not_found, "Some public ids were already gone");
        }
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        CLOUDINARY_MAX_DELETE_BATCH
    }

    fn name(&self) -> &str {
        "cloudinary"
    }
}
