//! Product Advertising API 5 lookups.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::client::ResilientApiClient;
use super::envelope::{ApiError, ApiResponseEnvelope, EnvelopeError, ErrorKind, UnparseableBody};
use super::retry::RetryPolicy;
use super::sigv4::{RequestParts, SigV4Signer};
use super::transport::{Method, RawResponse, Transport};
use crate::error::ConfigurationError;

pub const PAAPI_DEFAULT_HOST: &str = "webservices.amazon.com";
pub const PAAPI_DEFAULT_REGION: &str = "us-east-1";
pub const PAAPI_DEFAULT_MARKETPLACE: &str = "www.amazon.com";
const SERVICE: &str = "ProductAdvertisingAPI";
const TARGET_PREFIX: &str = "com.amazon.paapi5.v1.ProductAdvertisingAPIv1";
const RESOURCES: [&str; 2] = ["Images.Primary.Large", "ItemInfo.Title"];

#[derive(Debug, Clone)]
pub struct PaapiConfig {
    pub access_key: String,
    pub secret_key: String,
    pub partner_tag: String,
    pub host: String,
    pub region: String,
    pub marketplace: String,
    /// Overrides `https://{host}`, e.g. to point at a local mock server.
    pub endpoint: Option<String>,
    pub search_index: String,
}

impl PaapiConfig {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        partner_tag: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            partner_tag: partner_tag.into(),
            host: PAAPI_DEFAULT_HOST.to_owned(),
            region: PAAPI_DEFAULT_REGION.to_owned(),
            marketplace: PAAPI_DEFAULT_MARKETPLACE.to_owned(),
            endpoint: None,
            search_index: "All".to_owned(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => format!("https://{}", self.host),
        }
    }

    pub fn affiliate_url(&self, asin: &str) -> String {
        format!(
            "https://{}/dp/{asin}?tag={}",
            self.marketplace, self.partner_tag
        )
    }
}

/// A product extracted from a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMatch {
    pub asin: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub detail_page_url: Option<String>,
    pub affiliate_url: String,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    SearchItems,
    GetItems,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::SearchItems => "SearchItems",
            Operation::GetItems => "GetItems",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Operation::SearchItems => "/paapi5/searchitems",
            Operation::GetItems => "/paapi5/getitems",
        }
    }
}

pub struct ProductApiClient<T> {
    client: ResilientApiClient<T>,
    signer: SigV4Signer,
    config: PaapiConfig,
}

impl<T: Transport> ProductApiClient<T> {
    pub fn new(
        config: PaapiConfig,
        transport: T,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigurationError> {
        if config.partner_tag.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                name: "partner_tag",
                reason: "must not be empty".to_owned(),
            });
        }
        let signer = SigV4Signer::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            config.region.clone(),
            SERVICE,
        );
        Ok(Self {
            client: ResilientApiClient::new(transport, policy)?,
            signer,
            config,
        })
    }

    /// First `SearchItems` hit for `keywords`, if any.
    #[instrument(skip(self))]
    pub async fn search_best_match(
        &self,
        keywords: &str,
    ) -> Result<Option<ProductMatch>, ApiError> {
        let body = json!({
            "Keywords": keywords,
            "ItemCount": 1,
            "SearchIndex": self.config.search_index,
            "Resources": RESOURCES,
            "PartnerTag": self.config.partner_tag,
            "PartnerType": "Associates",
            "Marketplace": self.config.marketplace,
        });
        let items = self.call(Operation::SearchItems, &body).await?;
        Ok(items.into_iter().next())
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, asin: &str) -> Result<Option<ProductMatch>, ApiError> {
        let body = json!({
            "ItemIds": [asin],
            "ItemIdType": "ASIN",
            "Resources": RESOURCES,
            "PartnerTag": self.config.partner_tag,
            "PartnerType": "Associates",
            "Marketplace": self.config.marketplace,
        });
        let items = self.call(Operation::GetItems, &body).await?;
        Ok(items.into_iter().find(|item| item.asin == asin))
    }

    async fn call(
        &self,
        operation: Operation,
        body: &serde_json::Value,
    ) -> Result<Vec<ProductMatch>, ApiError> {
        let payload = serde_json::to_vec(body).map_err(|e| ApiError::Signing(e.to_string()))?;
        let url = format!("{}{}", self.config.base_url(), operation.path());
        let target = format!("{TARGET_PREFIX}.{}", operation.name());

        let items = self
            .client
            .execute(
                || {
                    let parts = RequestParts::new(Method::Post, url.as_str())
                        .header("content-encoding", "amz-1.0")
                        .header("content-type", "application/json; charset=utf-8")
                        .header("x-amz-target", target.as_str())
                        .body(payload.clone());
                    self.signer
                        .sign(parts, chrono::Utc::now())
                        .map_err(|e| ApiError::Signing(e.to_string()))
                },
                |response| parse_response(response, &self.config),
            )
            .await?;

        debug!(operation = operation.name(), found = items.len(), "Lookup finished");
        Ok(items)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResponse {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(default)]
    errors: Vec<WireError>,
    search_result: Option<WireItems>,
    items_result: Option<WireItems>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireItems {
    #[serde(default)]
    items: Vec<WireItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireItem {
    #[serde(rename = "ASIN")]
    asin: String,
    #[serde(rename = "DetailPageURL")]
    detail_page_url: Option<String>,
    images: Option<WireImages>,
    item_info: Option<WireItemInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireImages {
    primary: Option<WireImageSizes>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireImageSizes {
    large: Option<WireImage>,
}

#[derive(Deserialize)]
struct WireImage {
    #[serde(rename = "URL")]
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireItemInfo {
    title: Option<WireDisplayValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDisplayValue {
    display_value: String,
}

fn parse_response(
    response: &RawResponse,
    config: &PaapiConfig,
) -> Result<ApiResponseEnvelope<Vec<ProductMatch>>, UnparseableBody> {
    let wire: WireResponse = match response.json() {
        Ok(wire) => wire,
        // Throttled responses are not guaranteed to carry a JSON body.
        Err(_) if response.status == 429 => {
            return Ok(ApiResponseEnvelope::Error(EnvelopeError::rate_limited(vec![
                "HTTP 429 Too Many Requests".to_owned(),
            ])));
        }
        Err(e) => return Err(e.into()),
    };

    let messages: Vec<String> = wire
        .errors
        .iter()
        .filter_map(|e| e.message.clone().or_else(|| e.code.clone()))
        .collect();

    let throttled = wire
        .error_type
        .as_deref()
        .is_some_and(|t| t.contains("TooManyRequestsException"))
        || wire
            .errors
            .iter()
            .any(|e| e.code.as_deref() == Some("TooManyRequests"))
        || response.status == 429;
    if throttled {
        return Ok(ApiResponseEnvelope::Error(EnvelopeError::rate_limited(
            messages,
        )));
    }

    if !wire.errors.is_empty() {
        if wire
            .errors
            .iter()
            .all(|e| e.code.as_deref() == Some("NoResults"))
        {
            return Ok(ApiResponseEnvelope::Success(Vec::new()));
        }
        let code = wire
            .errors
            .iter()
            .find_map(|e| e.code.clone())
            .or(wire.error_type);
        return Ok(ApiResponseEnvelope::Error(EnvelopeError {
            kind: ErrorKind::Exception,
            code,
            messages,
        }));
    }

    if !response.is_success() {
        return Err(UnparseableBody(format!(
            "HTTP {} without an error envelope",
            response.status
        )));
    }

    let items = wire
        .search_result
        .or(wire.items_result)
        .map(|r| r.items)
        .unwrap_or_default()
        .into_iter()
        .map(|item| ProductMatch {
            affiliate_url: config.affiliate_url(&item.asin),
            title: item.item_info.and_then(|i| i.title).map(|t| t.display_value),
            image_url: item
                .images
                .and_then(|i| i.primary)
                .and_then(|p| p.large)
                .map(|l| l.url),
            detail_page_url: item.detail_page_url,
            asin: item.asin,
        })
        .collect();

    Ok(ApiResponseEnvelope::Success(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaapiConfig {
        PaapiConfig::new("AKID", "secret", "shop-20")
    }

    fn parse(
        status: u16,
        body: &str,
    ) -> Result<ApiResponseEnvelope<Vec<ProductMatch>>, UnparseableBody> {
        parse_response(&RawResponse::new(status, body), &config())
    }

    #[test]
    fn test_search_result_is_extracted() {
        let body = r#"{
            "SearchResult": {
                "Items": [{
                    "ASIN": "B000TEST01",
                    "DetailPageURL": "https://www.amazon.com/dp/B000TEST01?tag=shop-20",
                    "Images": {"Primary": {"Large": {"URL": "https://m.media-amazon.com/images/I/x.jpg"}}},
                    "ItemInfo": {"Title": {"DisplayValue": "Field Guide"}}
                }]
            }
        }"#;

        let ApiResponseEnvelope::Success(items) = parse(200, body).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].asin, "B000TEST01");
        assert_eq!(items[0].title.as_deref(), Some("Field Guide"));
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://m.media-amazon.com/images/I/x.jpg")
        );
        assert_eq!(
            items[0].affiliate_url,
            "https://www.amazon.com/dp/B000TEST01?tag=shop-20"
        );
    }

    #[test]
    fn test_items_result_with_missing_resources() {
        let body = r#"{"ItemsResult": {"Items": [{"ASIN": "B000TEST02"}]}}"#;
        let ApiResponseEnvelope::Success(items) = parse(200, body).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(items[0].title, None);
        assert_eq!(items[0].image_url, None);
    }

    #[test]
    fn test_too_many_requests_is_rate_limited() {
        let body = r#"{
            "__type": "com.amazon.paapi5#TooManyRequestsException",
            "Errors": [{"Code": "TooManyRequests", "Message": "The request was denied due to request throttling."}]
        }"#;
        let ApiResponseEnvelope::Error(error) = parse(429, body).unwrap() else {
            panic!("expected error envelope");
        };
        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert_eq!(
            error.messages,
            vec!["The request was denied due to request throttling.".to_owned()]
        );
    }

    #[test]
    fn test_bare_429_is_rate_limited() {
        let ApiResponseEnvelope::Error(error) = parse(429, "").unwrap() else {
            panic!("expected error envelope");
        };
        assert_eq!(error.kind, ErrorKind::RateLimited);
    }

    #[test]
    fn test_no_results_is_empty_success() {
        let body = r#"{"Errors": [{"Code": "NoResults", "Message": "No results found."}]}"#;
        assert_eq!(parse(404, body).unwrap(), ApiResponseEnvelope::Success(Vec::new()));
    }

    #[test]
    fn test_other_errors_are_exceptions() {
        let body = r#"{
            "__type": "com.amazon.paapi5#InvalidParameterValueException",
            "Errors": [{"Code": "InvalidParameterValue", "Message": "The ItemId is not valid."}]
        }"#;
        let ApiResponseEnvelope::Error(error) = parse(400, body).unwrap() else {
            panic!("expected error envelope");
        };
        assert_eq!(error.kind, ErrorKind::Exception);
        assert_eq!(error.code.as_deref(), Some("InvalidParameterValue"));
    }

    #[test]
    fn test_garbage_success_body_is_unparseable() {
        assert!(parse(200, "<html>").is_err());
    }

    #[test]
    fn test_base_url_prefers_endpoint() {
        assert_eq!(config().base_url(), "https://webservices.amazon.com");
        assert_eq!(
            config().with_endpoint("http://127.0.0.1:9000/").base_url(),
            "http://127.0.0.1:9000"
        );
    }
}
