use std::env::vars;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use tracing::info;

use crate::api::{PaapiConfig, RetryPolicy};
use crate::bulk::MutatorConfig;
use crate::collection::{CloudinaryConfig, R2Config};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// The final, validated configuration. Backend sections are optional; a
// command asks for the one it needs through the accessors below.
#[derive(Debug, Clone)]
pub struct Config {
    cloudinary: Option<CloudinaryConfig>,
    r2: Option<R2Config>,
    paapi: Option<PaapiConfig>,
    mutator: MutatorConfig,
    retry: RetryPolicy,
    http_timeout: Duration,
}

// Environment variables as read, before validation.
#[derive(Deserialize)]
struct RawConfig {
    cloudinary_url: Option<String>,
    cloudinary_cloud_name: Option<String>,
    cloudinary_api_key: Option<String>,
    cloudinary_api_secret: Option<String>,
    cloudinary_api_base: Option<String>,
    cloudinary_resource_type: Option<String>,

    cf_account_id: Option<String>,
    cf_access_key_id: Option<String>,
    cf_secret_access_key: Option<String>,
    cf_bucket: Option<String>,

    paapi_access_key: Option<String>,
    paapi_secret_key: Option<String>,
    paapi_partner_tag: Option<String>,
    paapi_host: Option<String>,
    paapi_region: Option<String>,
    paapi_marketplace: Option<String>,
    paapi_endpoint: Option<String>,

    page_size: Option<usize>,
    batch_size: Option<usize>,
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    http_timeout_secs: Option<u64>,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn init() -> anyhow::Result<Self> {
        info!("Loading configuration from environment variables");
        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            cloudinary_url,
            cloudinary_cloud_name,
            cloudinary_api_key,
            cloudinary_api_secret,
            cloudinary_api_base,
            cloudinary_resource_type,
            cf_account_id,
            cf_access_key_id,
            cf_secret_access_key,
            cf_bucket,
            paapi_access_key,
            paapi_secret_key,
            paapi_partner_tag,
            paapi_host,
            paapi_region,
            paapi_marketplace,
            paapi_endpoint,
            page_size,
            batch_size,
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
            http_timeout_secs,
        } = raw_config;

        let cloudinary = match cloudinary_url {
            Some(url) => Some(
                CloudinaryConfig::from_url(&url).context(
                    "CLOUDINARY_URL must look like cloudinary://<api_key>:<api_secret>@<cloud_name>",
                )?,
            ),
            None => section(
                "Cloudinary",
                [
                    ("CLOUDINARY_CLOUD_NAME", cloudinary_cloud_name),
                    ("CLOUDINARY_API_KEY", cloudinary_api_key),
                    ("CLOUDINARY_API_SECRET", cloudinary_api_secret),
                ],
            )?
            .map(|[cloud_name, api_key, api_secret]| {
                CloudinaryConfig::new(cloud_name, api_key, api_secret)
            }),
        };
        let cloudinary = cloudinary.map(|mut config| {
            if let Some(base) = cloudinary_api_base {
                info!("Using CLOUDINARY_API_BASE: {}", base);
                config = config.with_api_base(base);
            }
            if let Some(resource_type) = cloudinary_resource_type {
                config = config.with_resource_type(resource_type);
            }
            config
        });

        let r2 = section(
            "R2",
            [
                ("CF_ACCOUNT_ID", cf_account_id),
                ("CF_ACCESS_KEY_ID", cf_access_key_id),
                ("CF_SECRET_ACCESS_KEY", cf_secret_access_key),
                ("CF_BUCKET", cf_bucket),
            ],
        )?
        .map(
            |[account_id, access_key_id, secret_access_key, bucket]| R2Config {
                account_id,
                access_key_id,
                secret_access_key,
                bucket,
            },
        );

        let paapi = section(
            "Product Advertising API",
            [
                ("PAAPI_ACCESS_KEY", paapi_access_key),
                ("PAAPI_SECRET_KEY", paapi_secret_key),
                ("PAAPI_PARTNER_TAG", paapi_partner_tag),
            ],
        )?
        .map(|[access_key, secret_key, partner_tag]| {
            let mut config = PaapiConfig::new(access_key, secret_key, partner_tag);
            if let Some(host) = paapi_host {
                config.host = host;
            }
            if let Some(region) = paapi_region {
                config.region = region;
            }
            if let Some(marketplace) = paapi_marketplace {
                config.marketplace = marketplace;
            }
            config.endpoint = paapi_endpoint;
            config
        });

        let mut mutator = MutatorConfig::default();
        if let Some(page_size) = page_size {
            anyhow::ensure!(page_size > 0, "PAGE_SIZE must be at least 1");
            mutator.page_size = page_size;
        }
        if let Some(batch_size) = batch_size {
            anyhow::ensure!(batch_size > 0, "BATCH_SIZE must be at least 1");
            mutator.batch_size = batch_size;
        }

        let mut retry = RetryPolicy::default();
        if let Some(max_retries) = max_retries {
            retry.max_retries = max_retries;
        }
        if let Some(ms) = initial_backoff_ms {
            retry = RetryPolicy::new(retry.max_retries, Duration::from_millis(ms));
        }
        if let Some(ms) = max_backoff_ms {
            retry = retry.with_max_backoff(Duration::from_millis(ms));
        }
        retry
            .validate()
            .context("INITIAL_BACKOFF_MS / MAX_BACKOFF_MS are inconsistent")?;

        let http_timeout = match http_timeout_secs {
            Some(0) => anyhow::bail!("HTTP_TIMEOUT_SECS must be at least 1"),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Ok(Self {
            cloudinary,
            r2,
            paapi,
            mutator,
            retry,
            http_timeout,
        })
    }

    pub fn cloudinary(&self) -> anyhow::Result<&CloudinaryConfig> {
        self.cloudinary.as_ref().context(
            "Cloudinary is not configured: set CLOUDINARY_URL or \
             CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET",
        )
    }

    pub fn r2(&self) -> anyhow::Result<&R2Config> {
        self.r2.as_ref().context(
            "R2 is not configured: set CF_ACCOUNT_ID, CF_ACCESS_KEY_ID, \
             CF_SECRET_ACCESS_KEY and CF_BUCKET",
        )
    }

    pub fn paapi(&self) -> anyhow::Result<&PaapiConfig> {
        self.paapi.as_ref().context(
            "Product Advertising API is not configured: set PAAPI_ACCESS_KEY, \
             PAAPI_SECRET_KEY and PAAPI_PARTNER_TAG",
        )
    }

    pub fn mutator(&self) -> MutatorConfig {
        self.mutator
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

/// All-or-nothing group of variables. A partly filled group is an error
/// naming the missing variables.
fn section<const N: usize>(
    name: &str,
    entries: [(&'static str, Option<String>); N],
) -> anyhow::Result<Option<[String; N]>> {
    let missing: Vec<&str> = entries
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| *key)
        .collect();

    if missing.len() == N {
        return Ok(None);
    }
    if !missing.is_empty() {
        anyhow::bail!(
            "{name} is partly configured, missing: {}",
            missing.join(", ")
        );
    }
    Ok(Some(entries.map(|(_, value)| value.unwrap_or_default())))
}
