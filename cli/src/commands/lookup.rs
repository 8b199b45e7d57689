//! Product lookup commands.

use anyhow::{Context as _, Result};
use tracing::instrument;
use wellspring_maintenance::api::{HttpTransport, ProductApiClient, ProductMatch};
use wellspring_maintenance::config::Config;

use crate::output::Output;

fn client(config: &Config) -> Result<ProductApiClient<HttpTransport>> {
    let transport =
        HttpTransport::new(config.http_timeout()).context("Failed to build HTTP client")?;
    ProductApiClient::new(config.paapi()?.clone(), transport, config.retry_policy())
        .context("Invalid Product Advertising API settings")
}

#[instrument(skip_all, name = "lookup")]
pub async fn run_lookup(config: &Config, keywords: &[String]) -> Result<()> {
    let keywords = keywords.join(" ");
    let found = client(config)?
        .search_best_match(&keywords)
        .await
        .with_context(|| format!("Search for \"{keywords}\" failed"))?;

    show(&Output::new(), found.as_ref(), &keywords);
    Ok(())
}

#[instrument(skip_all, name = "item", fields(asin = %asin))]
pub async fn run_item(config: &Config, asin: &str) -> Result<()> {
    let found = client(config)?
        .get_item(asin)
        .await
        .with_context(|| format!("Lookup of {asin} failed"))?;

    show(&Output::new(), found.as_ref(), asin);
    Ok(())
}

fn show(out: &Output, found: Option<&ProductMatch>, query: &str) {
    let Some(product) = found else {
        out.warning(format!("No product found for {query}"));
        return;
    };

    out.header(product.title.as_deref().unwrap_or(product.asin.as_str()));
    out.labeled_indent("ASIN", &product.asin, 2);
    if let Some(url) = &product.image_url {
        out.labeled_indent("Image", url, 2);
    }
    if let Some(url) = &product.detail_page_url {
        out.labeled_indent("Detail page", url, 2);
    }
    out.labeled_indent("Affiliate link", &product.affiliate_url, 2);
}
