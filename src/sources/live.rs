//! # Live Retail-Pricing Source
//!
//! ## Purpose
//! Queries the external retail-pricing API directly, paginating through all
//! Linux pay-as-you-go hourly VM SKU listings for a region. Results are always
//! in base currency.
//!
//! ## Failure Semantics
//! - A SKU with no usable price still counts toward `sku_count` but never
//!   toward `priced_sku_count`; it does not abort the region fetch.
//! - A total region failure (network error, auth failure, upstream 5xx)
//!   surfaces as a `RegionFetch` error; the selector absorbs it and the region
//!   is omitted from the final result, never silently zeroed.

use super::{PricingSource, SourceFetch, SourceStats};
use crate::config::LiveApiConfig;
use crate::errors::{PricingError, Result};
use crate::models::{RegionPriceData, SkuPrice};
use crate::TenantContext;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retail prices API client
pub struct LiveSource {
    config: LiveApiConfig,
    client: Client,
    stats: Arc<RwLock<SourceStats>>,
}

/// One page of the retail prices listing
#[derive(Debug, Deserialize)]
struct RetailPricePage {
    #[serde(rename = "Items", default)]
    items: Vec<RetailPriceItem>,
    #[serde(rename = "NextPageLink")]
    next_page_link: Option<String>,
}

/// A single SKU listing entry
#[derive(Debug, Deserialize)]
struct RetailPriceItem {
    #[serde(rename = "armSkuName", default)]
    arm_sku_name: String,
    #[serde(rename = "skuName", default)]
    sku_name: String,
    #[serde(rename = "retailPrice")]
    retail_price: Option<f64>,
    #[serde(rename = "productName", default)]
    product_name: String,
    #[serde(rename = "meterName", default)]
    meter_name: String,
}

impl RetailPriceItem {
    /// Linux pay-as-you-go only: Windows products and Spot / Low Priority
    /// meters are not part of the catalog this engine aggregates.
    fn is_excluded(&self) -> bool {
        self.product_name.contains("Windows")
            || self.meter_name.contains("Spot")
            || self.meter_name.contains("Low Priority")
    }

    fn sku_id(&self) -> &str {
        if self.arm_sku_name.is_empty() {
            &self.sku_name
        } else {
            &self.arm_sku_name
        }
    }
}

impl LiveSource {
    pub fn new(config: LiveApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("region-price-scout/0.1")
            .build()
            .map_err(|e| PricingError::Network {
                details: e.to_string(),
            })?;

        Ok(Self {
            config,
            client,
            stats: Arc::new(RwLock::new(SourceStats::default())),
        })
    }

    /// Snapshot of this source's statistics
    pub fn stats(&self) -> SourceStats {
        self.stats.read().clone()
    }

    async fn fetch_page(&self, url: &str, region_id: &str) -> Result<RetailPricePage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PricingError::RegionFetch {
                region_id: region_id.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("Retail prices API rate limit hit for region {}", region_id);
            return Err(PricingError::RateLimitExceeded {
                source_name: "retail prices API".to_string(),
                retry_after_seconds: Some(60),
            });
        }

        if !response.status().is_success() {
            return Err(PricingError::RegionFetch {
                region_id: region_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<RetailPricePage>()
            .await
            .map_err(|e| PricingError::DataParsing {
                source_name: "retail prices API".to_string(),
                details: e.to_string(),
            })
    }

    fn first_page_url(&self, region_id: &str) -> String {
        let filter = format!(
            "serviceName eq 'Virtual Machines' and priceType eq 'Consumption' \
             and armRegionName eq '{}' and unitOfMeasure eq '1 Hour'",
            region_id
        );
        format!(
            "{}/api/retail/prices?currencyCode=USD&$filter={}",
            self.config.base_url.trim_end_matches('/'),
            urlencode(&filter)
        )
    }
}

/// Minimal percent-encoding for the OData filter expression
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[async_trait]
impl PricingSource for LiveSource {
    fn name(&self) -> &str {
        "live"
    }

    async fn fetch_region(&self, region_id: &str, _tenant: &TenantContext) -> Result<SourceFetch> {
        let mut url = self.first_page_url(region_id);
        // sku id -> best known price; later pages never downgrade a priced SKU
        let mut merged: BTreeMap<String, Option<f64>> = BTreeMap::new();
        let mut pages = 0usize;

        loop {
            let page = match self.fetch_page(&url, region_id).await {
                Ok(page) => page,
                Err(e) => {
                    self.stats.write().regions_failed += 1;
                    return Err(e);
                }
            };
            pages += 1;

            for item in &page.items {
                if item.is_excluded() || item.sku_id().is_empty() {
                    continue;
                }
                match merged.entry(item.sku_id().to_string()) {
                    Entry::Vacant(slot) => {
                        slot.insert(item.retail_price);
                    }
                    Entry::Occupied(mut slot) => {
                        if slot.get().is_none() {
                            *slot.get_mut() = item.retail_price;
                        }
                    }
                }
            }

            match page.next_page_link {
                Some(next) if pages < self.config.max_pages => url = next,
                Some(_) => {
                    warn!(
                        "Region {} listing exceeded {} pages; truncating",
                        region_id, self.config.max_pages
                    );
                    break;
                }
                None => break,
            }
        }

        let skus: Vec<SkuPrice> = merged
            .into_iter()
            .map(|(sku_id, price)| SkuPrice::new(sku_id, region_id, price))
            .collect();
        debug!(
            "Live fetch for region {}: {} SKUs over {} pages",
            region_id,
            skus.len(),
            pages
        );

        {
            let mut stats = self.stats.write();
            stats.regions_fetched += 1;
            stats.skus_seen += skus.len();
            stats.last_fetch = Some(Utc::now());
        }
        Ok(SourceFetch::Hit(RegionPriceData::new(region_id, skus)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> LiveSource {
        LiveSource::new(LiveApiConfig {
            base_url: server.uri(),
            timeout_seconds: 5,
            max_pages: 10,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn paginates_and_filters_listings() {
        let server = MockServer::start().await;

        let page2_url = format!("{}/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    { "armSkuName": "Standard_D4s_v5", "skuName": "D4s v5",
                      "retailPrice": 0.192, "productName": "Virtual Machines Dsv5 Series",
                      "meterName": "D4s v5" },
                    { "armSkuName": "Standard_L8s_v3", "skuName": "L8s v3",
                      "retailPrice": null, "productName": "Virtual Machines Lsv3 Series",
                      "meterName": "L8s v3" }
                ],
                "NextPageLink": null
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    { "armSkuName": "Standard_D2s_v5", "skuName": "D2s v5",
                      "retailPrice": 0.096, "productName": "Virtual Machines Dsv5 Series",
                      "meterName": "D2s v5" },
                    { "armSkuName": "Standard_D2s_v5", "skuName": "D2s v5",
                      "retailPrice": 0.085, "productName": "Virtual Machines Dsv5 Series Windows",
                      "meterName": "D2s v5" },
                    { "armSkuName": "Standard_D2s_v5", "skuName": "D2s v5 Spot",
                      "retailPrice": 0.029, "productName": "Virtual Machines Dsv5 Series",
                      "meterName": "D2s v5 Spot" }
                ],
                "NextPageLink": page2_url
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let outcome = source
            .fetch_region("eastus", &TenantContext::default())
            .await
            .unwrap();

        match outcome {
            SourceFetch::Hit(data) => {
                // Windows and Spot listings filtered; the null price still counts
                assert_eq!(data.sku_count(), 3);
                assert_eq!(data.priced_sku_count(), 2);
                let d2s = data
                    .skus
                    .iter()
                    .find(|s| s.sku_id == "Standard_D2s_v5")
                    .unwrap();
                assert_eq!(d2s.hourly_price, Some(0.096));
            }
            SourceFetch::Miss => panic!("expected live data"),
        }
    }

    #[tokio::test]
    async fn upstream_failure_becomes_region_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source
            .fetch_region("eastus", &TenantContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::RegionFetch { .. }));
        assert_eq!(source.stats().regions_failed, 1);
    }

    #[tokio::test]
    async fn empty_listing_is_a_hit_with_no_skus() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [],
                "NextPageLink": null
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        match source
            .fetch_region("newregion", &TenantContext::default())
            .await
            .unwrap()
        {
            SourceFetch::Hit(data) => assert_eq!(data.sku_count(), 0),
            SourceFetch::Miss => panic!("live source reports empty regions as hits"),
        }
    }

    #[tokio::test]
    async fn rate_limit_maps_to_dedicated_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source
            .fetch_region("eastus", &TenantContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::RateLimitExceeded { .. }));
    }
}
