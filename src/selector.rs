//! # Source Selector Module
//!
//! ## Purpose
//! Decides, once per request, whether price data comes from the store-backed
//! source alone (`db`), the live source alone (`live`), or a per-region hybrid
//! merge, based on cache freshness and coverage over the requested scope.
//!
//! ## Policy
//! 1. Every region fresh in the raw-price cache or the local store → `db`,
//!    zero live calls.
//! 2. No region has usable local data → `live` for the whole scope.
//! 3. Otherwise `hybrid`: cached regions are kept, only the missing or stale
//!    ones are fetched live; `coverage_pct` reports the cached share.
//!
//! Live fetches fan out concurrently, bounded by a semaphore to respect
//! external API rate limits, and route through the raw-price cache so
//! concurrent requests needing the same region share one in-flight fetch.
//! Ordering of results is restored downstream; nothing here depends on fetch
//! completion order.

use crate::cache::TtlCache;
use crate::currency::round_pct;
use crate::errors::{PricingError, Result};
use crate::models::{DataSource, RegionPriceData};
use crate::sources::{PricingSource, SourceFetch};
use crate::TenantContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A region whose fetch failed entirely; recorded, never silently zeroed
#[derive(Debug, Clone)]
pub struct RegionFailure {
    pub region_id: String,
    pub reason: String,
}

/// Collected per-region data for one request, plus sourcing metadata
#[derive(Debug)]
pub struct SelectionOutcome {
    pub regions: HashMap<String, Arc<RegionPriceData>>,
    pub data_source: DataSource,
    /// Percentage of regions satisfied from cached data; only set for hybrid
    pub coverage_pct: Option<f64>,
    pub failures: Vec<RegionFailure>,
}

/// Per-request sourcing policy and bounded live fan-out
pub struct SourceSelector {
    cache_source: Arc<dyn PricingSource>,
    live_source: Arc<dyn PricingSource>,
    raw_cache: Arc<TtlCache<String, RegionPriceData>>,
    semaphore: Arc<Semaphore>,
}

impl SourceSelector {
    pub fn new(
        cache_source: Arc<dyn PricingSource>,
        live_source: Arc<dyn PricingSource>,
        raw_cache: Arc<TtlCache<String, RegionPriceData>>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            cache_source,
            live_source,
            raw_cache,
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Gather price data for every region in scope, choosing sources per the
    /// selection policy. Per-region failures are absorbed into the outcome;
    /// only a total collapse of both sources is an error.
    pub async fn collect(
        &self,
        region_ids: &[String],
        tenant: &TenantContext,
    ) -> Result<SelectionOutcome> {
        let mut regions: HashMap<String, Arc<RegionPriceData>> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();

        for region_id in region_ids {
            if let Some(data) = self.raw_cache.peek(region_id) {
                regions.insert(region_id.clone(), data);
                continue;
            }
            match self.cache_source.fetch_region(region_id, tenant).await {
                Ok(SourceFetch::Hit(data)) => {
                    regions.insert(region_id.clone(), Arc::new(data));
                }
                Ok(SourceFetch::Miss) => missing.push(region_id.clone()),
                Err(e) => {
                    // Store trouble degrades that region to a live fetch.
                    warn!("Store lookup failed for region {}: {}", region_id, e);
                    missing.push(region_id.clone());
                }
            }
        }

        let cached_count = regions.len();
        if missing.is_empty() {
            debug!("All {} regions served from local data", cached_count);
            return Ok(SelectionOutcome {
                regions,
                data_source: DataSource::Db,
                coverage_pct: None,
                failures: Vec::new(),
            });
        }

        let data_source = if cached_count == 0 {
            DataSource::Live
        } else {
            DataSource::Hybrid
        };
        let coverage_pct = match data_source {
            DataSource::Hybrid => {
                Some(round_pct(100.0 * cached_count as f64 / region_ids.len() as f64))
            }
            _ => None,
        };
        debug!(
            "Fetching {} of {} regions live ({:?})",
            missing.len(),
            region_ids.len(),
            data_source
        );

        let fetches = missing.iter().map(|region_id| async {
            let result = self
                .raw_cache
                .get_or_compute(region_id, || async {
                    let _permit = self.semaphore.acquire().await.map_err(|_| {
                        PricingError::Internal {
                            message: "fetch semaphore closed".to_string(),
                        }
                    })?;
                    match self.live_source.fetch_region(region_id, tenant).await? {
                        SourceFetch::Hit(data) => Ok(data),
                        // An empty live listing is a real answer: a region with no SKUs.
                        SourceFetch::Miss => Ok(RegionPriceData::new(region_id.clone(), Vec::new())),
                    }
                })
                .await;
            (region_id.clone(), result)
        });

        let mut failures = Vec::new();
        for (region_id, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(data) => {
                    if let Err(e) = self.cache_source.materialize(&data).await {
                        warn!("Failed to materialize region {}: {}", region_id, e);
                    }
                    regions.insert(region_id, data);
                }
                Err(e) => {
                    warn!("Live fetch failed for region {}: {}", region_id, e);
                    failures.push(RegionFailure {
                        region_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if regions.is_empty() && !failures.is_empty() {
            return Err(PricingError::SourceUnavailable {
                details: format!("all {} region fetches failed", failures.len()),
            });
        }

        Ok(SelectionOutcome {
            regions,
            data_source,
            coverage_pct,
            failures,
        })
    }
}
