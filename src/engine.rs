//! # Pricing Engine Module
//!
//! ## Purpose
//! Orchestrating facade over the selector, aggregator, currency converter, and
//! the two cache tiers. This is the type the API adapter (and any other
//! consumer) talks to.
//!
//! ## Input/Output Specification
//! - **Input**: typed request parameters (tenant context, currency, grouping)
//! - **Output**: cached or freshly computed summary and cheapest-N results
//!
//! ## Lifecycle
//! Constructed once at service start with explicit dependencies (geography
//! index, both pricing sources, FX provider) and torn down at shutdown. The
//! engine owns both caches; no process-wide singletons. Both query operations
//! are idempotent and side-effect-free from the caller's perspective.

use crate::aggregate;
use crate::cache::TtlCache;
use crate::config::{CacheConfig, Config};
use crate::currency::{FxRateProvider, StaticFxProvider};
use crate::errors::Result;
use crate::geography::GeographyIndex;
use crate::models::{
    CheapestResult, Currency, GroupBy, RegionPriceRow, SummaryResult, SummaryRow,
};
use crate::selector::SourceSelector;
use crate::sources::{CacheSource, LiveSource, PricingSource};
use crate::TenantContext;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Parameters for a summary query
#[derive(Debug, Clone)]
pub struct SummaryParams {
    pub tenant: TenantContext,
    pub currency: Currency,
    pub group_by: GroupBy,
}

/// Parameters for a cheapest-N query
#[derive(Debug, Clone)]
pub struct CheapestParams {
    pub tenant: TenantContext,
    pub currency: Currency,
    /// Requested ranking depth; values below 1 are clamped to 1
    pub top_n: usize,
}

/// Request-shape key for the summary cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SummaryKey {
    tenant_fp: String,
    currency: Currency,
    group_by: GroupBy,
}

/// The pricing engine facade
pub struct PricingEngine {
    geography: Arc<GeographyIndex>,
    selector: SourceSelector,
    fx: Arc<dyn FxRateProvider>,
    summary_cache: TtlCache<SummaryKey, SummaryResult>,
}

impl PricingEngine {
    /// Build an engine with explicit dependencies
    pub fn new(
        geography: Arc<GeographyIndex>,
        cache_source: Arc<dyn PricingSource>,
        live_source: Arc<dyn PricingSource>,
        fx: Arc<dyn FxRateProvider>,
        cache_config: &CacheConfig,
    ) -> Self {
        let raw_cache = Arc::new(TtlCache::new(Duration::from_secs(
            cache_config.raw_price_ttl_seconds,
        )));
        let selector = SourceSelector::new(
            cache_source,
            live_source,
            raw_cache,
            cache_config.max_in_flight_fetches,
        );
        Self {
            geography,
            selector,
            fx,
            summary_cache: TtlCache::new(Duration::from_secs(cache_config.summary_ttl_seconds)),
        }
    }

    /// Convenience constructor wiring the default production dependencies
    pub fn from_config(config: &Config) -> Result<Self> {
        let geography = Arc::new(GeographyIndex::embedded()?);
        info!("Loaded geography index with {} regions", geography.len());

        let store = CacheSource::open(
            &config.store.path,
            Duration::from_secs(config.store.max_age_seconds),
        )?;
        let live = LiveSource::new(config.live_api.clone())?;

        Ok(Self::new(
            geography,
            Arc::new(store),
            Arc::new(live),
            Arc::new(StaticFxProvider::new()),
            &config.cache,
        ))
    }

    /// Per-region (or per-geography) average price summary over the full
    /// region catalog. Served from the summary cache within its TTL; a miss
    /// runs the selector + aggregator pipeline exactly once per key.
    pub async fn summary(&self, params: SummaryParams) -> Result<Arc<SummaryResult>> {
        // Resolve the FX rate before touching caches so invalid requests
        // never write anything.
        let fx_rate = self.fx.rate(params.currency)?;
        let key = SummaryKey {
            tenant_fp: params.tenant.fingerprint(),
            currency: params.currency,
            group_by: params.group_by,
        };

        self.summary_cache
            .get_or_compute(&key, || async {
                let outcome = self
                    .selector
                    .collect(self.geography.region_ids(), &params.tenant)
                    .await?;
                if !outcome.failures.is_empty() {
                    warn!(
                        "{} of {} regions omitted after fetch failures",
                        outcome.failures.len(),
                        self.geography.len()
                    );
                }

                let region_rows =
                    aggregate::region_rows(&outcome.regions, &self.geography, fx_rate);
                let rows: Vec<SummaryRow> = match params.group_by {
                    GroupBy::Region => {
                        region_rows.into_iter().map(SummaryRow::Region).collect()
                    }
                    GroupBy::Geography => aggregate::geography_rows(&region_rows)
                        .into_iter()
                        .map(SummaryRow::Geography)
                        .collect(),
                };

                Ok(SummaryResult {
                    rows,
                    currency: params.currency,
                    group_by: params.group_by,
                    data_source: outcome.data_source,
                    coverage_pct: outcome.coverage_pct,
                    timestamp_utc: Utc::now(),
                })
            })
            .await
    }

    /// Top-N cheapest regions by average price, derived from (and sharing the
    /// cache entry of) the region-grouped summary.
    pub async fn cheapest(&self, params: CheapestParams) -> Result<CheapestResult> {
        let top_n = params.top_n.max(1);
        let summary = self
            .summary(SummaryParams {
                tenant: params.tenant,
                currency: params.currency,
                group_by: GroupBy::Region,
            })
            .await?;

        let region_rows: Vec<RegionPriceRow> = summary
            .rows
            .iter()
            .filter_map(|row| match row {
                SummaryRow::Region(r) => Some(r.clone()),
                SummaryRow::Geography(_) => None,
            })
            .collect();

        Ok(CheapestResult {
            rows: aggregate::rank_cheapest(&region_rows, top_n),
            currency: params.currency,
            data_source: summary.data_source,
            timestamp_utc: summary.timestamp_utc,
        })
    }

    /// Sourcing mode the engine would use right now; exposed for health checks
    pub fn region_count(&self) -> usize {
        self.geography.len()
    }

    /// Number of distinct summary-cache keys observed since start
    pub fn summary_cache_size(&self) -> usize {
        self.summary_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataSource;
    use crate::sources::testing::MockSource;

    fn engine_with(store: Arc<MockSource>, live: Arc<MockSource>) -> PricingEngine {
        PricingEngine::new(
            Arc::new(GeographyIndex::embedded().unwrap()),
            store,
            live,
            Arc::new(StaticFxProvider::new()),
            &CacheConfig::default(),
        )
    }

    fn live_with_two_regions() -> Arc<MockSource> {
        Arc::new(
            MockSource::new("live")
                .with_region(
                    "eastus",
                    &[
                        ("Standard_B2s", Some(0.05)),
                        ("Standard_D2s_v5", Some(0.10)),
                        ("Standard_D4s_v5", Some(0.15)),
                    ],
                )
                .with_region(
                    "westus",
                    &[
                        ("Standard_B2s", Some(0.20)),
                        ("Standard_D2s_v5", Some(0.30)),
                        ("Standard_D4s_v5", None),
                        ("Standard_E4s_v5", None),
                        ("Standard_L8s_v3", None),
                    ],
                ),
        )
    }

    fn region_row<'a>(result: &'a SummaryResult, region_id: &str) -> &'a RegionPriceRow {
        result
            .rows
            .iter()
            .find_map(|row| match row {
                SummaryRow::Region(r) if r.region_id == region_id => Some(r),
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn summary_aggregates_live_data() {
        let engine = engine_with(Arc::new(MockSource::new("store")), live_with_two_regions());
        let result = engine
            .summary(SummaryParams {
                tenant: TenantContext::default(),
                currency: Currency::Usd,
                group_by: GroupBy::Region,
            })
            .await
            .unwrap();

        assert_eq!(result.data_source, DataSource::Live);
        // regions absent from the live source appear with null price fields
        assert_eq!(result.rows.len(), engine.region_count());

        let eastus = region_row(&result, "eastus");
        assert_eq!(eastus.avg_price, Some(0.10));
        assert_eq!(eastus.availability_pct, Some(100.0));

        let westus = region_row(&result, "westus");
        assert_eq!(westus.avg_price, Some(0.25));
        assert_eq!(westus.availability_pct, Some(40.0));
    }

    #[tokio::test]
    async fn full_store_coverage_never_calls_live() {
        let geography = GeographyIndex::embedded().unwrap();
        let mut store = MockSource::new("store");
        for region_id in geography.region_ids() {
            store = store.with_region(region_id, &[("Standard_B2s", Some(0.05))]);
        }
        let live = Arc::new(MockSource::new("live"));
        let engine = engine_with(Arc::new(store), live.clone());

        let result = engine
            .summary(SummaryParams {
                tenant: TenantContext::default(),
                currency: Currency::Usd,
                group_by: GroupBy::Region,
            })
            .await
            .unwrap();

        assert_eq!(result.data_source, DataSource::Db);
        assert_eq!(live.call_count(), 0);
    }

    #[tokio::test]
    async fn repeat_requests_are_idempotent_within_ttl() {
        let live = live_with_two_regions();
        let engine = engine_with(Arc::new(MockSource::new("store")), live.clone());
        let params = SummaryParams {
            tenant: TenantContext::default(),
            currency: Currency::Usd,
            group_by: GroupBy::Region,
        };

        let first = engine.summary(params.clone()).await.unwrap();
        let calls_after_first = live.call_count();
        let second = engine.summary(params).await.unwrap();

        assert_eq!(first.rows, second.rows);
        assert_eq!(first.timestamp_utc, second.timestamp_utc);
        assert_eq!(live.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn currency_conversion_applies_at_aggregation() {
        let live = live_with_two_regions();
        let engine = engine_with(Arc::new(MockSource::new("store")), live.clone());
        let tenant = TenantContext::default();

        let usd = engine
            .summary(SummaryParams {
                tenant: tenant.clone(),
                currency: Currency::Usd,
                group_by: GroupBy::Region,
            })
            .await
            .unwrap();
        let calls_after_usd = live.call_count();

        let eur = engine
            .summary(SummaryParams {
                tenant,
                currency: Currency::Eur,
                group_by: GroupBy::Region,
            })
            .await
            .unwrap();

        let usd_avg = region_row(&usd, "eastus").avg_price.unwrap();
        let eur_avg = region_row(&eur, "eastus").avg_price.unwrap();
        assert!((eur_avg - usd_avg * 0.92).abs() < 1e-9);
        // raw prices were already cached in base currency: no extra live calls
        assert_eq!(live.call_count(), calls_after_usd);
    }

    #[tokio::test]
    async fn geography_grouping_returns_rollups() {
        let engine = engine_with(Arc::new(MockSource::new("store")), live_with_two_regions());
        let result = engine
            .summary(SummaryParams {
                tenant: TenantContext::default(),
                currency: Currency::Usd,
                group_by: GroupBy::Geography,
            })
            .await
            .unwrap();

        assert!(result
            .rows
            .iter()
            .all(|row| matches!(row, SummaryRow::Geography(_))));
        let na = result
            .rows
            .iter()
            .find_map(|row| match row {
                SummaryRow::Geography(g) if g.geography == "North America" => Some(g),
                _ => None,
            })
            .unwrap();
        // mean of regional means: (0.10 + 0.25) / 2
        assert_eq!(na.avg_price, Some(0.175));
    }

    #[tokio::test]
    async fn cheapest_ranks_and_clamps_top_n() {
        let engine = engine_with(Arc::new(MockSource::new("store")), live_with_two_regions());

        let ranked = engine
            .cheapest(CheapestParams {
                tenant: TenantContext::default(),
                currency: Currency::Usd,
                top_n: 0,
            })
            .await
            .unwrap();

        // top_n clamped to 1; eastus wins with zero delta
        assert_eq!(ranked.rows.len(), 1);
        assert_eq!(ranked.rows[0].rank, 1);
        assert_eq!(ranked.rows[0].row.region_id, "eastus");
        assert_eq!(ranked.rows[0].delta_pct, 0.0);
    }

    #[tokio::test]
    async fn cheapest_excludes_unpriced_regions() {
        let engine = engine_with(Arc::new(MockSource::new("store")), live_with_two_regions());
        let ranked = engine
            .cheapest(CheapestParams {
                tenant: TenantContext::default(),
                currency: Currency::Usd,
                top_n: 50,
            })
            .await
            .unwrap();

        // only the two priced regions make the ranking
        assert_eq!(ranked.rows.len(), 2);
        assert!(ranked.rows[0].row.avg_price <= ranked.rows[1].row.avg_price);
        assert_eq!(ranked.rows[1].delta_pct, 150.0);
    }
}
