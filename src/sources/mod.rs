//! # Pricing Sources Module
//!
//! ## Purpose
//! Defines the common interface for pricing data sources and provides the two
//! implementations: a store-backed source reading materialized prices from a
//! local sled database, and a live source querying the external retail-pricing
//! API.
//!
//! ## Input/Output Specification
//! - **Input**: region identifier plus an opaque tenant context
//! - **Output**: priced and unpriced SKU observations for the region, or a
//!   reported miss, or a per-region failure
//!
//! ## Architecture
//! - `PricingSource` trait: common contract for all sources
//! - `store.rs`: sled-backed local store (`CacheSource`)
//! - `live.rs`: retail-pricing API client (`LiveSource`)
//!
//! Both sources are safe to invoke concurrently for different regions; neither
//! shares mutable state between calls beyond internal statistics counters.

pub mod live;
pub mod store;

use crate::errors::Result;
use crate::models::RegionPriceData;
use crate::TenantContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use live::LiveSource;
pub use store::CacheSource;

/// Outcome of a per-region fetch from a single source
#[derive(Debug, Clone)]
pub enum SourceFetch {
    /// The source produced SKU prices for the region
    Hit(RegionPriceData),
    /// The source has no usable (or no fresh) data for the region.
    /// Reported as data absence, never as an error.
    Miss,
}

/// Trait for pricing data sources
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Short name of this source for logging and stats
    fn name(&self) -> &str;

    /// Fetch all SKU prices for one region. A total region failure surfaces as
    /// an error; a plain absence of data is a `Miss`.
    async fn fetch_region(&self, region_id: &str, tenant: &TenantContext) -> Result<SourceFetch>;

    /// Persist freshly fetched region data so later requests can be served
    /// locally. Only the store-backed source does anything here.
    async fn materialize(&self, _data: &RegionPriceData) -> Result<()> {
        Ok(())
    }
}

/// Statistics for a pricing source
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    pub regions_fetched: usize,
    pub regions_failed: usize,
    pub skus_seen: usize,
    pub last_fetch: Option<DateTime<Utc>>,
}
