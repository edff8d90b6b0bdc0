//! # Region Price Scout
//!
//! ## Overview
//! This library ranks cloud compute regions by average hourly VM price, computed
//! from SKU-level catalog prices per region. It decides where price data comes
//! from (a local store vs. the live retail-pricing API), merges the two when only
//! partial data is available, computes statistical summaries, and caches results
//! at two time scales to bound both staleness and external API load.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `sources`: Pricing-source abstraction with store-backed and live implementations
//! - `selector`: Per-request sourcing policy (db / live / hybrid) and bounded fan-out
//! - `aggregate`: Pure aggregation, geography rollups, and cheapest-N ranking
//! - `cache`: Expiring single-flight caches (summary and raw-price tiers)
//! - `currency`: Point-in-time FX conversion applied at aggregation time
//! - `geography`: Static region catalog with geography/country metadata
//! - `engine`: Orchestrating facade consumed by the API adapter
//! - `api`: Thin actix-web adapter exposing `/summary` and `/cheapest`
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use region_price_scout::{Config, PricingEngine, TenantContext};
//! use region_price_scout::engine::SummaryParams;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let engine = PricingEngine::from_config(&config)?;
//!     let summary = engine
//!         .summary(SummaryParams {
//!             tenant: TenantContext::default(),
//!             currency: "USD".parse()?,
//!             group_by: "region".parse()?,
//!         })
//!         .await?;
//!     println!("{} rows", summary.rows.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod aggregate;
pub mod api;
pub mod cache;
pub mod config;
pub mod currency;
pub mod engine;
pub mod errors;
pub mod geography;
pub mod models;
pub mod selector;
pub mod sources;

// Re-exports for convenience
pub use config::Config;
pub use engine::PricingEngine;
pub use errors::{PricingError, Result};
pub use models::{CheapestResult, Currency, DataSource, GroupBy, SummaryResult};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Already-resolved tenant context, consumed as an opaque credential scope.
/// Only its fingerprint participates in cache keys; the engine never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TenantContext {
    pub tenant_id: Option<String>,
}

impl TenantContext {
    pub fn new(tenant_id: Option<String>) -> Self {
        Self { tenant_id }
    }

    /// Stable fingerprint for cache keying
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.tenant_id.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }
}

/// Application state shared across API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub engine: Arc<engine::PricingEngine>,
}
