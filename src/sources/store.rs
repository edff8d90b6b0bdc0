//! # Store-Backed Pricing Source
//!
//! ## Purpose
//! Reads previously materialized SKU prices from a local sled database. Never
//! performs network I/O: a missing entry, a stale entry, or a corrupt entry is
//! reported as a miss, not an error. Live fetches call `materialize` to persist
//! their results here for later requests, always in base currency.

use super::{PricingSource, SourceFetch, SourceStats};
use crate::errors::{PricingError, Result};
use crate::models::RegionPriceData;
use crate::TenantContext;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sled-backed local price store
pub struct CacheSource {
    db: sled::Db,
    tree: sled::Tree,
    max_age: chrono::Duration,
    stats: Arc<RwLock<SourceStats>>,
}

impl CacheSource {
    /// Open (or create) the store at `path`. Entries older than `max_age` are
    /// treated as absent.
    pub fn open(path: impl AsRef<Path>, max_age: Duration) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        let tree = db.open_tree("region_prices")?;
        let max_age = chrono::Duration::from_std(max_age).map_err(|e| PricingError::Config {
            message: format!("invalid store max_age: {}", e),
        })?;

        Ok(Self {
            db,
            tree,
            max_age,
            stats: Arc::new(RwLock::new(SourceStats::default())),
        })
    }

    /// Snapshot of this source's statistics
    pub fn stats(&self) -> SourceStats {
        self.stats.read().clone()
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl PricingSource for CacheSource {
    fn name(&self) -> &str {
        "store"
    }

    async fn fetch_region(&self, region_id: &str, _tenant: &TenantContext) -> Result<SourceFetch> {
        let Some(bytes) = self.tree.get(region_id.as_bytes())? else {
            return Ok(SourceFetch::Miss);
        };

        let data: RegionPriceData = match bincode::deserialize(&bytes) {
            Ok(data) => data,
            Err(e) => {
                // A corrupt entry degrades to a miss; the next materialize overwrites it.
                warn!("Discarding unreadable store entry for region {}: {}", region_id, e);
                return Ok(SourceFetch::Miss);
            }
        };

        let age = Utc::now().signed_duration_since(data.fetched_at);
        if age > self.max_age {
            debug!("Store entry for region {} is stale ({}s old)", region_id, age.num_seconds());
            return Ok(SourceFetch::Miss);
        }

        {
            let mut stats = self.stats.write();
            stats.regions_fetched += 1;
            stats.skus_seen += data.sku_count();
            stats.last_fetch = Some(Utc::now());
        }
        Ok(SourceFetch::Hit(data))
    }

    async fn materialize(&self, data: &RegionPriceData) -> Result<()> {
        let bytes = bincode::serialize(data)?;
        self.tree.insert(data.region_id.as_bytes(), bytes)?;
        debug!(
            "Materialized {} SKU prices for region {}",
            data.sku_count(),
            data.region_id
        );
        Ok(())
    }
}
