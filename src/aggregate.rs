//! # Aggregation Module
//!
//! ## Purpose
//! Pure functions turning per-region SKU price sets into summary rows,
//! geography rollups, and the cheapest-N ranking. Nothing here suspends or
//! touches shared state; callers pass in everything and own everything that
//! comes back.
//!
//! ## Semantics
//! - Per-region average: arithmetic mean of hourly prices over priced SKUs.
//!   Regions with zero priced SKUs get a null average and sort last.
//! - Geography rollup: mean of regional means; member regions contribute
//!   equally regardless of catalog size; counts are summed. Unmapped regions
//!   land in the literal `"Unknown"` bucket rather than being dropped.
//! - Currency conversion is applied here, once, to every average. Raw inputs
//!   are base-currency and stay that way in the caches.
//! - Ordering: stable ascending by average price, nulls last, ties broken by
//!   region id (geography name for rollups).

use crate::currency::{round_pct, round_price};
use crate::geography::GeographyIndex;
use crate::models::{CheapestRegionRow, GeographyPriceRow, RegionPriceData, RegionPriceRow};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Ascending by price with nulls last, deterministic tie-break
fn price_order(a: Option<f64>, b: Option<f64>, tie_a: &str, tie_b: &str) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x
            .partial_cmp(&y)
            .unwrap_or(Ordering::Equal)
            .then_with(|| tie_a.cmp(tie_b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => tie_a.cmp(tie_b),
    }
}

/// Build sorted per-region summary rows from collected price data.
/// `fx_rate` converts base-currency averages into the display currency.
pub fn region_rows(
    regions: &HashMap<String, Arc<RegionPriceData>>,
    index: &GeographyIndex,
    fx_rate: f64,
) -> Vec<RegionPriceRow> {
    let mut rows: Vec<RegionPriceRow> = regions
        .values()
        .map(|data| {
            let sku_count = data.sku_count();
            let priced = data.priced_values();
            let priced_sku_count = priced.len();

            let avg_price = if priced_sku_count > 0 {
                let mean = priced.iter().sum::<f64>() / priced_sku_count as f64;
                Some(round_price(mean * fx_rate))
            } else {
                None
            };
            let availability_pct = if sku_count > 0 {
                Some(round_pct(100.0 * priced_sku_count as f64 / sku_count as f64))
            } else {
                None
            };

            let info = index.get(&data.region_id);
            RegionPriceRow {
                geography: index.geography_of(&data.region_id).to_string(),
                region_name: index.display_name_of(&data.region_id).to_string(),
                region_id: data.region_id.clone(),
                country_code: info.map(|i| i.country_code.clone()).unwrap_or_default(),
                avg_price,
                availability_pct,
                sku_count,
                priced_sku_count,
                lat: info.and_then(|i| i.lat),
                lon: info.and_then(|i| i.lon),
            }
        })
        .collect();

    rows.sort_by(|a, b| price_order(a.avg_price, b.avg_price, &a.region_id, &b.region_id));
    rows
}

/// Roll region rows up into one row per geography
pub fn geography_rows(rows: &[RegionPriceRow]) -> Vec<GeographyPriceRow> {
    let mut groups: BTreeMap<&str, Vec<&RegionPriceRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.geography.as_str()).or_default().push(row);
    }

    let mut rollups: Vec<GeographyPriceRow> = groups
        .into_iter()
        .map(|(geography, members)| {
            let sku_count: usize = members.iter().map(|r| r.sku_count).sum();
            let priced_sku_count: usize = members.iter().map(|r| r.priced_sku_count).sum();

            // Mean of regional means; regions weigh equally by design.
            let priced_avgs: Vec<f64> = members.iter().filter_map(|r| r.avg_price).collect();
            let avg_price = if priced_avgs.is_empty() {
                None
            } else {
                Some(round_price(
                    priced_avgs.iter().sum::<f64>() / priced_avgs.len() as f64,
                ))
            };
            let availability_pct = if sku_count > 0 {
                Some(round_pct(100.0 * priced_sku_count as f64 / sku_count as f64))
            } else {
                None
            };

            GeographyPriceRow {
                geography: geography.to_string(),
                region_count: members.len(),
                avg_price,
                availability_pct,
                sku_count,
                priced_sku_count,
            }
        })
        .collect();

    rollups.sort_by(|a, b| price_order(a.avg_price, b.avg_price, &a.geography, &b.geography));
    rollups
}

/// Rank the cheapest `top_n` regions. Input rows must already be in summary
/// order; rows without a price are excluded entirely. Returns fewer than
/// `top_n` rows when fewer priced regions exist; never pads.
pub fn rank_cheapest(rows: &[RegionPriceRow], top_n: usize) -> Vec<CheapestRegionRow> {
    let priced: Vec<&RegionPriceRow> = rows.iter().filter(|r| r.avg_price.is_some()).collect();

    let Some(cheapest) = priced.first().and_then(|r| r.avg_price) else {
        return Vec::new();
    };

    priced
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, row)| {
            let avg = row.avg_price.unwrap_or(0.0);
            CheapestRegionRow {
                rank: i + 1,
                row: row.clone(),
                delta_pct: round_pct(100.0 * (avg - cheapest) / cheapest),
            }
        })
        .collect()
}
