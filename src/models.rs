//! # Data Model Module
//!
//! ## Purpose
//! Core data types exchanged between the pricing sources, the aggregator, the
//! cache layer, and the API adapter.
//!
//! ## Input/Output Specification
//! - **Input**: SKU-level prices produced by a pricing source
//! - **Output**: Aggregated summary rows and ranked cheapest-region rows
//! - **Serialization**: all externally visible rows serialize camelCase
//!
//! ## Invariants
//! - `availability_pct == 100 * priced_sku_count / sku_count` when
//!   `sku_count > 0`, otherwise `None`
//! - `avg_price` is `None` exactly when `priced_sku_count == 0`
//! - Raw per-region data is always held in the base currency (USD); display
//!   currency conversion happens once, at aggregation time

use crate::errors::PricingError;
use crate::validation_error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display currencies supported by the engine (base currency is USD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Cad,
    Chf,
    Inr,
    Brl,
}

impl Currency {
    /// ISO 4217 code for this currency
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Aud => "AUD",
            Currency::Cad => "CAD",
            Currency::Chf => "CHF",
            Currency::Inr => "INR",
            Currency::Brl => "BRL",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Usd
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            "AUD" => Ok(Currency::Aud),
            "CAD" => Ok(Currency::Cad),
            "CHF" => Ok(Currency::Chf),
            "INR" => Ok(Currency::Inr),
            "BRL" => Ok(Currency::Brl),
            other => Err(validation_error!(
                "currency",
                format!("unsupported currency code '{}'", other)
            )),
        }
    }
}

/// Row grouping requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Region,
    Geography,
}

impl Default for GroupBy {
    fn default() -> Self {
        GroupBy::Region
    }
}

impl FromStr for GroupBy {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "region" => Ok(GroupBy::Region),
            "geography" => Ok(GroupBy::Geography),
            other => Err(validation_error!(
                "groupBy",
                format!("expected 'region' or 'geography', got '{}'", other)
            )),
        }
    }
}

/// Where the price data for a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Every region satisfied from the local store within its freshness window
    Db,
    /// Every region fetched from the retail prices API
    Live,
    /// Per-region mix of store and live data
    Hybrid,
}

/// A single SKU price observation within a region, in base currency.
/// Immutable once returned by a pricing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuPrice {
    /// SKU identifier (e.g. `Standard_D2s_v5`)
    pub sku_id: String,
    /// Region the price applies to
    pub region_id: String,
    /// Hourly pay-as-you-go price in base currency; `None` when the SKU is
    /// listed for the region but carries no usable price
    pub hourly_price: Option<f64>,
    /// Whether this SKU counts toward `priced_sku_count`
    pub priced: bool,
}

impl SkuPrice {
    /// Build an observation from an optional raw price. Prices must be strictly
    /// positive to count as priced.
    pub fn new(sku_id: impl Into<String>, region_id: impl Into<String>, price: Option<f64>) -> Self {
        let hourly_price = price.filter(|p| *p > 0.0);
        Self {
            sku_id: sku_id.into(),
            region_id: region_id.into(),
            priced: hourly_price.is_some(),
            hourly_price,
        }
    }
}

/// All SKU price observations for one region, as produced by a pricing source.
/// Always in base currency so cached instances stay currency-independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionPriceData {
    pub region_id: String,
    pub skus: Vec<SkuPrice>,
    /// When the source produced this data
    pub fetched_at: DateTime<Utc>,
}

impl RegionPriceData {
    pub fn new(region_id: impl Into<String>, skus: Vec<SkuPrice>) -> Self {
        Self {
            region_id: region_id.into(),
            skus,
            fetched_at: Utc::now(),
        }
    }

    /// Total SKU catalog size for this region
    pub fn sku_count(&self) -> usize {
        self.skus.len()
    }

    /// Number of SKUs with a valid positive price
    pub fn priced_sku_count(&self) -> usize {
        self.skus.iter().filter(|s| s.priced).count()
    }

    /// All valid prices, in base currency
    pub fn priced_values(&self) -> Vec<f64> {
        self.skus.iter().filter_map(|s| s.hourly_price).collect()
    }
}

/// One summary row per region per aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPriceRow {
    pub geography: String,
    pub region_name: String,
    pub region_id: String,
    pub country_code: String,
    /// Mean hourly price over priced SKUs, in the display currency
    pub avg_price: Option<f64>,
    /// `100 * priced_sku_count / sku_count`; `None` when `sku_count == 0`
    pub availability_pct: Option<f64>,
    pub sku_count: usize,
    pub priced_sku_count: usize,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Rollup of all regions sharing a geography. Regions contribute equally to
/// `avg_price` (mean of regional means, not SKU-weighted); counts are sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographyPriceRow {
    pub geography: String,
    pub region_count: usize,
    pub avg_price: Option<f64>,
    pub availability_pct: Option<f64>,
    pub sku_count: usize,
    pub priced_sku_count: usize,
}

/// A row in a summary result, shaped by the requested grouping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryRow {
    Region(RegionPriceRow),
    Geography(GeographyPriceRow),
}

impl SummaryRow {
    pub fn avg_price(&self) -> Option<f64> {
        match self {
            SummaryRow::Region(r) => r.avg_price,
            SummaryRow::Geography(g) => g.avg_price,
        }
    }

    pub fn sku_count(&self) -> usize {
        match self {
            SummaryRow::Region(r) => r.sku_count,
            SummaryRow::Geography(g) => g.sku_count,
        }
    }
}

/// A row in the cheapest-regions ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheapestRegionRow {
    /// 1-based rank, cheapest first
    pub rank: usize,
    #[serde(flatten)]
    pub row: RegionPriceRow,
    /// Percentage above the cheapest region's average; exactly 0 at rank 1
    pub delta_pct: f64,
}

/// Full result of a summary computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub rows: Vec<SummaryRow>,
    pub currency: Currency,
    pub group_by: GroupBy,
    pub data_source: DataSource,
    /// Percentage of regions satisfied from cached data; only set for hybrid
    pub coverage_pct: Option<f64>,
    pub timestamp_utc: DateTime<Utc>,
}

/// Result envelope for the cheapest-N ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheapestResult {
    pub rows: Vec<CheapestRegionRow>,
    pub currency: Currency,
    pub data_source: DataSource,
    pub timestamp_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_round_trips_codes() {
        for code in ["USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "INR", "BRL"] {
            let c: Currency = code.parse().unwrap();
            assert_eq!(c.code(), code);
        }
        assert!("XXX".parse::<Currency>().is_err());
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
    }

    #[test]
    fn unknown_inputs_are_validation_errors() {
        let err = "XXX".parse::<Currency>().unwrap_err();
        assert!(matches!(err, PricingError::Validation { ref field, .. } if field == "currency"));

        let err = "continent".parse::<GroupBy>().unwrap_err();
        assert!(matches!(err, PricingError::Validation { ref field, .. } if field == "groupBy"));
    }

    #[test]
    fn sku_price_rejects_non_positive() {
        assert!(SkuPrice::new("Standard_B2s", "eastus", Some(0.05)).priced);
        assert!(!SkuPrice::new("Standard_B2s", "eastus", Some(0.0)).priced);
        assert!(!SkuPrice::new("Standard_B2s", "eastus", None).priced);
    }

    #[test]
    fn region_data_counts() {
        let data = RegionPriceData::new(
            "westus",
            vec![
                SkuPrice::new("a", "westus", Some(0.20)),
                SkuPrice::new("b", "westus", Some(0.30)),
                SkuPrice::new("c", "westus", None),
            ],
        );
        assert_eq!(data.sku_count(), 3);
        assert_eq!(data.priced_sku_count(), 2);
        assert_eq!(data.priced_values(), vec![0.20, 0.30]);
    }

    #[test]
    fn rows_serialize_camel_case() {
        let row = RegionPriceRow {
            geography: "North America".to_string(),
            region_name: "East US".to_string(),
            region_id: "eastus".to_string(),
            country_code: "US".to_string(),
            avg_price: Some(0.1),
            availability_pct: Some(100.0),
            sku_count: 3,
            priced_sku_count: 3,
            lat: Some(37.37),
            lon: Some(-79.82),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("regionId").is_some());
        assert!(json.get("avgPrice").is_some());
        assert!(json.get("availabilityPct").is_some());
        assert!(json.get("pricedSkuCount").is_some());

        let ranked = CheapestRegionRow {
            rank: 1,
            row,
            delta_pct: 0.0,
        };
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json.get("rank").unwrap(), 1);
        assert_eq!(json.get("deltaPct").unwrap(), 0.0);
        assert!(json.get("regionId").is_some());
    }
}
