//! # Geography Index Module
//!
//! ## Purpose
//! Static mapping from region identifier to geography and location metadata.
//! Read-only, loaded once at engine construction, and doubles as the region
//! catalog defining the scope of a pricing request.
//!
//! ## Input/Output Specification
//! - **Input**: embedded JSON region metadata (`data/region_geography.json`)
//! - **Output**: region lookups, geography labels, the ordered region catalog
//!
//! Regions absent from the index are assigned the literal `"Unknown"` geography
//! rather than dropped from rollups.

use crate::errors::Result;
use serde::Deserialize;
use std::collections::HashMap;

/// Geography label used when a region has no mapping
pub const UNKNOWN_GEOGRAPHY: &str = "Unknown";

const EMBEDDED_REGIONS: &str = include_str!("data/region_geography.json");

/// Metadata for a single region
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionInfo {
    pub display_name: String,
    pub geography: String,
    pub country_code: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Read-only region catalog and geography lookup
#[derive(Debug, Clone)]
pub struct GeographyIndex {
    regions: HashMap<String, RegionInfo>,
    /// Region ids in stable (sorted) order
    order: Vec<String>,
}

impl GeographyIndex {
    /// Build the index from a JSON document mapping region id to metadata
    pub fn from_json(json: &str) -> Result<Self> {
        let regions: HashMap<String, RegionInfo> = serde_json::from_str(json)?;
        let mut order: Vec<String> = regions.keys().cloned().collect();
        order.sort();
        Ok(Self { regions, order })
    }

    /// Load the embedded region catalog shipped with the crate
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_REGIONS)
    }

    /// Metadata for a region, if known
    pub fn get(&self, region_id: &str) -> Option<&RegionInfo> {
        self.regions.get(region_id)
    }

    /// Geography label for a region, `"Unknown"` when unmapped
    pub fn geography_of(&self, region_id: &str) -> &str {
        self.regions
            .get(region_id)
            .map(|r| r.geography.as_str())
            .unwrap_or(UNKNOWN_GEOGRAPHY)
    }

    /// Display name for a region, falling back to the raw id
    pub fn display_name_of<'a>(&'a self, region_id: &'a str) -> &'a str {
        self.regions
            .get(region_id)
            .map(|r| r.display_name.as_str())
            .unwrap_or(region_id)
    }

    /// All region ids in the catalog, sorted
    pub fn region_ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
