//! Region index: city -> district -> sub-district.
//!
//! Loaded once per run from a JSON file and never mutated afterwards, so a
//! shared `&RegionIndex` (or `Arc`) can be resolved against from any task.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CollectError, Result};
use crate::model::RegionNode;

/// Query values meaning "every district" / "every sub-district"
pub const ALL_SENTINELS: [&str; 2] = ["all", "전체"];

/// True when `value` is absent or one of the "all" sentinels.
pub fn is_all(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let v = v.trim();
            v.is_empty() || ALL_SENTINELS.contains(&v)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    #[serde(rename = "cityName", alias = "si_do_name")]
    pub name: String,
    #[serde(alias = "sigungu", default)]
    pub districts: Vec<District>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct District {
    #[serde(rename = "districtName", alias = "sigungu_name")]
    pub name: String,
    #[serde(rename = "districtCode", alias = "sigungu_code", default)]
    pub code: Option<String>,
    #[serde(rename = "subDistricts", alias = "eup_myeon_dong", default)]
    pub sub_districts: Vec<RegionNode>,
}

/// Outcome of [`RegionIndex::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Codes of the districts that were selected
    pub district_codes: Vec<String>,
    /// Unique sub-district codes
    pub codes: HashSet<String>,
    /// Sub-districts in dataset order, first occurrence of each code
    pub nodes: Vec<RegionNode>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keep only sub-districts whose name equals `name` exactly.
    pub fn retain_named(&mut self, name: &str) {
        self.nodes.retain(|n| n.name == name);
        self.codes = self.nodes.iter().map(|n| n.code.clone()).collect();
    }

    fn push_all(&mut self, district: &District) {
        if let Some(code) = &district.code {
            self.district_codes.push(code.clone());
        }
        for node in &district.sub_districts {
            if self.codes.insert(node.code.clone()) {
                self.nodes.push(node.clone());
            }
        }
    }
}

/// Read-only hierarchical region dataset.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    cities: Vec<City>,
}

impl RegionIndex {
    /// Load the dataset from a JSON file. A missing file is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CollectError::DatasetIo {
            path: path.display().to_string(),
            source,
        })?;
        let index = Self::from_json(&raw)?;
        debug!(path = %path.display(), cities = index.cities.len(), "Region dataset loaded");
        Ok(index)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let cities: Vec<City> = serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;
        Ok(Self { cities })
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Resolve `(city, district?)` to its sub-districts.
    ///
    /// `None` or an "all" sentinel selects every district of the city.
    /// A known region with no sub-districts yields an empty resolution.
    pub fn resolve(&self, city: &str, district: Option<&str>) -> Result<Resolution> {
        let entry = self
            .cities
            .iter()
            .find(|c| c.name == city)
            .ok_or_else(|| CollectError::RegionNotFound {
                city: city.to_string(),
            })?;

        let mut resolution = Resolution::default();

        if is_all(district) {
            for d in &entry.districts {
                resolution.push_all(d);
            }
        } else {
            let wanted = district.map(str::trim).unwrap_or_default();
            let d = entry
                .districts
                .iter()
                .find(|d| d.name == wanted)
                .ok_or_else(|| CollectError::DistrictNotFound {
                    city: city.to_string(),
                    district: wanted.to_string(),
                })?;
            resolution.push_all(d);
        }

        Ok(resolution)
    }
}
