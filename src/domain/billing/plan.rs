//! Billing plan catalog.
//!
//! Static mapping from (region, processor product id) to a plan definition.
//! The catalog is loaded once at startup and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Partition of processor accounts and credentials.
///
/// A region pins a customer's processor identity: catalogs, API keys, and
/// webhook secrets are all scoped per region. `Ord` gives the canonical
/// iteration order used for deterministic catalog resolution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Eu,
    Us,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Eu => write!(f, "eu"),
            Region::Us => write!(f, "us"),
        }
    }
}

impl FromStr for Region {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eu" => Ok(Region::Eu),
            "us" => Ok(Region::Us),
            other => Err(CatalogError::UnknownRegion(other.to_string())),
        }
    }
}

/// A purchasable storage plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPlan {
    /// Internal plan identifier (e.g. "100gb_yearly").
    pub id: String,

    /// Processor-side price/product id this plan is sold under.
    pub product_id: String,

    /// Storage granted by the plan, in bytes.
    pub storage_quota: i64,

    /// Display price, processor-reported currency units (e.g. "4.99").
    pub price: String,

    /// Billing period label (e.g. "month", "year").
    pub period: String,
}

/// Errors raised while loading or querying the plan catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("catalog parse error: {0}")]
    Parse(String),

    #[error("catalog for region {0} is empty")]
    EmptyRegion(Region),
}

/// Immutable per-region plan catalog.
///
/// Product ids are disjoint across regions in practice, but resolution does
/// not assume it: regions are scanned in canonical order and the first match
/// wins, so lookups are reproducible.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct PlanCatalog {
    plans: BTreeMap<Region, Vec<BillingPlan>>,
}

impl PlanCatalog {
    /// Builds a catalog from per-region plan lists.
    pub fn new(plans: BTreeMap<Region, Vec<BillingPlan>>) -> Self {
        Self { plans }
    }

    /// Parses a catalog from its YAML representation.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` on malformed YAML and
    /// `CatalogError::EmptyRegion` if a region lists no plans.
    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        let catalog: PlanCatalog =
            serde_yaml::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        for (region, plans) in &catalog.plans {
            if plans.is_empty() {
                return Err(CatalogError::EmptyRegion(*region));
            }
        }
        Ok(catalog)
    }

    /// Resolves a processor product id to its plan and owning region.
    ///
    /// First match in canonical region order; `None` if no region sells the
    /// product.
    pub fn resolve(&self, product_id: &str) -> Option<(&BillingPlan, Region)> {
        for (region, plans) in &self.plans {
            if let Some(plan) = plans.iter().find(|p| p.product_id == product_id) {
                return Some((plan, *region));
            }
        }
        None
    }

    /// All plans sold in a region.
    pub fn plans_for(&self, region: Region) -> &[BillingPlan] {
        self.plans.get(&region).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Regions with a configured catalog, in canonical order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.plans.keys().copied()
    }
}

/// Built-in catalog used when no catalog file is configured.
pub static DEFAULT_CATALOG: Lazy<PlanCatalog> = Lazy::new(|| {
    PlanCatalog::from_yaml(DEFAULT_CATALOG_YAML).expect("built-in catalog is well-formed")
});

const DEFAULT_CATALOG_YAML: &str = r#"
eu:
  - id: 50gb_monthly
    product_id: price_eu_50gb_monthly
    storage_quota: 53687091200
    price: "2.99"
    period: month
  - id: 200gb_yearly
    product_id: price_eu_200gb_yearly
    storage_quota: 214748364800
    price: "24.99"
    period: year
us:
  - id: 50gb_monthly
    product_id: price_us_50gb_monthly
    storage_quota: 53687091200
    price: "2.99"
    period: month
  - id: 200gb_yearly
    product_id: price_us_200gb_yearly
    storage_quota: 214748364800
    price: "24.99"
    period: year
"#;
