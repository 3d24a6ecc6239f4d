use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{HarnessError, HarnessResult};

/// Activity status of a tenant as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityStatus {
    /// Tenant is loaded and serves queries.
    Hot,
    /// Tenant is offloaded and must be activated before querying.
    Cold,
    /// Any status this harness does not drive (e.g. `FROZEN`, `OFFLOADING`).
    #[serde(other)]
    Other,
}

impl ActivityStatus {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "HOT",
            Self::Cold => "COLD",
            Self::Other => "OTHER",
        }
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOT" => Ok(Self::Hot),
            "COLD" => Ok(Self::Cold),
            other => Err(format!("unsupported activity status `{other}`, expected HOT or COLD")),
        }
    }
}

/// A tenant of the target collection. Only referenced, never created here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant name, unique within the collection.
    pub name: String,
    /// Activity status at the time the tenant list was fetched.
    #[serde(rename = "activityStatus", default = "default_status")]
    pub activity_status: ActivityStatus,
}

fn default_status() -> ActivityStatus {
    ActivityStatus::Hot
}

impl Tenant {
    /// Creates a tenant descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, activity_status: ActivityStatus) -> Self {
        Self {
            name: name.into(),
            activity_status,
        }
    }
}

/// Read-only set of tenant names shared by every worker.
///
/// Cloning is cheap; all clones share the same backing slice.
#[derive(Debug, Clone)]
pub struct TenantPool {
    names: Arc<[String]>,
}

impl TenantPool {
    /// Builds a pool from tenant names.
    ///
    /// Returns [`HarnessError::EmptyTenantSet`] when `names` is empty so the
    /// precondition is reported before any sampling happens.
    pub fn new(collection: &str, names: Vec<String>) -> HarnessResult<Self> {
        if names.is_empty() {
            return Err(HarnessError::empty_tenant_set(collection));
        }
        Ok(Self {
            names: names.into(),
        })
    }

    /// Builds a pool from fetched tenants, optionally keeping only one activity status.
    pub fn from_tenants(
        collection: &str,
        tenants: &[Tenant],
        status: Option<ActivityStatus>,
    ) -> HarnessResult<Self> {
        let names = tenants
            .iter()
            .filter(|t| status.map_or(true, |s| t.activity_status == s))
            .map(|t| t.name.clone())
            .collect();
        Self::new(collection, names)
    }

    /// Number of tenants in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`; an empty pool cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All tenant names in their original order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Picks one tenant uniformly at random.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.names[rng.gen_range(0..self.names.len())]
    }

    /// Returns `n` distinct tenants in random order (`n` capped to the pool size).
    ///
    /// Shuffles a copy with Fisher–Yates and takes the prefix; the pool itself
    /// is never reordered.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<String> {
        let n = n.min(self.names.len());
        let mut shuffled = self.names.to_vec();
        for i in (1..shuffled.len()).rev() {
            let j = rng.gen_range(0..=i);
            shuffled.swap(i, j);
        }
        shuffled.truncate(n);
        shuffled
    }
}
