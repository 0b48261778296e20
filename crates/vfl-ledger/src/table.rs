use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfl_catalog::Mt;
use vfl_registry::{TankId, VesselRegistry};

/// ROB and current grade of one tank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankRob {
    pub rob: Mt,
    pub grade: String,
    /// Capacity in tonnes for `grade`; absent on hand-built opening tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Mt>,
}

/// Closing ROB per tank as of a period (or the opening state of a leg).
///
/// Keyed by tank id, so iteration and serialization order are stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobTable {
    /// Timestamp of the period that produced this table; `None` for an
    /// opening table that no accepted period precedes.
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    pub tanks: BTreeMap<TankId, TankRob>,
}

impl RobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registered tank at zero ROB with its onboarding grade.
    pub fn empty_for(registry: &VesselRegistry) -> Self {
        let tanks = registry
            .tanks()
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    TankRob {
                        rob: Mt::ZERO,
                        grade: t.grade.clone(),
                        capacity: registry.capacity_mt(t.id.as_str(), &t.grade),
                    },
                )
            })
            .collect();
        Self { as_of: None, tanks }
    }

    /// Set a tank's ROB and grade (builder style, for opening tables).
    pub fn with(mut self, tank: &str, rob: Mt, grade: &str) -> Self {
        self.tanks.insert(
            TankId::new(tank),
            TankRob {
                rob,
                grade: grade.to_string(),
                capacity: None,
            },
        );
        self
    }

    /// ROB of a tank; zero when the table has no row for it.
    pub fn rob(&self, tank: &str) -> Mt {
        self.get(tank).map(|r| r.rob).unwrap_or(Mt::ZERO)
    }

    pub fn grade(&self, tank: &str) -> Option<&str> {
        self.get(tank).map(|r| r.grade.as_str())
    }

    pub fn get(&self, tank: &str) -> Option<&TankRob> {
        self.tanks.get(tank)
    }

    /// Total ROB across all tanks.
    pub fn total(&self) -> Mt {
        self.tanks.values().map(|r| r.rob).sum()
    }

    /// Total ROB per grade, keyed by grade name.
    pub fn totals_by_grade(&self) -> BTreeMap<String, Mt> {
        let mut out: BTreeMap<String, Mt> = BTreeMap::new();
        for r in self.tanks.values() {
            *out.entry(r.grade.clone()).or_insert(Mt::ZERO) += r.rob;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.tanks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tanks.is_empty()
    }
}

/// Per-tank breakdown of one ledger run, in algorithm order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankMovement {
    pub tank: TankId,
    pub grade: String,
    pub opening: Mt,
    pub consumed: Mt,
    pub bunkered: Mt,
    pub debunkered: Mt,
    /// Net signed transfer.
    pub transferred: Mt,
    pub corrected: Mt,
    pub closing: Mt,
    /// Capacity in tonnes for the closing grade, when resolvable.
    pub capacity: Option<Mt>,
}

/// Vessel-wide totals of one ledger run (applied events only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    /// Root-consumer draws only; sub-consumer entries are sub-allocations.
    pub consumed: Mt,
    pub bunkered: Mt,
    pub debunkered: Mt,
    pub corrected: Mt,
}
