//! Append-only period journal.
//!
//! # Invariants
//!
//! - Per (vessel, leg), entries are strictly increasing by report time.
//! - Nothing is ever replaced or removed.
//! - A rejected append leaves the store unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use vfl_ledger::{AcceptedPeriod, LegKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The entry's report time is not after the leg's latest entry.
    NotIncreasing {
        leg: LegKey,
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotIncreasing { leg, last, got } => write!(
                f,
                "store: {leg}: report time {got} is not after latest stored {last}"
            ),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence contract for accepted periods.  Real backends live outside
/// this workspace.
pub trait PeriodStore {
    /// Check that `entry` could be appended, without appending it.
    fn check_append(&self, entry: &AcceptedPeriod) -> Result<(), StoreError>;

    /// Append an accepted period to its leg.
    fn append(&mut self, entry: AcceptedPeriod) -> Result<(), StoreError>;

    /// Most recent accepted period of a leg.
    fn latest(&self, leg: &LegKey) -> Option<&AcceptedPeriod>;

    /// All accepted periods of a leg, oldest first.
    fn periods(&self, leg: &LegKey) -> &[AcceptedPeriod];
}

/// In-memory [`PeriodStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    legs: BTreeMap<LegKey, Vec<AcceptedPeriod>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legs with at least one accepted period.
    pub fn legs(&self) -> impl Iterator<Item = &LegKey> {
        self.legs.keys()
    }
}

impl PeriodStore for MemoryStore {
    fn check_append(&self, entry: &AcceptedPeriod) -> Result<(), StoreError> {
        let leg = entry.period.key.leg_key();
        if let Some(last) = self.latest(&leg) {
            let last_time = last.period.report_time();
            let got = entry.period.report_time();
            if got <= last_time {
                return Err(StoreError::NotIncreasing {
                    leg,
                    last: last_time,
                    got,
                });
            }
        }
        Ok(())
    }

    fn append(&mut self, entry: AcceptedPeriod) -> Result<(), StoreError> {
        self.check_append(&entry)?;
        self.legs
            .entry(entry.period.key.leg_key())
            .or_default()
            .push(entry);
        Ok(())
    }

    fn latest(&self, leg: &LegKey) -> Option<&AcceptedPeriod> {
        self.legs.get(leg).and_then(|v| v.last())
    }

    fn periods(&self, leg: &LegKey) -> &[AcceptedPeriod] {
        self.legs.get(leg).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vfl_catalog::{Mt, ReportType};
    use vfl_ledger::{PeriodKey, ReportPeriod, RobTable};

    fn entry(leg: &str, hour: u32) -> AcceptedPeriod {
        let time = Utc.with_ymd_and_hms(2026, 4, 1, hour, 0, 0).unwrap();
        let mut closing = RobTable::new().with("A", Mt::whole(100), "MGO");
        closing.as_of = Some(time);
        AcceptedPeriod {
            period: ReportPeriod::new(PeriodKey::new("V", leg, time), ReportType::Noon),
            closing,
        }
    }

    #[test]
    fn legs_are_independent_and_ordered() {
        let mut store = MemoryStore::new();
        store.append(entry("L1", 12)).unwrap();
        store.append(entry("L2", 6)).unwrap();
        store.append(entry("L1", 18)).unwrap();

        let l1 = LegKey::new("V", "L1");
        assert_eq!(store.periods(&l1).len(), 2);
        assert_eq!(
            store.latest(&l1).map(|a| a.period.report_time().format("%H").to_string()),
            Some("18".to_string())
        );
        assert_eq!(store.legs().count(), 2);
    }

    #[test]
    fn non_increasing_append_is_refused_and_store_unchanged() {
        let mut store = MemoryStore::new();
        store.append(entry("L1", 12)).unwrap();

        let err = store.append(entry("L1", 12)).unwrap_err();
        assert!(matches!(err, StoreError::NotIncreasing { .. }));
        assert!(store.check_append(&entry("L1", 11)).is_err());
        assert_eq!(store.periods(&LegKey::new("V", "L1")).len(), 1);
    }

    #[test]
    fn unknown_leg_is_empty() {
        let store = MemoryStore::new();
        let leg = LegKey::new("V", "L9");
        assert!(store.latest(&leg).is_none());
        assert!(store.periods(&leg).is_empty());
    }
}
