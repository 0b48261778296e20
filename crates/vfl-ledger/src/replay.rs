use serde::{Deserialize, Serialize};
use vfl_registry::{TankId, VesselRegistry};

use crate::engine::{reconcile_period, LedgerConfig, LedgerOutcome};
use crate::period::{PeriodKey, ReportPeriod};
use crate::table::RobTable;

/// A journaled period: what was submitted and the closing table it produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPeriod {
    pub period: ReportPeriod,
    pub closing: RobTable,
}

/// One step of a replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayStep {
    pub outcome: LedgerOutcome,
    /// Whether the outcome passed the policy.  Only accepted steps advance
    /// the running table.
    pub accepted: bool,
}

/// Fold the ledger over `periods`, starting from `opening`.
///
/// Mirrors a live session: a period that the policy would block is reported
/// but does not become the next period's prior.
pub fn replay(
    registry: &VesselRegistry,
    opening: &RobTable,
    periods: &[ReportPeriod],
    config: &LedgerConfig,
) -> Vec<ReplayStep> {
    let mut prior = opening.clone();
    let mut steps = Vec::with_capacity(periods.len());
    for p in periods {
        let outcome = reconcile_period(registry, &prior, p, config);
        let accepted = outcome.is_acceptable(&config.policy);
        if accepted {
            prior = outcome.closing.clone();
        }
        steps.push(ReplayStep { outcome, accepted });
    }
    steps
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayError {
    /// A journaled period no longer passes the policy.
    Rejected { index: usize, key: PeriodKey },
    /// Recomputed closing differs from the stored one.  `tank` is the first
    /// differing tank in id order, `None` if only `as_of` differs.
    Mismatch {
        index: usize,
        key: PeriodKey,
        tank: Option<TankId>,
    },
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { index, key } => write!(
                f,
                "replay: journal entry {index} ({}/{} @ {}) is rejected on recompute",
                key.vessel, key.leg, key.report_time
            ),
            Self::Mismatch { index, key, tank } => {
                write!(
                    f,
                    "replay: journal entry {index} ({}/{} @ {}) closing mismatch",
                    key.vessel, key.leg, key.report_time
                )?;
                if let Some(t) = tank {
                    write!(f, " at tank '{t}'")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ReplayError {}

/// Recompute a journal from `opening` and check every stored closing table.
///
/// Returns the final closing table on success.
pub fn verify_replay(
    registry: &VesselRegistry,
    opening: &RobTable,
    journal: &[AcceptedPeriod],
    config: &LedgerConfig,
) -> Result<RobTable, ReplayError> {
    let mut prior = opening.clone();
    for (index, entry) in journal.iter().enumerate() {
        let outcome = reconcile_period(registry, &prior, &entry.period, config);
        if !outcome.is_acceptable(&config.policy) {
            return Err(ReplayError::Rejected {
                index,
                key: entry.period.key.clone(),
            });
        }
        if outcome.closing != entry.closing {
            return Err(ReplayError::Mismatch {
                index,
                key: entry.period.key.clone(),
                tank: first_difference(&outcome.closing, &entry.closing),
            });
        }
        prior = outcome.closing;
    }
    Ok(prior)
}

fn first_difference(a: &RobTable, b: &RobTable) -> Option<TankId> {
    let mut ids: Vec<&TankId> = a.tanks.keys().chain(b.tanks.keys()).collect();
    ids.sort();
    ids.dedup();
    ids.into_iter()
        .find(|id| a.tanks.get(*id) != b.tanks.get(*id))
        .cloned()
}
