//! vfl-ledger
//!
//! Reconciliation Ledger: per-tank ROB carried across report periods.
//! - `period`: report periods and movement events (consumption, bunkering,
//!   debunkering, transfer, survey correction)
//! - `engine`: one ledger run, prior closing + events -> new closing
//! - `issues`: structural / conservation / advisory issues and the policy
//!   that decides which block acceptance
//! - `replay`: fold over a period sequence; verify a stored journal
//!
//! Pure logic. No IO, no logging.

mod engine;
mod issues;
mod period;
mod replay;
mod table;

pub use engine::{reconcile_period, LedgerConfig, LedgerOutcome};
pub use issues::{
    ConservationKind, ConservationPolicy, Disposition, EventRef, IssueClass, LedgerIssue,
};
pub use period::{
    Allocation, BlobHandle, BunkeringEvent, ConsumptionEntry, DebunkeringEvent, LegKey,
    PeriodKey, ReportPeriod, SurveyCorrection, TransferEvent, TransferLeg,
};
pub use replay::{replay, verify_replay, AcceptedPeriod, ReplayError, ReplayStep};
pub use table::{PeriodTotals, RobTable, TankMovement, TankRob};
