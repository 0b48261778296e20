//! vfl-session
//!
//! Single writer for one voyage leg.  A session holds the vessel
//! configuration, the leg's opening table and a [`PeriodStore`]; each
//! submission runs the ledger and the validator against the latest accepted
//! period and is journaled only when nothing blocks it.
//!
//! `submit` takes `&mut self`, so at most one ledger run per leg is in
//! flight.  A blocked or failed submission leaves the store untouched.

mod store;

pub use store::{MemoryStore, PeriodStore, StoreError};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use vfl_audit::{stream_id, AuditWriter};
use vfl_config::VesselConfig;
use vfl_ledger::{
    reconcile_period, verify_replay, AcceptedPeriod, LedgerIssue, LedgerOutcome, LegKey,
    ReportPeriod, RobTable,
};
use vfl_validate::{validate_report, Finding, ValidationContext};

/// Audit topic and event type for journaled periods.
pub const AUDIT_TOPIC: &str = "ledger";
pub const EVENT_PERIOD_ACCEPTED: &str = "PERIOD_ACCEPTED";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Journaled; becomes the prior of the next submission.
    Accepted,
    /// At least one blocking issue; nothing was journaled.
    Blocked,
    /// Computed on request without journaling.
    Draft,
}

/// Everything one submission produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub decision: Decision,
    pub ledger: LedgerOutcome,
    pub findings: Vec<Finding>,
    /// The subset of `ledger.issues` that prevents acceptance.
    pub blocking: Vec<LedgerIssue>,
    pub config_hash: String,
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.decision == Decision::Accepted
    }
}

pub struct Session<S: PeriodStore> {
    config: VesselConfig,
    leg: LegKey,
    opening: RobTable,
    store: S,
    audit: Option<AuditWriter>,
}

impl<S: PeriodStore> Session<S> {
    /// `opening` is the leg's starting table; it is the prior of the first
    /// period when the store holds nothing for `leg` yet.
    pub fn new(config: VesselConfig, leg: LegKey, opening: RobTable, store: S) -> Self {
        Self {
            config,
            leg,
            opening,
            store,
            audit: None,
        }
    }

    /// Write every accepted period to `writer` as well.
    pub fn with_audit(mut self, writer: AuditWriter) -> Self {
        self.audit = Some(writer);
        self
    }

    pub fn leg(&self) -> &LegKey {
        &self.leg
    }

    pub fn config(&self) -> &VesselConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> Option<&AuditWriter> {
        self.audit.as_ref()
    }

    /// Closing table of the latest accepted period, or the opening table.
    pub fn prior_table(&self) -> &RobTable {
        self.store
            .latest(&self.leg)
            .map(|a| &a.closing)
            .unwrap_or(&self.opening)
    }

    pub fn prior_period(&self) -> Option<&ReportPeriod> {
        self.store.latest(&self.leg).map(|a| &a.period)
    }

    /// Run ledger and validator without journaling.
    pub fn draft(&self, period: &ReportPeriod) -> Result<SubmissionOutcome> {
        self.check_leg(period)?;
        let (ledger, findings) = self.evaluate(period);
        let blocking = self.blocking_issues(&ledger);
        info!(
            leg = %self.leg,
            report_time = %period.report_time(),
            issues = ledger.issues.len(),
            blocking = blocking.len(),
            findings = findings.len(),
            "period/draft"
        );
        Ok(self.outcome(Decision::Draft, ledger, findings, blocking))
    }

    /// Run ledger and validator and journal the period if nothing blocks it.
    ///
    /// Errors are reserved for misuse (wrong leg) and I/O failures; a period
    /// that fails the policy returns `Ok` with [`Decision::Blocked`].
    pub fn submit(&mut self, period: ReportPeriod) -> Result<SubmissionOutcome> {
        self.check_leg(&period)?;
        let (ledger, findings) = self.evaluate(&period);
        let blocking = self.blocking_issues(&ledger);

        if !blocking.is_empty() {
            let codes: Vec<&str> = blocking.iter().map(LedgerIssue::code).collect();
            warn!(
                leg = %self.leg,
                report_time = %period.report_time(),
                blocking = ?codes,
                rejected_events = ledger.rejected.len(),
                "period/blocked"
            );
            return Ok(self.outcome(Decision::Blocked, ledger, findings, blocking));
        }

        let entry = AcceptedPeriod {
            period,
            closing: ledger.closing.clone(),
        };
        self.store
            .check_append(&entry)
            .with_context(|| format!("journal {}", self.leg))?;

        if let Some(audit) = self.audit.as_mut() {
            let payload = audit_payload(&entry, &ledger, &findings)?;
            audit
                .append(
                    stream_id(&self.leg.vessel, &self.leg.leg),
                    AUDIT_TOPIC,
                    EVENT_PERIOD_ACCEPTED,
                    &self.config.config_hash,
                    payload,
                )
                .context("write audit event")?;
        }

        let report_time = entry.period.report_time();
        self.store
            .append(entry)
            .with_context(|| format!("journal {}", self.leg))?;

        info!(
            leg = %self.leg,
            report_time = %report_time,
            total_rob = ledger.closing.total().tonnes(),
            issues = ledger.issues.len(),
            findings = findings.len(),
            "period/accepted"
        );
        Ok(self.outcome(Decision::Accepted, ledger, findings, blocking))
    }

    /// Recompute the leg's journal from the opening table and compare every
    /// stored closing table.  Returns the final table.
    pub fn verify(&self) -> Result<RobTable> {
        let journal = self.store.periods(&self.leg);
        verify_replay(
            &self.config.registry,
            &self.opening,
            journal,
            &self.config.policy.ledger,
        )
        .with_context(|| format!("verify journal {}", self.leg))
    }

    fn check_leg(&self, period: &ReportPeriod) -> Result<()> {
        let got = period.key.leg_key();
        if got != self.leg {
            bail!("period belongs to leg {got}, session is for {}", self.leg);
        }
        Ok(())
    }

    fn evaluate(&self, period: &ReportPeriod) -> (LedgerOutcome, Vec<Finding>) {
        let ledger = reconcile_period(
            &self.config.registry,
            self.prior_table(),
            period,
            &self.config.policy.ledger,
        );
        let ctx = ValidationContext {
            rules: &self.config.rules,
            reference: &self.config.reference,
            grades: self.config.registry.grades(),
            config: &self.config.policy.validator,
        };
        let findings = validate_report(&ctx, period, self.prior_period());
        (ledger, findings)
    }

    fn blocking_issues(&self, ledger: &LedgerOutcome) -> Vec<LedgerIssue> {
        ledger
            .blocking(&self.config.policy.ledger.policy)
            .into_iter()
            .cloned()
            .collect()
    }

    fn outcome(
        &self,
        decision: Decision,
        ledger: LedgerOutcome,
        findings: Vec<Finding>,
        blocking: Vec<LedgerIssue>,
    ) -> SubmissionOutcome {
        SubmissionOutcome {
            decision,
            ledger,
            findings,
            blocking,
            config_hash: self.config.config_hash.clone(),
        }
    }
}

fn audit_payload(
    entry: &AcceptedPeriod,
    ledger: &LedgerOutcome,
    findings: &[Finding],
) -> Result<serde_json::Value> {
    let closing = serde_json::to_value(&entry.closing).context("serialize closing table")?;
    let issues: Vec<&str> = ledger.issues.iter().map(LedgerIssue::code).collect();
    Ok(json!({
        "vessel": entry.period.key.vessel,
        "leg": entry.period.key.leg,
        "report_time": entry.period.report_time(),
        "report_type": entry.period.report_type,
        "total_rob": entry.closing.total().tonnes(),
        "closing": closing,
        "issues": issues,
        "findings": findings.len(),
    }))
}
