//! Ledger command handlers: reconcile, validate and replay.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;
use vfl_audit::AuditWriter;
use vfl_config::{ConfigConsumer, VesselConfig};
use vfl_ledger::{reconcile_period, LedgerIssue, LedgerOutcome, ReportPeriod, RobTable};
use vfl_session::{Decision, MemoryStore, Session};
use vfl_validate::{validate_report, Finding, ValidationContext};

use super::{load_vessel_config, print_json, read_json};

fn validation_context(cfg: &VesselConfig) -> ValidationContext<'_> {
    ValidationContext {
        rules: &cfg.rules,
        reference: &cfg.reference,
        grades: cfg.registry.grades(),
        config: &cfg.policy.validator,
    }
}

fn read_prior(prior: Option<&str>) -> Result<Option<ReportPeriod>> {
    prior.map(read_json::<ReportPeriod>).transpose()
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReconcileReport<'a> {
    config_hash: &'a str,
    acceptable: bool,
    ledger: &'a LedgerOutcome,
    findings: &'a [Finding],
}

pub fn reconcile(
    config_paths: &[String],
    opening: &str,
    period: &str,
    prior: Option<&str>,
    strict_config: bool,
) -> Result<()> {
    let cfg = load_vessel_config(config_paths, ConfigConsumer::Session, strict_config)?;
    let opening: RobTable = read_json(opening)?;
    let period: ReportPeriod = read_json(period)?;
    let prior = read_prior(prior)?;

    let outcome = reconcile_period(&cfg.registry, &opening, &period, &cfg.policy.ledger);
    let findings = validate_report(&validation_context(&cfg), &period, prior.as_ref());
    let acceptable = outcome.is_acceptable(&cfg.policy.ledger.policy);

    info!(
        report_time = %period.report_time(),
        issues = outcome.issues.len(),
        findings = findings.len(),
        acceptable,
        "reconcile"
    );
    print_json(&ReconcileReport {
        config_hash: &cfg.config_hash,
        acceptable,
        ledger: &outcome,
        findings: &findings,
    })
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn validate(
    config_paths: &[String],
    period: &str,
    prior: Option<&str>,
    strict_config: bool,
) -> Result<()> {
    let cfg = load_vessel_config(config_paths, ConfigConsumer::Validator, strict_config)?;
    let period: ReportPeriod = read_json(period)?;
    let prior = read_prior(prior)?;

    let findings = validate_report(&validation_context(&cfg), &period, prior.as_ref());
    info!(findings = findings.len(), "validate");
    print_json(&findings)
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReplayLine {
    file: String,
    decision: Decision,
    closing: RobTable,
    blocking: Vec<LedgerIssue>,
    findings: usize,
}

#[derive(Serialize)]
struct ReplayReport {
    config_hash: String,
    steps: Vec<ReplayLine>,
    /// Closing table of the last accepted period.
    closing: RobTable,
}

pub fn replay(
    config_paths: &[String],
    opening: &str,
    audit: Option<&str>,
    period_paths: &[String],
    strict_config: bool,
) -> Result<()> {
    let cfg = load_vessel_config(config_paths, ConfigConsumer::Session, strict_config)?;
    let opening: RobTable = read_json(opening)?;
    let periods = period_paths
        .iter()
        .map(|p| read_json::<ReportPeriod>(p).map(|period| (p.clone(), period)))
        .collect::<Result<Vec<_>>>()?;

    let Some((_, first)) = periods.first() else {
        bail!("no periods to replay");
    };
    let leg = first.key.leg_key();
    let config_hash = cfg.config_hash.clone();

    let mut session = Session::new(cfg, leg, opening, MemoryStore::new());
    if let Some(path) = audit {
        let writer = AuditWriter::resume(path, true)
            .with_context(|| format!("open audit log {path}"))?;
        session = session.with_audit(writer);
    }

    let mut steps = Vec::with_capacity(periods.len());
    for (file, period) in periods {
        let outcome = session.submit(period)?;
        steps.push(ReplayLine {
            file,
            decision: outcome.decision,
            closing: outcome.ledger.closing,
            blocking: outcome.blocking,
            findings: outcome.findings.len(),
        });
    }

    let blocked = steps
        .iter()
        .filter(|s| s.decision == Decision::Blocked)
        .count();
    let total = steps.len();
    print_json(&ReplayReport {
        config_hash,
        steps,
        closing: session.prior_table().clone(),
    })?;

    if blocked > 0 {
        bail!("{blocked} of {total} periods blocked");
    }
    session.verify()?;
    Ok(())
}
