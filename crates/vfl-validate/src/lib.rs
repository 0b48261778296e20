//! vfl-validate
//!
//! Validation Rule Evaluator: range, derived-value, cross-field and
//! prior-interval checks over a report's raw fields, plus BDN quality checks
//! against the grade catalog.
//!
//! Findings are advisory.  The validator never blocks ledger computation or
//! acceptance; it only reports.
//!
//! Pure logic. No IO.

mod evaluator;
mod types;

pub use evaluator::{check_bunkerings, evaluate};
pub use types::{Finding, Severity, ValidatorConfig};

use vfl_catalog::{GradeCatalog, ReferenceData, RuleCatalog};
use vfl_ledger::ReportPeriod;

/// Reference data a full validation pass reads.
#[derive(Clone, Copy, Debug)]
pub struct ValidationContext<'a> {
    pub rules: &'a RuleCatalog,
    pub reference: &'a ReferenceData,
    pub grades: &'a GradeCatalog,
    pub config: &'a ValidatorConfig,
}

/// Catalog rules first (catalog order, then field), then bunkering quality
/// findings in event order.
pub fn validate_report(
    ctx: &ValidationContext<'_>,
    period: &ReportPeriod,
    prior: Option<&ReportPeriod>,
) -> Vec<Finding> {
    let mut out = evaluate(ctx.rules, ctx.reference, period, prior);
    out.extend(check_bunkerings(ctx.grades, ctx.config, period));
    out
}
