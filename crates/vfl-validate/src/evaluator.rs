use vfl_catalog::{Bound, GradeCatalog, ReferenceData, RuleCatalog, RuleKind, ValidationRule};
use vfl_ledger::ReportPeriod;

use crate::types::{Finding, ValidatorConfig};

/// Slack for float sums of hour fields (0.1 + 0.2 style error).
const SUM_EPSILON: f64 = 1e-9;

// ============================================================================
// Public API
// ============================================================================

/// Evaluate every applicable catalog rule against a period's raw fields.
///
/// `prior` is the previous accepted period on the same leg, when one exists;
/// interval rules are skipped without it.  Findings come back in catalog
/// order, then by field.
pub fn evaluate(
    rules: &RuleCatalog,
    reference: &ReferenceData,
    period: &ReportPeriod,
    prior: Option<&ReportPeriod>,
) -> Vec<Finding> {
    let mut keyed: Vec<(usize, Finding)> = Vec::new();
    for (order, rule) in rules.rules().iter().enumerate() {
        if !rule.applies(period.report_type) {
            continue;
        }
        let mut found = Vec::new();
        match &rule.kind {
            RuleKind::Range { min, max } => {
                check_range(rule, min.as_ref(), max.as_ref(), reference, period, &mut found)
            }
            RuleKind::Derived { formula, tolerance } => {
                if let Some(computed) = formula.evaluate(|name| period.field(name)) {
                    check_derived(rule, computed, *tolerance, period, &mut found);
                }
            }
            RuleKind::SumNotExceeding { parts } => check_sum(rule, parts, period, &mut found),
            RuleKind::PriorInterval {
                min_hours,
                max_hours,
            } => {
                if let Some(prior) = prior {
                    check_interval(rule, *min_hours, *max_hours, period, prior, &mut found);
                }
            }
        }
        keyed.extend(found.into_iter().map(|f| (order, f)));
    }
    // Stable: findings of one rule keep their emission order.
    keyed.sort_by(|(a, fa), (b, fb)| a.cmp(b).then_with(|| fa.field.cmp(&fb.field)));
    keyed.into_iter().map(|(_, f)| f).collect()
}

/// Compare each bunkering's BDN quality figures against the grade catalog.
///
/// Unknown grades are skipped here; the ledger reports them.  A declared
/// figure of zero means "not stated" and is not checked.
pub fn check_bunkerings(
    grades: &GradeCatalog,
    config: &ValidatorConfig,
    period: &ReportPeriod,
) -> Vec<Finding> {
    let mut out = Vec::new();
    if !config.check_bunkering_quality {
        return out;
    }
    for (i, ev) in period.bunkerings.iter().enumerate() {
        let Some(grade) = grades.get(&ev.grade) else {
            continue;
        };
        if ev.sulphur_pct > 0.0 && grade.sulphur_pct > 0.0 && ev.sulphur_pct > grade.sulphur_pct
        {
            out.push(
                Finding::warning(
                    "BDN_SULPHUR",
                    &format!("bunkerings[{i}].sulphur_pct"),
                    format!(
                        "{}: declared sulphur {}% exceeds {} limit {}%",
                        ev.bdn_number, ev.sulphur_pct, grade.name, grade.sulphur_pct
                    ),
                )
                .with_value(ev.sulphur_pct),
            );
        }
        if ev.density_kg_m3 > 0.0 && grade.density_kg_m3 > 0.0 {
            let deviation = (ev.density_kg_m3 - grade.density_kg_m3).abs() / grade.density_kg_m3;
            if deviation > config.density_tolerance {
                out.push(
                    Finding::warning(
                        "BDN_DENSITY",
                        &format!("bunkerings[{i}].density_kg_m3"),
                        format!(
                            "{}: declared density {} kg/m3 deviates {:.2}% from {} reference {} kg/m3",
                            ev.bdn_number,
                            ev.density_kg_m3,
                            deviation * 100.0,
                            grade.name,
                            grade.density_kg_m3
                        ),
                    )
                    .with_value(ev.density_kg_m3),
                );
            }
        }
        if ev.viscosity_cst > 0.0
            && grade.viscosity_cst > 0.0
            && ev.viscosity_cst > grade.viscosity_cst
        {
            out.push(
                Finding::warning(
                    "BDN_VISCOSITY",
                    &format!("bunkerings[{i}].viscosity_cst"),
                    format!(
                        "{}: declared viscosity {} cSt exceeds {} grade {} cSt",
                        ev.bdn_number, ev.viscosity_cst, grade.name, grade.viscosity_cst
                    ),
                )
                .with_value(ev.viscosity_cst),
            );
        }
    }
    out
}

// ============================================================================
// Rule kinds
// ============================================================================

fn check_range(
    rule: &ValidationRule,
    min: Option<&Bound>,
    max: Option<&Bound>,
    reference: &ReferenceData,
    period: &ReportPeriod,
    out: &mut Vec<Finding>,
) {
    let Some(value) = period.field(&rule.field) else {
        return;
    };
    if !value.is_finite() {
        out.push(Finding::warning(
            &rule.id,
            &rule.field,
            format!("{} is not a finite number", rule.field),
        ));
        return;
    }
    if let Some(bound) = min {
        match bound.resolve(reference) {
            Ok(lo) if value < lo => out.push(
                Finding::warning(
                    &rule.id,
                    &rule.field,
                    format!("{} {} < min {}", rule.field, value, lo),
                )
                .with_value(value),
            ),
            Ok(_) => {}
            Err(key) => out.push(missing_reference(rule, key)),
        }
    }
    if let Some(bound) = max {
        match bound.resolve(reference) {
            Ok(hi) if value > hi => out.push(
                Finding::warning(
                    &rule.id,
                    &rule.field,
                    format!("{} {} > max {}", rule.field, value, hi),
                )
                .with_value(value),
            ),
            Ok(_) => {}
            Err(key) => out.push(missing_reference(rule, key)),
        }
    }
}

fn missing_reference(rule: &ValidationRule, key: &str) -> Finding {
    Finding::info(
        &rule.id,
        &rule.field,
        format!("reference value '{key}' is not configured; bound not checked"),
    )
}

fn check_derived(
    rule: &ValidationRule,
    computed: f64,
    tolerance: f64,
    period: &ReportPeriod,
    out: &mut Vec<Finding>,
) {
    match period.field(&rule.field) {
        None => out.push(
            Finding::info(
                &rule.id,
                &rule.field,
                format!("{} computed as {:.2}", rule.field, computed),
            )
            .with_value(computed),
        ),
        Some(submitted) if (submitted - computed).abs() <= tolerance.abs() => {}
        Some(submitted) => out.push(
            Finding::warning(
                &rule.id,
                &rule.field,
                format!(
                    "{} submitted {} but computes to {:.2} (tolerance {})",
                    rule.field, submitted, computed, tolerance
                ),
            )
            .with_value(computed),
        ),
    }
}

fn check_sum(rule: &ValidationRule, parts: &[String], period: &ReportPeriod, out: &mut Vec<Finding>) {
    let Some(limit) = period.field(&rule.field) else {
        return;
    };
    let total: f64 = parts.iter().filter_map(|p| period.field(p)).sum();
    if total > limit + SUM_EPSILON {
        out.push(
            Finding::warning(
                &rule.id,
                &rule.field,
                format!(
                    "{} ({}) exceeds {} {}",
                    parts.join(" + "),
                    total,
                    rule.field,
                    limit
                ),
            )
            .with_value(total),
        );
    }
}

fn check_interval(
    rule: &ValidationRule,
    min_hours: Option<f64>,
    max_hours: f64,
    period: &ReportPeriod,
    prior: &ReportPeriod,
    out: &mut Vec<Finding>,
) {
    let elapsed = period.report_time() - prior.report_time();
    let hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
    if let Some(lo) = min_hours {
        if hours < lo {
            out.push(
                Finding::warning(
                    &rule.id,
                    &rule.field,
                    format!("{hours:.2} h since previous report is below {lo} h"),
                )
                .with_value(hours),
            );
            return;
        }
    }
    if hours > max_hours {
        out.push(
            Finding::warning(
                &rule.id,
                &rule.field,
                format!("{hours:.2} h since previous report exceeds {max_hours} h"),
            )
            .with_value(hours),
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use chrono::{Duration, TimeZone, Utc};
    use vfl_catalog::{DerivedFormula, ReportType};
    use vfl_ledger::PeriodKey;

    fn noon() -> ReportPeriod {
        let key = PeriodKey::new("V", "L", Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap());
        ReportPeriod::new(key, ReportType::Noon)
    }

    fn reference() -> ReferenceData {
        [("mcr_rpm".to_string(), 100.0)].into_iter().collect()
    }

    #[test]
    fn absent_range_field_yields_nothing() {
        let out = evaluate(&RuleCatalog::standard(), &reference(), &noon(), None);
        assert!(out.is_empty(), "{out:?}");
    }

    #[test]
    fn reference_bound_scales_and_missing_reference_is_info() {
        let p = noon().with_field("me_rpm", 106.0).with_field("tc_rpm", 9000.0);
        let out = evaluate(&RuleCatalog::standard(), &reference(), &p, None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rule_id, "ME_RPM_RANGE");
        assert_eq!(out[0].severity, Severity::Warning);
        assert_eq!(out[1].rule_id, "TC_RPM_RANGE");
        assert_eq!(out[1].severity, Severity::Info);
        assert!(out[1].message.contains("shop_test_tc_rpm"));
    }

    #[test]
    fn non_finite_value_is_warning() {
        let p = noon().with_field("wind_force_bft", f64::NAN);
        let out = evaluate(&RuleCatalog::standard(), &reference(), &p, None);
        assert_eq!(out.len(), 1);
        assert!(out[0].message.contains("not a finite"));
    }

    #[test]
    fn derived_without_submission_is_info_with_value() {
        let p = noon()
            .with_field("me_consumption_mt", 30.0)
            .with_field("me_power_kw", 7500.0)
            .with_field("me_run_hours", 24.0);
        let out = evaluate(&RuleCatalog::standard(), &reference(), &p, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule_id, "ME_SFOC_DERIVED");
        assert_eq!(out[0].severity, Severity::Info);
        let v = out[0].value.unwrap();
        assert!((v - 166.666_666).abs() < 1e-3);
    }

    #[test]
    fn zero_denominator_skips_derived_rule() {
        let p = noon()
            .with_field("observed_distance_nm", 200.0)
            .with_field("steaming_hours", 0.0);
        let out = evaluate(&RuleCatalog::standard(), &reference(), &p, None);
        assert!(out.iter().all(|f| f.rule_id != "SPEED_DERIVED"));
    }

    #[test]
    fn sum_parts_default_to_zero_and_limit_required() {
        let over = noon()
            .with_field("elapsed_hours", 4.0)
            .with_field("maneuvering_hours", 3.0)
            .with_field("drifting_hours", 1.5);
        let out = evaluate(&RuleCatalog::standard(), &reference(), &over, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule_id, "PORT_HOURS_WITHIN_ELAPSED");

        let exact = noon()
            .with_field("elapsed_hours", 0.3)
            .with_field("maneuvering_hours", 0.1)
            .with_field("anchorage_hours", 0.2);
        assert!(evaluate(&RuleCatalog::standard(), &reference(), &exact, None).is_empty());

        let no_limit = noon().with_field("maneuvering_hours", 99.0);
        assert!(evaluate(&RuleCatalog::standard(), &reference(), &no_limit, None).is_empty());
    }

    #[test]
    fn interval_needs_prior_and_checks_bounds() {
        let mut prior = noon();
        prior.key.report_time = prior.key.report_time - Duration::hours(26);
        let p = noon();
        assert!(evaluate(&RuleCatalog::standard(), &reference(), &p, None).is_empty());
        let out = evaluate(&RuleCatalog::standard(), &reference(), &p, Some(&prior));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule_id, "EVENT_INTERVAL");
        assert_eq!(out[0].value, Some(26.0));

        prior.key.report_time = p.key.report_time + Duration::hours(1);
        let out = evaluate(&RuleCatalog::standard(), &reference(), &p, Some(&prior));
        assert!(out[0].message.contains("below"));
    }

    #[test]
    fn scoped_rules_skip_other_report_types() {
        let mut p = noon()
            .with_field("slip_pct", 55.0)
            .with_field("engine_distance_nm", 100.0)
            .with_field("observed_distance_nm", 90.0);
        p.report_type = ReportType::Bunkering;
        assert!(evaluate(&RuleCatalog::standard(), &reference(), &p, None).is_empty());
    }

    #[test]
    fn findings_follow_catalog_order() {
        let rules = RuleCatalog::new(vec![
            ValidationRule::new(
                "Z_FIRST",
                "z",
                RuleKind::Range {
                    min: None,
                    max: Some(Bound::Value(1.0)),
                },
            ),
            ValidationRule::new(
                "A_SECOND",
                "a",
                RuleKind::Derived {
                    formula: DerivedFormula::Sum {
                        terms: vec!["z".into()],
                    },
                    tolerance: 0.0,
                },
            ),
        ])
        .unwrap();
        let p = noon().with_field("z", 2.0).with_field("a", 3.0);
        let ids: Vec<String> = evaluate(&rules, &ReferenceData::new(), &p, None)
            .into_iter()
            .map(|f| f.rule_id)
            .collect();
        assert_eq!(ids, vec!["Z_FIRST", "A_SECOND"]);
    }

    fn vlsfo_delivery(viscosity_cst: f64) -> ReportPeriod {
        let mut p = noon();
        p.report_type = ReportType::Bunkering;
        p.bunkerings.push(vfl_ledger::BunkeringEvent {
            bdn_number: "BDN-3".to_string(),
            delivered_at: p.report_time(),
            grade: "VLSFO".to_string(),
            mass: vfl_catalog::Mt::whole(300),
            density_kg_m3: 960.0,
            viscosity_cst,
            sulphur_pct: 0.5,
            allocations: vec![vfl_ledger::Allocation::new("VLSFO_1", vfl_catalog::Mt::whole(300))],
            attachment: None,
        });
        p
    }

    #[test]
    fn viscosity_above_grade_warns() {
        let grades = GradeCatalog::standard();
        let config = ValidatorConfig::default();

        let out = check_bunkerings(&grades, &config, &vlsfo_delivery(380.0));
        assert_eq!(out.len(), 1, "{out:?}");
        assert_eq!(out[0].rule_id, "BDN_VISCOSITY");
        assert_eq!(out[0].field, "bunkerings[0].viscosity_cst");
        assert_eq!(out[0].severity, Severity::Warning);
        assert_eq!(out[0].value, Some(380.0));

        assert!(check_bunkerings(&grades, &config, &vlsfo_delivery(180.0)).is_empty());
        // Zero means the BDN did not state it.
        assert!(check_bunkerings(&grades, &config, &vlsfo_delivery(0.0)).is_empty());
    }
}
