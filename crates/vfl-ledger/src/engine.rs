//! Reconciliation engine: previous closing ROB + one period's movements ->
//! new closing ROB, movement breakdown and sorted issues.
//!
//! # Rules
//! - Every event is checked as a unit before it touches any tank.  An event
//!   with a structural issue is rejected in full and excluded from the table.
//! - Movements apply in a fixed order: consumption, bunkering, debunkering,
//!   transfer, survey correction.
//! - Sub-consumer entries are sub-allocations of their parent.  Per tank, a
//!   consumer's effective draw is the larger of its own entries and the sum
//!   of its children's effective draws; each root's effective draw is
//!   deducted.  A complete hierarchy is therefore not double counted, and
//!   draws reported only on sub-consumers still leave the tank.
//! - Closing values are recorded as computed, even when they violate
//!   `0 <= ROB <= capacity`.  Nothing is clamped.
//!
//! # Determinism
//! Pure function of (registry, prior table, period, config).  No IO, no
//! clock, no randomness; tanks are iterated in `TankId` order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vfl_catalog::Mt;
use vfl_registry::{ConsumerId, TankId, VesselRegistry};

use crate::issues::{ConservationPolicy, EventRef, IssueClass, LedgerIssue};
use crate::period::{
    Allocation, BunkeringEvent, ConsumptionEntry, DebunkeringEvent, PeriodKey, ReportPeriod,
    SurveyCorrection, TransferEvent,
};
use crate::table::{PeriodTotals, RobTable, TankMovement, TankRob};

// ---------------------------------------------------------------------------
// Config / outcome
// ---------------------------------------------------------------------------

/// Ledger tolerances and conservation policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Allowed |allocated - declared| for bunkering / debunkering, and
    /// allowed |net| for transfers.
    pub allocation_tolerance: Mt,
    /// Allowed |declared opening - prior closing| per tank.
    pub continuity_tolerance: Mt,
    pub policy: ConservationPolicy,
}

/// Result of one ledger run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    pub key: PeriodKey,
    /// Closing ROB per tank, stamped with the period's report time.
    pub closing: RobTable,
    /// Per-tank breakdown in `TankId` order.
    pub movements: Vec<TankMovement>,
    pub totals: PeriodTotals,
    /// Sorted; see [`LedgerIssue`] for the order.
    pub issues: Vec<LedgerIssue>,
    /// Events excluded from the table, sorted and de-duplicated.
    pub rejected: Vec<EventRef>,
}

impl LedgerOutcome {
    pub fn has_structural(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.class() == IssueClass::Structural)
    }

    /// Issues that prevent acceptance under `policy`.
    pub fn blocking<'a>(&'a self, policy: &ConservationPolicy) -> Vec<&'a LedgerIssue> {
        self.issues.iter().filter(|i| i.blocks(policy)).collect()
    }

    pub fn is_acceptable(&self, policy: &ConservationPolicy) -> bool {
        !self.issues.iter().any(|i| i.blocks(policy))
    }

    pub fn movement(&self, tank: &str) -> Option<&TankMovement> {
        self.movements.iter().find(|m| m.tank.as_str() == tank)
    }
}

// ---------------------------------------------------------------------------
// Working book
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Row {
    grade: String,
    opening: Mt,
    consumed: Mt,
    bunkered: Mt,
    debunkered: Mt,
    transferred: Mt,
    corrected: Mt,
}

impl Row {
    fn opened(opening: Mt, grade: String) -> Self {
        Self {
            grade,
            opening,
            consumed: Mt::ZERO,
            bunkered: Mt::ZERO,
            debunkered: Mt::ZERO,
            transferred: Mt::ZERO,
            corrected: Mt::ZERO,
        }
    }

    /// Running ROB, in algorithm order.
    fn current(&self) -> Mt {
        self.opening - self.consumed + self.bunkered - self.debunkered
            + self.transferred
            + self.corrected
    }
}

/// Every registered tank plus any prior row the registry no longer knows
/// (carried forward untouched).
struct Book {
    rows: BTreeMap<TankId, Row>,
}

impl Book {
    fn open(registry: &VesselRegistry, prior: &RobTable) -> Self {
        let mut rows = BTreeMap::new();
        for t in registry.tanks() {
            let row = match prior.tanks.get(&t.id) {
                Some(r) => Row::opened(r.rob, r.grade.clone()),
                None => Row::opened(Mt::ZERO, t.grade.clone()),
            };
            rows.insert(t.id.clone(), row);
        }
        for (id, r) in &prior.tanks {
            rows.entry(id.clone())
                .or_insert_with(|| Row::opened(r.rob, r.grade.clone()));
        }
        Self { rows }
    }

    // Callers only pass tank ids that passed the registry check, and every
    // registered tank has a row.
    fn row_mut(&mut self, tank: &TankId) -> Option<&mut Row> {
        self.rows.get_mut(tank)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Reconcile one period against the prior accepted closing table.
///
/// `prior.as_of` is the last accepted report time on this leg (`None` for
/// the first period); it drives the `OutOfOrder` check.
pub fn reconcile_period(
    registry: &VesselRegistry,
    prior: &RobTable,
    period: &ReportPeriod,
    config: &LedgerConfig,
) -> LedgerOutcome {
    let mut issues = Vec::new();

    check_order(prior, period, &mut issues);
    check_continuity(registry, prior, period, config, &mut issues);

    let mut book = Book::open(registry, prior);
    let tolerance = config.allocation_tolerance.abs();

    // 2. consumption
    let mut draws: BTreeMap<ConsumerId, Mt> = BTreeMap::new();
    let mut tank_draws: BTreeMap<TankId, BTreeMap<ConsumerId, Mt>> = BTreeMap::new();
    for (index, entry) in period.consumption.iter().enumerate() {
        let event = EventRef::Consumption { index };
        match check_consumption(registry, &book, entry, &event) {
            Ok(tank) => {
                *draws.entry(entry.consumer.clone()).or_default() += entry.quantity;
                *tank_draws
                    .entry(tank)
                    .or_default()
                    .entry(entry.consumer.clone())
                    .or_default() += entry.quantity;
            }
            Err(mut found) => issues.append(&mut found),
        }
    }
    let mut consumed = Mt::ZERO;
    for (tank, own) in &tank_draws {
        let deducted: Mt = registry
            .consumers()
            .iter()
            .filter(|c| c.parent.is_none())
            .map(|root| effective_draw(registry, own, &root.id))
            .sum();
        if let Some(row) = book.row_mut(tank) {
            row.consumed += deducted;
            consumed += deducted;
        }
    }

    // 3. bunkering
    let mut bunkered = Mt::ZERO;
    for (index, ev) in period.bunkerings.iter().enumerate() {
        let event = EventRef::Bunkering {
            index,
            bdn_number: ev.bdn_number.clone(),
        };
        let found = check_bunkering(registry, ev, &event, tolerance);
        if !found.is_empty() {
            issues.extend(found);
            continue;
        }
        for a in &ev.allocations {
            let Some(row) = book.row_mut(&a.tank) else {
                continue;
            };
            if a.quantity.is_positive() && row.grade != ev.grade {
                if row.current().is_positive() {
                    issues.push(LedgerIssue::GradeCommingled {
                        event: event.clone(),
                        tank: a.tank.clone(),
                        held: row.grade.clone(),
                        delivered: ev.grade.clone(),
                    });
                }
                row.grade = ev.grade.clone();
            }
            row.bunkered += a.quantity;
            bunkered += a.quantity;
        }
    }

    // 4. debunkering
    let mut debunkered = Mt::ZERO;
    for (index, ev) in period.debunkerings.iter().enumerate() {
        let event = EventRef::Debunkering { index };
        let found = check_debunkering(registry, ev, &event, tolerance);
        if !found.is_empty() {
            issues.extend(found);
            continue;
        }
        for a in &ev.allocations {
            if let Some(row) = book.row_mut(&a.tank) {
                row.debunkered += a.quantity;
                debunkered += a.quantity;
            }
        }
    }

    // 5. transfers
    for (index, ev) in period.transfers.iter().enumerate() {
        let event = EventRef::Transfer { index };
        let found = check_transfer(registry, ev, &event, tolerance);
        if !found.is_empty() {
            issues.extend(found);
            continue;
        }
        for leg in &ev.legs {
            if let Some(row) = book.row_mut(&leg.tank) {
                row.transferred += leg.quantity;
            }
        }
    }

    // 6. survey corrections, at most one per tank
    let mut corrected_tanks: BTreeSet<TankId> = BTreeSet::new();
    let mut corrected = Mt::ZERO;
    for (index, c) in period.corrections.iter().enumerate() {
        let event = EventRef::Correction { index };
        if let Err(issue) = check_correction(registry, &corrected_tanks, c, &event) {
            issues.push(issue);
            continue;
        }
        corrected_tanks.insert(c.tank.clone());
        if let Some(row) = book.row_mut(&c.tank) {
            row.corrected += c.delta;
            corrected += c.delta;
        }
    }

    // 7. store closing; conservation checks
    let mut closing = RobTable {
        as_of: Some(period.report_time()),
        tanks: BTreeMap::new(),
    };
    let mut movements = Vec::with_capacity(book.rows.len());
    for (tank, row) in book.rows {
        let value = row.current();
        let capacity = registry.capacity_mt(tank.as_str(), &row.grade);
        if value.is_negative() {
            issues.push(LedgerIssue::NegativeRob {
                tank: tank.clone(),
                closing: value,
            });
        }
        if let Some(cap) = capacity {
            if value > cap {
                issues.push(LedgerIssue::CapacityExceeded {
                    tank: tank.clone(),
                    closing: value,
                    capacity: cap,
                });
            }
        }
        movements.push(TankMovement {
            tank: tank.clone(),
            grade: row.grade.clone(),
            opening: row.opening,
            consumed: row.consumed,
            bunkered: row.bunkered,
            debunkered: row.debunkered,
            transferred: row.transferred,
            corrected: row.corrected,
            closing: value,
            capacity,
        });
        closing.tanks.insert(
            tank,
            TankRob {
                rob: value,
                grade: row.grade,
                capacity,
            },
        );
    }

    check_sub_consumers(registry, &draws, tolerance, &mut issues);

    issues.sort();
    issues.dedup();
    let mut rejected: Vec<EventRef> = issues
        .iter()
        .filter_map(|i| i.rejected_event().cloned())
        .collect();
    rejected.sort();
    rejected.dedup();

    LedgerOutcome {
        key: period.key.clone(),
        closing,
        movements,
        totals: PeriodTotals {
            consumed,
            bunkered,
            debunkered,
            corrected,
        },
        issues,
        rejected,
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_order(prior: &RobTable, period: &ReportPeriod, issues: &mut Vec<LedgerIssue>) {
    if let Some(last) = prior.as_of {
        if period.report_time() <= last {
            issues.push(LedgerIssue::OutOfOrder {
                last_accepted: last,
                submitted: period.report_time(),
            });
        }
    }
}

fn check_continuity(
    registry: &VesselRegistry,
    prior: &RobTable,
    period: &ReportPeriod,
    config: &LedgerConfig,
    issues: &mut Vec<LedgerIssue>,
) {
    let tolerance = config.continuity_tolerance.abs();
    for (tank, declared) in &period.opening {
        if registry.tank(tank.as_str()).is_none() {
            issues.push(LedgerIssue::UnknownTank {
                event: EventRef::Opening,
                tank: tank.clone(),
            });
            continue;
        }
        let expected = prior.rob(tank.as_str());
        if !declared.within(expected, tolerance) {
            issues.push(LedgerIssue::Discontinuity {
                tank: tank.clone(),
                declared: *declared,
                expected,
            });
        }
    }
}

/// Resolve a consumption entry to its source tank, or report why not.
fn check_consumption(
    registry: &VesselRegistry,
    book: &Book,
    entry: &ConsumptionEntry,
    event: &EventRef,
) -> Result<TankId, Vec<LedgerIssue>> {
    let mut found = Vec::new();
    if registry.consumer(entry.consumer.as_str()).is_none() {
        found.push(LedgerIssue::UnknownConsumer {
            event: event.clone(),
            consumer: entry.consumer.clone(),
        });
    }
    if entry.quantity.is_negative() {
        found.push(LedgerIssue::InvalidQuantity {
            event: event.clone(),
            quantity: entry.quantity,
        });
    }
    let source = match (&entry.tank, &entry.grade) {
        (Some(tank), _) => {
            if registry.tank(tank.as_str()).is_some() {
                Some(tank.clone())
            } else {
                found.push(LedgerIssue::UnknownTank {
                    event: event.clone(),
                    tank: tank.clone(),
                });
                None
            }
        }
        (None, Some(grade)) => {
            if registry.grade(grade).is_none() {
                found.push(LedgerIssue::UnknownGrade {
                    event: event.clone(),
                    grade: grade.clone(),
                });
                None
            } else {
                let candidates: Vec<&TankId> = book
                    .rows
                    .iter()
                    .filter(|(id, row)| {
                        row.grade == *grade && registry.tank(id.as_str()).is_some()
                    })
                    .map(|(id, _)| id)
                    .collect();
                if candidates.len() == 1 {
                    Some(candidates[0].clone())
                } else {
                    found.push(LedgerIssue::UnresolvedSource {
                        event: event.clone(),
                        grade: Some(grade.clone()),
                        candidates: candidates.len(),
                    });
                    None
                }
            }
        }
        (None, None) => {
            found.push(LedgerIssue::UnresolvedSource {
                event: event.clone(),
                grade: None,
                candidates: 0,
            });
            None
        }
    };
    match source {
        Some(tank) if found.is_empty() => Ok(tank),
        _ => Err(found),
    }
}

/// Shared allocation checks: known tanks, non-negative shares, non-empty set.
fn check_allocations(
    registry: &VesselRegistry,
    allocations: &[Allocation],
    event: &EventRef,
    found: &mut Vec<LedgerIssue>,
) -> Mt {
    if allocations.is_empty() {
        found.push(LedgerIssue::InvalidQuantity {
            event: event.clone(),
            quantity: Mt::ZERO,
        });
    }
    let mut allocated = Mt::ZERO;
    for a in allocations {
        if registry.tank(a.tank.as_str()).is_none() {
            found.push(LedgerIssue::UnknownTank {
                event: event.clone(),
                tank: a.tank.clone(),
            });
        }
        if a.quantity.is_negative() {
            found.push(LedgerIssue::InvalidQuantity {
                event: event.clone(),
                quantity: a.quantity,
            });
        }
        allocated += a.quantity;
    }
    allocated
}

fn check_bunkering(
    registry: &VesselRegistry,
    ev: &BunkeringEvent,
    event: &EventRef,
    tolerance: Mt,
) -> Vec<LedgerIssue> {
    let mut found = Vec::new();
    if registry.grade(&ev.grade).is_none() {
        found.push(LedgerIssue::UnknownGrade {
            event: event.clone(),
            grade: ev.grade.clone(),
        });
    }
    if !ev.mass.is_positive() {
        found.push(LedgerIssue::InvalidQuantity {
            event: event.clone(),
            quantity: ev.mass,
        });
    }
    let allocated = check_allocations(registry, &ev.allocations, event, &mut found);
    if !ev.allocations.is_empty() && !allocated.within(ev.mass, tolerance) {
        found.push(LedgerIssue::UnbalancedBunkering {
            event: event.clone(),
            declared: ev.mass,
            allocated,
        });
    }
    found
}

fn check_debunkering(
    registry: &VesselRegistry,
    ev: &DebunkeringEvent,
    event: &EventRef,
    tolerance: Mt,
) -> Vec<LedgerIssue> {
    let mut found = Vec::new();
    if !ev.quantity.is_positive() {
        found.push(LedgerIssue::InvalidQuantity {
            event: event.clone(),
            quantity: ev.quantity,
        });
    }
    let allocated = check_allocations(registry, &ev.allocations, event, &mut found);
    if !ev.allocations.is_empty() && !allocated.within(ev.quantity, tolerance) {
        found.push(LedgerIssue::UnbalancedDebunkering {
            event: event.clone(),
            declared: ev.quantity,
            allocated,
        });
    }
    found
}

fn check_transfer(
    registry: &VesselRegistry,
    ev: &TransferEvent,
    event: &EventRef,
    tolerance: Mt,
) -> Vec<LedgerIssue> {
    let mut found = Vec::new();
    let mut net = Mt::ZERO;
    for leg in &ev.legs {
        if registry.tank(leg.tank.as_str()).is_none() {
            found.push(LedgerIssue::UnknownTank {
                event: event.clone(),
                tank: leg.tank.clone(),
            });
        }
        net += leg.quantity;
    }
    if !net.within(Mt::ZERO, tolerance) {
        found.push(LedgerIssue::UnbalancedTransfer {
            event: event.clone(),
            net,
        });
    }
    found
}

fn check_correction(
    registry: &VesselRegistry,
    seen: &BTreeSet<TankId>,
    c: &SurveyCorrection,
    event: &EventRef,
) -> Result<(), LedgerIssue> {
    if registry.tank(c.tank.as_str()).is_none() {
        return Err(LedgerIssue::UnknownTank {
            event: event.clone(),
            tank: c.tank.clone(),
        });
    }
    if seen.contains(&c.tank) {
        return Err(LedgerIssue::DuplicateCorrection {
            event: event.clone(),
            tank: c.tank.clone(),
        });
    }
    Ok(())
}

/// Draw of `consumer` on one tank: its own entries or, when larger, the
/// effective draws of its children.
fn effective_draw(
    registry: &VesselRegistry,
    own: &BTreeMap<ConsumerId, Mt>,
    consumer: &ConsumerId,
) -> Mt {
    let direct = own.get(consumer).copied().unwrap_or(Mt::ZERO);
    let children: Mt = registry
        .children(consumer.as_str())
        .into_iter()
        .map(|c| effective_draw(registry, own, &c.id))
        .sum();
    direct.max(children)
}

/// Advisory: a parent's own draw must cover its direct children's draws.
fn check_sub_consumers(
    registry: &VesselRegistry,
    draws: &BTreeMap<ConsumerId, Mt>,
    tolerance: Mt,
    issues: &mut Vec<LedgerIssue>,
) {
    for consumer in registry.consumers() {
        let children = registry.children(consumer.id.as_str());
        if children.is_empty() {
            continue;
        }
        let sub_total: Mt = children
            .iter()
            .filter_map(|c| draws.get(&c.id))
            .sum();
        if sub_total.is_zero() {
            continue;
        }
        let draw = draws.get(&consumer.id).copied().unwrap_or(Mt::ZERO);
        if draw + tolerance < sub_total {
            issues.push(LedgerIssue::SubConsumerOverdraw {
                consumer: consumer.id.clone(),
                draw,
                sub_total,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::TransferLeg;
    use chrono::{TimeZone, Utc};
    use vfl_catalog::{Capacity, GradeCatalog, ReportType};

    fn t(tonnes: f64) -> Mt {
        Mt::from_tonnes(tonnes).unwrap()
    }

    fn registry() -> VesselRegistry {
        let mut reg = VesselRegistry::new(GradeCatalog::standard());
        reg.register_tank("A", Capacity::Mass(Mt::whole(1000)), "HFO")
            .unwrap();
        reg.register_tank("B", Capacity::Mass(Mt::whole(1000)), "HFO")
            .unwrap();
        reg.register_tank("M", Capacity::Mass(Mt::whole(100)), "MGO")
            .unwrap();
        let boiler = reg.register_consumer("BOILER", None).unwrap();
        reg.register_consumer("ME", None).unwrap();
        reg.register_consumer("BOILER.HEAT", Some(boiler)).unwrap();
        reg
    }

    fn prior() -> RobTable {
        RobTable::new()
            .with("A", Mt::whole(500), "HFO")
            .with("B", Mt::whole(200), "HFO")
            .with("M", Mt::whole(40), "MGO")
    }

    fn period() -> ReportPeriod {
        let key = PeriodKey::new("V1", "L1", Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        ReportPeriod::new(key, ReportType::Noon)
    }

    #[test]
    fn complete_hierarchy_is_deducted_once() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("BOILER", "A", Mt::whole(5)));
        p.consumption.push(ConsumptionEntry::from_tank("BOILER.HEAT", "A", Mt::whole(3)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("A"), Mt::whole(495));
        assert_eq!(out.totals.consumed, Mt::whole(5));
        assert!(out.issues.is_empty(), "{:?}", out.issues);
    }

    #[test]
    fn sub_consumer_overdraw_is_advisory() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("BOILER", "A", Mt::whole(2)));
        p.consumption.push(ConsumptionEntry::from_tank("BOILER.HEAT", "A", Mt::whole(3)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert!(matches!(
            out.issues.as_slice(),
            [LedgerIssue::SubConsumerOverdraw { draw, sub_total, .. }]
                if *draw == Mt::whole(2) && *sub_total == Mt::whole(3)
        ));
        assert!(out.is_acceptable(&ConservationPolicy::strict()));
        // The larger side is what left the tank.
        assert_eq!(out.closing.rob("A"), Mt::whole(497));
    }

    #[test]
    fn sub_consumer_only_entry_is_deducted() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("BOILER.HEAT", "A", Mt::whole(7)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("A"), Mt::whole(493));
        assert_eq!(out.totals.consumed, Mt::whole(7));
        assert_eq!(out.movement("A").unwrap().consumed, Mt::whole(7));
        assert_eq!(out.issues[0].code(), "SUB_CONSUMER_OVERDRAW");
    }

    #[test]
    fn hierarchy_draws_are_netted_per_tank() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("BOILER", "A", Mt::whole(4)));
        p.consumption.push(ConsumptionEntry::from_tank("BOILER.HEAT", "B", Mt::whole(3)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("A"), Mt::whole(496));
        assert_eq!(out.closing.rob("B"), Mt::whole(197));
        assert_eq!(out.totals.consumed, Mt::whole(7));
        // Over the whole period the root covers its child.
        assert!(out.issues.is_empty(), "{:?}", out.issues);
    }

    #[test]
    fn grandchild_draws_roll_up_through_parent() {
        let mut reg = registry();
        reg.register_consumer("BOILER.HEAT.AFT", Some(ConsumerId::new("BOILER.HEAT")))
            .unwrap();
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("BOILER.HEAT", "A", Mt::whole(2)));
        p.consumption
            .push(ConsumptionEntry::from_tank("BOILER.HEAT.AFT", "A", Mt::whole(6)));
        let out = reconcile_period(&reg, &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("A"), Mt::whole(494));
        assert_eq!(out.totals.consumed, Mt::whole(6));
    }

    #[test]
    fn grade_only_entry_resolves_to_single_tank() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_grade("ME", "MGO", Mt::whole(4)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("M"), Mt::whole(36));
        assert!(out.issues.is_empty());
    }

    #[test]
    fn grade_only_entry_with_two_candidates_rejected() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_grade("ME", "HFO", Mt::whole(4)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.total(), prior().total());
        assert_eq!(out.rejected, vec![EventRef::Consumption { index: 0 }]);
        assert!(matches!(
            out.issues[0],
            LedgerIssue::UnresolvedSource { candidates: 2, .. }
        ));
    }

    #[test]
    fn unknown_consumer_and_negative_quantity_both_reported() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("GHOST", "A", Mt::whole(-1)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        let codes: Vec<&str> = out.issues.iter().map(|i| i.code()).collect();
        assert_eq!(codes, vec!["UNKNOWN_CONSUMER", "INVALID_QUANTITY"]);
        assert_eq!(out.closing.rob("A"), Mt::whole(500));
    }

    #[test]
    fn second_correction_on_same_tank_rejected_first_applied() {
        let mut p = period();
        for delta in [1, 2] {
            p.corrections.push(SurveyCorrection {
                tank: TankId::new("B"),
                delta: Mt::whole(delta),
                comment: String::new(),
            });
        }
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("B"), Mt::whole(201));
        assert_eq!(
            out.issues,
            vec![LedgerIssue::DuplicateCorrection {
                event: EventRef::Correction { index: 1 },
                tank: TankId::new("B"),
            }]
        );
    }

    #[test]
    fn bunkering_into_holding_tank_of_other_grade_is_commingled() {
        let mut p = period();
        p.bunkerings.push(BunkeringEvent {
            bdn_number: "BDN-7".to_string(),
            delivered_at: p.report_time(),
            grade: "VLSFO".to_string(),
            mass: Mt::whole(10),
            density_kg_m3: 960.0,
            viscosity_cst: 380.0,
            sulphur_pct: 0.5,
            allocations: vec![Allocation::new("A", Mt::whole(10))],
            attachment: None,
        });
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.grade("A"), Some("VLSFO"));
        assert_eq!(out.issues[0].code(), "GRADE_COMMINGLED");
    }

    #[test]
    fn empty_tank_takes_new_grade_silently() {
        let mut p = period();
        p.bunkerings.push(BunkeringEvent {
            bdn_number: "BDN-8".to_string(),
            delivered_at: p.report_time(),
            grade: "MDO".to_string(),
            mass: Mt::whole(50),
            density_kg_m3: 900.0,
            viscosity_cst: 0.0,
            sulphur_pct: 0.0,
            allocations: vec![Allocation::new("M", Mt::whole(50))],
            attachment: None,
        });
        let prior = RobTable::new()
            .with("A", Mt::whole(500), "HFO")
            .with("B", Mt::whole(200), "HFO")
            .with("M", Mt::ZERO, "MGO");
        let out = reconcile_period(&registry(), &prior, &p, &LedgerConfig::default());
        assert_eq!(out.closing.grade("M"), Some("MDO"));
        assert_eq!(out.closing.rob("M"), Mt::whole(50));
        assert!(out.issues.is_empty(), "{:?}", out.issues);
    }

    #[test]
    fn transfer_with_net_imbalance_rejected() {
        let mut p = period();
        p.transfers.push(TransferEvent {
            legs: vec![
                TransferLeg::new("A", Mt::whole(-30)),
                TransferLeg::new("B", Mt::whole(29)),
            ],
        });
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(
            out.issues,
            vec![LedgerIssue::UnbalancedTransfer {
                event: EventRef::Transfer { index: 0 },
                net: Mt::whole(-1),
            }]
        );
        assert_eq!(out.closing.rob("A"), Mt::whole(500));
        assert_eq!(out.closing.rob("B"), Mt::whole(200));
    }

    #[test]
    fn out_of_order_timestamp_flagged() {
        let mut prior = prior();
        prior.as_of = Some(period().report_time());
        let out = reconcile_period(&registry(), &prior, &period(), &LedgerConfig::default());
        assert_eq!(out.issues[0].code(), "OUT_OF_ORDER");
        assert!(!out.is_acceptable(&ConservationPolicy::default()));
        assert!(!out.is_acceptable(&ConservationPolicy::strict()));
        assert_eq!(out.blocking(&ConservationPolicy::default()).len(), 1);
    }

    #[test]
    fn negative_rob_recorded_not_clamped() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("ME", "M", Mt::whole(41)));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(out.closing.rob("M"), Mt::whole(-1));
        assert_eq!(
            out.issues,
            vec![LedgerIssue::NegativeRob {
                tank: TankId::new("M"),
                closing: Mt::whole(-1)
            }]
        );
    }

    #[test]
    fn tolerance_admits_small_imbalance() {
        let mut p = period();
        p.bunkerings.push(BunkeringEvent {
            bdn_number: "BDN-9".to_string(),
            delivered_at: p.report_time(),
            grade: "HFO".to_string(),
            mass: t(50.0),
            density_kg_m3: 991.0,
            viscosity_cst: 380.0,
            sulphur_pct: 3.0,
            allocations: vec![Allocation::new("A", t(49.95))],
            attachment: None,
        });
        let config = LedgerConfig {
            allocation_tolerance: t(0.1),
            ..LedgerConfig::default()
        };
        let out = reconcile_period(&registry(), &prior(), &p, &config);
        assert!(out.issues.is_empty());
        assert_eq!(out.closing.rob("A"), t(549.95));
    }

    #[test]
    fn movement_breakdown_matches_closing() {
        let mut p = period();
        p.consumption.push(ConsumptionEntry::from_tank("ME", "A", Mt::whole(20)));
        p.corrections.push(SurveyCorrection {
            tank: TankId::new("A"),
            delta: t(-0.5),
            comment: "sounding".to_string(),
        });
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        let m = out.movement("A").unwrap();
        assert_eq!(m.opening, Mt::whole(500));
        assert_eq!(m.consumed, Mt::whole(20));
        assert_eq!(m.corrected, t(-0.5));
        assert_eq!(m.closing, t(479.5));
        assert_eq!(m.capacity, Some(Mt::whole(1000)));
        let tanks: Vec<&str> = out.movements.iter().map(|m| m.tank.as_str()).collect();
        assert_eq!(tanks, vec!["A", "B", "M"]);
    }

    fn hfo_bunkering(bdn: &str, mass: Mt, allocations: Vec<Allocation>) -> BunkeringEvent {
        BunkeringEvent {
            bdn_number: bdn.to_string(),
            delivered_at: Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap(),
            grade: "HFO".to_string(),
            mass,
            density_kg_m3: 991.0,
            viscosity_cst: 380.0,
            sulphur_pct: 2.9,
            allocations,
            attachment: None,
        }
    }

    #[test]
    fn unbalanced_debunkering_touches_no_tank() {
        let mut p = period();
        p.debunkerings.push(DebunkeringEvent {
            removed_at: p.report_time(),
            quantity: Mt::whole(30),
            allocations: vec![
                Allocation::new("A", Mt::whole(20)),
                Allocation::new("B", Mt::whole(9)),
            ],
            receipt: Default::default(),
        });
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(
            out.issues,
            vec![LedgerIssue::UnbalancedDebunkering {
                event: EventRef::Debunkering { index: 0 },
                declared: Mt::whole(30),
                allocated: Mt::whole(29),
            }]
        );
        assert_eq!(out.rejected, vec![EventRef::Debunkering { index: 0 }]);
        assert_eq!(out.closing.rob("A"), Mt::whole(500));
        assert_eq!(out.closing.rob("B"), Mt::whole(200));
        assert_eq!(out.totals.debunkered, Mt::ZERO);
        assert!(!out.is_acceptable(&ConservationPolicy::default()));
    }

    #[test]
    fn allocation_to_unknown_tank_rejects_whole_bunkering() {
        let mut p = period();
        p.bunkerings.push(hfo_bunkering(
            "BDN-10",
            Mt::whole(50),
            vec![
                Allocation::new("A", Mt::whole(30)),
                Allocation::new("GHOST", Mt::whole(20)),
            ],
        ));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        let event = EventRef::Bunkering {
            index: 0,
            bdn_number: "BDN-10".to_string(),
        };
        assert_eq!(
            out.issues,
            vec![LedgerIssue::UnknownTank {
                event: event.clone(),
                tank: TankId::new("GHOST"),
            }]
        );
        assert_eq!(out.rejected, vec![event]);
        assert_eq!(out.closing.rob("A"), Mt::whole(500));
        assert_eq!(out.totals.bunkered, Mt::ZERO);
    }

    #[test]
    fn unknown_tank_in_declared_opening_is_structural() {
        let p = period()
            .with_opening("A", Mt::whole(500))
            .with_opening("GHOST", Mt::whole(10));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert_eq!(
            out.issues,
            vec![LedgerIssue::UnknownTank {
                event: EventRef::Opening,
                tank: TankId::new("GHOST"),
            }]
        );
        assert_eq!(out.rejected, vec![EventRef::Opening]);
        assert!(!out.closing.tanks.contains_key("GHOST"));
        assert!(!out.is_acceptable(&ConservationPolicy::default()));
    }

    #[test]
    fn bunkering_without_allocations_is_invalid() {
        let mut p = period();
        p.bunkerings
            .push(hfo_bunkering("BDN-11", Mt::whole(50), Vec::new()));
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        assert!(matches!(
            out.issues.as_slice(),
            [LedgerIssue::InvalidQuantity { quantity, .. }] if quantity.is_zero()
        ));
        assert_eq!(out.closing.total(), prior().total());
        assert_eq!(out.rejected.len(), 1);
    }

    #[test]
    fn volumetric_capacity_follows_new_grade() {
        let mut reg = registry();
        reg.register_tank("V", Capacity::Volume(100.0), "HFO").unwrap();
        let mut p = period();
        p.bunkerings.push(BunkeringEvent {
            grade: "MGO".to_string(),
            density_kg_m3: 890.0,
            viscosity_cst: 5.0,
            sulphur_pct: 0.1,
            ..hfo_bunkering("BDN-12", Mt::whole(90), vec![Allocation::new("V", Mt::whole(90))])
        });
        let out = reconcile_period(&reg, &prior(), &p, &LedgerConfig::default());
        // 100 m3 holds 99.1 t of HFO but only 89 t of MGO.
        assert_eq!(out.closing.grade("V"), Some("MGO"));
        assert_eq!(
            out.issues,
            vec![LedgerIssue::CapacityExceeded {
                tank: TankId::new("V"),
                closing: Mt::whole(90),
                capacity: Mt::whole(89),
            }]
        );
        assert_eq!(out.movement("V").unwrap().capacity, Some(Mt::whole(89)));
        assert!(out.is_acceptable(&ConservationPolicy::default()));
        assert!(!out.is_acceptable(&ConservationPolicy::strict()));
    }

    #[test]
    fn huge_allocations_do_not_overflow() {
        let mut p = period();
        let huge = Mt::new(i64::MAX / 2 + 1);
        p.bunkerings.push(hfo_bunkering(
            "BDN-13",
            Mt::whole(50),
            vec![Allocation::new("A", huge), Allocation::new("B", huge)],
        ));
        p.transfers.push(TransferEvent {
            legs: vec![TransferLeg::new("A", huge), TransferLeg::new("B", huge)],
        });
        let out = reconcile_period(&registry(), &prior(), &p, &LedgerConfig::default());
        let codes: Vec<&str> = out.issues.iter().map(|i| i.code()).collect();
        assert_eq!(codes, vec!["UNBALANCED_BUNKERING", "UNBALANCED_TRANSFER"]);
        assert_eq!(out.closing.rob("A"), Mt::whole(500));
    }
}
