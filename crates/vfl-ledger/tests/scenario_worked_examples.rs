//! Scenario: worked ledger examples
//!
//! # Invariants under test
//!
//! 1. 500.0 opening, 20.0 consumed, 100.0 bunkered -> 580.0 closing.
//! 2. A bunkering whose allocations (49.5) miss the declared mass (50.0)
//!    yields `UnbalancedBunkering` and no tank is mutated.
//! 3. A balanced transfer moves quantity between tanks without changing the
//!    vessel total.
//! 4. A closing above capacity is recorded as computed and reported with
//!    `CapacityExceeded`.

use chrono::{TimeZone, Utc};
use vfl_catalog::{Capacity, GradeCatalog, Mt, ReportType};
use vfl_ledger::{
    reconcile_period, Allocation, BunkeringEvent, ConsumptionEntry, EventRef, LedgerConfig,
    LedgerIssue, PeriodKey, ReportPeriod, RobTable, TransferEvent, TransferLeg,
};
use vfl_registry::{TankId, VesselRegistry};

fn t(tonnes: f64) -> Mt {
    Mt::from_tonnes(tonnes).unwrap()
}

fn registry() -> VesselRegistry {
    let mut reg = VesselRegistry::new(GradeCatalog::standard());
    reg.register_tank("A", Capacity::Mass(Mt::whole(1000)), "HFO")
        .unwrap();
    reg.register_tank("B", Capacity::Mass(Mt::whole(1000)), "HFO")
        .unwrap();
    reg.register_consumer("ME", None).unwrap();
    reg
}

fn noon() -> ReportPeriod {
    let key = PeriodKey::new(
        "MV NORTHERN STAR",
        "L07",
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap(),
    );
    ReportPeriod::new(key, ReportType::Noon)
}

fn bunkering(bdn: &str, mass: Mt, allocations: Vec<Allocation>) -> BunkeringEvent {
    BunkeringEvent {
        bdn_number: bdn.to_string(),
        delivered_at: Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap(),
        grade: "HFO".to_string(),
        mass,
        density_kg_m3: 989.5,
        viscosity_cst: 380.0,
        sulphur_pct: 2.9,
        allocations,
        attachment: None,
    }
}

#[test]
fn consumption_and_bunkering_carry_rob_forward() {
    let prior = RobTable::new()
        .with("A", t(500.0), "HFO")
        .with("B", Mt::ZERO, "HFO");
    let mut p = noon();
    p.consumption
        .push(ConsumptionEntry::from_tank("ME", "A", t(20.0)));
    p.bunkerings.push(bunkering(
        "BDN-001",
        t(100.0),
        vec![Allocation::new("A", t(100.0))],
    ));

    let out = reconcile_period(&registry(), &prior, &p, &LedgerConfig::default());

    assert!(out.issues.is_empty(), "{:?}", out.issues);
    assert_eq!(out.closing.rob("A"), t(580.0));
    assert_eq!(out.closing.as_of, Some(p.report_time()));
}

#[test]
fn unbalanced_bunkering_mutates_nothing() {
    let prior = RobTable::new()
        .with("A", t(300.0), "HFO")
        .with("B", t(200.0), "HFO");
    let mut p = noon();
    p.bunkerings.push(bunkering(
        "BDN-002",
        t(50.0),
        vec![
            Allocation::new("A", t(25.0)),
            Allocation::new("B", t(24.5)),
        ],
    ));

    let out = reconcile_period(&registry(), &prior, &p, &LedgerConfig::default());

    assert_eq!(
        out.issues,
        vec![LedgerIssue::UnbalancedBunkering {
            event: EventRef::Bunkering {
                index: 0,
                bdn_number: "BDN-002".to_string()
            },
            declared: t(50.0),
            allocated: t(49.5),
        }]
    );
    assert_eq!(out.closing.rob("A"), t(300.0));
    assert_eq!(out.closing.rob("B"), t(200.0));
    assert!(out.has_structural());
    assert!(!out.is_acceptable(&LedgerConfig::default().policy));
    assert_eq!(out.rejected.len(), 1);
}

#[test]
fn exactly_balanced_bunkering_is_accepted() {
    let prior = RobTable::new()
        .with("A", t(300.0), "HFO")
        .with("B", t(200.0), "HFO");
    let mut p = noon();
    p.bunkerings.push(bunkering(
        "BDN-003",
        t(50.0),
        vec![
            Allocation::new("A", t(25.5)),
            Allocation::new("B", t(24.5)),
        ],
    ));

    let out = reconcile_period(&registry(), &prior, &p, &LedgerConfig::default());

    assert!(out.issues.is_empty());
    assert_eq!(out.closing.total(), t(550.0));
}

#[test]
fn transfer_preserves_total() {
    let prior = RobTable::new()
        .with("A", t(300.0), "HFO")
        .with("B", t(200.0), "HFO");
    let mut p = noon();
    p.transfers.push(TransferEvent {
        legs: vec![
            TransferLeg::new("A", t(-30.0)),
            TransferLeg::new("B", t(30.0)),
        ],
    });

    let out = reconcile_period(&registry(), &prior, &p, &LedgerConfig::default());

    assert!(out.issues.is_empty());
    assert_eq!(out.closing.rob("A"), t(270.0));
    assert_eq!(out.closing.rob("B"), t(230.0));
    assert_eq!(out.closing.total(), prior.total());
}

#[test]
fn capacity_exceeded_is_recorded_unclamped() {
    let prior = RobTable::new()
        .with("A", t(900.0), "HFO")
        .with("B", Mt::ZERO, "HFO");
    let mut p = noon();
    p.bunkerings.push(bunkering(
        "BDN-004",
        t(120.0),
        vec![Allocation::new("A", t(120.0))],
    ));

    let out = reconcile_period(&registry(), &prior, &p, &LedgerConfig::default());

    assert_eq!(out.closing.rob("A"), t(1020.0));
    assert_eq!(
        out.issues,
        vec![LedgerIssue::CapacityExceeded {
            tank: TankId::new("A"),
            closing: t(1020.0),
            capacity: t(1000.0),
        }]
    );
    // Warn-only by default.
    assert!(out.is_acceptable(&LedgerConfig::default().policy));
}
