//! Report periods and the movement events they carry.
//!
//! Everything here is a plain, immutable record as submitted by the form
//! layer.  Validation happens in the engine, never at construction, so a
//! malformed payload still deserializes and can be reported on.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfl_catalog::{Mt, ReportType};
use vfl_registry::{ConsumerId, TankId};

/// Opaque handle to an attachment (BDN scan, removal receipt) held by the
/// external upload service.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(pub String);

/// Append-only storage key of a period: (vessel, voyage leg, timestamp).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub vessel: String,
    pub leg: String,
    pub report_time: DateTime<Utc>,
}

impl PeriodKey {
    pub fn new(
        vessel: impl Into<String>,
        leg: impl Into<String>,
        report_time: DateTime<Utc>,
    ) -> Self {
        Self {
            vessel: vessel.into(),
            leg: leg.into(),
            report_time,
        }
    }

    /// The (vessel, leg) pair this period belongs to.
    pub fn leg_key(&self) -> LegKey {
        LegKey {
            vessel: self.vessel.clone(),
            leg: self.leg.clone(),
        }
    }
}

/// A voyage leg of one vessel; the unit of single-writer ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LegKey {
    pub vessel: String,
    pub leg: String,
}

impl LegKey {
    pub fn new(vessel: impl Into<String>, leg: impl Into<String>) -> Self {
        Self {
            vessel: vessel.into(),
            leg: leg.into(),
        }
    }
}

impl std::fmt::Display for LegKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.vessel, self.leg)
    }
}

// ---------------------------------------------------------------------------
// Movement events
// ---------------------------------------------------------------------------

/// Fuel drawn by one consumer during the period.
///
/// The source is normally a tank.  A grade-only entry is resolved to the
/// single tank currently holding that grade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    pub consumer: ConsumerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tank: Option<TankId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub quantity: Mt,
}

impl ConsumptionEntry {
    pub fn from_tank(consumer: &str, tank: &str, quantity: Mt) -> Self {
        Self {
            consumer: ConsumerId::new(consumer),
            tank: Some(TankId::new(tank)),
            grade: None,
            quantity,
        }
    }

    pub fn from_grade(consumer: &str, grade: &str, quantity: Mt) -> Self {
        Self {
            consumer: ConsumerId::new(consumer),
            tank: None,
            grade: Some(grade.to_string()),
            quantity,
        }
    }
}

/// One (tank, quantity) share of a bunkering or debunkering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub tank: TankId,
    pub quantity: Mt,
}

impl Allocation {
    pub fn new(tank: &str, quantity: Mt) -> Self {
        Self {
            tank: TankId::new(tank),
            quantity,
        }
    }
}

/// A delivery received against a bunker delivery note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BunkeringEvent {
    pub bdn_number: String,
    pub delivered_at: DateTime<Utc>,
    pub grade: String,
    /// Declared mass on the BDN.
    pub mass: Mt,
    #[serde(default)]
    pub density_kg_m3: f64,
    #[serde(default)]
    pub viscosity_cst: f64,
    #[serde(default)]
    pub sulphur_pct: f64,
    pub allocations: Vec<Allocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<BlobHandle>,
}

/// Product removed from the vessel against a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebunkeringEvent {
    pub removed_at: DateTime<Utc>,
    pub quantity: Mt,
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub receipt: BlobHandle,
}

/// One signed leg of an internal transfer (negative = out of the tank).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub tank: TankId,
    pub quantity: Mt,
}

impl TransferLeg {
    pub fn new(tank: &str, quantity: Mt) -> Self {
        Self {
            tank: TankId::new(tank),
            quantity,
        }
    }
}

/// Internal tank-to-tank movement; legs must net to zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub legs: Vec<TransferLeg>,
}

/// Sounding adjustment reconciling metered against measured ROB.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyCorrection {
    pub tank: TankId,
    pub delta: Mt,
    #[serde(default)]
    pub comment: String,
}

// ---------------------------------------------------------------------------
// ReportPeriod
// ---------------------------------------------------------------------------

/// One submitted voyage-event report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub key: PeriodKey,
    pub report_type: ReportType,
    /// Opening ROB per tank as shown on the form.  Checked against the prior
    /// accepted closing; never used as the arithmetic starting point.
    #[serde(default)]
    pub opening: BTreeMap<TankId, Mt>,
    #[serde(default)]
    pub consumption: Vec<ConsumptionEntry>,
    #[serde(default)]
    pub bunkerings: Vec<BunkeringEvent>,
    #[serde(default)]
    pub debunkerings: Vec<DebunkeringEvent>,
    #[serde(default)]
    pub transfers: Vec<TransferEvent>,
    #[serde(default)]
    pub corrections: Vec<SurveyCorrection>,
    /// Raw numeric form fields read by the validator.
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
    /// Raw textual / enumerated form fields.
    #[serde(default)]
    pub text: BTreeMap<String, String>,
}

impl ReportPeriod {
    /// An empty period of the given type.
    pub fn new(key: PeriodKey, report_type: ReportType) -> Self {
        Self {
            key,
            report_type,
            opening: BTreeMap::new(),
            consumption: Vec::new(),
            bunkerings: Vec::new(),
            debunkerings: Vec::new(),
            transfers: Vec::new(),
            corrections: Vec::new(),
            fields: BTreeMap::new(),
            text: BTreeMap::new(),
        }
    }

    pub fn report_time(&self) -> DateTime<Utc> {
        self.key.report_time
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_opening(mut self, tank: &str, rob: Mt) -> Self {
        self.opening.insert(TankId::new(tank), rob);
        self
    }
}
