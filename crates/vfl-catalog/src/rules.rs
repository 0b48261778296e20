//! Validation rule catalog: the declarative half of the rule engine.
//!
//! Rules are plain data (serde) so the catalog can be loaded from vessel
//! configuration.  Evaluation lives in `vfl-validate`; the only logic here is
//! the closed set of derived-field formulas, which are matched at compile
//! time instead of being looked up by name.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{CatalogError, ReportType};

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// Vessel reference values that range bounds may refer to
/// (e.g. `shop_test_tc_rpm`, `mcr_kw`).
pub type ReferenceData = BTreeMap<String, f64>;

/// A range bound: a literal, or a multiple of a reference value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Value(f64),
    Reference {
        reference: String,
        #[serde(default = "unit_factor")]
        factor: f64,
    },
}

fn unit_factor() -> f64 {
    1.0
}

impl Bound {
    /// Resolve against reference data.  `Err(key)` names the missing key.
    pub fn resolve<'a>(&'a self, reference: &ReferenceData) -> Result<f64, &'a str> {
        match self {
            Bound::Value(v) => Ok(*v),
            Bound::Reference { reference: key, factor } => reference
                .get(key)
                .map(|v| v * factor)
                .ok_or(key.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived formulas
// ---------------------------------------------------------------------------

/// Closed set of derived-value formulas.  Each variant names the report
/// fields it reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivedFormula {
    /// `(engine − observed) / engine × 100`
    Slip {
        engine_distance: String,
        observed_distance: String,
    },
    /// `consumption[mt] × 1e6 / (power[kW] × hours)` in g/kWh.
    Sfoc {
        consumption: String,
        power: String,
        run_hours: String,
    },
    /// `distance / hours`
    AverageSpeed { distance: String, hours: String },
    /// `Σ terms`
    Sum { terms: Vec<String> },
    /// `numerator / denominator × scale`
    Ratio {
        numerator: String,
        denominator: String,
        #[serde(default = "unit_factor")]
        scale: f64,
    },
}

impl DerivedFormula {
    /// Field names read by this formula, in declaration order.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            DerivedFormula::Slip {
                engine_distance,
                observed_distance,
            } => vec![engine_distance.as_str(), observed_distance.as_str()],
            DerivedFormula::Sfoc {
                consumption,
                power,
                run_hours,
            } => vec![consumption.as_str(), power.as_str(), run_hours.as_str()],
            DerivedFormula::AverageSpeed { distance, hours } => {
                vec![distance.as_str(), hours.as_str()]
            }
            DerivedFormula::Sum { terms } => terms.iter().map(String::as_str).collect(),
            DerivedFormula::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
        }
    }

    /// Evaluate against a field lookup.
    ///
    /// `None` when an input is missing, a denominator is zero, or the result
    /// is not finite.
    pub fn evaluate<F>(&self, field: F) -> Option<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let v = match self {
            DerivedFormula::Slip {
                engine_distance,
                observed_distance,
            } => {
                let eng = field(engine_distance)?;
                let obs = field(observed_distance)?;
                ratio(eng - obs, eng)? * 100.0
            }
            DerivedFormula::Sfoc {
                consumption,
                power,
                run_hours,
            } => {
                let cons = field(consumption)?;
                let kw = field(power)?;
                let hrs = field(run_hours)?;
                ratio(cons * 1e6, kw * hrs)?
            }
            DerivedFormula::AverageSpeed { distance, hours } => {
                ratio(field(distance)?, field(hours)?)?
            }
            DerivedFormula::Sum { terms } => {
                let mut acc = 0.0;
                for t in terms {
                    acc += field(t)?;
                }
                acc
            }
            DerivedFormula::Ratio {
                numerator,
                denominator,
                scale,
            } => ratio(field(numerator)?, field(denominator)?)? * scale,
        };
        v.is_finite().then_some(v)
    }
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// What a rule checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// `min ≤ field ≤ max`; either side may be omitted.
    Range {
        #[serde(default)]
        min: Option<Bound>,
        #[serde(default)]
        max: Option<Bound>,
    },
    /// `field ≈ formula(...)` within an absolute tolerance.
    Derived {
        formula: DerivedFormula,
        #[serde(default)]
        tolerance: f64,
    },
    /// `Σ parts ≤ field`.
    SumNotExceeding { parts: Vec<String> },
    /// Hours between the prior period's timestamp and this one lie within
    /// `[min_hours, max_hours]`.
    PriorInterval {
        #[serde(default)]
        min_hours: Option<f64>,
        max_hours: f64,
    },
}

/// One entry of the rule catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Stable identifier reported in findings.
    pub id: String,
    /// The field the finding is attached to.
    pub field: String,
    /// Report types the rule applies to; empty means all.
    #[serde(default)]
    pub applies_to: Vec<ReportType>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl ValidationRule {
    pub fn new(id: impl Into<String>, field: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            applies_to: Vec::new(),
            kind,
        }
    }

    pub fn only_for(mut self, types: &[ReportType]) -> Self {
        self.applies_to = types.to_vec();
        self
    }

    pub fn applies(&self, report_type: ReportType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&report_type)
    }
}

/// Ordered rule list with unique ids.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ValidationRule>", into = "Vec<ValidationRule>")]
pub struct RuleCatalog {
    rules: Vec<ValidationRule>,
}

impl RuleCatalog {
    /// Build a catalog, rejecting empty or duplicate rule ids.
    pub fn new(rules: Vec<ValidationRule>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        for r in &rules {
            if r.id.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if !seen.insert(r.id.as_str()) {
                return Err(CatalogError::DuplicateRule { id: r.id.clone() });
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule set the reporting forms enforce for a typical
    /// two-stroke main-engine vessel.
    pub fn standard() -> Self {
        use ReportType::*;
        let sea = [Noon, Cosp, Eosp];
        let rules = vec![
            ValidationRule::new(
                "SLIP_DERIVED",
                "slip_pct",
                RuleKind::Derived {
                    formula: DerivedFormula::Slip {
                        engine_distance: "engine_distance_nm".into(),
                        observed_distance: "observed_distance_nm".into(),
                    },
                    tolerance: 0.1,
                },
            )
            .only_for(&sea),
            ValidationRule::new(
                "SLIP_RANGE",
                "slip_pct",
                RuleKind::Range {
                    min: Some(Bound::Value(-10.0)),
                    max: Some(Bound::Value(30.0)),
                },
            )
            .only_for(&sea),
            ValidationRule::new(
                "SPEED_DERIVED",
                "average_speed_kn",
                RuleKind::Derived {
                    formula: DerivedFormula::AverageSpeed {
                        distance: "observed_distance_nm".into(),
                        hours: "steaming_hours".into(),
                    },
                    tolerance: 0.05,
                },
            )
            .only_for(&sea),
            ValidationRule::new(
                "ME_SFOC_DERIVED",
                "me_sfoc_g_kwh",
                RuleKind::Derived {
                    formula: DerivedFormula::Sfoc {
                        consumption: "me_consumption_mt".into(),
                        power: "me_power_kw".into(),
                        run_hours: "me_run_hours".into(),
                    },
                    tolerance: 1.0,
                },
            ),
            ValidationRule::new(
                "ME_SFOC_RANGE",
                "me_sfoc_g_kwh",
                RuleKind::Range {
                    min: Some(Bound::Value(150.0)),
                    max: Some(Bound::Value(250.0)),
                },
            ),
            ValidationRule::new(
                "ME_RPM_RANGE",
                "me_rpm",
                RuleKind::Range {
                    min: Some(Bound::Value(0.0)),
                    max: Some(Bound::Reference {
                        reference: "mcr_rpm".into(),
                        factor: 1.05,
                    }),
                },
            ),
            ValidationRule::new(
                "TC_RPM_RANGE",
                "tc_rpm",
                RuleKind::Range {
                    min: Some(Bound::Value(0.0)),
                    max: Some(Bound::Reference {
                        reference: "shop_test_tc_rpm".into(),
                        factor: 1.10,
                    }),
                },
            ),
            ValidationRule::new(
                "WIND_FORCE_RANGE",
                "wind_force_bft",
                RuleKind::Range {
                    min: Some(Bound::Value(0.0)),
                    max: Some(Bound::Value(12.0)),
                },
            ),
            ValidationRule::new(
                "SEA_STATE_RANGE",
                "sea_state_douglas",
                RuleKind::Range {
                    min: Some(Bound::Value(0.0)),
                    max: Some(Bound::Value(9.0)),
                },
            ),
            ValidationRule::new(
                "PORT_HOURS_WITHIN_ELAPSED",
                "elapsed_hours",
                RuleKind::SumNotExceeding {
                    parts: vec![
                        "maneuvering_hours".into(),
                        "anchorage_hours".into(),
                        "drifting_hours".into(),
                    ],
                },
            ),
            ValidationRule::new(
                "BAD_WEATHER_WITHIN_STEAMING",
                "steaming_hours",
                RuleKind::SumNotExceeding {
                    parts: vec!["bad_weather_hours".into()],
                },
            ),
            ValidationRule::new(
                "EVENT_INTERVAL",
                "report_time",
                RuleKind::PriorInterval {
                    min_hours: Some(0.0),
                    max_hours: 25.0,
                },
            ),
        ];
        // Ids above are literal and unique.
        Self { rules }
    }
}

impl TryFrom<Vec<ValidationRule>> for RuleCatalog {
    type Error = CatalogError;

    fn try_from(rules: Vec<ValidationRule>) -> Result<Self, Self::Error> {
        RuleCatalog::new(rules)
    }
}

impl From<RuleCatalog> for Vec<ValidationRule> {
    fn from(c: RuleCatalog) -> Self {
        c.rules
    }
}
