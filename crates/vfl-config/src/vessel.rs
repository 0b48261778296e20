//! Typed view of a loaded vessel configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vfl_catalog::{FuelGrade, GradeCatalog, ReferenceData, RuleCatalog};
use vfl_ledger::LedgerConfig;
use vfl_registry::{Consumer, Tank, VesselRegistry};
use vfl_validate::ValidatorConfig;

use crate::LoadedConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselInfo {
    pub name: String,
    #[serde(default)]
    pub imo: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// On-disk layout.  Unknown keys are tolerated here; the unused-key guard
/// reports them.
#[derive(Deserialize)]
struct Raw {
    vessel: VesselInfo,
    /// Absent -> the standard grade catalog.
    #[serde(default)]
    grades: Option<Vec<FuelGrade>>,
    #[serde(default)]
    tanks: Vec<Tank>,
    #[serde(default)]
    consumers: Vec<Consumer>,
    #[serde(default)]
    reference: ReferenceData,
    /// Absent -> the standard rule catalog.
    #[serde(default)]
    rules: Option<RuleCatalog>,
    #[serde(default)]
    policy: PolicyConfig,
}

/// Everything a session needs, built and checked from one loaded config.
#[derive(Clone, Debug)]
pub struct VesselConfig {
    pub vessel: VesselInfo,
    pub registry: VesselRegistry,
    pub rules: RuleCatalog,
    pub reference: ReferenceData,
    pub policy: PolicyConfig,
    /// Hash of the canonical JSON this view was built from.
    pub config_hash: String,
}

impl VesselConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let mut cfg = Self::from_json(&loaded.config_json)?;
        cfg.config_hash = loaded.config_hash.clone();
        Ok(cfg)
    }

    /// Build from a merged JSON document.  `config_hash` is left empty.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let raw: Raw = serde_json::from_value(config_json.clone())
            .context("vessel config does not match the expected layout")?;

        let grades = match raw.grades {
            Some(list) => GradeCatalog::from_grades(list).context("invalid grade catalog")?,
            None => GradeCatalog::standard(),
        };
        let registry = VesselRegistry::from_parts(grades, raw.tanks, raw.consumers)
            .context("invalid tank / consumer registry")?;

        Ok(Self {
            vessel: raw.vessel,
            registry,
            rules: raw.rules.unwrap_or_else(RuleCatalog::standard),
            reference: raw.reference,
            policy: raw.policy,
            config_hash: String::new(),
        })
    }
}
