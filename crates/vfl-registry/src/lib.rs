//! vfl-registry
//!
//! Tank & Consumer Registry: the vessel's fixed inventory of tanks and
//! consumption points.
//!
//! # Rules
//! - Ids are unique per kind (a tank and a consumer may share an id).
//! - There is no removal.  A decommissioned tank or consumer simply stops
//!   appearing in future allocations, so historical periods stay replayable.
//! - A consumer's parent must already be registered.  Cycles are therefore
//!   unrepresentable.
//! - A tank's grade must exist in the grade catalog.
//!
//! Insertion order is preserved for deterministic listing.

use serde::{Deserialize, Serialize};
use vfl_catalog::{Capacity, FuelGrade, GradeCatalog, Mt};

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Tank identifier, e.g. `"HFO_1P"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankId(pub String);

impl TankId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Ord/Eq/Hash are derived from the inner `String`, so they agree with `str`.
impl std::borrow::Borrow<str> for TankId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Consumer identifier, e.g. `"BOILER_1"` or `"BOILER_1.CARGO_HEATING"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(pub String);

impl ConsumerId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A fixed tank.  Its ROB lives in the ledger, not here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: TankId,
    pub capacity: Capacity,
    /// Grade assigned at onboarding.  The ledger tracks the current grade,
    /// which may change on bunkering.
    pub grade: String,
}

/// A consumption point (engine, boiler, auxiliary load) or a sub-allocation
/// of one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: ConsumerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<ConsumerId>,
}

impl Consumer {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Tank,
    Consumer,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Tank => f.write_str("tank"),
            EntityKind::Consumer => f.write_str("consumer"),
        }
    }
}

/// Errors returned by [`VesselRegistry`] registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// The id is empty or whitespace.
    EmptyId { kind: EntityKind },
    /// The id is already registered for this kind.
    DuplicateId { kind: EntityKind, id: String },
    /// The tank's grade is not in the grade catalog.
    UnknownGrade { tank: String, grade: String },
    /// The consumer's parent has not been registered.
    UnknownParent { consumer: String, parent: String },
    /// Negative mass, or a volume that is negative or not finite.
    InvalidCapacity { tank: String },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId { kind } => write!(f, "{kind} id must not be empty"),
            Self::DuplicateId { kind, id } => write!(f, "{kind} '{id}' is already registered"),
            Self::UnknownGrade { tank, grade } => {
                write!(f, "tank '{tank}' references unknown grade '{grade}'")
            }
            Self::UnknownParent { consumer, parent } => write!(
                f,
                "consumer '{consumer}' references unregistered parent '{parent}'"
            ),
            Self::InvalidCapacity { tank } => write!(
                f,
                "tank '{tank}' capacity must be a finite, non-negative quantity"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// VesselRegistry
// ---------------------------------------------------------------------------

/// The vessel's tanks and consumers plus the grade catalog they refer to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VesselRegistry {
    grades: GradeCatalog,
    tanks: Vec<Tank>,
    consumers: Vec<Consumer>,
}

impl VesselRegistry {
    pub fn new(grades: GradeCatalog) -> Self {
        Self {
            grades,
            tanks: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Build from declared lists, registering in order.
    ///
    /// Consumers must be listed parents-first.
    pub fn from_parts(
        grades: GradeCatalog,
        tanks: impl IntoIterator<Item = Tank>,
        consumers: impl IntoIterator<Item = Consumer>,
    ) -> Result<Self, RegistryError> {
        let mut reg = Self::new(grades);
        for t in tanks {
            reg.register_tank(t.id.0, t.capacity, t.grade)?;
        }
        for c in consumers {
            reg.register_consumer_named(c.id.0, c.name, c.parent)?;
        }
        Ok(reg)
    }

    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Register a tank.
    ///
    /// # Errors
    /// - [`RegistryError::EmptyId`]
    /// - [`RegistryError::DuplicateId`]
    /// - [`RegistryError::UnknownGrade`]
    /// - [`RegistryError::InvalidCapacity`]
    pub fn register_tank(
        &mut self,
        id: impl Into<String>,
        capacity: Capacity,
        grade: impl Into<String>,
    ) -> Result<TankId, RegistryError> {
        let id = id.into();
        let grade = grade.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId {
                kind: EntityKind::Tank,
            });
        }
        if self.tank(&id).is_some() {
            return Err(RegistryError::DuplicateId {
                kind: EntityKind::Tank,
                id,
            });
        }
        if !self.grades.contains(&grade) {
            return Err(RegistryError::UnknownGrade { tank: id, grade });
        }
        let valid = match capacity {
            Capacity::Mass(m) => !m.is_negative(),
            Capacity::Volume(m3) => m3.is_finite() && m3 >= 0.0,
        };
        if !valid {
            return Err(RegistryError::InvalidCapacity { tank: id });
        }
        let tank_id = TankId(id);
        self.tanks.push(Tank {
            id: tank_id.clone(),
            capacity,
            grade,
        });
        Ok(tank_id)
    }

    /// Register a consumer, optionally as a sub-consumer of `parent`.
    pub fn register_consumer(
        &mut self,
        id: impl Into<String>,
        parent: Option<ConsumerId>,
    ) -> Result<ConsumerId, RegistryError> {
        self.register_consumer_named(id, String::new(), parent)
    }

    /// As [`register_consumer`](Self::register_consumer) with a display name.
    ///
    /// # Errors
    /// - [`RegistryError::EmptyId`]
    /// - [`RegistryError::DuplicateId`]
    /// - [`RegistryError::UnknownParent`]
    pub fn register_consumer_named(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        parent: Option<ConsumerId>,
    ) -> Result<ConsumerId, RegistryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId {
                kind: EntityKind::Consumer,
            });
        }
        if self.consumer(&id).is_some() {
            return Err(RegistryError::DuplicateId {
                kind: EntityKind::Consumer,
                id,
            });
        }
        if let Some(p) = &parent {
            if self.consumer(p.as_str()).is_none() {
                return Err(RegistryError::UnknownParent {
                    consumer: id,
                    parent: p.0.clone(),
                });
            }
        }
        let consumer_id = ConsumerId(id);
        self.consumers.push(Consumer {
            id: consumer_id.clone(),
            name: name.into(),
            parent,
        });
        Ok(consumer_id)
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn grades(&self) -> &GradeCatalog {
        &self.grades
    }

    pub fn grade(&self, name: &str) -> Option<&FuelGrade> {
        self.grades.get(name)
    }

    pub fn tank(&self, id: &str) -> Option<&Tank> {
        self.tanks.iter().find(|t| t.id.as_str() == id)
    }

    pub fn consumer(&self, id: &str) -> Option<&Consumer> {
        self.consumers.iter().find(|c| c.id.as_str() == id)
    }

    /// Tanks in registration order.
    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    /// Consumers in registration order.
    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }

    /// Direct sub-consumers of `id`, in registration order.
    pub fn children(&self, id: &str) -> Vec<&Consumer> {
        self.consumers
            .iter()
            .filter(|c| c.parent.as_ref().map(|p| p.as_str()) == Some(id))
            .collect()
    }

    /// `true` if the consumer exists and has no parent.
    pub fn is_root(&self, id: &str) -> bool {
        self.consumer(id).is_some_and(|c| c.parent.is_none())
    }

    /// The top-level ancestor of `id` (itself if it is a root).
    pub fn root_of(&self, id: &str) -> Option<&ConsumerId> {
        let mut cur = self.consumer(id)?;
        while let Some(p) = &cur.parent {
            cur = self.consumer(p.as_str())?;
        }
        Some(&cur.id)
    }

    /// Capacity of `tank` in tonnes when it holds `grade`.
    ///
    /// `None` if the tank or grade is unknown.
    pub fn capacity_mt(&self, tank: &str, grade: &str) -> Option<Mt> {
        let t = self.tank(tank)?;
        let g = self.grades.get(grade)?;
        t.capacity.to_mt(g)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
