//! Fuel grade reference data and tank capacity units.

use serde::{Deserialize, Serialize};

use crate::{CatalogError, Mt};

/// Immutable reference data for one fuel / lubricant / water grade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelGrade {
    /// Lookup key, e.g. `"VLSFO"`.
    pub name: String,
    /// Density at 15 °C in kg/m³.
    pub density_kg_m3: f64,
    /// Kinematic viscosity in cSt.
    #[serde(default)]
    pub viscosity_cst: f64,
    /// Maximum sulphur content in % m/m.
    #[serde(default)]
    pub sulphur_pct: f64,
    /// Lower calorific value in MJ/kg.
    #[serde(default)]
    pub lcv_mj_kg: f64,
    /// Higher calorific value in MJ/kg.
    #[serde(default)]
    pub hcv_mj_kg: f64,
}

impl FuelGrade {
    pub fn new(name: impl Into<String>, density_kg_m3: f64) -> Self {
        Self {
            name: name.into(),
            density_kg_m3,
            viscosity_cst: 0.0,
            sulphur_pct: 0.0,
            lcv_mj_kg: 0.0,
            hcv_mj_kg: 0.0,
        }
    }

    pub fn with_viscosity(mut self, cst: f64) -> Self {
        self.viscosity_cst = cst;
        self
    }

    pub fn with_sulphur(mut self, pct: f64) -> Self {
        self.sulphur_pct = pct;
        self
    }

    pub fn with_calorific(mut self, lcv_mj_kg: f64, hcv_mj_kg: f64) -> Self {
        self.lcv_mj_kg = lcv_mj_kg;
        self.hcv_mj_kg = hcv_mj_kg;
        self
    }

    /// Mass of `m3` cubic metres of this grade.
    pub fn mass_of_volume(&self, m3: f64) -> Option<Mt> {
        Mt::from_tonnes(m3 * self.density_kg_m3 / 1000.0)
    }
}

/// Nominal tank capacity as declared in the vessel particulars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    /// Capacity given directly in metric tonnes.
    Mass(Mt),
    /// Capacity given in m³; converted with the density of the tank's
    /// current grade.
    Volume(f64),
}

impl Capacity {
    /// Capacity in tonnes for a tank holding `grade`.
    ///
    /// Returns `None` only when a volumetric capacity cannot be represented
    /// (non-finite density or volume).
    pub fn to_mt(&self, grade: &FuelGrade) -> Option<Mt> {
        match self {
            Capacity::Mass(m) => Some(*m),
            Capacity::Volume(m3) => grade.mass_of_volume(*m3),
        }
    }
}

// ---------------------------------------------------------------------------
// GradeCatalog
// ---------------------------------------------------------------------------

/// Name-keyed grade catalog.  Insertion order is preserved for listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeCatalog {
    grades: Vec<FuelGrade>,
}

impl GradeCatalog {
    pub fn new() -> Self {
        Self { grades: Vec::new() }
    }

    /// Common marine fuel grades with ISO 8217 typical values.
    pub fn standard() -> Self {
        let grades = vec![
            FuelGrade::new("HFO", 991.0)
                .with_viscosity(380.0)
                .with_sulphur(3.5)
                .with_calorific(40.2, 42.6),
            FuelGrade::new("VLSFO", 960.0)
                .with_viscosity(180.0)
                .with_sulphur(0.5)
                .with_calorific(41.0, 43.5),
            FuelGrade::new("ULSFO", 920.0)
                .with_viscosity(40.0)
                .with_sulphur(0.1)
                .with_calorific(41.5, 44.0),
            FuelGrade::new("MDO", 900.0)
                .with_viscosity(11.0)
                .with_sulphur(0.5)
                .with_calorific(42.7, 45.4),
            FuelGrade::new("MGO", 890.0)
                .with_viscosity(6.0)
                .with_sulphur(0.1)
                .with_calorific(42.7, 45.6),
        ];
        Self { grades }
    }

    /// Add a grade.
    ///
    /// # Errors
    /// [`CatalogError::EmptyName`] / [`CatalogError::DuplicateGrade`].
    pub fn insert(&mut self, grade: FuelGrade) -> Result<(), CatalogError> {
        if grade.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if self.contains(&grade.name) {
            return Err(CatalogError::DuplicateGrade { name: grade.name });
        }
        self.grades.push(grade);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FuelGrade> {
        self.grades.iter().find(|g| g.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuelGrade> {
        self.grades.iter()
    }

    pub fn len(&self) -> usize {
        self.grades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }

    /// Build from a list, rejecting duplicates.
    pub fn from_grades(grades: impl IntoIterator<Item = FuelGrade>) -> Result<Self, CatalogError> {
        let mut cat = Self::new();
        for g in grades {
            cat.insert(g)?;
        }
        Ok(cat)
    }
}
