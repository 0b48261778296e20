//! vfl-catalog
//!
//! Unit & Range Catalog: static reference data shared by the registry, the
//! ledger and the validator.
//! - `Mt`: fixed-point mass (grams) used for every tank quantity
//! - Fuel grades (density, viscosity, sulphur, calorific values)
//! - Report types
//! - Validation rule catalog and derived-field formulas
//!
//! Pure data. No IO.

mod grade;
mod report_type;
mod rules;
mod units;

pub use grade::{Capacity, FuelGrade, GradeCatalog};
pub use report_type::ReportType;
pub use rules::{Bound, DerivedFormula, ReferenceData, RuleCatalog, RuleKind, ValidationRule};
pub use units::{Mt, MtRangeError, MAX_TONNES, MT_SCALE};

/// Catalog construction errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// A grade name or rule id is empty or whitespace.
    EmptyName,
    DuplicateGrade { name: String },
    DuplicateRule { id: String },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "catalog: name/id must not be empty"),
            Self::DuplicateGrade { name } => {
                write!(f, "catalog: grade '{name}' is already defined")
            }
            Self::DuplicateRule { id } => write!(f, "catalog: rule '{id}' is already defined"),
        }
    }
}

impl std::error::Error for CatalogError {}
