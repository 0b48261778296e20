use serde::{Deserialize, Serialize};

/// Finding severity.  Nothing the validator reports blocks a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Derived-value display or a bound that could not be checked.
    Info,
    /// Out of range or inconsistent.
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => f.write_str("INFO"),
            Severity::Warning => f.write_str("WARNING"),
        }
    }
}

/// One validator finding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub field: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Computed value, for derived-value findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Finding {
    pub fn info(rule_id: &str, field: &str, message: String) -> Self {
        Self {
            field: field.to_string(),
            rule_id: rule_id.to_string(),
            severity: Severity::Info,
            message,
            value: None,
        }
    }

    pub fn warning(rule_id: &str, field: &str, message: String) -> Self {
        Self {
            field: field.to_string(),
            rule_id: rule_id.to_string(),
            severity: Severity::Warning,
            message,
            value: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Tuning for the bunkering quality checks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Allowed relative deviation of declared BDN density from the catalog
    /// density, as a fraction (0.02 = 2 %).
    pub density_tolerance: f64,
    pub check_bunkering_quality: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            density_tolerance: 0.02,
            check_bunkering_quality: true,
        }
    }
}
