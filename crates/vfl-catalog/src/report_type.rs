use serde::{Deserialize, Serialize};

/// The voyage event a report period snapshots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Noon,
    Departure,
    Arrival,
    /// Commencement of sea passage.
    Cosp,
    /// End of sea passage.
    Eosp,
    /// Finished with engines.
    Fwe,
    Bunkering,
}

impl ReportType {
    pub const ALL: [ReportType; 7] = [
        ReportType::Noon,
        ReportType::Departure,
        ReportType::Arrival,
        ReportType::Cosp,
        ReportType::Eosp,
        ReportType::Fwe,
        ReportType::Bunkering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Noon => "NOON",
            ReportType::Departure => "DEPARTURE",
            ReportType::Arrival => "ARRIVAL",
            ReportType::Cosp => "COSP",
            ReportType::Eosp => "EOSP",
            ReportType::Fwe => "FWE",
            ReportType::Bunkering => "BUNKERING",
        }
    }

    /// Sea-passage reports carry distance, slip and engine performance fields.
    pub fn is_sea_passage(&self) -> bool {
        matches!(self, ReportType::Noon | ReportType::Cosp | ReportType::Eosp)
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let up = s.trim().to_uppercase();
        ReportType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == up)
            .ok_or_else(|| format!("unknown report type '{s}'"))
    }
}
