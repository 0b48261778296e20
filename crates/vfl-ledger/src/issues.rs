use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfl_catalog::Mt;
use vfl_registry::{ConsumerId, TankId};

/// Which submitted event an issue refers to (index within its list).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRef {
    /// The declared opening ROB block of the form.
    Opening,
    Consumption { index: usize },
    Bunkering { index: usize, bdn_number: String },
    Debunkering { index: usize },
    Transfer { index: usize },
    Correction { index: usize },
}

impl std::fmt::Display for EventRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => f.write_str("opening"),
            Self::Consumption { index } => write!(f, "consumption[{index}]"),
            Self::Bunkering { index, bdn_number } => write!(f, "bunkering[{index}] ({bdn_number})"),
            Self::Debunkering { index } => write!(f, "debunkering[{index}]"),
            Self::Transfer { index } => write!(f, "transfer[{index}]"),
            Self::Correction { index } => write!(f, "correction[{index}]"),
        }
    }
}

/// Severity class of a ledger issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueClass {
    /// Rejects the event; the period cannot be accepted.
    Structural,
    /// Warns or blocks per [`ConservationPolicy`].
    Conservation,
    /// Never blocks.
    Advisory,
}

/// Conservation issue kinds the policy can individually escalate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConservationKind {
    NegativeRob,
    CapacityExceeded,
    Discontinuity,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    #[default]
    Warn,
    Block,
}

/// Per-kind disposition of conservation issues.  Defaults to warn-only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConservationPolicy {
    pub negative_rob: Disposition,
    pub capacity_exceeded: Disposition,
    pub discontinuity: Disposition,
}

impl ConservationPolicy {
    /// Every conservation kind blocks acceptance.
    pub fn strict() -> Self {
        Self {
            negative_rob: Disposition::Block,
            capacity_exceeded: Disposition::Block,
            discontinuity: Disposition::Block,
        }
    }

    pub fn disposition(&self, kind: ConservationKind) -> Disposition {
        match kind {
            ConservationKind::NegativeRob => self.negative_rob,
            ConservationKind::CapacityExceeded => self.capacity_exceeded,
            ConservationKind::Discontinuity => self.discontinuity,
        }
    }
}

/// Ledger issue.  Reported in the outcome, never returned as `Err`.
///
/// Variant order is the diagnostic order: issues are sorted by it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerIssue {
    // --- structural ---
    UnknownTank {
        event: EventRef,
        tank: TankId,
    },
    UnknownConsumer {
        event: EventRef,
        consumer: ConsumerId,
    },
    UnknownGrade {
        event: EventRef,
        grade: String,
    },
    /// A grade-only consumption entry matched zero or several tanks.
    UnresolvedSource {
        event: EventRef,
        grade: Option<String>,
        candidates: usize,
    },
    InvalidQuantity {
        event: EventRef,
        quantity: Mt,
    },
    UnbalancedBunkering {
        event: EventRef,
        declared: Mt,
        allocated: Mt,
    },
    UnbalancedDebunkering {
        event: EventRef,
        declared: Mt,
        allocated: Mt,
    },
    UnbalancedTransfer {
        event: EventRef,
        net: Mt,
    },
    DuplicateCorrection {
        event: EventRef,
        tank: TankId,
    },

    // --- conservation ---
    OutOfOrder {
        last_accepted: DateTime<Utc>,
        submitted: DateTime<Utc>,
    },
    Discontinuity {
        tank: TankId,
        declared: Mt,
        expected: Mt,
    },
    NegativeRob {
        tank: TankId,
        closing: Mt,
    },
    CapacityExceeded {
        tank: TankId,
        closing: Mt,
        capacity: Mt,
    },

    // --- advisory ---
    SubConsumerOverdraw {
        consumer: ConsumerId,
        draw: Mt,
        sub_total: Mt,
    },
    GradeCommingled {
        event: EventRef,
        tank: TankId,
        held: String,
        delivered: String,
    },
}

impl LedgerIssue {
    pub fn class(&self) -> IssueClass {
        match self {
            Self::UnknownTank { .. }
            | Self::UnknownConsumer { .. }
            | Self::UnknownGrade { .. }
            | Self::UnresolvedSource { .. }
            | Self::InvalidQuantity { .. }
            | Self::UnbalancedBunkering { .. }
            | Self::UnbalancedDebunkering { .. }
            | Self::UnbalancedTransfer { .. }
            | Self::DuplicateCorrection { .. } => IssueClass::Structural,
            Self::OutOfOrder { .. }
            | Self::Discontinuity { .. }
            | Self::NegativeRob { .. }
            | Self::CapacityExceeded { .. } => IssueClass::Conservation,
            Self::SubConsumerOverdraw { .. } | Self::GradeCommingled { .. } => {
                IssueClass::Advisory
            }
        }
    }

    pub fn conservation_kind(&self) -> Option<ConservationKind> {
        match self {
            Self::Discontinuity { .. } => Some(ConservationKind::Discontinuity),
            Self::NegativeRob { .. } => Some(ConservationKind::NegativeRob),
            Self::CapacityExceeded { .. } => Some(ConservationKind::CapacityExceeded),
            _ => None,
        }
    }

    /// `true` if this issue prevents acceptance under `policy`.
    ///
    /// `OutOfOrder` blocks under every policy: the period store only takes
    /// strictly increasing report times per leg.
    pub fn blocks(&self, policy: &ConservationPolicy) -> bool {
        if matches!(self, Self::OutOfOrder { .. }) {
            return true;
        }
        match self.class() {
            IssueClass::Structural => true,
            IssueClass::Advisory => false,
            IssueClass::Conservation => self
                .conservation_kind()
                .is_some_and(|k| policy.disposition(k) == Disposition::Block),
        }
    }

    /// Stable machine code, e.g. `"UNBALANCED_BUNKERING"`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTank { .. } => "UNKNOWN_TANK",
            Self::UnknownConsumer { .. } => "UNKNOWN_CONSUMER",
            Self::UnknownGrade { .. } => "UNKNOWN_GRADE",
            Self::UnresolvedSource { .. } => "UNRESOLVED_SOURCE",
            Self::InvalidQuantity { .. } => "INVALID_QUANTITY",
            Self::UnbalancedBunkering { .. } => "UNBALANCED_BUNKERING",
            Self::UnbalancedDebunkering { .. } => "UNBALANCED_DEBUNKERING",
            Self::UnbalancedTransfer { .. } => "UNBALANCED_TRANSFER",
            Self::DuplicateCorrection { .. } => "DUPLICATE_CORRECTION",
            Self::OutOfOrder { .. } => "OUT_OF_ORDER",
            Self::Discontinuity { .. } => "DISCONTINUITY",
            Self::NegativeRob { .. } => "NEGATIVE_ROB",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::SubConsumerOverdraw { .. } => "SUB_CONSUMER_OVERDRAW",
            Self::GradeCommingled { .. } => "GRADE_COMMINGLED",
        }
    }

    /// The rejected event, for structural issues tied to one.
    pub fn rejected_event(&self) -> Option<&EventRef> {
        if self.class() != IssueClass::Structural {
            return None;
        }
        match self {
            Self::UnknownTank { event, .. }
            | Self::UnknownConsumer { event, .. }
            | Self::UnknownGrade { event, .. }
            | Self::UnresolvedSource { event, .. }
            | Self::InvalidQuantity { event, .. }
            | Self::UnbalancedBunkering { event, .. }
            | Self::UnbalancedDebunkering { event, .. }
            | Self::UnbalancedTransfer { event, .. }
            | Self::DuplicateCorrection { event, .. } => Some(event),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTank { event, tank } => write!(f, "{event}: unknown tank '{tank}'"),
            Self::UnknownConsumer { event, consumer } => {
                write!(f, "{event}: unknown consumer '{consumer}'")
            }
            Self::UnknownGrade { event, grade } => write!(f, "{event}: unknown grade '{grade}'"),
            Self::UnresolvedSource {
                event,
                grade,
                candidates,
            } => match grade {
                Some(g) => write!(
                    f,
                    "{event}: grade '{g}' matches {candidates} tanks, expected exactly one"
                ),
                None => write!(f, "{event}: entry names neither a tank nor a grade"),
            },
            Self::InvalidQuantity { event, quantity } => {
                write!(f, "{event}: invalid quantity {quantity} mt")
            }
            Self::UnbalancedBunkering {
                event,
                declared,
                allocated,
            } => write!(
                f,
                "{event}: allocations {allocated} mt != declared mass {declared} mt"
            ),
            Self::UnbalancedDebunkering {
                event,
                declared,
                allocated,
            } => write!(
                f,
                "{event}: allocations {allocated} mt != removed quantity {declared} mt"
            ),
            Self::UnbalancedTransfer { event, net } => {
                write!(f, "{event}: transfer legs net to {net} mt, expected 0")
            }
            Self::DuplicateCorrection { event, tank } => {
                write!(f, "{event}: second survey correction on tank '{tank}'")
            }
            Self::OutOfOrder {
                last_accepted,
                submitted,
            } => write!(
                f,
                "period at {submitted} is not after last accepted period at {last_accepted}"
            ),
            Self::Discontinuity {
                tank,
                declared,
                expected,
            } => write!(
                f,
                "tank '{tank}': declared opening {declared} mt != prior closing {expected} mt"
            ),
            Self::NegativeRob { tank, closing } => {
                write!(f, "tank '{tank}': closing ROB {closing} mt is negative")
            }
            Self::CapacityExceeded {
                tank,
                closing,
                capacity,
            } => write!(
                f,
                "tank '{tank}': closing ROB {closing} mt exceeds capacity {capacity} mt"
            ),
            Self::SubConsumerOverdraw {
                consumer,
                draw,
                sub_total,
            } => write!(
                f,
                "consumer '{consumer}': draw {draw} mt is below its sub-consumers' total {sub_total} mt"
            ),
            Self::GradeCommingled {
                event,
                tank,
                held,
                delivered,
            } => write!(
                f,
                "{event}: {delivered} delivered into tank '{tank}' still holding {held}"
            ),
        }
    }
}
