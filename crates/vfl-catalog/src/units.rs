//! Fixed-point mass type.
//!
//! # Motivation
//!
//! Every tank quantity in the ledger is a mass in metric tonnes.  Allocation
//! balance checks ("bunkered allocations sum exactly to the declared mass")
//! cannot be expressed reliably over `f64`: `49.7 + 0.3` is not `50.0`.  `Mt`
//! stores the mass as an `i64` count of grams (1e-6 tonne), so sums are exact
//! and a tolerance of zero means "balanced to the gram".
//!
//! # Scale
//!
//! 1 mt = `Mt::new(1_000_000)`.  Form payloads carry tonnes as JSON numbers;
//! they are rounded to the nearest gram on the way in (see
//! [`Mt::from_tonnes`]) and rendered back as tonnes on the way out.
//!
//! # Construction
//!
//! There is no `From<i64>` / `From<f64>`.  Use [`Mt::new`] for raw grams,
//! [`Mt::from_tonnes`] (or `TryFrom<f64>`) for decimal tonnes.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Grams per metric tonne.
pub const MT_SCALE: i64 = 1_000_000;

/// Largest decimal tonnage accepted from a form, in either sign.
pub const MAX_TONNES: f64 = 1e9;

// ---------------------------------------------------------------------------
// Mt newtype
// ---------------------------------------------------------------------------

/// A signed mass in metric tonnes at 1e-6 resolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Mt(i64);

impl Mt {
    /// Zero mass.
    pub const ZERO: Mt = Mt(0);

    /// Construct from a raw gram count.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Mt(raw)
    }

    /// Construct from a whole number of tonnes.
    #[inline]
    pub const fn whole(tonnes: i64) -> Self {
        Mt(tonnes.saturating_mul(MT_SCALE))
    }

    /// Round decimal tonnes to the nearest gram.
    ///
    /// Returns `None` for NaN, infinities and magnitudes above
    /// [`MAX_TONNES`].  The cap leaves sums of thousands of entries far
    /// inside the `i64` gram range.
    pub fn from_tonnes(tonnes: f64) -> Option<Mt> {
        if !tonnes.is_finite() || tonnes.abs() > MAX_TONNES {
            return None;
        }
        Some(Mt((tonnes * MT_SCALE as f64).round() as i64))
    }

    /// Underlying gram count.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Decimal tonnes (lossy above 2^53 grams, far beyond any tank).
    #[inline]
    pub fn tonnes(self) -> f64 {
        self.0 as f64 / MT_SCALE as f64
    }

    /// Saturating addition.
    #[inline]
    pub fn saturating_add(self, rhs: Mt) -> Mt {
        Mt(self.0.saturating_add(rhs.0))
    }

    /// Checked addition; `None` on overflow.
    #[inline]
    pub fn checked_add(self, rhs: Mt) -> Option<Mt> {
        self.0.checked_add(rhs.0).map(Mt)
    }

    /// Absolute value.  `i64::MIN` saturates.
    #[inline]
    pub fn abs(self) -> Mt {
        Mt(self.0.saturating_abs())
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `true` if `|self - other| <= tolerance`.
    pub fn within(self, other: Mt, tolerance: Mt) -> bool {
        (self.0 as i128 - other.0 as i128).abs() <= tolerance.0.unsigned_abs() as i128
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
//
// Operators saturate at the `i64` bounds instead of panicking.
// ---------------------------------------------------------------------------

impl Add for Mt {
    type Output = Mt;
    #[inline]
    fn add(self, rhs: Mt) -> Mt {
        Mt(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Mt {
    type Output = Mt;
    #[inline]
    fn sub(self, rhs: Mt) -> Mt {
        Mt(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Mt {
    type Output = Mt;
    #[inline]
    fn neg(self) -> Mt {
        Mt(self.0.saturating_neg())
    }
}

impl AddAssign for Mt {
    #[inline]
    fn add_assign(&mut self, rhs: Mt) {
        *self = *self + rhs;
    }
}

impl SubAssign for Mt {
    #[inline]
    fn sub_assign(&mut self, rhs: Mt) {
        *self = *self - rhs;
    }
}

impl Sum for Mt {
    fn sum<I: Iterator<Item = Mt>>(iter: I) -> Mt {
        iter.fold(Mt::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Mt> for Mt {
    fn sum<I: Iterator<Item = &'a Mt>>(iter: I) -> Mt {
        iter.copied().sum()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Rejected decimal tonnage.
#[derive(Clone, Debug, PartialEq)]
pub struct MtRangeError {
    pub tonnes: f64,
}

impl std::fmt::Display for MtRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mass {} t is not a finite tonnage within +/-{MAX_TONNES} t",
            self.tonnes
        )
    }
}

impl std::error::Error for MtRangeError {}

impl TryFrom<f64> for Mt {
    type Error = MtRangeError;

    fn try_from(tonnes: f64) -> Result<Self, Self::Error> {
        Mt::from_tonnes(tonnes).ok_or(MtRangeError { tonnes })
    }
}

impl From<Mt> for f64 {
    fn from(m: Mt) -> f64 {
        m.tonnes()
    }
}

impl std::fmt::Display for Mt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / MT_SCALE;
        let frac = (self.0 % MT_SCALE).abs();
        // -0.5 t truncates to whole == 0 and would lose its sign.
        if self.0 < 0 && whole == 0 {
            write!(f, "-{whole}.{frac:06}")
        } else {
            write!(f, "{whole}.{frac:06}")
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
