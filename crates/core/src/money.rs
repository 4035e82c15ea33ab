//! Money and payment-mode value objects.
//!
//! Amounts are whole paise (1/100 of a rupee) in an `i64`. Nothing in the
//! ledger uses floating point.
//!
//! A single ledger line is capped at [`Money::MAX_LINE`]. Aggregates also
//! check their running totals with [`Money::try_add`], so an accepted history
//! always rehydrates. The arithmetic operators saturate at the `i64` bounds
//! and never wrap.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Signed amount in paise.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest amount one ledger line may carry: ₹10 lakh crore (10^15 paise).
    pub const MAX_LINE: Money = Money(1_000_000_000_000_000);

    pub const fn from_paise(paise: i64) -> Self {
        Self(paise)
    }

    /// Whole rupees; `None` when the paise count does not fit in an `i64`.
    pub const fn from_rupees(rupees: i64) -> Option<Self> {
        match rupees.checked_mul(100) {
            Some(paise) => Some(Self(paise)),
            None => None,
        }
    }

    pub const fn paise(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Validates the amount of one ledger line: positive and at most
    /// [`Money::MAX_LINE`].
    pub fn ensure_line_amount(self, what: &str) -> Result<Money, DomainError> {
        if !self.is_positive() {
            return Err(DomainError::validation(format!("{what} must be positive")));
        }
        self.ensure_within_line_limit(what)
    }

    /// Like [`Money::ensure_line_amount`] but zero and negatives pass.
    pub fn ensure_within_line_limit(self, what: &str) -> Result<Money, DomainError> {
        if self > Money::MAX_LINE {
            return Err(DomainError::validation(format!(
                "{what} exceeds the per-line limit of {}",
                Money::MAX_LINE
            )));
        }
        Ok(self)
    }

    /// `self + other` for a running total; overflow is an invariant violation.
    pub fn try_add(self, other: Money, total: &str) -> Result<Money, DomainError> {
        self.checked_add(other)
            .ok_or_else(|| DomainError::invariant(format!("{total} would overflow")))
    }

    /// `self * numerator / denominator`, rounded half away from zero.
    ///
    /// Returns `None` when `denominator` is zero or the result overflows.
    pub fn mul_div(self, numerator: i64, denominator: i64) -> Option<Money> {
        let q = round_div(self.0 as i128 * numerator as i128, denominator as i128)?;
        i64::try_from(q).ok().map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

/// Renders as rupees with two decimals, e.g. `1250.05` or `-0.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parses `"1250"`, `"1250.5"`, `"-12.05"`. More than two fractional
    /// digits is rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let invalid = || DomainError::validation(format!("invalid amount: '{s}'"));

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let rupees: i64 = whole.parse().map_err(|_| invalid())?;
        let paise: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let total = rupees
            .checked_mul(100)
            .and_then(|r| r.checked_add(paise))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -total } else { total }))
    }
}

/// How money physically moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Bank,
    Upi,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 3] = [PaymentMode::Cash, PaymentMode::Bank, PaymentMode::Upi];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Bank => "bank",
            PaymentMode::Upi => "upi",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "bank" => Ok(PaymentMode::Bank),
            "upi" => Ok(PaymentMode::Upi),
            other => Err(DomainError::validation(format!(
                "payment mode must be one of: cash, bank, upi (got '{other}')"
            ))),
        }
    }
}

/// `part / whole` in basis points (1% = 100), rounded half away from zero.
///
/// `None` when `whole` is zero.
pub fn basis_points(part: Money, whole: Money) -> Option<i64> {
    let q = round_div(part.0 as i128 * 10_000, whole.0 as i128)?;
    i64::try_from(q).ok()
}

fn round_div(num: i128, den: i128) -> Option<i128> {
    if den == 0 {
        return None;
    }
    let q = num / den;
    let r = num % den;
    if 2 * r.abs() >= den.abs() {
        let sign = if (num < 0) != (den < 0) { -1 } else { 1 };
        Some(q + sign)
    } else {
        Some(q)
    }
}
