//! Pence - Non-negative integer wrapper for monetary amounts
//!
//! All monetary amounts in TipJar are integer pence (the smallest
//! currency unit). Floating point never touches money, and negative
//! amounts are rejected at the type level.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when working with amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(i64),
}

/// A non-negative amount of money in pence.
///
/// # Invariant
/// The inner value is always >= 0. This is enforced by the constructor.
///
/// # Example
/// ```
/// use tipjar_core::Pence;
///
/// let amount = Pence::new(300).unwrap();
/// assert_eq!(amount.value(), 300);
///
/// // Negative amounts are rejected
/// assert!(Pence::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Pence(i64);

impl Pence {
    /// Zero amount constant
    pub const ZERO: Self = Self(0);

    /// Create a new Pence amount.
    ///
    /// Returns an error if the value is negative.
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value < 0 {
            Err(AmountError::NegativeAmount(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Create a Pence amount without validation.
    ///
    /// # Safety
    /// The caller MUST ensure the value is non-negative.
    /// Use only for trusted sources (e.g., values read back from validated storage).
    #[inline]
    pub const fn new_unchecked(value: i64) -> Self {
        Self(value)
    }

    /// Get the inner pence value
    #[inline]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Check if the amount is zero
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition - returns None on overflow
    pub fn checked_add(&self, other: Pence) -> Option<Pence> {
        self.0.checked_add(other.0).map(Pence)
    }

    /// Checked subtraction - returns None if the result would be negative
    pub fn checked_sub(&self, other: Pence) -> Option<Pence> {
        let result = self.0.checked_sub(other.0)?;
        if result < 0 {
            None
        } else {
            Some(Pence(result))
        }
    }

    /// Percentage share of this amount, rounded half away from zero.
    ///
    /// Used for ownership splits: `Pence::new(300)?.percentage(50)` is 150,
    /// `Pence::new(101)?.percentage(50)` is 51. The intermediate product is
    /// computed in i128 and the result saturates at `i64::MAX`, so no input
    /// can overflow into a negative amount.
    pub fn percentage(&self, percent: u8) -> Pence {
        let share = (i128::from(self.0) * i128::from(percent) + 50) / 100;
        Pence(i64::try_from(share).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Pence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

impl TryFrom<i64> for Pence {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Pence> for i64 {
    fn from(amount: Pence) -> Self {
        amount.0
    }
}

impl Default for Pence {
    fn default() -> Self {
        Self::ZERO
    }
}

/// A non-negative reward-point balance.
///
/// TuneBytes are a secondary loyalty balance tracked alongside money.
/// They are not pence and must never be mixed with `Pence` arithmetic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TuneBytes(i64);

impl TuneBytes {
    /// Zero balance constant
    pub const ZERO: Self = Self(0);

    /// Create a TuneBytes balance.
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value < 0 {
            Err(AmountError::NegativeAmount(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Create a TuneBytes balance without validation.
    #[inline]
    pub const fn new_unchecked(value: i64) -> Self {
        Self(value)
    }

    /// Get the inner point value
    #[inline]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Checked addition - returns None on overflow
    pub fn checked_add(&self, other: TuneBytes) -> Option<TuneBytes> {
        self.0.checked_add(other.0).map(TuneBytes)
    }

    /// Checked subtraction - returns None if the result would be negative
    pub fn checked_sub(&self, other: TuneBytes) -> Option<TuneBytes> {
        let result = self.0.checked_sub(other.0)?;
        if result < 0 {
            None
        } else {
            Some(TuneBytes(result))
        }
    }
}

impl fmt::Display for TuneBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} TB", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pence_positive() {
        let amount = Pence::new(100).unwrap();
        assert_eq!(amount.value(), 100);
    }

    #[test]
    fn test_pence_zero() {
        let amount = Pence::new(0).unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_pence_negative_rejected() {
        let result = Pence::new(-100);
        assert!(matches!(result, Err(AmountError::NegativeAmount(-100))));
    }

    #[test]
    fn test_checked_sub_prevents_negative() {
        let a = Pence::new(50).unwrap();
        let b = Pence::new(100).unwrap();
        assert!(a.checked_sub(b).is_none());
    }

    #[test]
    fn test_checked_sub_success() {
        let a = Pence::new(100).unwrap();
        let b = Pence::new(30).unwrap();
        assert_eq!(a.checked_sub(b).unwrap().value(), 70);
    }

    #[test]
    fn test_percentage_exact() {
        let tip = Pence::new(300).unwrap();
        assert_eq!(tip.percentage(50).value(), 150);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let tip = Pence::new(101).unwrap();
        assert_eq!(tip.percentage(50).value(), 51);
        assert_eq!(tip.percentage(0).value(), 0);
        assert_eq!(tip.percentage(100).value(), 101);
    }

    #[test]
    fn test_percentage_never_goes_negative_on_extremes() {
        let huge = Pence::new(i64::MAX).unwrap();
        assert_eq!(huge.percentage(100).value(), i64::MAX);
        assert_eq!(huge.percentage(255).value(), i64::MAX);
        assert!(huge.percentage(1).value() > 0);
    }

    #[test]
    fn test_serde_roundtrip() {
        let amount = Pence::new(12345).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "12345");
        let parsed: Pence = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, parsed);
    }

    #[test]
    fn test_serde_rejects_negative() {
        let parsed: Result<Pence, _> = serde_json::from_str("-5");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_tune_bytes_checked_sub() {
        let a = TuneBytes::new(10).unwrap();
        let b = TuneBytes::new(4).unwrap();
        assert_eq!(a.checked_sub(b).unwrap().value(), 6);
        assert!(b.checked_sub(a).is_none());
    }
}
