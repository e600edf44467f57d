//! Arbitrary-precision fixed-point decimals.
//!
//! A [`DecimalValue`] is `digits × 10^exponent` with an unbounded integer
//! digit component. Values are never normalized implicitly, so the scale of
//! a parsed literal survives arithmetic until it is explicitly truncated.
//!
//! Parsed literals carry an exponent within ±[`MAX_EXPONENT`]. Arithmetic that
//! would need to align exponents further apart than `u32::MAX` digits fails
//! with [`LiquidityError::InvalidArgument`] instead of wrapping.

use std::{
    cmp::Ordering,
    fmt,
    ops::Neg,
    str::FromStr,
};

use bigdecimal::{
    num_bigint::{BigInt, BigUint, Sign},
    num_traits::Pow,
    BigDecimal,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{LiquidityError, Result},
    utils::constants::DIVISION_PRECISION,
};

#[derive(Debug, Clone, Default)]
pub struct DecimalValue {
    digits: BigInt,
    exponent: i64,
}

/// Largest absolute exponent accepted from a decimal literal
pub const MAX_EXPONENT: i64 = 10_000;

fn exponent_out_of_range() -> LiquidityError {
    LiquidityError::InvalidArgument("decimal exponent out of range".to_string())
}

/// `10^n` as a big integer
fn ten_pow(n: u64) -> Result<BigInt> {
    let n = u32::try_from(n).map_err(|_| exponent_out_of_range())?;
    Ok(BigInt::from(10u8).pow(n))
}

impl DecimalValue {
    pub fn new(digits: impl Into<BigInt>, exponent: i64) -> Self {
        Self {
            digits: digits.into(),
            exponent,
        }
    }

    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Parses a decimal literal such as `"0.007"`, `"-12"` or `"1.5e3"`.
    ///
    /// The literal's scale is kept: `"0.70"` has digits `70` and exponent `-2`.
    pub fn from_decimal_string(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(LiquidityError::Parse("empty decimal string".to_string()));
        }

        let parsed = BigDecimal::from_str(value)
            .map_err(|e| LiquidityError::Parse(format!("{value:?} is not a decimal: {e}")))?;

        let parsed = Self::from(parsed);
        if parsed.exponent.unsigned_abs() > MAX_EXPONENT.unsigned_abs() {
            return Err(LiquidityError::Parse(format!(
                "{value:?} has an exponent beyond ±{MAX_EXPONENT}"
            )));
        }
        Ok(parsed)
    }

    pub fn digits(&self) -> &BigInt {
        &self.digits
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.digits.sign() == Sign::NoSign
    }

    pub fn is_negative(&self) -> bool {
        self.digits.sign() == Sign::Minus
    }

    /// Same digits and same exponent, as opposed to `==` which compares values
    pub fn is_identical(&self, other: &Self) -> bool {
        self.exponent == other.exponent && self.digits == other.digits
    }

    /// Number of decimal digits in the digit component (zero counts as one digit)
    pub fn significant_digits(&self) -> u64 {
        self.digits.magnitude().to_string().len() as u64
    }

    /// Drops the `n` lowest digits and raises the exponent by `n`.
    ///
    /// This is lossy: the dropped digits are discarded, not rounded. The digit
    /// component is divided toward zero.
    pub fn truncate(&self, n: i32) -> Result<Self> {
        let n = u64::try_from(n).map_err(|_| {
            LiquidityError::InvalidArgument(format!("cannot truncate {n} digits"))
        })?;
        self.drop_digits(n)
    }

    fn drop_digits(&self, n: u64) -> Result<Self> {
        if n == 0 {
            return Ok(self.clone());
        }
        let exponent = i64::try_from(n)
            .ok()
            .and_then(|n| self.exponent.checked_add(n))
            .ok_or_else(exponent_out_of_range)?;
        Ok(Self {
            digits: &self.digits / ten_pow(n)?,
            exponent,
        })
    }

    /// Removes trailing zero digits, raising the exponent accordingly.
    pub fn normalized(&self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }

        let ten = BigInt::from(10u8);
        let mut digits = self.digits.clone();
        let mut exponent = self.exponent;
        while (&digits % &ten).sign() == Sign::NoSign {
            digits /= &ten;
            exponent += 1;
        }
        Self { digits, exponent }
    }

    /// Divides with the default precision of [`DIVISION_PRECISION`] significant digits.
    pub fn checked_div(&self, divisor: &Self) -> Result<Self> {
        self.checked_div_with_precision(divisor, DIVISION_PRECISION)
    }

    /// Divides keeping `precision` significant digits; further digits are truncated
    /// and trailing zeros stripped from the quotient.
    pub fn checked_div_with_precision(&self, divisor: &Self, precision: u64) -> Result<Self> {
        if precision == 0 {
            return Err(LiquidityError::InvalidArgument(
                "division precision must be positive".to_string(),
            ));
        }
        if divisor.is_zero() {
            return Err(LiquidityError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }

        // Scale the dividend so the integer quotient carries at least `precision + 1` digits
        let shift = (precision + divisor.significant_digits() + 1)
            .saturating_sub(self.significant_digits());
        let digits = (&self.digits * ten_pow(shift)?) / &divisor.digits;
        let exponent = i64::try_from(shift)
            .ok()
            .and_then(|shift| {
                self.exponent
                    .checked_sub(divisor.exponent)?
                    .checked_sub(shift)
            })
            .ok_or_else(exponent_out_of_range)?;
        let quotient = Self::new(digits, exponent);

        let excess = quotient.significant_digits().saturating_sub(precision);
        Ok(quotient.drop_digits(excess)?.normalized())
    }

    /// Exact sum, expressed at the smaller of the two exponents
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        let exponent = self.exponent.min(other.exponent);
        Ok(Self::new(
            self.digits_at(exponent)? + other.digits_at(exponent)?,
            exponent,
        ))
    }

    /// Exact difference, expressed at the smaller of the two exponents
    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        let exponent = self.exponent.min(other.exponent);
        Ok(Self::new(
            self.digits_at(exponent)? - other.digits_at(exponent)?,
            exponent,
        ))
    }

    /// Exact product; the exponents add up
    pub fn checked_mul(&self, other: &Self) -> Result<Self> {
        let exponent = self
            .exponent
            .checked_add(other.exponent)
            .ok_or_else(exponent_out_of_range)?;
        Ok(Self::new(&self.digits * &other.digits, exponent))
    }

    /// Digit component expressed at `exponent`, which must not exceed `self.exponent`
    fn digits_at(&self, exponent: i64) -> Result<BigInt> {
        let gap = self
            .exponent
            .checked_sub(exponent)
            .and_then(|gap| u64::try_from(gap).ok())
            .ok_or_else(exponent_out_of_range)?;
        if gap == 0 {
            Ok(self.digits.clone())
        } else {
            Ok(&self.digits * ten_pow(gap)?)
        }
    }

    /// Compares absolute values without aligning exponents that are far apart
    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        let (left, right) = (self.digits.magnitude(), other.digits.magnitude());
        let left_len = left.to_string().len();
        let right_len = right.to_string().len();

        // Position of the leading digit decides unless both lead at the same place
        let left_lead = i128::from(self.exponent) + left_len as i128;
        let right_lead = i128::from(other.exponent) + right_len as i128;
        if left_lead != right_lead {
            return left_lead.cmp(&right_lead);
        }

        let ten = BigUint::from(10u8);
        match left_len.cmp(&right_len) {
            Ordering::Less => (left * Pow::pow(ten, right_len - left_len)).cmp(right),
            Ordering::Greater => left.cmp(&(right * Pow::pow(ten, left_len - right_len))),
            Ordering::Equal => left.cmp(right),
        }
    }
}

impl From<BigDecimal> for DecimalValue {
    fn from(value: BigDecimal) -> Self {
        let (digits, scale) = value.into_bigint_and_exponent();
        Self::new(digits, -scale)
    }
}

impl From<DecimalValue> for BigDecimal {
    fn from(value: DecimalValue) -> Self {
        BigDecimal::new(value.digits, -value.exponent)
    }
}

impl From<&DecimalValue> for BigDecimal {
    fn from(value: &DecimalValue) -> Self {
        BigDecimal::new(value.digits.clone(), -value.exponent)
    }
}

impl From<i64> for DecimalValue {
    fn from(value: i64) -> Self {
        Self::new(value, 0)
    }
}

impl From<u64> for DecimalValue {
    fn from(value: u64) -> Self {
        Self::new(value, 0)
    }
}

impl FromStr for DecimalValue {
    type Err = LiquidityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_decimal_string(s)
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.digits.magnitude().to_string();
        let sign = if self.is_negative() { "-" } else { "" };

        if self.exponent >= 0 {
            let zeros = if self.is_zero() { 0 } else { self.exponent as usize };
            return write!(f, "{sign}{magnitude}{}", "0".repeat(zeros));
        }

        let scale = self.exponent.unsigned_abs() as usize;
        if magnitude.len() > scale {
            let (integer, fraction) = magnitude.split_at(magnitude.len() - scale);
            write!(f, "{sign}{integer}.{fraction}")
        } else {
            write!(f, "{sign}0.{}{magnitude}", "0".repeat(scale - magnitude.len()))
        }
    }
}

impl PartialEq for DecimalValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DecimalValue {}

impl PartialOrd for DecimalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecimalValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_sign = self.digits.sign().cmp(&other.digits.sign());
        if by_sign != Ordering::Equal || self.is_zero() {
            return by_sign;
        }

        let by_magnitude = self.cmp_magnitude(other);
        if self.is_negative() {
            by_magnitude.reverse()
        } else {
            by_magnitude
        }
    }
}

impl Neg for DecimalValue {
    type Output = DecimalValue;

    fn neg(self) -> DecimalValue {
        DecimalValue::new(-self.digits, self.exponent)
    }
}

impl Serialize for DecimalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DecimalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        DecimalValue::from_decimal_string(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> DecimalValue {
        value.parse().unwrap()
    }

    #[test]
    fn test_parse_keeps_literal_scale() {
        let value = dec("0.70");
        assert_eq!(value.digits(), &BigInt::from(70));
        assert_eq!(value.exponent(), -2);

        let value = dec("-12");
        assert_eq!(value.digits(), &BigInt::from(-12));
        assert_eq!(value.exponent(), 0);

        let value = dec("1.5e3");
        assert_eq!(value, DecimalValue::from(1500i64));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for input in ["", "abc", "1.2.3", "--1", "0x10"] {
            assert!(
                matches!(DecimalValue::from_decimal_string(input), Err(LiquidityError::Parse(_))),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_truncate_drops_digits_and_raises_exponent() {
        let cases: [(i64, i64, i32); 5] = [
            (123456789, -9, 3),
            (7000000000000000, -18, 15),
            (99, 0, 1),
            (5, -2, 4),
            (1000, 3, 2),
        ];

        for (digits, exponent, n) in cases {
            let value = DecimalValue::new(digits, exponent);
            let truncated = value.truncate(n).unwrap();

            let expected_digits = BigInt::from(digits) / BigInt::from(10u8).pow(n as u32);
            assert_eq!(truncated.digits(), &expected_digits);
            assert_eq!(truncated.exponent(), exponent + n as i64);
        }
    }

    #[test]
    fn test_truncate_zero_is_identity() {
        let value = dec("3.14159");
        assert!(value.truncate(0).unwrap().is_identical(&value));
    }

    #[test]
    fn test_truncate_does_not_mutate_the_original() {
        let value = dec("0.123456");
        let _ = value.truncate(3).unwrap();
        assert!(value.is_identical(&dec("0.123456")));
    }

    #[test]
    fn test_truncate_is_lossy_not_rounding() {
        let truncated = dec("0.129").truncate(1).unwrap();
        assert_eq!(truncated, dec("0.12"));
    }

    #[test]
    fn test_truncate_negative_amount_is_invalid() {
        assert!(matches!(
            dec("1.5").truncate(-1),
            Err(LiquidityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_add_and_sub_align_exponents() {
        let sum = dec("0.7").checked_add(&dec("5.1")).unwrap();
        assert_eq!(sum, dec("5.8"));

        let sum = dec("1").checked_add(&dec("0.001")).unwrap();
        assert_eq!(sum.exponent(), -3);
        assert_eq!(sum.digits(), &BigInt::from(1001));

        let difference = dec("0.7").checked_sub(&dec("5.1")).unwrap();
        assert_eq!(difference, dec("-4.4"));
    }

    #[test]
    fn test_mul_sums_exponents() {
        let product = dec("100").checked_mul(&dec("0.007")).unwrap();
        assert_eq!(product.exponent(), -3);
        assert_eq!(product.digits(), &BigInt::from(700));
        assert_eq!(product, dec("0.7"));
    }

    #[test]
    fn test_div_by_zero_fails() {
        assert!(matches!(
            dec("1").checked_div(&dec("0.000")),
            Err(LiquidityError::DivisionByZero)
        ));
    }

    #[test]
    fn test_div_exact_and_repeating() {
        assert_eq!(dec("100").checked_div(&dec("4")).unwrap(), dec("25"));
        assert_eq!(dec("0").checked_div(&dec("4")).unwrap(), DecimalValue::zero());

        let third = dec("1").checked_div(&dec("3")).unwrap();
        assert_eq!(third.significant_digits(), DIVISION_PRECISION);
        assert_eq!(third.to_string(), format!("0.{}", "3".repeat(34)));

        let two_thirds = dec("2").checked_div_with_precision(&dec("3"), 5).unwrap();
        assert_eq!(two_thirds.to_string(), "0.66666");
    }

    #[test]
    fn test_display_plain_notation() {
        assert_eq!(DecimalValue::new(7, -3).to_string(), "0.007");
        assert_eq!(DecimalValue::new(-46, -1).to_string(), "-4.6");
        assert_eq!(DecimalValue::new(15, 2).to_string(), "1500");
        assert_eq!(DecimalValue::new(0, -2).to_string(), "0.00");
        assert_eq!(DecimalValue::new(0, 4).to_string(), "0");
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert_eq!(dec("1.0"), dec("1.00"));
        assert!(!dec("1.0").is_identical(&dec("1.00")));
        assert!(dec("0.0022") < dec("0.007"));
        assert!(dec("-1") < DecimalValue::zero());
    }

    #[test]
    fn test_parse_rejects_exponents_out_of_range() {
        for input in ["1e4294967296", "1e10001", "1e-10001", "0.5e-9223372036854775807"] {
            assert!(
                matches!(DecimalValue::from_decimal_string(input), Err(LiquidityError::Parse(_))),
                "{input:?} should not parse"
            );
        }
        assert_eq!(dec("1e10000").exponent(), 10_000);
        assert_eq!(dec("1e-10000").exponent(), -10_000);
    }

    #[test]
    fn test_far_apart_exponents_never_wrap() {
        let huge = DecimalValue::new(1, 1i64 << 32);
        let tiny = DecimalValue::new(1, -(1i64 << 32));
        let one = DecimalValue::from(1i64);

        assert!(huge > one);
        assert!(tiny < one);
        assert!(tiny > DecimalValue::zero());
        assert!(-huge.clone() < -one.clone());
        assert!(matches!(
            huge.checked_add(&one),
            Err(LiquidityError::InvalidArgument(_))
        ));
        assert!(matches!(
            one.checked_sub(&tiny),
            Err(LiquidityError::InvalidArgument(_))
        ));
        assert!(matches!(
            DecimalValue::new(1, i64::MAX).checked_mul(&DecimalValue::new(1, 1)),
            Err(LiquidityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_ordering_with_equal_leading_position() {
        assert!(dec("12.5") > dec("12.49"));
        assert!(dec("-12.5") < dec("-12.49"));
        assert_eq!(DecimalValue::new(1200, -2), DecimalValue::new(12, 0));
        assert!(DecimalValue::new(1201, -2) > DecimalValue::new(12, 0));
    }

    #[test]
    fn test_bigdecimal_round_trip_keeps_scale() {
        let value = dec("0.102");
        let stored: BigDecimal = (&value).into();
        assert!(DecimalValue::from(stored).is_identical(&value));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&dec("0.007")).unwrap();
        assert_eq!(json, "\"0.007\"");
        let back: DecimalValue = serde_json::from_str("\"-2.50\"").unwrap();
        assert!(back.is_identical(&DecimalValue::new(-250, -2)));
        assert!(serde_json::from_str::<DecimalValue>("\"nope\"").is_err());
    }
}
