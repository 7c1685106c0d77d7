use alloy::primitives::{Sign, I256, U256};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The maximum number of fractional digits a [`Multiplier`] may carry.
pub const MAX_MULTIPLIER_DECIMALS: u8 = 4;

/// Errors produced while building a [`Multiplier`] or scaling by one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaleError {
    /// The multiplier has more fractional digits than supported.
    #[error(
        "multiplier {value} has {decimals} fractional digits, at most {MAX_MULTIPLIER_DECIMALS} are supported"
    )]
    Precision {
        /// The offending multiplier, as written.
        value: String,
        /// The number of significant fractional digits.
        decimals: usize,
    },
    /// The multiplier is not a decimal number.
    #[error("invalid multiplier: {0:?}")]
    Invalid(String),
    /// The scaled value does not fit in 256 bits.
    #[error("scaled value overflows 256 bits")]
    Overflow,
    /// An unsigned result was requested but the scaled value is negative.
    #[error("scaled value is negative")]
    Negative,
}

/// Rounding applied when the scaled product is not a whole number.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    /// Round half up.
    Round,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity. Fee math must never under-pay, so this
    /// is the default.
    #[default]
    Ceil,
}

/// An exact decimal multiplier with at most [`MAX_MULTIPLIER_DECIMALS`]
/// fractional digits.
///
/// The value is `mantissa / 10^decimals`. Trailing fractional zeros are not
/// significant, so `1.50` and `1.5` are the same multiplier.
///
/// ```
/// # use userop_types::Multiplier;
/// let m: Multiplier = "1.234".parse().unwrap();
/// assert_eq!(m.to_string(), "1.234");
/// assert!("1.23456".parse::<Multiplier>().is_err());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MultiplierRepr", into = "String")]
pub struct Multiplier {
    mantissa: i128,
    decimals: u8,
}

impl Multiplier {
    /// The identity multiplier.
    pub const ONE: Self = Self { mantissa: 1, decimals: 0 };

    /// The multiplier applied to the observed base fee when deriving
    /// `maxFeePerGas`.
    pub const BASE_FEE_BUFFER: Self = Self { mantissa: 15, decimals: 1 };

    /// The minimum bump a replacement operation must carry over the fees of
    /// the operation it replaces.
    pub const REPLACEMENT_BUMP: Self = Self { mantissa: 11, decimals: 1 };

    /// Create a multiplier worth `mantissa / 10^decimals`.
    pub fn new(mantissa: i128, decimals: u8) -> Result<Self, ScaleError> {
        let mut normalized = Self { mantissa, decimals };
        while normalized.decimals > 0 && normalized.mantissa % 10 == 0 {
            normalized.mantissa /= 10;
            normalized.decimals -= 1;
        }
        if normalized.decimals > MAX_MULTIPLIER_DECIMALS {
            return Err(ScaleError::Precision {
                value: normalized.to_string(),
                decimals: normalized.decimals as usize,
            });
        }
        Ok(normalized)
    }

    /// Create a whole-number multiplier.
    pub const fn from_integer(value: i64) -> Self {
        Self { mantissa: value as i128, decimals: 0 }
    }

    /// Get the mantissa.
    pub const fn mantissa(&self) -> i128 {
        self.mantissa
    }

    /// Get the number of significant fractional digits.
    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    /// True if the multiplier has no fractional part.
    pub const fn is_whole(&self) -> bool {
        self.decimals == 0
    }

    /// True if the multiplier is below zero.
    pub const fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// `10^decimals`.
    fn divisor(&self) -> U256 {
        U256::from(10u64).pow(U256::from(self.decimals))
    }

    /// The absolute value of the mantissa.
    fn magnitude(&self) -> U256 {
        U256::from(self.mantissa.unsigned_abs())
    }

    /// Scale `base` by this multiplier. See [`scale`].
    pub fn apply(&self, base: U256, mode: RoundingMode) -> Result<I256, ScaleError> {
        scale(base, *self, mode)
    }

    /// Scale `base` by this multiplier, requiring a non-negative result. See
    /// [`scale_unsigned`].
    pub fn apply_unsigned(&self, base: U256, mode: RoundingMode) -> Result<U256, ScaleError> {
        scale_unsigned(base, *self, mode)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = decimals + 1);
        let (int, frac) = padded.split_at(padded.len() - decimals);
        write!(f, "{sign}{int}.{frac}")
    }
}

impl FromStr for Multiplier {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScaleError::Invalid(s.to_string());

        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let frac = frac.trim_end_matches('0');
        if frac.len() > MAX_MULTIPLIER_DECIMALS as usize {
            return Err(ScaleError::Precision { value: s.to_string(), decimals: frac.len() });
        }

        let digits = format!("{int}{frac}");
        let digits = if digits.is_empty() { "0" } else { digits.as_str() };
        let magnitude: i128 = digits.parse().map_err(|_| invalid())?;
        let mantissa = if negative { -magnitude } else { magnitude };

        Self::new(mantissa, frac.len() as u8)
    }
}

impl TryFrom<f64> for Multiplier {
    type Error = ScaleError;

    /// Converts through the shortest decimal representation that round-trips
    /// to the same `f64`, so `1.1` becomes exactly `11 / 10`.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(ScaleError::Invalid(value.to_string()));
        }
        value.to_string().parse()
    }
}

impl From<Multiplier> for String {
    fn from(value: Multiplier) -> Self {
        value.to_string()
    }
}

/// Accepts either a decimal string or a JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum MultiplierRepr {
    Text(String),
    Number(f64),
}

impl TryFrom<MultiplierRepr> for Multiplier {
    type Error = ScaleError;

    fn try_from(value: MultiplierRepr) -> Result<Self, Self::Error> {
        match value {
            MultiplierRepr::Text(s) => s.parse(),
            MultiplierRepr::Number(n) => n.try_into(),
        }
    }
}

/// Multiply `base` by `multiplier` exactly, rounding the result according to
/// `mode`.
///
/// With `d` fractional digits the multiplier is applied as an integer
/// product followed by a division by `10^d`:
///
/// - [`RoundingMode::Round`]: `(product + 10^d / 2) / 10^d`, mirrored for
///   negative products (half away from zero)
/// - [`RoundingMode::Ceil`]: `(product + 10^d - 1) / 10^d` for non-negative
///   products, truncation for negative ones
/// - [`RoundingMode::Floor`]: truncation for non-negative products,
///   `(product - 10^d + 1) / 10^d` for negative ones
///
/// Division truncates toward zero throughout.
///
/// ```
/// # use alloy::primitives::{I256, U256};
/// # use userop_types::{scale, Multiplier, RoundingMode};
/// let m: Multiplier = "1.234".parse().unwrap();
/// let base = U256::from(100);
/// assert_eq!(scale(base, m, RoundingMode::Ceil).unwrap(), I256::try_from(124).unwrap());
/// assert_eq!(scale(base, m, RoundingMode::Round).unwrap(), I256::try_from(123).unwrap());
/// assert_eq!(scale(base, m, RoundingMode::Floor).unwrap(), I256::try_from(123).unwrap());
/// ```
pub fn scale(base: U256, multiplier: Multiplier, mode: RoundingMode) -> Result<I256, ScaleError> {
    let magnitude = base.checked_mul(multiplier.magnitude()).ok_or(ScaleError::Overflow)?;
    let divisor = multiplier.divisor();
    let half = divisor / U256::from(2);
    let negative = multiplier.is_negative() && !magnitude.is_zero();

    // All arithmetic happens on the magnitude of the product. Negative
    // products round half away from zero so that exact products stay exact.
    let quotient = match (negative, mode) {
        (_, RoundingMode::Round) => {
            magnitude.checked_add(half).ok_or(ScaleError::Overflow)? / divisor
        }
        (false, RoundingMode::Ceil) => {
            magnitude.checked_add(divisor - U256::from(1)).ok_or(ScaleError::Overflow)? / divisor
        }
        (false, RoundingMode::Floor) | (true, RoundingMode::Ceil) => magnitude / divisor,
        (true, RoundingMode::Floor) => {
            magnitude.checked_add(divisor - U256::from(1)).ok_or(ScaleError::Overflow)? / divisor
        }
    };

    let sign = if negative { Sign::Negative } else { Sign::Positive };
    I256::checked_from_sign_and_abs(sign, quotient).ok_or(ScaleError::Overflow)
}

/// [`scale`], for callers that need an unsigned result such as a gas or fee
/// value.
pub fn scale_unsigned(
    base: U256,
    multiplier: Multiplier,
    mode: RoundingMode,
) -> Result<U256, ScaleError> {
    let scaled = scale(base, multiplier, mode)?;
    if scaled.is_negative() {
        return Err(ScaleError::Negative);
    }
    Ok(scaled.into_raw())
}

/// The larger of two values.
pub fn bigint_max(a: U256, b: U256) -> U256 {
    a.max(b)
}

/// Clamp `value` into `[min, max]`, each bound optional.
pub fn clamp(value: U256, min: Option<U256>, max: Option<U256>) -> U256 {
    let value = min.map_or(value, |min| value.max(min));
    max.map_or(value, |max| value.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(s: &str) -> Multiplier {
        s.parse().unwrap()
    }

    fn i(v: i64) -> I256 {
        I256::try_from(v).unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(m("1.5"), Multiplier::BASE_FEE_BUFFER);
        assert_eq!(m("1.10"), Multiplier::REPLACEMENT_BUMP);
        assert_eq!(m("2"), Multiplier::from_integer(2));
        assert_eq!(m("-0.05").to_string(), "-0.05");
        assert_eq!(m(".5").to_string(), "0.5");
        assert_eq!(m("3.0000000").to_string(), "3");
        assert!(matches!("abc".parse::<Multiplier>(), Err(ScaleError::Invalid(_))));
        assert!(matches!("".parse::<Multiplier>(), Err(ScaleError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Multiplier>(), Err(ScaleError::Invalid(_))));
    }

    #[test]
    fn too_many_decimals_is_a_precision_error() {
        let err = "1.23456".parse::<Multiplier>().unwrap_err();
        assert_eq!(err, ScaleError::Precision { value: "1.23456".to_string(), decimals: 5 });
        assert!(Multiplier::new(123456, 5).is_err());
        assert!(Multiplier::try_from(0.00001).is_err());
    }

    #[test]
    fn from_float_is_exact() {
        assert_eq!(Multiplier::try_from(1.1).unwrap(), Multiplier::REPLACEMENT_BUMP);
        assert_eq!(Multiplier::try_from(0.1234).unwrap(), m("0.1234"));
        assert!(Multiplier::try_from(f64::NAN).is_err());
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let a: Multiplier = serde_json::from_str("\"1.25\"").unwrap();
        let b: Multiplier = serde_json::from_str("1.25").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"1.25\"");
        assert!(serde_json::from_str::<Multiplier>("1.23456").is_err());
    }

    #[test]
    fn scale_reference_values() {
        let base = U256::from(100);
        assert_eq!(scale(base, m("1.234"), RoundingMode::Ceil).unwrap(), i(124));
        assert_eq!(scale(base, m("1.234"), RoundingMode::Round).unwrap(), i(123));
        assert_eq!(scale(base, m("1.234"), RoundingMode::Floor).unwrap(), i(123));
        assert_eq!(scale(base, m("1.235"), RoundingMode::Round).unwrap(), i(124));
    }

    #[test]
    fn whole_and_zero_multipliers() {
        let base = U256::from(7);
        for mode in [RoundingMode::Round, RoundingMode::Floor, RoundingMode::Ceil] {
            assert_eq!(scale(base, m("3"), mode).unwrap(), i(21));
            assert_eq!(scale(base, m("0"), mode).unwrap(), I256::ZERO);
            assert_eq!(scale(U256::ZERO, m("-1.5"), mode).unwrap(), I256::ZERO);
        }
    }

    #[test]
    fn negative_multipliers() {
        // 100 * -1.234 = -123.4
        let base = U256::from(100);
        assert_eq!(scale(base, m("-1.234"), RoundingMode::Ceil).unwrap(), i(-123));
        assert_eq!(scale(base, m("-1.234"), RoundingMode::Floor).unwrap(), i(-124));
        assert_eq!(scale(base, m("-1.234"), RoundingMode::Round).unwrap(), i(-123));
        assert_eq!(scale(base, m("-1.235"), RoundingMode::Round).unwrap(), i(-124));
        assert_eq!(scale(base, m("-1.23"), RoundingMode::Round).unwrap(), i(-123));
        // -0.3 rounds to zero
        assert_eq!(scale(U256::from(3), m("-0.1"), RoundingMode::Round).unwrap(), I256::ZERO);
        assert_eq!(
            scale_unsigned(base, m("-1"), RoundingMode::Ceil).unwrap_err(),
            ScaleError::Negative
        );
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(scale(U256::MAX, m("2"), RoundingMode::Ceil).unwrap_err(), ScaleError::Overflow);
        assert_eq!(
            scale_unsigned(U256::MAX, m("1"), RoundingMode::Floor).unwrap_err(),
            ScaleError::Overflow
        );
    }

    #[test]
    fn clamp_bounds() {
        let v = U256::from(50);
        assert_eq!(clamp(v, Some(U256::from(60)), None), U256::from(60));
        assert_eq!(clamp(v, None, Some(U256::from(40))), U256::from(40));
        assert_eq!(clamp(v, None, None), v);
        assert_eq!(bigint_max(v, U256::from(51)), U256::from(51));
    }

    proptest! {
        #[test]
        fn ceil_round_floor_are_ordered(
            base in any::<u128>(),
            mantissa in -1_000_000i128..1_000_000,
            decimals in 0u8..=4,
        ) {
            let Ok(multiplier) = Multiplier::new(mantissa, decimals) else {
                return Ok(());
            };
            let base = U256::from(base);
            let ceil = scale(base, multiplier, RoundingMode::Ceil).unwrap();
            let round = scale(base, multiplier, RoundingMode::Round).unwrap();
            let floor = scale(base, multiplier, RoundingMode::Floor).unwrap();
            prop_assert!(ceil >= round);
            prop_assert!(round >= floor);

            let product = base * U256::from(mantissa.unsigned_abs());
            if product % U256::from(10u64).pow(U256::from(decimals)) == U256::ZERO {
                prop_assert_eq!(ceil, floor);
            }
        }
    }
}
