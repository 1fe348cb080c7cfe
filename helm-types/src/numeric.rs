use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    /// Unsigned 256-bit integer, four little-endian u64 limbs.
    pub struct U256(4);
}

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = String::deserialize(deserializer)?;
        U256::from_dec_str(&repr).map_err(de::Error::custom)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseI256Error {
    #[error("invalid decimal string")]
    InvalidDigits,
    #[error("value out of range for I256")]
    OutOfRange,
}

/// Signed 256-bit integer in two's-complement representation over [U256].
///
/// Only the operations the compiler itself performs are provided: constant
/// construction, comparison, and the checked stepping arithmetic used by
/// loop unrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct I256(U256);

fn twos_negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn flip_sign(value: U256) -> U256 {
    value ^ (U256::one() << 255)
}

impl I256 {
    pub fn zero() -> Self {
        I256(U256::zero())
    }

    pub fn from_raw(bits: U256) -> Self {
        I256(bits)
    }

    pub fn to_raw(self) -> U256 {
        self.0
    }

    pub fn from_i128(value: i128) -> Self {
        if value >= 0 {
            I256(U256::from(value as u128))
        } else {
            I256(twos_negate(U256::from(value.unsigned_abs())))
        }
    }

    /// Builds a value from a sign and a magnitude, rejecting magnitudes that
    /// do not fit the two's-complement range.
    pub fn from_magnitude(negative: bool, magnitude: U256) -> Result<Self, ParseI256Error> {
        let sign_bound = U256::one() << 255;
        if negative {
            if magnitude > sign_bound {
                return Err(ParseI256Error::OutOfRange);
            }
            Ok(I256(twos_negate(magnitude)))
        } else {
            if magnitude >= sign_bound {
                return Err(ParseI256Error::OutOfRange);
            }
            Ok(I256(magnitude))
        }
    }

    pub fn from_dec_str(repr: &str) -> Result<Self, ParseI256Error> {
        let (negative, digits) = match repr.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, repr),
        };
        let magnitude =
            U256::from_dec_str(digits).map_err(|_| ParseI256Error::InvalidDigits)?;
        Self::from_magnitude(negative, magnitude)
    }

    pub fn is_negative(&self) -> bool {
        self.0.bit(255)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Absolute value as an unsigned integer. Total: the magnitude of the
    /// minimum value (2^255) is representable in a [U256].
    pub fn magnitude(&self) -> U256 {
        if self.is_negative() {
            twos_negate(self.0)
        } else {
            self.0
        }
    }

    pub fn checked_add(self, other: I256) -> Option<I256> {
        let (sum, _) = self.0.overflowing_add(other.0);
        let same_sign = self.is_negative() == other.is_negative();
        if same_sign && sum.bit(255) != self.is_negative() {
            None
        } else {
            Some(I256(sum))
        }
    }

    pub fn checked_sub(self, other: I256) -> Option<I256> {
        let (diff, _) = self.0.overflowing_sub(other.0);
        let differing_sign = self.is_negative() != other.is_negative();
        if differing_sign && diff.bit(255) != self.is_negative() {
            None
        } else {
            Some(I256(diff))
        }
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flipping the sign bit turns two's-complement order into unsigned order.
        flip_sign(self.0).cmp(&flip_sign(other.0))
    }
}

impl fmt::Display for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}", self.magnitude())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for I256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for I256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = String::deserialize(deserializer)?;
        I256::from_dec_str(&repr).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i256_roundtrips_decimal_strings() {
        for repr in ["0", "1", "-1", "42", "-987654321987654321"] {
            assert_eq!(I256::from_dec_str(repr).unwrap().to_string(), repr);
        }
    }

    #[test]
    fn i256_ordering_spans_zero() {
        let neg = I256::from_i128(-5);
        let zero = I256::zero();
        let pos = I256::from_i128(7);
        assert!(neg < zero);
        assert!(zero < pos);
        assert!(neg < pos);
    }

    #[test]
    fn i256_checked_add_detects_overflow() {
        let max = I256::from_magnitude(false, (U256::one() << 255) - 1).unwrap();
        assert_eq!(max.checked_add(I256::from_i128(1)), None);
        assert_eq!(
            I256::from_i128(-3).checked_add(I256::from_i128(5)),
            Some(I256::from_i128(2))
        );
    }

    #[test]
    fn i256_magnitude_of_minimum_value() {
        let min = I256::from_magnitude(true, U256::one() << 255).unwrap();
        assert!(min.is_negative());
        assert_eq!(min.magnitude(), U256::one() << 255);
    }

    #[test]
    fn u256_serde_uses_decimal_strings() {
        let value = U256::from(123456789u64);
        let encoded = serde_json::to_string(&value).unwrap();
        assert_eq!(encoded, "\"123456789\"");
        let decoded: U256 = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }
}
