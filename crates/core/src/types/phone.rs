//! Mobile-money phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number is required")]
    Empty,
    /// The input contains something other than ASCII digits.
    #[error("phone number must contain digits only")]
    NonDigit,
    /// The input has the wrong number of digits.
    #[error("phone number must be exactly {expected} digits")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
    },
    /// The input does not start with the country code.
    #[error("phone number must start with {prefix}")]
    WrongPrefix {
        /// Required country-code prefix.
        prefix: &'static str,
    },
}

/// A phone number accepted by the mobile-money provider.
///
/// ## Constraints
///
/// - ASCII digits only, no `+`, spaces or separators
/// - Exactly 12 digits
/// - Starts with the `254` country code
///
/// ## Examples
///
/// ```
/// use agroshop_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse("254712345678").is_ok());
///
/// assert!(PhoneNumber::parse("0712345678").is_err());   // local format
/// assert!(PhoneNumber::parse("25471234567").is_err());  // 11 digits
/// assert!(PhoneNumber::parse("254abcdefghi").is_err()); // not digits
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Required number of digits.
    pub const LENGTH: usize = 12;

    /// Required country-code prefix.
    pub const COUNTRY_PREFIX: &'static str = "254";

    /// Parse a `PhoneNumber` from a string.
    ///
    /// Surrounding whitespace is ignored; nothing else is normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains non-digits, is not
    /// exactly 12 digits long, or lacks the `254` prefix.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::NonDigit);
        }

        if s.len() != Self::LENGTH {
            return Err(PhoneError::WrongLength {
                expected: Self::LENGTH,
            });
        }

        if !s.starts_with(Self::COUNTRY_PREFIX) {
            return Err(PhoneError::WrongPrefix {
                prefix: Self::COUNTRY_PREFIX,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number with all but the last three digits hidden, for logs.
    #[must_use]
    pub fn masked(&self) -> String {
        let visible = self.0.get(self.0.len().saturating_sub(3)..).unwrap_or("");
        format!("{}{visible}", "*".repeat(Self::LENGTH - visible.len()))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}
