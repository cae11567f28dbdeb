//! Strongly typed merchant and certificate identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $normalize:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self($normalize(view)))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self($normalize(&value)))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (merchant, serial number).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (merchant, serial number).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (merchant, serial number).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! {
	MerchantId,
	"Merchant identifier (`mchid`) issued by WeChat Pay.",
	"Merchant",
	str::to_owned
}
def_id! {
	SerialNumber,
	"Certificate serial number; stored as upper-case hex so lookups ignore case.",
	"SerialNumber",
	str::to_ascii_uppercase
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_trim_and_validate() {
		assert!(MerchantId::new(" 1900000109").is_err(), "Leading whitespace must be rejected.");
		assert!(MerchantId::new("1900000109 ").is_err(), "Trailing whitespace must be rejected.");

		let merchant =
			MerchantId::new("1900000109").expect("Merchant fixture should be considered valid.");

		assert_eq!(merchant.as_ref(), "1900000109");
		assert!(SerialNumber::new("").is_err());
		assert!(SerialNumber::new("384A A390").is_err());
	}

	#[test]
	fn serial_numbers_normalize_case() {
		let lower = SerialNumber::new("384aa39043f718b081647ece653266ee2484450b")
			.expect("Lower-case serial should be valid.");
		let upper = SerialNumber::new("384AA39043F718B081647ECE653266EE2484450B")
			.expect("Upper-case serial should be valid.");

		assert_eq!(lower, upper);
		assert_eq!(lower.as_ref(), "384AA39043F718B081647ECE653266EE2484450B");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let serial: SerialNumber =
			serde_json::from_str("\"5157f09e\"").expect("Serial should deserialize successfully.");

		assert_eq!(serial.as_ref(), "5157F09E");
		assert!(serde_json::from_str::<MerchantId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<MerchantId>("\"\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("1900{}0109", '\u{00A0}');

		assert!(MerchantId::new(&nbsp).is_err());

		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		MerchantId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(MerchantId::new(&too_long).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<SerialNumber, u8> = HashMap::from_iter([(
			SerialNumber::new("5157F09E").expect("Serial used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("5157F09E"), Some(&7));
	}
}
