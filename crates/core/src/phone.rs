//! Recipient number normalization for the send pipeline.

use crate::error::{GatewayError, Result};

/// Canonical recipient suffix used by the web-messaging transport.
pub const ADDRESS_SUFFIX: &str = "@c.us";

/// Minimum digit count for a plausible recipient number.
const MIN_DIGITS: usize = 10;

/// Normalizes a caller-supplied number into a transport address.
///
/// Strips every non-digit, rejects anything shorter than ten digits, and
/// appends [`ADDRESS_SUFFIX`]. Feeding the result back in yields the same
/// address, so normalization is idempotent.
pub fn normalize_recipient(raw: &str) -> Result<String> {
	let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
	if digits.len() < MIN_DIGITS {
		return Err(GatewayError::InvalidPhoneFormat);
	}
	Ok(format!("{digits}{ADDRESS_SUFFIX}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_formats_punctuated_number() {
		let address = normalize_recipient("+1 (555) 123-4567").unwrap();
		assert_eq!(address, "15551234567@c.us");
	}

	#[test]
	fn test_rejects_short_numbers() {
		// "12-34" strips down to two digits.
		assert!(matches!(
			normalize_recipient("12-34"),
			Err(GatewayError::InvalidPhoneFormat)
		));
		assert!(matches!(
			normalize_recipient(""),
			Err(GatewayError::InvalidPhoneFormat)
		));
		// Nine digits is still one short.
		assert!(matches!(
			normalize_recipient("123456789"),
			Err(GatewayError::InvalidPhoneFormat)
		));
	}

	#[test]
	fn test_accepts_exactly_ten_digits() {
		assert_eq!(normalize_recipient("5551234567").unwrap(), "5551234567@c.us");
	}

	#[test]
	fn test_idempotent_over_own_output() {
		let once = normalize_recipient("+1 (555) 123-4567").unwrap();
		let twice = normalize_recipient(&once).unwrap();
		assert_eq!(once, twice);
	}
}
