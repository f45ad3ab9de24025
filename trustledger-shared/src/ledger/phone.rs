/// Phone number normalization
///
/// Members log in with their phone number, which doubles as their username.
/// Numbers are stored as exactly 10 digits; an Indian country code
/// (`+91`, or `91` on a 12-character number) is stripped first.
///
/// # Example
///
/// ```
/// use trustledger_shared::ledger::phone::{normalize_phone, validate_phone};
///
/// assert_eq!(normalize_phone(" +91 98765 43210 "), "9876543210");
/// assert_eq!(validate_phone("919876543210").unwrap(), "9876543210");
/// assert!(validate_phone("12345").is_err());
/// ```

use once_cell::sync::Lazy;
use regex::Regex;

static TEN_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("static phone pattern is valid"));

/// Error returned for numbers that are not 10 digits after normalization
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Phone number must be exactly 10 digits.")]
pub struct InvalidPhone;

/// Normalizes a phone number without validating it
///
/// Used on login, where the username may also be a non-phone admin name.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw.trim().chars().filter(|c| *c != ' ').collect();

    if let Some(rest) = compact.strip_prefix("+91") {
        rest.to_string()
    } else if compact.len() == 12 && compact.starts_with("91") {
        compact[2..].to_string()
    } else {
        compact
    }
}

/// Normalizes and validates a phone number for registration
pub fn validate_phone(raw: &str) -> Result<String, InvalidPhone> {
    let phone = normalize_phone(raw);

    if TEN_DIGITS.is_match(&phone) {
        Ok(phone)
    } else {
        Err(InvalidPhone)
    }
}
