/// Payment reference numbers
///
/// A payment without a caller-supplied reference gets one generated:
/// `TXN` followed by 9 random characters from `[A-Z0-9]`.
///
/// Generated references are not checked against existing payments before
/// insert. The unique constraint on `payments.reference_number` is the only
/// backstop, and a collision is reported as a conflict (no retry).
///
/// # Example
///
/// ```
/// use trustledger_shared::ledger::reference::{generate_reference, resolve_reference};
///
/// let reference = generate_reference();
/// assert!(reference.starts_with("TXN"));
/// assert_eq!(reference.len(), 12);
///
/// assert_eq!(resolve_reference(Some("UPI-778812".to_string())), "UPI-778812");
/// ```

use rand::Rng;

/// Prefix of generated references
pub const REFERENCE_PREFIX: &str = "TXN";

/// Number of random characters after the prefix
const REFERENCE_RANDOM_LENGTH: usize = 9;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a new payment reference
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();

    let random_part: String = (0..REFERENCE_RANDOM_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{}{}", REFERENCE_PREFIX, random_part)
}

/// Uses the supplied reference, or generates one if it is absent or blank
pub fn resolve_reference(supplied: Option<String>) -> String {
    match supplied {
        Some(reference) if !reference.trim().is_empty() => reference.trim().to_string(),
        _ => generate_reference(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_reference_format() {
        for _ in 0..50 {
            let reference = generate_reference();
            assert!(reference.starts_with(REFERENCE_PREFIX));
            assert_eq!(reference.len(), REFERENCE_PREFIX.len() + REFERENCE_RANDOM_LENGTH);
            assert!(reference[REFERENCE_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generated_references_differ() {
        assert_ne!(generate_reference(), generate_reference());
    }

    #[test]
    fn test_blank_reference_is_replaced() {
        assert!(resolve_reference(None).starts_with(REFERENCE_PREFIX));
        assert!(resolve_reference(Some(String::new())).starts_with(REFERENCE_PREFIX));
        assert!(resolve_reference(Some("   ".to_string())).starts_with(REFERENCE_PREFIX));
    }

    #[test]
    fn test_supplied_reference_is_kept() {
        assert_eq!(resolve_reference(Some(" CHQ-0042 ".to_string())), "CHQ-0042");
    }
}
