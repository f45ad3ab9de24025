/// Member code allocation
///
/// Every member receives a human-readable code of the form `PREFIX-NNNN`
/// exactly once, when the member row is first inserted. The next code is
/// derived from the most recently inserted member that already carries a
/// code: its numeric segment is incremented by one.
///
/// # Format
///
/// ```text
/// KT-0001, KT-0002, ..., KT-9999, KT-10000
/// ```
///
/// The sequence is zero-padded to four digits and unbounded beyond that.
///
/// # Malformed codes
///
/// If the previous code has no numeric segment (e.g. `LEGACY` or `KT-abc`)
/// numbering restarts at 1. This can collide with an existing `KT-0001`;
/// the store's unique constraint on `member_code` then rejects the insert.
///
/// # Example
///
/// ```
/// use trustledger_shared::ledger::identity::IdentityAllocator;
///
/// let codes = IdentityAllocator::default();
/// assert_eq!(codes.next_after(None), "KT-0001");
/// assert_eq!(codes.next_after(Some("KT-0041")), "KT-0042");
/// assert_eq!(codes.next_after(Some("LEGACY")), "KT-0001");
/// ```

/// Prefix used when none is configured
pub const DEFAULT_CODE_PREFIX: &str = "KT";

/// Minimum width of the numeric segment
const SEQUENCE_WIDTH: usize = 4;

/// Allocates member codes from the previous code in insertion order
///
/// The allocator is stateless; serialization of concurrent allocations is
/// the store's responsibility (advisory lock or store mutex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAllocator {
    prefix: String,
}

impl IdentityAllocator {
    /// Creates an allocator for the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Configured prefix (without the trailing dash)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the code that follows `last_code`
    ///
    /// `last_code` is the code of the most recently inserted coded member,
    /// or `None` when no such member exists.
    pub fn next_after(&self, last_code: Option<&str>) -> String {
        let next = last_code
            .and_then(parse_sequence)
            .map_or(1, |n| n.saturating_add(1));

        format_code(&self.prefix, next)
    }
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_PREFIX)
    }
}

/// Extracts the numeric segment of a member code
///
/// The segment is the text between the first `-` and the next `-` (or the
/// end of the string). The prefix itself is not checked, so `ABC-12`
/// parses as 12.
pub fn parse_sequence(code: &str) -> Option<u64> {
    code.split('-').nth(1)?.trim().parse().ok()
}

/// Formats a member code
pub fn format_code(prefix: &str, sequence: u64) -> String {
    format!("{}-{:0width$}", prefix, sequence, width = SEQUENCE_WIDTH)
}
