//! JSON syntax validation

/// Check a record parses as a JSON value of any kind
///
/// The record is neither modified nor normalized.
pub fn validate(bytes: &[u8]) -> Result<(), serde_json::Error> {
    serde_json::from_slice::<serde_json::Value>(bytes).map(|_| ())
}

/// Whether a record is well-formed JSON
pub fn is_valid_json(bytes: &[u8]) -> bool {
    validate(bytes).is_ok()
}
