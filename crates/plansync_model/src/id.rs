//! Record identifiers.
//!
//! Records are identified by UUIDv4 strings so that ids minted offline never
//! collide with ids minted on another device or on the backend.

use uuid::Uuid;

/// Generates a fresh record id.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns true if `id` is usable as a record id.
///
/// Any non-empty string without control characters is accepted; ids coming
/// from the backend are not required to be UUIDs.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn id_validation() {
        assert!(is_valid_id("task-1"));
        assert!(is_valid_id(&new_id()));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("bad\nid"));
    }
}
