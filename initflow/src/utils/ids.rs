//! Identifier helpers.

use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

/// Pattern every node and stage id must match.
pub const ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.:/-]*$";

static ID_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(ID_PATTERN).ok());

/// Returns true if `id` is a well-formed node or stage id.
///
/// # Examples
///
/// ```
/// use initflow::utils::is_valid_id;
///
/// assert!(is_valid_id("registry.blocks"));
/// assert!(!is_valid_id(""));
/// assert!(!is_valid_id(" padded"));
/// ```
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    ID_REGEX.as_ref().is_some_and(|re| re.is_match(id))
}

/// Generates a fresh run identifier (UUID v4).
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        for id in ["a", "core", "registry.blocks", "assets/textures", "net:handshake", "A_1-b"] {
            assert!(is_valid_id(id), "{id} should be valid");
        }
    }

    #[test]
    fn test_invalid_ids() {
        for id in ["", " ", "-leading", ".dot", "has space", "tab\tid"] {
            assert!(!is_valid_id(id), "{id:?} should be invalid");
        }
    }
}
