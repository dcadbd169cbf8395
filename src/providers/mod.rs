//! Provider adapters
//!
//! Endpoint-specific collaborators built on the core contract: each adapter
//! owns its provider's error-code tables, rate-limit header names, request
//! defaults, and the logic that derives [`crate::paginate::PageMeta`] from a
//! payload. The core modules never embed provider knowledge; adapters are the
//! only place it lives.

pub mod twitter;

/// Join listable values into the comma-separated form bulk endpoints expect.
pub fn list_to_csv<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
