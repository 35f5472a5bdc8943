//! Equality gate between a candidate feed and the published one.

use crate::domain::NotificationItem;

/// Whether publishing `candidate` would change what readers see.
///
/// Two lists are equivalent when they have the same length, the same id
/// sequence and the same read flags. Content edits under an unchanged id are
/// not detected.
pub fn has_changed(published: &[NotificationItem], candidate: &[NotificationItem]) -> bool {
    published.len() != candidate.len()
        || published
            .iter()
            .zip(candidate)
            .any(|(a, b)| a.id != b.id || a.read != b.read)
}
