//! Monotonic 64-bit UID generation for quest instances.
//!
//! UIDs are unique for the lifetime of the process; restoring a save bumps
//! the counter past the largest restored UID so fresh parses never collide.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier assigned to a [`crate::Quest`] at creation.
pub type QuestUid = u64;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Generate the next quest UID.
pub fn next_uid() -> QuestUid {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// Ensure all future UIDs are strictly greater than `uid`.
///
/// Called when restoring saved quests, which carry UIDs minted by an earlier
/// process.
pub fn bump_past(uid: QuestUid) {
    NEXT_UID.fetch_max(uid.saturating_add(1), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_monotonic() {
        let a = next_uid();
        let b = next_uid();
        assert!(b > a);
    }

    #[test]
    fn bump_past_skips_restored_range() {
        let restored = next_uid() + 500;
        bump_past(restored);
        assert!(next_uid() > restored);
    }
}
