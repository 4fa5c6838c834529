//! Read-only world state consumed by the engine.
//!
//! The engine never simulates the game world itself; every tick it receives
//! a [`WorldView`] snapshot (simulated time, fade state, player position)
//! assembled by the host. Conditions read from it, nothing here mutates it.

use serde::{Deserialize, Serialize};

use crate::site::SiteType;

/// Simulated world time in seconds. Not wall-clock time.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldTime(pub u64);

impl WorldTime {
    /// One simulated week, the tombstone-to-removal grace period.
    pub const WEEK_SECONDS: u64 = 7 * 24 * 60 * 60;

    pub fn seconds(self) -> u64 {
        self.0
    }

    /// Seconds elapsed since `earlier`; zero when `earlier` is in the future.
    pub fn seconds_since(self, earlier: WorldTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn plus_seconds(self, secs: u64) -> WorldTime {
        WorldTime(self.0.saturating_add(secs))
    }
}

/// Identity record for an NPC, matched on exact equality of all four fields.
///
/// This is a heuristic identity comparison, not a stable primary key: two
/// NPCs colliding on all four fields are indistinguishable. Kept as-is
/// deliberately; callers scan the full resource set per click, so no keyed
/// lookup is built on top of it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcIdentity {
    pub content_hash: u32,
    pub map_id: i32,
    pub name_seed: i32,
    pub building_key: u32,
}

impl NpcIdentity {
    /// Derive a deterministic identity from a display name.
    ///
    /// Map id and building key stay zero until the NPC is placed at a site.
    pub fn from_name(name: &str) -> Self {
        let hash = fnv1a(name.as_bytes());
        Self {
            content_hash: hash,
            map_id: 0,
            name_seed: hash.wrapping_mul(0x9E37_79B9) as i32,
            building_key: 0,
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Where the player currently is, in site terms.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSite {
    pub site_type: SiteType,
    pub map_id: i32,
    pub building_key: u32,
}

/// Snapshot of the host world handed to every tick.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldView {
    pub now: WorldTime,
    /// Ticking is suppressed entirely while a scene fade is in progress.
    pub fade_in_progress: bool,
    pub player_site: Option<PlayerSite>,
}

impl WorldView {
    pub fn at(now: WorldTime) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_since_saturates() {
        let earlier = WorldTime(100);
        let later = WorldTime(250);
        assert_eq!(later.seconds_since(earlier), 150);
        assert_eq!(earlier.seconds_since(later), 0);
    }

    #[test]
    fn identity_from_name_is_deterministic() {
        let a = NpcIdentity::from_name("Lady Magnessen");
        let b = NpcIdentity::from_name("Lady Magnessen");
        assert_eq!(a, b);
        assert_ne!(a, NpcIdentity::from_name("Lord Quisto"));
    }

    #[test]
    fn identity_equality_is_exact_on_all_fields() {
        let base = NpcIdentity::from_name("Courier");
        let mut shifted = base;
        shifted.map_id = 77;
        // one differing field breaks the (heuristic) match
        assert_ne!(base, shifted);
    }
}
