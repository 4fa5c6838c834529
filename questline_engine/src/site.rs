//! Site links: cross-references from world locations to quest places.
//!
//! External systems (dialog, NPC spawning, dungeon layout) look content up
//! by location; the [`SiteLink`] records kept by the orchestrator are the
//! index they query. Links are plain values -- they reference their quest
//! only by UID and are dropped en masse when that quest is tombstoned.

use serde::{Deserialize, Serialize};

use crate::idgen::QuestUid;
use crate::symbol::Symbol;

/// Categories of world sites a quest place can resolve to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiteType {
    Town,
    Dungeon,
    Building,
    Remote,
}

/// World-location payload carried by a Place resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDetails {
    pub site_type: SiteType,
    pub map_id: i32,
    /// Zero for non-building sites.
    pub building_key: u32,
}

/// Cross-reference tying one quest place to a world location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLink {
    pub quest_uid: QuestUid,
    pub place_symbol: Symbol,
    pub site_type: SiteType,
    pub map_id: i32,
    pub building_key: u32,
}

impl SiteLink {
    /// Filter predicate for the orchestrator's linear site scan.
    ///
    /// A `building_key` of zero matches any building at the location,
    /// encoding the common non-building-site query.
    pub fn matches(&self, site_type: SiteType, map_id: i32, building_key: u32) -> bool {
        self.site_type == site_type
            && self.map_id == map_id
            && (building_key == 0 || self.building_key == building_key)
    }
}
