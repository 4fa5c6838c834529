//! Quest resources: the named entities a quest program owns.
//!
//! Resources are a closed family of tagged variants -- persons, places,
//! items, foes, clocks -- each carrying a kind-specific payload. A resource
//! is keyed by its [`crate::Symbol`] in the owning quest's resource map and
//! never outlives that quest; any back-reference to the owner is the quest
//! UID, resolved through the orchestrator.

use serde::{Deserialize, Serialize};

use crate::site::SiteDetails;
use crate::symbol::Symbol;
use crate::world::{NpcIdentity, WorldTime};

/// Payload for a Person resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub display_name: String,
    pub identity: NpcIdentity,
    /// Questors are the persons eligible for last-clicked-NPC matching.
    pub is_questor: bool,
    /// Place the person was spawned at, once a place-npc action ran.
    pub placed_at: Option<Symbol>,
}

impl PersonDetails {
    pub fn new(display_name: &str, is_questor: bool) -> Self {
        Self {
            display_name: display_name.to_string(),
            identity: NpcIdentity::from_name(display_name),
            is_questor,
            placed_at: None,
        }
    }
}

/// Payload for an Item resource. The template name is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub template: String,
    pub given_to_player: bool,
}

/// Payload for a Foe resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoeDetails {
    pub kind: String,
    pub count: u32,
    pub spawned: bool,
}

/// Payload for a Clock resource: a countdown against simulated world time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDetails {
    pub duration_secs: u64,
    pub started_at: Option<WorldTime>,
}

impl ClockDetails {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_secs,
            started_at: None,
        }
    }

    /// Start (or restart) the countdown at `now`.
    pub fn start(&mut self, now: WorldTime) {
        self.started_at = Some(now);
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    /// A clock that was never started never expires.
    pub fn expired(&self, now: WorldTime) -> bool {
        self.started_at
            .is_some_and(|started| now.seconds_since(started) >= self.duration_secs)
    }
}

/// A named entity inside a quest program.
///
/// Externally tagged (serde default): these variants travel through ron
/// save files, which cannot represent internal tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestResource {
    Person(PersonDetails),
    Place(SiteDetails),
    Item(ItemDetails),
    Foe(FoeDetails),
    Clock(ClockDetails),
}

impl QuestResource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            QuestResource::Person(_) => "person",
            QuestResource::Place(_) => "place",
            QuestResource::Item(_) => "item",
            QuestResource::Foe(_) => "foe",
            QuestResource::Clock(_) => "clock",
        }
    }

    pub fn as_person(&self) -> Option<&PersonDetails> {
        match self {
            QuestResource::Person(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_person_mut(&mut self) -> Option<&mut PersonDetails> {
        match self {
            QuestResource::Person(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_place(&self) -> Option<&SiteDetails> {
        match self {
            QuestResource::Place(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut ItemDetails> {
        match self {
            QuestResource::Item(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_foe_mut(&mut self) -> Option<&mut FoeDetails> {
        match self {
            QuestResource::Foe(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_clock(&self) -> Option<&ClockDetails> {
        match self {
            QuestResource::Clock(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_clock_mut(&mut self) -> Option<&mut ClockDetails> {
        match self {
            QuestResource::Clock(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_never_started_never_expires() {
        let clock = ClockDetails::new(60);
        assert!(!clock.expired(WorldTime(u64::MAX)));
    }

    #[test]
    fn clock_expires_after_duration_of_world_time() {
        let mut clock = ClockDetails::new(60);
        clock.start(WorldTime(100));
        assert!(!clock.expired(WorldTime(159)));
        assert!(clock.expired(WorldTime(160)));
        assert!(clock.expired(WorldTime(500)));
    }

    #[test]
    fn stopped_clock_forgets_its_start() {
        let mut clock = ClockDetails::new(10);
        clock.start(WorldTime(0));
        clock.stop();
        assert!(!clock.expired(WorldTime(1000)));
    }

    #[test]
    fn variant_accessors_reject_other_kinds() {
        let res = QuestResource::Clock(ClockDetails::new(5));
        assert!(res.as_clock().is_some());
        assert!(res.as_person().is_none());
        assert!(res.as_place().is_none());
        assert_eq!(res.kind_name(), "clock");
    }

    #[test]
    fn resource_serialization_round_trip() {
        let res = QuestResource::Clock(ClockDetails {
            duration_secs: 90,
            started_at: Some(WorldTime(5)),
        });
        let s = serde_json::to_string(&res).unwrap();
        assert!(s.contains("\"Clock\""));
        let back: QuestResource = serde_json::from_str(&s).unwrap();
        assert_eq!(back, res);
    }

    #[test]
    fn resource_round_trips_through_ron() {
        // saves go to disk as ron, so the variant encoding must survive it
        let res = QuestResource::Person(PersonDetails::new("Archivist Venn", true));
        let text = ron::ser::to_string(&res).unwrap();
        let back: QuestResource = ron::from_str(&text).unwrap();
        assert_eq!(back, res);
    }

    #[test]
    fn person_identity_derived_from_display_name() {
        let person = PersonDetails::new("Baltham Greyman", true);
        assert_eq!(person.identity, NpcIdentity::from_name("Baltham Greyman"));
        assert!(person.is_questor);
        assert!(person.placed_at.is_none());
    }
}
