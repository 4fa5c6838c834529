//! Versioned save/restore of live quest machine state.
//!
//! A snapshot holds the full flat site-link list and one versioned record
//! per tracked quest. Records map every field explicitly -- no reflection,
//! no schema migration beyond the version tag. Restoring is the only way a
//! quest comes to exist other than fresh parsing.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::idgen::QuestUid;
use crate::quest::Quest;
use crate::resource::QuestResource;
use crate::site::SiteLink;
use crate::symbol::Symbol;
use crate::task::{Condition, Task};
use crate::world::WorldTime;

pub const SAVE_VERSION: u32 = 1;

/// Snapshot of one task's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: Option<Symbol>,
    pub triggered: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

/// Versioned snapshot of one tracked quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestSaveRecord {
    pub version: u32,
    pub uid: QuestUid,
    pub name: String,
    pub complete: bool,
    pub tombstoned: bool,
    pub tombstoned_at: Option<WorldTime>,
    pub resources: Vec<(Symbol, QuestResource)>,
    pub tasks: Vec<TaskRecord>,
    pub source_lines: Option<Vec<String>>,
}

impl QuestSaveRecord {
    pub fn capture(quest: &Quest) -> Self {
        let mut resources: Vec<(Symbol, QuestResource)> = quest
            .resources()
            .iter()
            .map(|(sym, res)| (sym.clone(), res.clone()))
            .collect();
        // stable order keeps snapshots diffable
        resources.sort_by(|(a, _), (b, _)| a.cmp(b));

        Self {
            version: SAVE_VERSION,
            uid: quest.uid(),
            name: quest.name().to_string(),
            complete: quest.is_complete(),
            tombstoned: quest.is_tombstoned(),
            tombstoned_at: quest.tombstoned_at(),
            resources,
            tasks: quest
                .tasks()
                .iter()
                .map(|task| TaskRecord {
                    name: task.name.clone(),
                    triggered: task.triggered,
                    conditions: task.conditions.clone(),
                    actions: task.actions.clone(),
                })
                .collect(),
            source_lines: quest.source_lines().map(<[String]>::to_vec),
        }
    }

    /// Rebuild a live quest from this record, UID and flags included.
    pub fn restore(self) -> Quest {
        Quest {
            uid: self.uid,
            name: self.name,
            resources: self.resources.into_iter().collect(),
            tasks: self
                .tasks
                .into_iter()
                .map(|record| Task {
                    name: record.name,
                    triggered: record.triggered,
                    conditions: record.conditions,
                    actions: record.actions,
                })
                .collect(),
            complete: self.complete,
            tombstoned: self.tombstoned,
            tombstoned_at: self.tombstoned_at,
            // a tombstoned quest was disposed when it was tombstoned
            disposed: self.tombstoned,
            source_lines: self.source_lines,
        }
    }
}

/// Full machine snapshot: site links plus every tracked quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub site_links: Vec<SiteLink>,
    pub quests: Vec<QuestSaveRecord>,
}

impl SaveData {
    pub fn capture<'a>(site_links: &[SiteLink], quests: impl Iterator<Item = &'a Quest>) -> Self {
        let mut quests: Vec<QuestSaveRecord> = quests.map(QuestSaveRecord::capture).collect();
        quests.sort_by_key(|record| record.uid);
        Self {
            version: SAVE_VERSION,
            site_links: site_links.to_vec(),
            quests,
        }
    }

    pub fn warn_on_version_mismatch(&self) {
        if self.version != SAVE_VERSION {
            warn!(
                "save data version {} differs from current {SAVE_VERSION}; restoring anyway",
                self.version
            );
        }
    }
}

/// Serialize a snapshot to a ron file.
///
/// # Errors
/// Fails when serialization or the write fails.
pub fn write_save_file(path: &Path, data: &SaveData) -> Result<()> {
    let ron = ron::ser::to_string(data).context("serializing save data")?;
    fs::write(path, ron).with_context(|| format!("writing save file {}", path.display()))
}

/// Read a snapshot back from a ron file.
///
/// # Errors
/// Fails when the file cannot be read or deserialized.
pub fn load_save_file(path: &Path) -> Result<SaveData> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading save file {}", path.display()))?;
    ron::from_str(&raw).with_context(|| format!("parsing save file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ClockDetails;
    use tempfile::tempdir;

    fn sample_quest() -> Quest {
        let mut quest = Quest::new("saved");
        quest.add_resource(Symbol::new("_timer_"), QuestResource::Clock(ClockDetails::new(300)));
        let mut task = Task::named(Symbol::new("_t_"));
        task.triggered = true;
        task.conditions.push(Condition::ClockExpired(Symbol::new("_timer_")));
        task.actions.push(Action::Say { message_id: 4040 });
        task.actions.push(Action::EndQuest);
        quest.add_task(task);
        quest
    }

    #[test]
    fn record_round_trip_preserves_identity_and_state() {
        let mut quest = sample_quest();
        quest.set_complete();
        let record = QuestSaveRecord::capture(&quest);
        let restored = record.restore();

        assert_eq!(restored.uid(), quest.uid());
        assert_eq!(restored.name(), quest.name());
        assert!(restored.is_complete());
        assert!(!restored.is_tombstoned());
        assert_eq!(restored.resources(), quest.resources());
        assert_eq!(restored.tasks(), quest.tasks());
    }

    #[test]
    fn tombstoned_record_restores_as_disposed() {
        let mut quest = sample_quest();
        quest.set_tombstoned(WorldTime(99));
        let restored = QuestSaveRecord::capture(&quest).restore();
        assert!(restored.is_tombstoned());
        assert_eq!(restored.tombstoned_at(), Some(WorldTime(99)));
        assert!(restored.is_complete());
    }

    #[test]
    fn save_file_round_trips_through_ron() {
        let quest = sample_quest();
        let links = vec![SiteLink {
            quest_uid: quest.uid(),
            place_symbol: Symbol::new("_p_"),
            site_type: crate::site::SiteType::Dungeon,
            map_id: 4,
            building_key: 0,
        }];
        let data = SaveData::capture(&links, std::iter::once(&quest));

        let dir = tempdir().unwrap();
        let path = dir.path().join("quests.ron");
        write_save_file(&path, &data).unwrap();
        let loaded = load_save_file(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn load_save_file_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quests.ron");
        fs::write(&path, "this is not ron").unwrap();
        assert!(load_save_file(&path).is_err());
    }
}
