//! Bound quest actions and their dispatcher.
//!
//! Actions are the "effects" half of the engine: conditions (see
//! [`crate::task`]) decide which tasks run, and the actions in those tasks
//! mutate quest state when dispatched. An [`Action`] is a concrete instance
//! bound from an action template at parse time, scoped to one quest.
//!
//! A quest may freely mutate its own resources and tasks while updating, but
//! never the orchestrator's collections. Anything with cross-quest reach --
//! registering a site link, surfacing a message, asking the host to spawn
//! something -- is emitted as a [`QuestEffect`] and applied by the
//! orchestrator after the update loop.
//!
//! Every dispatched action is logged as `└─ action: ...`, giving an audit
//! trail of quest state changes.

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::idgen::QuestUid;
use crate::quest::Quest;
use crate::site::SiteLink;
use crate::symbol::Symbol;
use crate::world::WorldView;

/// A single bound, executable script instruction.
// Externally tagged for ron save-file compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Surface a message from the quest's message table.
    Say { message_id: u32 },
    /// Add an entry to the player's quest log.
    LogMessage { message_id: u32, step: u32 },
    StartTask(Symbol),
    ClearTask(Symbol),
    StartClock(Symbol),
    StopClock(Symbol),
    /// Spawn a person at a place, registering a site link for it.
    PlaceNpc { npc: Symbol, place: Symbol },
    /// Spawn an item at a place, registering a site link for it.
    PlaceItem { item: Symbol, place: Symbol },
    GivePlayerItem(Symbol),
    CreateFoe(Symbol),
    /// Flip the quest's completion flag. The only path to completion.
    EndQuest,
}

/// Cross-quest effects collected during a quest update and applied by the
/// orchestrator once iteration is over.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestEffect {
    AddSiteLink(SiteLink),
    ShowMessage { quest: QuestUid, message_id: u32 },
    LogEntry { quest: QuestUid, message_id: u32, step: u32 },
    GiveItem { quest: QuestUid, template: String },
    SpawnFoe { quest: QuestUid, kind: String, count: u32 },
}

/// Failure of a single action invocation.
///
/// Contained: logged by the caller, never propagated past the owning
/// quest's update.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("no {kind} resource '{symbol}' in this quest")]
    MissingResource { kind: &'static str, symbol: Symbol },
    #[error("no task named '{0}' in this quest")]
    MissingTask(Symbol),
}

/// Execute one bound action against its owning quest.
///
/// # Errors
/// Returns an [`ActionError`] when a referenced resource or task is missing
/// or of the wrong kind; the action's effects are abandoned for this tick.
pub fn dispatch_action(
    quest: &mut Quest,
    view: &WorldView,
    action: &Action,
    effects: &mut Vec<QuestEffect>,
) -> Result<(), ActionError> {
    let uid = quest.uid();
    match action {
        Action::Say { message_id } => {
            info!("└─ action: Say({message_id})");
            effects.push(QuestEffect::ShowMessage {
                quest: uid,
                message_id: *message_id,
            });
        },
        Action::LogMessage { message_id, step } => {
            info!("└─ action: LogMessage({message_id}, step {step})");
            effects.push(QuestEffect::LogEntry {
                quest: uid,
                message_id: *message_id,
                step: *step,
            });
        },
        Action::StartTask(sym) => {
            info!("└─ action: StartTask({sym})");
            if !quest.set_task_triggered(sym, true) {
                return Err(ActionError::MissingTask(sym.clone()));
            }
        },
        Action::ClearTask(sym) => {
            info!("└─ action: ClearTask({sym})");
            if !quest.set_task_triggered(sym, false) {
                return Err(ActionError::MissingTask(sym.clone()));
            }
        },
        Action::StartClock(sym) => {
            info!("└─ action: StartClock({sym})");
            let now = view.now;
            quest
                .clock_mut(sym)
                .ok_or_else(|| ActionError::MissingResource {
                    kind: "clock",
                    symbol: sym.clone(),
                })?
                .start(now);
        },
        Action::StopClock(sym) => {
            info!("└─ action: StopClock({sym})");
            quest
                .clock_mut(sym)
                .ok_or_else(|| ActionError::MissingResource {
                    kind: "clock",
                    symbol: sym.clone(),
                })?
                .stop();
        },
        Action::PlaceNpc { npc, place } => {
            info!("└─ action: PlaceNpc({npc} at {place})");
            let site = *quest.place(place).ok_or_else(|| ActionError::MissingResource {
                kind: "place",
                symbol: place.clone(),
            })?;
            let person = quest
                .person_mut(npc)
                .ok_or_else(|| ActionError::MissingResource {
                    kind: "person",
                    symbol: npc.clone(),
                })?;
            person.placed_at = Some(place.clone());
            person.identity.map_id = site.map_id;
            person.identity.building_key = site.building_key;
            effects.push(QuestEffect::AddSiteLink(SiteLink {
                quest_uid: uid,
                place_symbol: place.clone(),
                site_type: site.site_type,
                map_id: site.map_id,
                building_key: site.building_key,
            }));
        },
        Action::PlaceItem { item, place } => {
            info!("└─ action: PlaceItem({item} at {place})");
            let site = *quest.place(place).ok_or_else(|| ActionError::MissingResource {
                kind: "place",
                symbol: place.clone(),
            })?;
            if quest.item(item).is_none() {
                return Err(ActionError::MissingResource {
                    kind: "item",
                    symbol: item.clone(),
                });
            }
            effects.push(QuestEffect::AddSiteLink(SiteLink {
                quest_uid: uid,
                place_symbol: place.clone(),
                site_type: site.site_type,
                map_id: site.map_id,
                building_key: site.building_key,
            }));
        },
        Action::GivePlayerItem(sym) => {
            info!("└─ action: GivePlayerItem({sym})");
            let details = quest
                .item_mut(sym)
                .ok_or_else(|| ActionError::MissingResource {
                    kind: "item",
                    symbol: sym.clone(),
                })?;
            details.given_to_player = true;
            effects.push(QuestEffect::GiveItem {
                quest: uid,
                template: details.template.clone(),
            });
        },
        Action::CreateFoe(sym) => {
            info!("└─ action: CreateFoe({sym})");
            let details = quest
                .foe_mut(sym)
                .ok_or_else(|| ActionError::MissingResource {
                    kind: "foe",
                    symbol: sym.clone(),
                })?;
            details.spawned = true;
            effects.push(QuestEffect::SpawnFoe {
                quest: uid,
                kind: details.kind.clone(),
                count: details.count,
            });
        },
        Action::EndQuest => {
            info!("└─ action: EndQuest");
            quest.set_complete();
        },
    }
    Ok(())
}
