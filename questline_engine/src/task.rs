//! Tasks and their trigger conditions.
//!
//! A task is a named, ordered list of bound actions. The distinguished
//! unnamed task (one per quest) is the implicit global task: it is part of
//! the evaluation set on every tick, and runs whenever its conditions hold
//! (unconditionally when it has none). Named tasks run when they have been
//! explicitly triggered or when any of their conditions currently holds.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::quest::Quest;
use crate::symbol::Symbol;
use crate::world::{NpcIdentity, WorldView};

/// A pure-read trigger condition, re-evaluated fresh every tick.
///
/// Conditions never mutate state. Anything they need from outside the quest
/// comes through the per-tick [`WorldView`] or the orchestrator's
/// last-clicked NPC record.
// Externally tagged for ron save-file compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// The most recently clicked NPC matches this quest person's identity.
    ClickedNpc(Symbol),
    /// The named clock has been started and has run out of world time.
    ClockExpired(Symbol),
    /// Every listed task has been triggered.
    TasksTriggered(Vec<Symbol>),
    /// The player stands at the named place's site.
    PlayerAtPlace(Symbol),
}

impl Condition {
    pub fn is_met(&self, quest: &Quest, view: &WorldView, clicked: Option<&NpcIdentity>) -> bool {
        match self {
            Condition::ClickedNpc(sym) => match quest.person(sym) {
                Some(person) => clicked.is_some_and(|id| *id == person.identity),
                None => {
                    warn!("quest {}: clicked-npc condition names unknown person '{sym}'", quest.uid());
                    false
                },
            },
            Condition::ClockExpired(sym) => match quest.clock(sym) {
                Some(clock) => clock.expired(view.now),
                None => {
                    warn!("quest {}: clock-expired condition names unknown clock '{sym}'", quest.uid());
                    false
                },
            },
            Condition::TasksTriggered(syms) => syms
                .iter()
                .all(|sym| quest.task(sym).is_some_and(|task| task.triggered)),
            Condition::PlayerAtPlace(sym) => match (quest.place(sym), view.player_site) {
                (Some(site), Some(player)) => {
                    site.site_type == player.site_type
                        && site.map_id == player.map_id
                        && site.building_key == player.building_key
                },
                _ => false,
            },
        }
    }
}

/// A named (or implicit global) ordered group of actions within a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// `None` marks the implicit global task.
    pub name: Option<Symbol>,
    pub triggered: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl Task {
    pub fn global() -> Self {
        Self {
            name: None,
            triggered: false,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn named(name: Symbol) -> Self {
        Self {
            name: Some(name),
            triggered: false,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.name.is_none()
    }

    /// Whether this task's actions should run this tick.
    ///
    /// The global task is evaluated every tick but its conditions still
    /// gate it; only a condition-free global task runs unconditionally. A
    /// named task additionally needs to have been triggered (or a condition
    /// to hold) before it runs.
    pub fn is_active(&self, quest: &Quest, view: &WorldView, clicked: Option<&NpcIdentity>) -> bool {
        if self.triggered {
            return true;
        }
        if self.conditions.is_empty() {
            return self.is_global();
        }
        self.conditions.iter().any(|c| c.is_met(quest, view, clicked))
    }

    /// Label used in logs, where the global task has no symbol to show.
    pub fn label(&self) -> &str {
        self.name.as_ref().map_or("<global>", Symbol::as_str)
    }
}
