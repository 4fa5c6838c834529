//! A running quest instance and its per-tick execution state machine.
//!
//! Lifecycle: Active → Complete → Tombstoned → removed. Completion is set
//! only by actions (there is no other path) and is monotone; tombstoning is
//! the orchestrator's move and implies completion. A tombstoned quest stays
//! queryable until the orchestrator removes it.

use std::collections::HashMap;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::action::{QuestEffect, dispatch_action};
use crate::idgen::{self, QuestUid};
use crate::resource::{ClockDetails, FoeDetails, ItemDetails, PersonDetails, QuestResource};
use crate::site::SiteDetails;
use crate::symbol::Symbol;
use crate::task::Task;
use crate::world::{NpcIdentity, WorldTime, WorldView};

/// One running instance of a parsed quest program.
///
/// Owns its resources and tasks. The global task always sits at index 0 of
/// the task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub(crate) uid: QuestUid,
    pub(crate) name: String,
    pub(crate) resources: HashMap<Symbol, QuestResource>,
    pub(crate) tasks: Vec<Task>,
    pub(crate) complete: bool,
    pub(crate) tombstoned: bool,
    pub(crate) tombstoned_at: Option<WorldTime>,
    pub(crate) disposed: bool,
    /// Original source lines, retained for debugging only.
    pub(crate) source_lines: Option<Vec<String>>,
}

impl Quest {
    /// Create an empty quest with a fresh UID and its implicit global task.
    pub fn new(name: &str) -> Self {
        Self {
            uid: idgen::next_uid(),
            name: name.to_string(),
            resources: HashMap::new(),
            tasks: vec![Task::global()],
            complete: false,
            tombstoned: false,
            tombstoned_at: None,
            disposed: false,
            source_lines: None,
        }
    }

    pub fn uid(&self) -> QuestUid {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned
    }

    pub fn tombstoned_at(&self) -> Option<WorldTime> {
        self.tombstoned_at
    }

    pub fn resources(&self) -> &HashMap<Symbol, QuestResource> {
        &self.resources
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn source_lines(&self) -> Option<&[String]> {
        self.source_lines.as_deref()
    }

    /// Register a resource under `symbol`. Returns false when the symbol is
    /// already taken (resource symbols are unique within a quest).
    pub fn add_resource(&mut self, symbol: Symbol, resource: QuestResource) -> bool {
        if self.resources.contains_key(&symbol) {
            return false;
        }
        self.resources.insert(symbol, resource);
        true
    }

    /// Append a named task. Returns false on a duplicate task name.
    pub fn add_task(&mut self, task: Task) -> bool {
        if let Some(name) = &task.name {
            if self.tasks.iter().any(|t| t.name.as_ref() == Some(name)) {
                return false;
            }
        }
        self.tasks.push(task);
        true
    }

    pub fn resource(&self, symbol: &Symbol) -> Option<&QuestResource> {
        self.resources.get(symbol)
    }

    pub fn person(&self, symbol: &Symbol) -> Option<&PersonDetails> {
        self.resources.get(symbol).and_then(QuestResource::as_person)
    }

    pub fn person_mut(&mut self, symbol: &Symbol) -> Option<&mut PersonDetails> {
        self.resources.get_mut(symbol).and_then(QuestResource::as_person_mut)
    }

    pub fn place(&self, symbol: &Symbol) -> Option<&SiteDetails> {
        self.resources.get(symbol).and_then(QuestResource::as_place)
    }

    pub fn item(&self, symbol: &Symbol) -> Option<&ItemDetails> {
        self.resources.get(symbol).and_then(|r| match r {
            QuestResource::Item(i) => Some(i),
            _ => None,
        })
    }

    pub fn item_mut(&mut self, symbol: &Symbol) -> Option<&mut ItemDetails> {
        self.resources.get_mut(symbol).and_then(QuestResource::as_item_mut)
    }

    pub fn foe_mut(&mut self, symbol: &Symbol) -> Option<&mut FoeDetails> {
        self.resources.get_mut(symbol).and_then(QuestResource::as_foe_mut)
    }

    pub fn clock(&self, symbol: &Symbol) -> Option<&ClockDetails> {
        self.resources.get(symbol).and_then(QuestResource::as_clock)
    }

    pub fn clock_mut(&mut self, symbol: &Symbol) -> Option<&mut ClockDetails> {
        self.resources.get_mut(symbol).and_then(QuestResource::as_clock_mut)
    }

    pub fn task(&self, symbol: &Symbol) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name.as_ref() == Some(symbol))
    }

    /// Set or clear a task's triggered flag. Returns false on unknown task.
    pub fn set_task_triggered(&mut self, symbol: &Symbol, triggered: bool) -> bool {
        match self.tasks.iter_mut().find(|t| t.name.as_ref() == Some(symbol)) {
            Some(task) => {
                task.triggered = triggered;
                true
            },
            None => false,
        }
    }

    /// Mark the quest complete. Monotone: completion never reverts.
    pub fn set_complete(&mut self) {
        if !self.complete {
            self.complete = true;
            info!("quest {} ({}) complete", self.uid, self.name);
        }
    }

    /// Flip the tombstone flag, recording the world time. Orchestrator-only;
    /// forces completion first so tombstoned always implies complete.
    pub(crate) fn set_tombstoned(&mut self, now: WorldTime) {
        self.set_complete();
        if !self.tombstoned {
            self.tombstoned = true;
            self.tombstoned_at = Some(now);
            info!("quest {} ({}) tombstoned at world time {}", self.uid, self.name, now.seconds());
        }
    }

    /// Run one tick of this quest.
    ///
    /// Every task whose trigger currently holds executes its actions in
    /// declaration order (see [`Task::is_active`]). A failing action
    /// stops only its own task for this tick; the failure is logged and
    /// never escapes this call. Returns the cross-quest effects for the
    /// orchestrator to apply.
    pub fn update(&mut self, view: &WorldView, clicked: Option<&NpcIdentity>) -> Vec<QuestEffect> {
        let mut effects = Vec::new();

        // Decide the active set up front so action side effects (start/clear
        // task) cannot reshape this tick's iteration.
        let active: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_active(self, view, clicked))
            .map(|(i, _)| i)
            .collect();

        for idx in active {
            let actions = self.tasks[idx].actions.clone();
            let label = self.tasks[idx].label().to_string();
            for action in &actions {
                if let Err(err) = dispatch_action(self, view, action, &mut effects) {
                    error!(
                        "quest {} task '{label}': action failed ({err}); abandoning rest of task this tick",
                        self.uid
                    );
                    break;
                }
            }
        }

        effects
    }

    /// Release anything needing explicit cleanup. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for resource in self.resources.values_mut() {
            if let Some(clock) = resource.as_clock_mut() {
                clock.stop();
            }
        }
        info!("quest {} ({}) disposed", self.uid, self.name);
    }
}
