//! The quest machine: orchestrator for every live quest instance.
//!
//! Owns the tracked-quest map, the action-template registry, the site-link
//! index, and the fixed-rate tick gate. It is the sole entry point external
//! systems use; one machine per running session, explicitly constructed and
//! passed by reference (no global singleton).
//!
//! Everything runs single-threaded and cooperatively: `tick` is a
//! synchronous call, no two ticks overlap, and only the machine's own tick
//! loop mutates the tracked-quest map and site-link list. Quests report
//! cross-cutting effects which are applied after the update loop, so the
//! map is never restructured while it is being iterated.

use std::collections::HashMap;
use std::time::Instant;

use log::{info, warn};

use crate::action::QuestEffect;
use crate::idgen::{self, QuestUid};
use crate::loader::{EngineConfig, load_quest_source};
use crate::parser::Parser;
use crate::quest::Quest;
use crate::save::SaveData;
use crate::site::{SiteLink, SiteType};
use crate::template::{ActionTemplate, TemplateRegistry};
use crate::world::{NpcIdentity, WorldTime, WorldView};

/// Process-wide advisory notifications. Fired synchronously, fire-and-forget;
/// no component blocks on a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestEvent {
    QuestStarted(QuestUid),
    QuestEnded(QuestUid),
    Tick,
    /// A quest surfaced a message from its message table.
    Message { quest: QuestUid, message_id: u32 },
    /// A quest added an entry to the player's log.
    LogEntry { quest: QuestUid, message_id: u32, step: u32 },
    /// A quest handed an item to the player; the template is opaque.
    ItemGranted { quest: QuestUid, template: String },
    /// A quest asked the host to spawn foes.
    FoeSpawned { quest: QuestUid, kind: String, count: u32 },
}

type Subscriber = Box<dyn FnMut(&QuestEvent)>;
type RegistrationHook = Box<dyn FnOnce(&mut TemplateRegistry)>;

/// Orchestrator owning all running quests and their lifecycle.
pub struct QuestMachine {
    config: EngineConfig,
    registry: TemplateRegistry,
    quests: HashMap<QuestUid, Quest>,
    site_links: Vec<SiteLink>,
    // transient per-tick work queues
    to_invoke: Vec<Quest>,
    to_tombstone: Vec<QuestUid>,
    to_remove: Vec<QuestUid>,
    /// Volatile, externally-set record used for questor matching.
    last_npc_clicked: Option<NpcIdentity>,
    subscribers: Vec<Subscriber>,
    registration_hooks: Vec<RegistrationHook>,
    started: bool,
    created_at: Instant,
    last_tick: Option<Instant>,
}

impl QuestMachine {
    pub fn new(config: EngineConfig) -> Self {
        info!("quest machine created");
        Self {
            config,
            registry: TemplateRegistry::builtin(),
            quests: HashMap::new(),
            site_links: Vec::new(),
            to_invoke: Vec::new(),
            to_tombstone: Vec::new(),
            to_remove: Vec::new(),
            last_npc_clicked: None,
            subscribers: Vec::new(),
            registration_hooks: Vec::new(),
            started: false,
            created_at: Instant::now(),
            last_tick: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Append an action template for lines the builtin catalog does not
    /// cover. Registration order is semantic (first match wins).
    pub fn register_action_template(&mut self, template: ActionTemplate) {
        self.registry.register(template);
    }

    /// Queue a hook to extend the template registry; all hooks run exactly
    /// once, when the machine starts.
    pub fn on_template_registration(&mut self, hook: impl FnOnce(&mut TemplateRegistry) + 'static) {
        self.registration_hooks.push(Box::new(hook));
    }

    /// Subscribe to quest notifications.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&QuestEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Run queued template-registration hooks. Idempotent; also invoked by
    /// the first `update` call.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let hooks = std::mem::take(&mut self.registration_hooks);
        if !hooks.is_empty() {
            info!("running {} template registration hook(s)", hooks.len());
        }
        for hook in hooks {
            hook(&mut self.registry);
        }
    }

    /// Parse quest source lines against this machine's registry.
    ///
    /// # Errors
    /// Propagates any [`crate::ParseError`] to the caller; parse-time errors
    /// are fatal to quest creation.
    pub fn parse_quest(&self, name: &str, lines: &[String]) -> Result<Quest, crate::parser::ParseError> {
        Parser::new(&self.registry).parse(name, lines)
    }

    /// Load and parse a quest source file from the configured quest
    /// directory. A missing or empty file fails with `EmptySource`.
    ///
    /// # Errors
    /// Fails when the source is empty/missing or does not parse.
    pub fn parse_quest_from_file(&self, name: &str) -> anyhow::Result<Quest> {
        let lines = load_quest_source(&self.config.quest_dir, name);
        let quest = self.parse_quest(name, &lines)?;
        Ok(quest)
    }

    /// Register a quest immediately and fire `QuestStarted`.
    ///
    /// Duplicate-UID policy: reject. The tracked quest keeps its identity;
    /// the incoming one is dropped with a warning and `false` is returned.
    pub fn instantiate_quest(&mut self, quest: Quest) -> bool {
        let uid = quest.uid();
        if self.quests.contains_key(&uid) {
            warn!("quest UID {uid} already tracked; rejecting duplicate instantiation");
            return false;
        }
        info!("quest {uid} ('{}') started", quest.name());
        self.quests.insert(uid, quest);
        self.fire(&QuestEvent::QuestStarted(uid));
        true
    }

    /// Defer registration to the next tick's invoke phase, so a quest
    /// created mid-tick never runs partially initialized in the same tick.
    pub fn schedule_quest(&mut self, quest: Quest) {
        info!("quest {} ('{}') scheduled for next tick", quest.uid(), quest.name());
        self.to_invoke.push(quest);
    }

    pub fn get_quest(&self, uid: QuestUid) -> Option<&Quest> {
        self.quests.get(&uid)
    }

    pub fn get_quest_mut(&mut self, uid: QuestUid) -> Option<&mut Quest> {
        self.quests.get_mut(&uid)
    }

    pub fn all_quests(&self) -> impl Iterator<Item = &Quest> {
        self.quests.values()
    }

    pub fn quest_count(&self) -> usize {
        self.quests.len()
    }

    /// False for an untracked UID (defined not-found sentinel; use
    /// [`Self::get_quest`] to distinguish).
    pub fn is_quest_complete(&self, uid: QuestUid) -> bool {
        self.quests.get(&uid).is_some_and(Quest::is_complete)
    }

    /// False for an untracked UID.
    pub fn is_quest_tombstoned(&self, uid: QuestUid) -> bool {
        self.quests.get(&uid).is_some_and(Quest::is_tombstoned)
    }

    /// Rate-gated tick driver, called from the host's frame loop.
    ///
    /// Skipped entirely while a fade is in progress, during the startup
    /// grace period, and until the tick interval has elapsed since the last
    /// evaluation. Both gates are simple time checks, not lifecycle states.
    pub fn update(&mut self, view: &WorldView) {
        self.start();
        if view.fade_in_progress {
            return;
        }
        if self.created_at.elapsed() < self.config.startup_grace() {
            return;
        }
        let due = self
            .last_tick
            .is_none_or(|last| last.elapsed() >= self.config.tick_interval());
        if !due {
            return;
        }
        self.last_tick = Some(Instant::now());
        self.tick(view);
    }

    /// Run one full tick immediately: invoke, update, classify, tombstone,
    /// remove, notify.
    pub fn tick(&mut self, view: &WorldView) {
        // 1. drain scheduled quests into the tracked set
        let pending = std::mem::take(&mut self.to_invoke);
        for quest in pending {
            self.instantiate_quest(quest);
        }

        // 2. update every non-complete quest, gathering deferred effects
        let clicked = self.last_npc_clicked;
        let mut effects = Vec::new();
        for quest in self.quests.values_mut().filter(|q| !q.is_complete()) {
            effects.extend(quest.update(view, clicked.as_ref()));
        }
        self.apply_effects(effects);

        // 3. classify for the drain phases
        for quest in self.quests.values() {
            if quest.is_complete() && !quest.is_tombstoned() {
                self.to_tombstone.push(quest.uid());
            } else if let Some(at) = quest.tombstoned_at() {
                if view.now.seconds_since(at) >= WorldTime::WEEK_SECONDS {
                    self.to_remove.push(quest.uid());
                }
            }
        }

        // 4. tombstone, then remove
        let tombstone = std::mem::take(&mut self.to_tombstone);
        for uid in tombstone {
            self.tombstone_quest(uid, view.now);
        }
        let remove = std::mem::take(&mut self.to_remove);
        for uid in remove {
            self.remove_quest(uid, view.now);
        }

        // 5. advisory tick notification
        self.fire(&QuestEvent::Tick);
    }

    fn apply_effects(&mut self, effects: Vec<QuestEffect>) {
        for effect in effects {
            match effect {
                QuestEffect::AddSiteLink(link) => self.add_site_link(link),
                QuestEffect::ShowMessage { quest, message_id } => {
                    self.fire(&QuestEvent::Message { quest, message_id });
                },
                QuestEffect::LogEntry { quest, message_id, step } => {
                    self.fire(&QuestEvent::LogEntry { quest, message_id, step });
                },
                QuestEffect::GiveItem { quest, template } => {
                    self.fire(&QuestEvent::ItemGranted { quest, template });
                },
                QuestEffect::SpawnFoe { quest, kind, count } => {
                    self.fire(&QuestEvent::FoeSpawned { quest, kind, count });
                },
            }
        }
    }

    /// Dispose a quest, flip its tombstone flag with the current world time,
    /// drop all of its site links, and fire `QuestEnded`. Returns false when
    /// the quest is untracked or already tombstoned.
    pub fn tombstone_quest(&mut self, uid: QuestUid, now: WorldTime) -> bool {
        let Some(quest) = self.quests.get_mut(&uid) else {
            return false;
        };
        if quest.is_tombstoned() {
            return false;
        }
        quest.dispose();
        quest.set_tombstoned(now);
        let before = self.site_links.len();
        self.site_links.retain(|link| link.quest_uid != uid);
        let dropped = before - self.site_links.len();
        if dropped > 0 {
            info!("quest {uid}: dropped {dropped} site link(s) on tombstone");
        }
        self.fire(&QuestEvent::QuestEnded(uid));
        true
    }

    /// Drop a quest from tracking, tombstoning it first when needed.
    /// Returns whether a removal occurred.
    pub fn remove_quest(&mut self, uid: QuestUid, now: WorldTime) -> bool {
        if !self.quests.contains_key(&uid) {
            return false;
        }
        if !self.is_quest_tombstoned(uid) {
            self.tombstone_quest(uid, now);
        }
        self.quests.remove(&uid);
        info!("quest {uid} removed from tracking");
        true
    }

    /// Register a site link. Links already present are not duplicated,
    /// since placement actions re-execute on every tick of their task.
    pub fn add_site_link(&mut self, link: SiteLink) {
        if self.site_links.contains(&link) {
            return;
        }
        info!(
            "site link added: quest {} place '{}' ({:?} map {} building {})",
            link.quest_uid, link.place_symbol, link.site_type, link.map_id, link.building_key
        );
        self.site_links.push(link);
    }

    /// Linear scan of the flat site-link list. `building_key == 0` matches
    /// any building at the location. The working set is small and churns
    /// slowly; no index structure is kept on top of it.
    pub fn get_site_links(&self, site_type: SiteType, map_id: i32, building_key: u32) -> Vec<SiteLink> {
        self.site_links
            .iter()
            .filter(|link| link.matches(site_type, map_id, building_key))
            .cloned()
            .collect()
    }

    pub fn site_link_count(&self) -> usize {
        self.site_links.len()
    }

    pub fn set_last_npc_clicked(&mut self, identity: NpcIdentity) {
        self.last_npc_clicked = Some(identity);
    }

    pub fn last_npc_clicked(&self) -> Option<NpcIdentity> {
        self.last_npc_clicked
    }

    /// Whether the last-clicked NPC matches a questor person in any
    /// non-tombstoned quest. Identity is the four-field equality heuristic;
    /// a deliberate small-n linear scan over the full resource set.
    pub fn is_last_npc_clicked_an_active_questor(&self) -> bool {
        let Some(clicked) = self.last_npc_clicked else {
            return false;
        };
        self.quests
            .values()
            .filter(|q| !q.is_tombstoned())
            .flat_map(|q| q.resources().values())
            .filter_map(crate::resource::QuestResource::as_person)
            .any(|person| person.is_questor && person.identity == clicked)
    }

    /// Wholesale reset of tracked state. The template registry and event
    /// subscribers survive; quests, site links, queues, and the last-clicked
    /// record do not.
    pub fn clear_state(&mut self) {
        self.quests.clear();
        self.site_links.clear();
        self.to_invoke.clear();
        self.to_tombstone.clear();
        self.to_remove.clear();
        self.last_npc_clicked = None;
        info!("quest machine state cleared");
    }

    /// Dispose and drop every tracked quest along with all site links.
    pub fn purge_all_quests(&mut self) {
        for quest in self.quests.values_mut() {
            quest.dispose();
        }
        let purged = self.quests.len();
        self.quests.clear();
        self.site_links.clear();
        self.to_invoke.clear();
        self.to_tombstone.clear();
        self.to_remove.clear();
        info!("purged {purged} quest(s)");
    }

    /// Capture a versioned snapshot of all tracked quests and site links.
    pub fn save_data(&self) -> SaveData {
        SaveData::capture(&self.site_links, self.quests.values())
    }

    /// Repopulate the machine from a snapshot, replacing all tracked state.
    /// The UID generator is advanced past every restored UID.
    pub fn restore_save_data(&mut self, data: SaveData) {
        data.warn_on_version_mismatch();
        self.clear_state();
        self.site_links = data.site_links;
        for record in data.quests {
            let quest = record.restore();
            idgen::bump_past(quest.uid());
            self.quests.insert(quest.uid(), quest);
        }
        info!(
            "restored {} quest(s) and {} site link(s) from save data",
            self.quests.len(),
            self.site_links.len()
        );
    }

    fn fire(&mut self, event: &QuestEvent) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for subscriber in &mut subscribers {
            subscriber(event);
        }
        subscribers.extend(self.subscribers.drain(..));
        self.subscribers = subscribers;
    }
}
