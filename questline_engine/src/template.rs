//! Action templates and the ordered first-match registry.
//!
//! A template is a stateless prototype: a compiled pattern test plus a
//! factory that binds a quest-scoped [`Condition`] or [`Action`] from the
//! captured parameters. The registry resolves script lines by a linear,
//! first-match scan in registration order -- order is semantic, and
//! templates with more specific patterns must be registered before more
//! general ones (the builtin catalog documents its own ordering). A line
//! matching no template is not an error; callers skip it.

use log::debug;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::action::Action;
use crate::quest::Quest;
use crate::symbol::Symbol;
use crate::task::Condition;

/// What a template binds: a task trigger condition or an executable action.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundOp {
    Condition(Condition),
    Action(Action),
}

/// Failure binding a matched line to a concrete op.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("no {kind} resource '{symbol}' declared")]
    UnknownSymbol { kind: &'static str, symbol: Symbol },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

type BindFn = fn(&Captures, &Quest) -> Result<BoundOp, BindError>;

/// Stateless pattern + factory pair, registered once at startup.
pub struct ActionTemplate {
    pub name: &'static str,
    pattern: Regex,
    bind: BindFn,
}

impl std::fmt::Debug for ActionTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTemplate")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl ActionTemplate {
    /// Build a template from a regex pattern source.
    ///
    /// # Errors
    /// Returns the regex compile error for an invalid pattern.
    pub fn new(name: &'static str, pattern: &str, bind: BindFn) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            bind,
        })
    }

    /// Pattern test: captures on success, `None` on no match.
    pub fn test<'a>(&self, line: &'a str) -> Option<Captures<'a>> {
        self.pattern.captures(line)
    }

    /// Bind a concrete op from matched parameters, resolved against `quest`.
    ///
    /// # Errors
    /// Returns a [`BindError`] when a referenced resource is undeclared or a
    /// numeric capture does not fit.
    pub fn bind(&self, caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
        (self.bind)(caps, quest)
    }
}

/// Ordered template list with first-match resolution.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: Vec<ActionTemplate>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The builtin catalog.
    ///
    /// Registration order (first match wins):
    /// 1. `clicked npc <person>` -- condition
    /// 2. `when clock <clock> expires` -- condition (before the bare `when`
    ///    forms, which would otherwise shadow longer lines starting `when`)
    /// 3. `when <task> and <task>` -- condition (before bare `when`)
    /// 4. `when <task>` -- condition
    /// 5. `pc at <place>` -- condition
    /// 6. `say <msg>`
    /// 7. `log <msg> step <n>`
    /// 8. `start task <task>` / 9. `clear task <task>`
    /// 10. `start clock <clock>` / 11. `stop clock <clock>`
    /// 12. `place npc <person> at <place>` / 13. `place item <item> at <place>`
    /// 14. `give pc <item>`
    /// 15. `create foe <foe>`
    /// 16. `end quest`
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(tpl("clicked-npc", r"^clicked npc (\w+)$", bind_clicked_npc));
        registry.register(tpl("when-clock-expires", r"^when clock (\w+) expires$", bind_clock_expired));
        registry.register(tpl("when-both-tasks", r"^when (\w+) and (\w+)$", bind_when_both));
        registry.register(tpl("when-task", r"^when (\w+)$", bind_when_one));
        registry.register(tpl("pc-at", r"^pc at (\w+)$", bind_pc_at));
        registry.register(tpl("say", r"^say (\d+)$", bind_say));
        registry.register(tpl("log", r"^log (\d+) step (\d+)$", bind_log));
        registry.register(tpl("start-task", r"^start task (\w+)$", bind_start_task));
        registry.register(tpl("clear-task", r"^clear task (\w+)$", bind_clear_task));
        registry.register(tpl("start-clock", r"^start clock (\w+)$", bind_start_clock));
        registry.register(tpl("stop-clock", r"^stop clock (\w+)$", bind_stop_clock));
        registry.register(tpl("place-npc", r"^place npc (\w+) at (\w+)$", bind_place_npc));
        registry.register(tpl("place-item", r"^place item (\w+) at (\w+)$", bind_place_item));
        registry.register(tpl("give-pc", r"^give pc (\w+)$", bind_give_pc));
        registry.register(tpl("create-foe", r"^create foe (\w+)$", bind_create_foe));
        registry.register(tpl("end-quest", r"^end quest$", bind_end_quest));
        registry
    }

    /// Append a template. No dedup: registering twice means matching twice,
    /// idempotency is the caller's responsibility.
    pub fn register(&mut self, template: ActionTemplate) {
        debug!("registered action template '{}'", template.name);
        self.templates.push(template);
    }

    /// Linear first-match scan in registration order.
    pub fn resolve<'a, 'b>(&'a self, line: &'b str) -> Option<(&'a ActionTemplate, Captures<'b>)> {
        self.templates
            .iter()
            .find_map(|t| t.test(line).map(|caps| (t, caps)))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn tpl(name: &'static str, pattern: &str, bind: BindFn) -> ActionTemplate {
    ActionTemplate::new(name, pattern, bind).expect("builtin template pattern must compile")
}

fn cap_symbol(caps: &Captures, idx: usize) -> Symbol {
    Symbol::new(&caps[idx])
}

fn cap_u32(caps: &Captures, idx: usize) -> Result<u32, BindError> {
    caps[idx]
        .parse()
        .map_err(|_| BindError::InvalidNumber(caps[idx].to_string()))
}

fn require_person(quest: &Quest, sym: &Symbol) -> Result<(), BindError> {
    quest.person(sym).map(|_| ()).ok_or(BindError::UnknownSymbol {
        kind: "person",
        symbol: sym.clone(),
    })
}

fn require_place(quest: &Quest, sym: &Symbol) -> Result<(), BindError> {
    quest.place(sym).map(|_| ()).ok_or(BindError::UnknownSymbol {
        kind: "place",
        symbol: sym.clone(),
    })
}

fn require_item(quest: &Quest, sym: &Symbol) -> Result<(), BindError> {
    quest.item(sym).map(|_| ()).ok_or(BindError::UnknownSymbol {
        kind: "item",
        symbol: sym.clone(),
    })
}

fn require_clock(quest: &Quest, sym: &Symbol) -> Result<(), BindError> {
    quest.clock(sym).map(|_| ()).ok_or(BindError::UnknownSymbol {
        kind: "clock",
        symbol: sym.clone(),
    })
}

fn bind_clicked_npc(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    require_person(quest, &sym)?;
    Ok(BoundOp::Condition(Condition::ClickedNpc(sym)))
}

fn bind_clock_expired(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    require_clock(quest, &sym)?;
    Ok(BoundOp::Condition(Condition::ClockExpired(sym)))
}

// Task references may be forward references; the parser validates them after
// the whole source has been read.
fn bind_when_both(caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Condition(Condition::TasksTriggered(vec![
        cap_symbol(caps, 1),
        cap_symbol(caps, 2),
    ])))
}

fn bind_when_one(caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Condition(Condition::TasksTriggered(vec![cap_symbol(caps, 1)])))
}

fn bind_pc_at(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    require_place(quest, &sym)?;
    Ok(BoundOp::Condition(Condition::PlayerAtPlace(sym)))
}

fn bind_say(caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Action(Action::Say {
        message_id: cap_u32(caps, 1)?,
    }))
}

fn bind_log(caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Action(Action::LogMessage {
        message_id: cap_u32(caps, 1)?,
        step: cap_u32(caps, 2)?,
    }))
}

fn bind_start_task(caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Action(Action::StartTask(cap_symbol(caps, 1))))
}

fn bind_clear_task(caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Action(Action::ClearTask(cap_symbol(caps, 1))))
}

fn bind_start_clock(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    require_clock(quest, &sym)?;
    Ok(BoundOp::Action(Action::StartClock(sym)))
}

fn bind_stop_clock(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    require_clock(quest, &sym)?;
    Ok(BoundOp::Action(Action::StopClock(sym)))
}

fn bind_place_npc(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let npc = cap_symbol(caps, 1);
    let place = cap_symbol(caps, 2);
    require_person(quest, &npc)?;
    require_place(quest, &place)?;
    Ok(BoundOp::Action(Action::PlaceNpc { npc, place }))
}

fn bind_place_item(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let item = cap_symbol(caps, 1);
    let place = cap_symbol(caps, 2);
    require_item(quest, &item)?;
    require_place(quest, &place)?;
    Ok(BoundOp::Action(Action::PlaceItem { item, place }))
}

fn bind_give_pc(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    require_item(quest, &sym)?;
    Ok(BoundOp::Action(Action::GivePlayerItem(sym)))
}

fn bind_create_foe(caps: &Captures, quest: &Quest) -> Result<BoundOp, BindError> {
    let sym = cap_symbol(caps, 1);
    quest
        .resource(&sym)
        .filter(|r| r.kind_name() == "foe")
        .ok_or(BindError::UnknownSymbol {
            kind: "foe",
            symbol: sym.clone(),
        })?;
    Ok(BoundOp::Action(Action::CreateFoe(sym)))
}

fn bind_end_quest(_caps: &Captures, _quest: &Quest) -> Result<BoundOp, BindError> {
    Ok(BoundOp::Action(Action::EndQuest))
}
