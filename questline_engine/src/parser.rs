//! Line-oriented quest source parser.
//!
//! Converts raw text lines into a [`Quest`] program: resource declarations,
//! task headers, and action/condition lines bound through the template
//! registry. Resource declarations are strict -- a malformed declaration or
//! duplicate symbol fails the parse. Everything else is resolved against the
//! registry, and a line no template recognizes is silently skipped (logged
//! at debug). That skip is deliberate: sources written for richer engine
//! builds still parse, with the unsupported lines contributing nothing.
//!
//! Source shape:
//!
//! ```text
//! quest: The Missing Courier
//! -- comment
//! person _giver_ named Lady Brisienna questor
//! site _inn_ building 1024 building 36
//! item _letter_ sealed letter
//! clock _deadline_ 3.12:00
//!
//! clicked npc _giver_
//! say 1010
//! start clock _deadline_
//!
//! _delivered_ task:
//!   pc at _inn_
//!   give pc _letter_
//!   end quest
//! ```
//!
//! Lines before the first task header belong to the implicit global task.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::quest::Quest;
use crate::resource::{ClockDetails, FoeDetails, ItemDetails, PersonDetails, QuestResource};
use crate::site::{SiteDetails, SiteType};
use crate::symbol::Symbol;
use crate::task::Task;
use crate::template::{BindError, BoundOp, TemplateRegistry};

/// Structural parse failures. Fatal to quest creation; unrecognized action
/// lines are not among them by design.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("quest source is empty")]
    EmptySource,
    #[error("line {line_no}: malformed {kind} declaration: '{text}'")]
    MalformedResource {
        kind: &'static str,
        line_no: usize,
        text: String,
    },
    #[error("line {line_no}: duplicate symbol '{symbol}'")]
    DuplicateSymbol { symbol: Symbol, line_no: usize },
    #[error("line {line_no}: duplicate task '{symbol}'")]
    DuplicateTask { symbol: Symbol, line_no: usize },
    #[error("line {line_no}: no {kind} resource '{symbol}' declared")]
    UnknownSymbol {
        kind: &'static str,
        symbol: Symbol,
        line_no: usize,
    },
    #[error("line {line_no}: invalid number '{text}'")]
    InvalidNumber { text: String, line_no: usize },
    #[error("task '{in_task}' references undefined task '{referenced}'")]
    UndefinedTask { referenced: Symbol, in_task: String },
}

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^quest:\s*(.+)$").expect("header pattern"));
static TASK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+) task:$").expect("task pattern"));
// A trailing `questor` is reserved as the questor flag: a display name
// cannot end with that (lowercase) word.
static PERSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^person (\w+) named (.+?)( questor)?$").expect("person pattern"));
static SITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^site (\w+) (town|dungeon|building|remote) (-?\d+)(?: building (\d+))?$").expect("site pattern")
});
static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^item (\w+) (.+)$").expect("item pattern"));
static FOE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^foe (\w+) (.+?)(?: count (\d+))?$").expect("foe pattern"));
static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^clock (\w+) (\d+)\.(\d{1,2}):(\d{2})$").expect("clock pattern"));

const RESOURCE_KEYWORDS: [&str; 5] = ["person", "site", "item", "foe", "clock"];

/// Quest source parser bound to a template registry.
pub struct Parser<'a> {
    registry: &'a TemplateRegistry,
    keep_source: bool,
}

impl<'a> Parser<'a> {
    pub fn new(registry: &'a TemplateRegistry) -> Self {
        Self {
            registry,
            keep_source: false,
        }
    }

    /// Retain the raw source lines on the parsed quest (debug aid only).
    pub fn with_source_retention(mut self) -> Self {
        self.keep_source = true;
        self
    }

    /// Parse quest source lines into a fresh [`Quest`].
    ///
    /// # Errors
    /// Fails on empty source, malformed resource declarations, duplicate
    /// symbols or tasks, references to undeclared resources, and post-parse
    /// validation of task references.
    pub fn parse(&self, name: &str, lines: &[String]) -> Result<Quest, ParseError> {
        if lines.iter().all(|l| l.trim().is_empty()) {
            return Err(ParseError::EmptySource);
        }

        let mut quest = Quest::new(name);
        if self.keep_source {
            quest.source_lines = Some(lines.to_vec());
        }

        // index of the task currently being built; 0 is the global task
        let mut current_task = 0usize;

        for (idx, raw) in lines.iter().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with("--") {
                continue;
            }

            if let Some(caps) = HEADER_RE.captures(line) {
                quest.name = caps[1].trim().to_string();
                continue;
            }

            if let Some(caps) = TASK_RE.captures(line) {
                let symbol = Symbol::new(&caps[1]);
                if quest.resources.contains_key(&symbol) {
                    return Err(ParseError::DuplicateSymbol { symbol, line_no });
                }
                if !quest.add_task(Task::named(symbol.clone())) {
                    return Err(ParseError::DuplicateTask { symbol, line_no });
                }
                current_task = quest.tasks.len() - 1;
                continue;
            }

            // resolve the canonical &'static keyword, not the borrowed word
            let first_word = line.split_whitespace().next().unwrap_or_default();
            if let Some(&kind) = RESOURCE_KEYWORDS.iter().find(|k| **k == first_word) {
                let (symbol, resource) = parse_resource(kind, line, line_no)?;
                if !quest.add_resource(symbol.clone(), resource) {
                    return Err(ParseError::DuplicateSymbol { symbol, line_no });
                }
                continue;
            }

            match self.registry.resolve(line) {
                Some((template, caps)) => match template.bind(&caps, &quest) {
                    Ok(BoundOp::Condition(cond)) => quest.tasks[current_task].conditions.push(cond),
                    Ok(BoundOp::Action(action)) => quest.tasks[current_task].actions.push(action),
                    Err(BindError::UnknownSymbol { kind, symbol }) => {
                        return Err(ParseError::UnknownSymbol { kind, symbol, line_no });
                    },
                    Err(BindError::InvalidNumber(text)) => {
                        return Err(ParseError::InvalidNumber { text, line_no });
                    },
                },
                None => debug!("line {line_no}: no template matches '{line}', skipping"),
            }
        }

        validate_task_references(&quest)?;
        Ok(quest)
    }
}

fn parse_resource(kind: &'static str, line: &str, line_no: usize) -> Result<(Symbol, QuestResource), ParseError> {
    let malformed = || ParseError::MalformedResource {
        kind,
        line_no,
        text: line.to_string(),
    };
    match kind {
        "person" => {
            let caps = PERSON_RE.captures(line).ok_or_else(malformed)?;
            let is_questor = caps.get(3).is_some();
            Ok((
                Symbol::new(&caps[1]),
                QuestResource::Person(PersonDetails::new(caps[2].trim(), is_questor)),
            ))
        },
        "site" => {
            let caps = SITE_RE.captures(line).ok_or_else(malformed)?;
            let site_type = match &caps[2] {
                "town" => SiteType::Town,
                "dungeon" => SiteType::Dungeon,
                "building" => SiteType::Building,
                _ => SiteType::Remote,
            };
            let map_id = caps[3].parse().map_err(|_| malformed())?;
            let building_key = match caps.get(4) {
                Some(m) => m.as_str().parse().map_err(|_| malformed())?,
                None => 0,
            };
            Ok((
                Symbol::new(&caps[1]),
                QuestResource::Place(SiteDetails {
                    site_type,
                    map_id,
                    building_key,
                }),
            ))
        },
        "item" => {
            let caps = ITEM_RE.captures(line).ok_or_else(malformed)?;
            Ok((
                Symbol::new(&caps[1]),
                QuestResource::Item(ItemDetails {
                    template: caps[2].trim().to_string(),
                    given_to_player: false,
                }),
            ))
        },
        "foe" => {
            let caps = FOE_RE.captures(line).ok_or_else(malformed)?;
            let count = match caps.get(3) {
                Some(m) => m.as_str().parse().map_err(|_| malformed())?,
                None => 1,
            };
            Ok((
                Symbol::new(&caps[1]),
                QuestResource::Foe(FoeDetails {
                    kind: caps[2].trim().to_string(),
                    count,
                    spawned: false,
                }),
            ))
        },
        "clock" => {
            let caps = CLOCK_RE.captures(line).ok_or_else(malformed)?;
            let days: u64 = caps[2].parse().map_err(|_| malformed())?;
            let hours: u64 = caps[3].parse().map_err(|_| malformed())?;
            let minutes: u64 = caps[4].parse().map_err(|_| malformed())?;
            if hours >= 24 || minutes >= 60 {
                return Err(malformed());
            }
            let duration_secs = (days * 24 * 60 * 60) + (hours * 60 * 60) + (minutes * 60);
            Ok((Symbol::new(&caps[1]), QuestResource::Clock(ClockDetails::new(duration_secs))))
        },
        _ => Err(malformed()),
    }
}

/// Task references may be forward references, so they are checked once the
/// whole source has been read. Guarantees no dangling references survive
/// parsing.
fn validate_task_references(quest: &Quest) -> Result<(), ParseError> {
    let task_exists = |sym: &Symbol| quest.task(sym).is_some();
    for task in quest.tasks() {
        let in_task = task.label().to_string();
        for condition in &task.conditions {
            if let crate::task::Condition::TasksTriggered(syms) = condition {
                for sym in syms {
                    if !task_exists(sym) {
                        return Err(ParseError::UndefinedTask {
                            referenced: sym.clone(),
                            in_task,
                        });
                    }
                }
            }
        }
        for action in &task.actions {
            let referenced = match action {
                crate::action::Action::StartTask(sym) | crate::action::Action::ClearTask(sym) => Some(sym),
                _ => None,
            };
            if let Some(sym) = referenced {
                if !task_exists(sym) {
                    return Err(ParseError::UndefinedTask {
                        referenced: sym.clone(),
                        in_task,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::task::Condition;

    fn lines(source: &str) -> Vec<String> {
        source.lines().map(str::to_string).collect()
    }

    fn parse(source: &str) -> Result<Quest, ParseError> {
        let registry = TemplateRegistry::builtin();
        Parser::new(&registry).parse("test", &lines(source))
    }

    const COURIER: &str = "\
quest: The Missing Courier
-- delivery quest
person _giver_ named Lady Brisienna questor
site _inn_ building 1024 building 36
item _letter_ sealed letter
clock _deadline_ 3.12:00

clicked npc _giver_
say 1010
start clock _deadline_
start task _delivered_

_delivered_ task:
pc at _inn_
give pc _letter_
end quest
";

    #[test]
    fn parses_resources_tasks_and_header() {
        let quest = parse(COURIER).unwrap();
        assert_eq!(quest.name(), "The Missing Courier");
        assert_eq!(quest.resources().len(), 4);
        assert_eq!(quest.tasks().len(), 2);
        assert!(quest.tasks()[0].is_global());
        assert_eq!(quest.tasks()[1].name, Some(Symbol::new("_delivered_")));

        // global task picked up the preamble ops
        assert_eq!(
            quest.tasks()[0].conditions,
            vec![Condition::ClickedNpc(Symbol::new("_giver_"))]
        );
        assert_eq!(quest.tasks()[0].actions.len(), 3);
        assert_eq!(quest.tasks()[1].actions.len(), 2);
    }

    #[test]
    fn every_resource_keyword_declares_its_kind() {
        let quest = parse(
            "person _p_ named Some Person\n\
             site _s_ town 12\n\
             item _i_ iron key\n\
             foe _f_ skeleton count 4\n\
             clock _c_ 0.01:30\n",
        )
        .unwrap();
        assert_eq!(quest.resources().len(), 5);
        assert!(quest.person(&Symbol::new("_p_")).is_some());
        assert!(quest.place(&Symbol::new("_s_")).is_some());
        assert_eq!(quest.item(&Symbol::new("_i_")).unwrap().template, "iron key");
        match quest.resource(&Symbol::new("_f_")).unwrap() {
            QuestResource::Foe(foe) => {
                assert_eq!(foe.kind, "skeleton");
                assert_eq!(foe.count, 4);
            },
            other => panic!("expected a foe, got {other:?}"),
        }
        assert_eq!(quest.clock(&Symbol::new("_c_")).unwrap().duration_secs, 3_600 + 30 * 60);
    }

    #[test]
    fn clock_duration_is_days_hours_minutes() {
        let quest = parse("clock _d_ 3.12:30").unwrap();
        let clock = quest.clock(&Symbol::new("_d_")).unwrap();
        assert_eq!(clock.duration_secs, 3 * 86_400 + 12 * 3_600 + 30 * 60);
    }

    #[test]
    fn empty_source_is_fatal() {
        assert_eq!(parse(""), Err(ParseError::EmptySource));
        assert_eq!(parse("\n   \n"), Err(ParseError::EmptySource));
    }

    #[test]
    fn unrecognized_lines_are_silently_skipped() {
        let quest = parse(
            "item _gold_ gold pieces\nrotate moon widdershins\nsay 10\ngive pc _gold_\n",
        )
        .unwrap();
        // two recognized action lines survive, the unknown one contributes nothing
        assert_eq!(quest.tasks()[0].actions.len(), 2);
    }

    #[test]
    fn malformed_resource_declaration_is_fatal() {
        let err = parse("person _giver_").unwrap_err();
        assert!(matches!(err, ParseError::MalformedResource { kind: "person", .. }));

        let err = parse("clock _t_ sideways").unwrap_err();
        assert!(matches!(err, ParseError::MalformedResource { kind: "clock", .. }));
    }

    #[test]
    fn duplicate_symbol_is_fatal() {
        let err = parse("item _x_ a thing\nitem _x_ another\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateSymbol {
                symbol: Symbol::new("_x_"),
                line_no: 2
            }
        );
    }

    #[test]
    fn dangling_resource_reference_is_fatal() {
        let err = parse("say 1\ngive pc _ghost_\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownSymbol {
                kind: "item",
                ..
            }
        ));
    }

    #[test]
    fn forward_task_reference_is_allowed() {
        let quest = parse("start task _later_\n\n_later_ task:\nend quest\n").unwrap();
        assert_eq!(quest.tasks()[0].actions, vec![Action::StartTask(Symbol::new("_later_"))]);
    }

    #[test]
    fn undefined_task_reference_fails_validation() {
        let err = parse("start task _never_\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::UndefinedTask {
                referenced: Symbol::new("_never_"),
                in_task: "<global>".into()
            }
        );
    }

    #[test]
    fn trailing_questor_word_is_always_the_flag() {
        // "questor" is a reserved trailing keyword, never part of the name
        let quest = parse("person _q_ named wandering questor\n").unwrap();
        let person = quest.person(&Symbol::new("_q_")).unwrap();
        assert!(person.is_questor);
        assert_eq!(person.display_name, "wandering");
    }

    #[test]
    fn questor_flag_and_plain_person_both_parse() {
        let quest = parse("person _a_ named Gondyr the Elder questor\nperson _b_ named Plain Miller\n").unwrap();
        assert!(quest.person(&Symbol::new("_a_")).unwrap().is_questor);
        let plain = quest.person(&Symbol::new("_b_")).unwrap();
        assert!(!plain.is_questor);
        assert_eq!(plain.display_name, "Plain Miller");
    }

    #[test]
    fn source_retention_is_opt_in() {
        let registry = TemplateRegistry::builtin();
        let src = lines("say 1\n");
        let without = Parser::new(&registry).parse("q", &src).unwrap();
        assert!(without.source_lines().is_none());
        let with = Parser::new(&registry).with_source_retention().parse("q", &src).unwrap();
        assert_eq!(with.source_lines().unwrap().len(), 1);
    }
}
