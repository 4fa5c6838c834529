#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const QUESTLINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod action;
pub mod idgen;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod quest;
pub mod resource;
pub mod save;
pub mod site;
pub mod symbol;
pub mod task;
pub mod template;
pub mod world;

// Re-exports for convenience
pub use action::{Action, ActionError, QuestEffect};
pub use idgen::QuestUid;
pub use loader::EngineConfig;
pub use machine::{QuestEvent, QuestMachine};
pub use parser::{ParseError, Parser};
pub use quest::Quest;
pub use resource::QuestResource;
pub use save::SaveData;
pub use site::{SiteDetails, SiteLink, SiteType};
pub use symbol::Symbol;
pub use task::{Condition, Task};
pub use template::{ActionTemplate, BoundOp, TemplateRegistry};
pub use world::{NpcIdentity, WorldTime, WorldView};
