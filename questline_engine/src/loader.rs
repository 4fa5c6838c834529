//! Engine configuration and text loaders.
//!
//! Quest sources and auxiliary tables live as plain text on disk; the
//! loaders here are the only file access the engine performs besides save
//! files. A missing source is logged and yields an empty result -- it never
//! throws up through the parser boundary (the caller decides whether empty
//! is fatal).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// Default extension appended to quest and table names without one.
pub const SOURCE_EXT: &str = "txt";

/// Engine tuning and data paths, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quest_dir: PathBuf,
    pub table_dir: PathBuf,
    /// Milliseconds between tick evaluations (~10 Hz by default).
    pub tick_interval_ms: u64,
    /// Milliseconds after machine creation before the first tick may run.
    pub startup_grace_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quest_dir: PathBuf::from("quests"),
            table_dir: PathBuf::from("tables"),
            tick_interval_ms: 100,
            startup_grace_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    /// Read a config from a TOML file.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Read a config, falling back to defaults (with a warning) on failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("using default engine config: {err:#}");
                Self::default()
            },
        }
    }
}

fn resolve_source_path(dir: &Path, name: &str) -> PathBuf {
    let mut path = dir.join(name);
    if path.extension().is_none() {
        path.set_extension(SOURCE_EXT);
    }
    path
}

/// Load quest source text by name, appending the default extension when
/// absent. Returns an empty line list (and warns) when the file is missing
/// or unreadable.
pub fn load_quest_source(dir: &Path, name: &str) -> Vec<String> {
    let path = resolve_source_path(dir, name);
    match fs::read_to_string(&path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(err) => {
            warn!("quest source '{}' not loaded: {err}", path.display());
            Vec::new()
        },
    }
}

/// Load an auxiliary lookup table by name. Tables are opaque `key: value`
/// lines; comments (`--`) and lines without a separator are skipped. Same
/// missing-file contract as [`load_quest_source`].
pub fn load_table(dir: &Path, name: &str) -> HashMap<String, String> {
    let path = resolve_source_path(dir, name);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            warn!("table '{}' not loaded: {err}", path.display());
            return HashMap::new();
        },
    };
    let mut table = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            table.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_ten_hertz() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.quest_dir, PathBuf::from("quests"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "tick_interval_ms = 50\nquest_dir = \"data/quests\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.quest_dir, PathBuf::from("data/quests"));
        // unspecified fields fall back to defaults
        assert_eq!(config.startup_grace_ms, 1000);
    }

    #[test]
    fn load_or_default_swallows_missing_file() {
        let config = EngineConfig::load_or_default(Path::new("no/such/engine.toml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn quest_source_gets_default_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("courier.txt"), "say 1\nsay 2\n").unwrap();

        let lines = load_quest_source(dir.path(), "courier");
        assert_eq!(lines.len(), 2);

        // explicit extension is left alone
        let lines = load_quest_source(dir.path(), "courier.txt");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn missing_quest_source_yields_empty_lines() {
        let dir = tempdir().unwrap();
        assert!(load_quest_source(dir.path(), "nonexistent").is_empty());
    }

    #[test]
    fn tables_parse_key_value_lines_and_skip_noise() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("messages.txt"),
            "-- message table\n1010: Greetings, traveler.\n1011: Farewell.\nnot a pair\n",
        )
        .unwrap();

        let table = load_table(dir.path(), "messages");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("1010").map(String::as_str), Some("Greetings, traveler."));
    }
}
