//! Entity catalog: alias resolution and respawn metadata.

use std::collections::HashMap;
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;
use tracing::{error, info, warn};

/// One catalog entry, keyed externally by its canonical id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityDef {
    /// Alternative names, matched case-insensitively.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub respawn_hours: i64,
    #[serde(default)]
    pub respawn_minutes: i64,
    #[serde(default)]
    pub respawn_seconds: i64,
    /// Human-readable name; falls back to the canonical id.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Emoji prefix for display.
    #[serde(default)]
    pub emoji: Option<String>,
}

impl EntityDef {
    /// Respawn duration from the hours/minutes/seconds fields.
    pub fn respawn_duration(&self) -> Duration {
        Duration::hours(self.respawn_hours)
            + Duration::minutes(self.respawn_minutes)
            + Duration::seconds(self.respawn_seconds)
    }
}

/// Read-mostly lookup table over entity definitions.
///
/// Built once at startup; a config reload swaps in a whole new catalog.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    entities: HashMap<String, EntityDef>,
    /// Lower-cased alias -> canonical id.
    alias_map: HashMap<String, String>,
}

impl EntityCatalog {
    /// Build a catalog from (canonical id, definition) entries.
    ///
    /// The alias map folds each entry's canonical id, display name, and
    /// aliases, lower-cased. Later entries overwrite earlier ones on alias
    /// collision, so entry order matters.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, EntityDef)>) -> Self {
        let mut entities = HashMap::new();
        let mut alias_map = HashMap::new();

        for (canonical_id, def) in entries {
            alias_map.insert(canonical_id.to_lowercase(), canonical_id.clone());
            if let Some(display_name) = &def.display_name {
                alias_map.insert(display_name.to_lowercase(), canonical_id.clone());
            }
            for alias in &def.aliases {
                alias_map.insert(alias.to_lowercase(), canonical_id.clone());
            }
            entities.insert(canonical_id, def);
        }

        Self { entities, alias_map }
    }

    /// Load the catalog from a JSON file keyed by canonical id.
    ///
    /// A missing or unreadable file yields an empty catalog rather than an
    /// error: the bot stays up and simply knows no entities.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "entity catalog not readable, starting empty");
                return Self::default();
            }
        };

        // serde_json's preserve_order feature keeps file order, which decides
        // alias collisions (last write wins).
        let parsed: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(path = %path.display(), error = %e, "entity catalog is not valid JSON, starting empty");
                return Self::default();
            }
        };

        let entries = parsed.into_iter().filter_map(|(id, value)| {
            match serde_json::from_value::<EntityDef>(value) {
                Ok(def) => Some((id, def)),
                Err(e) => {
                    error!(entity = %id, error = %e, "skipping malformed catalog entry");
                    None
                }
            }
        });

        let catalog = Self::from_entries(entries);
        info!(entities = catalog.len(), "loaded entity catalog");
        catalog
    }

    /// Case-insensitive exact alias lookup. No fuzzy matching.
    pub fn resolve_alias(&self, text: &str) -> Option<&str> {
        self.alias_map.get(&text.to_lowercase()).map(String::as_str)
    }

    /// Emoji-prefixed display name, falling back to the canonical id.
    pub fn display(&self, canonical_id: &str) -> String {
        let Some(def) = self.entities.get(canonical_id) else {
            return canonical_id.to_string();
        };
        let name = def.display_name.as_deref().unwrap_or(canonical_id);
        match &def.emoji {
            Some(emoji) => format!("{}{}", emoji, name),
            None => name.to_string(),
        }
    }

    /// Respawn duration for an entity; zero if unknown.
    pub fn respawn_duration(&self, canonical_id: &str) -> Duration {
        self.entities
            .get(canonical_id)
            .map(EntityDef::respawn_duration)
            .unwrap_or_else(Duration::zero)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
