//! Keys and entities as they travel between the store, the pipeline and CSV files.
//!
//! An entity is identified by a `Key` (namespace + kind + local identifier) and
//! carries an ordered map of JSON property values. Entities are only ever
//! replaced as a whole; there is no partial-field update.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Reserved first column of every export/import file.
pub const ENTITY_KEY_COLUMN: &str = "EntityKey";

/// Human label for the default (empty) namespace.
pub const DEFAULT_NAMESPACE_LABEL: &str = "(default)";

/// Local identifier of an entity: a numeric id or a string name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityId {
    Id(i64),
    Name(String),
}

impl EntityId {
    /// Interprets a raw CSV cell.
    ///
    /// Digits with an optional leading `-` that fit in `i64` become a numeric
    /// id, so every exported id reads back as an id. Anything else is kept
    /// verbatim as a name.
    pub fn parse(raw: &str) -> Self {
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<i64>() {
                return EntityId::Id(id);
            }
        }
        EntityId::Name(raw.to_string())
    }

    /// Backend tag used by the SQL store (`id` or `name`).
    pub fn tag(&self) -> &'static str {
        match self {
            EntityId::Id(_) => "id",
            EntityId::Name(_) => "name",
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Id(id) => write!(f, "{}", id),
            EntityId::Name(name) => f.write_str(name),
        }
    }
}

/// Full identifier of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub namespace: String,
    pub kind: String,
    pub id: EntityId,
}

impl Key {
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>, id: EntityId) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            id,
        }
    }
}

/// One stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: Key,
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Returns the property rendered as a CSV cell.
    ///
    /// Strings are written verbatim, `null` and absent properties become an
    /// empty cell and every other JSON value uses its JSON text.
    pub fn cell(&self, column: &str) -> String {
        match self.properties.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Formats a namespace for display, mapping the empty namespace to `(default)`.
pub fn display_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE_LABEL
    } else {
        namespace
    }
}
