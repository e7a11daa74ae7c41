//! Typed records of `library.json`
//!
//! The document is validated as a whole against the JSON schema, then each
//! entry is decoded on its own so a bad entry only fails itself. All the
//! "missing or null" rules live here:
//!
//! - keys that must be present but may hold `null` use [`nullable`]
//! - nested collections that may be absent or `null` use [`null_as_empty`]
//! - plain `Option` fields with `#[serde(default)]` may be absent or `null`
//!
//! Unknown fields are ignored.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One report in the library
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub sha1_hash: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub title: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub authors: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable")]
    pub file_creation_date: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub file_modification_date: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub file_size: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub plain_text: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub language: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub ts_created_at: Option<Value>,
    #[serde(deserialize_with = "nullable")]
    pub ts_updated_at: Option<Value>,
    #[serde(deserialize_with = "nullable")]
    pub ts_creation_date: Option<Value>,
    #[serde(deserialize_with = "nullable")]
    pub ts_modification_date: Option<Value>,
    #[serde(default)]
    pub files: Option<EntryFiles>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: Vec<LibrarySource>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub references: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub report_names: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub threat_actors: Vec<LibraryThreatActor>,
}

/// Paths of the files extracted for an entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFiles {
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySource {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<String>,
    #[serde(default)]
    pub reports: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryThreatActor {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub main_name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub source_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tools: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub reports: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aliases: Vec<String>,
}

impl LibraryEntry {
    /// Decode one entry of the raw document
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }

    pub fn files(&self) -> EntryFiles {
        self.files.clone().unwrap_or_default()
    }
}

/// Render a pass-through value for a TEXT column.
///
/// Strings are stored as-is, other JSON values as their JSON text.
pub fn verbatim(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Key must be present, `null` maps to `None`
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Absent (with `#[serde(default)]`) or `null` both decode to an empty list
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
