//! Object and property metadata
//!
//! Metadata is a flat list of `key=value` pairs, serialized as
//! `key1=value1;key2=value2`. Schemas are identified through it.

use std::fmt;

/// Ordered string key/value pairs attached to objects, properties and archives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    entries: Vec<(String, String)>,
}

impl MetaData {
    /// Key naming the schema of an object or compound property
    pub const SCHEMA: &'static str = "schema";

    /// Key naming the schema together with its compound, e.g. `AbcGeom_Xform_v3:.xform`
    pub const SCHEMA_OBJ_TITLE: &'static str = "schemaObjTitle";

    /// Archive key recording the writing application
    pub const APPLICATION: &'static str = "_ai_Application";

    /// Archive key recording the library version string
    pub const ALEMBIC_VERSION: &'static str = "_ai_AlembicVersion";

    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the serialized `key=value;...` form
    ///
    /// Tokens without `=` are skipped. A repeated key keeps its last value.
    pub fn parse(text: &str) -> Self {
        let mut metadata = Self::new();
        for token in text.split(';') {
            if let Some((key, value)) = token.split_once('=') {
                if !key.is_empty() {
                    metadata.set(key, value);
                }
            }
        }
        metadata
    }

    /// Serialize to the `key=value;...` form
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Set a value, replacing an existing entry in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`MetaData::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `schema` value, if any
    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA)
    }

    /// The `schemaObjTitle` value, if any
    pub fn schema_obj_title(&self) -> Option<&str> {
        self.get(Self::SCHEMA_OBJ_TITLE)
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
