use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::error::{Error, Result};

/// Hashable dictionary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl DictKey {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(DictKey::Int(*v)),
            Value::Str(v) => Ok(DictKey::Str(v.clone())),
            Value::Bool(v) => Ok(DictKey::Bool(*v)),
            other => Err(Error::TypeProjection {
                expected: "int, str or bool dictionary key",
                found: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for DictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictKey::Int(v) => write!(f, "{v}"),
            DictKey::Str(v) => write!(f, "{v:?}"),
            DictKey::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Insertion-ordered dictionary. Later duplicates replace earlier entries.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Arc<Vec<(DictKey, Value)>>,
}

impl Dict {
    pub fn new(pairs: impl IntoIterator<Item = (DictKey, Value)>) -> Self {
        let mut entries: Vec<(DictKey, Value)> = Vec::new();
        for (key, value) in pairs {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &DictKey) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Lookup that reports the missing key.
    pub fn at(&self, key: &DictKey) -> Result<&Value> {
        self.get(key).ok_or_else(|| Error::KeyNotFound {
            key: key.to_string(),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &DictKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DictKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}
