//! Ordered metadata model populated by format handlers
//!
//! Entries keep the position of their first insertion; setting an existing
//! name replaces the value in place.

use std::collections::HashMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Reference to a bitmap produced alongside a property model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BitmapRef(pub usize);

/// Tagged property value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Unsigned(u64),
    /// Seconds since the Unix epoch
    Timestamp(i64),
    Bytes(Vec<u8>),
    Bitmap(BitmapRef),
}

impl PropertyValue {
    /// Short type name for display
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Unsigned(_) => "unsigned",
            PropertyValue::Timestamp(_) => "timestamp",
            PropertyValue::Bytes(_) => "bytes",
            PropertyValue::Bitmap(_) => "bitmap",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::Unsigned(v) => Some(*v),
            PropertyValue::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Integer(v) | PropertyValue::Timestamp(v) => write!(f, "{}", v),
            PropertyValue::Unsigned(v) => write!(f, "{}", v),
            PropertyValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            PropertyValue::Bitmap(r) => write!(f, "<bitmap #{}>", r.0),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Unsigned(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Unsigned(u64::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<BitmapRef> for PropertyValue {
    fn from(value: BitmapRef) -> Self {
        PropertyValue::Bitmap(value)
    }
}

/// Insertion-ordered name/value metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyModel {
    entries: Vec<(String, PropertyValue)>,
    index: HashMap<String, usize>,
}

impl PropertyModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, keeping the original position if it already exists
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        let value = value.into();

        match self.index.get(&name) {
            Some(&idx) => self.entries[idx].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Get the value stored for `name`
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.index.get(name).map(|&idx| &self.entries[idx].1)
    }

    /// Whether `name` is present
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the model has no properties
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Property names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Convert to an ordered JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for PropertyModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
