//! Attribute maps: caller overrides and resolved attribute sets.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::json_kind;
use crate::error::{FactoryError, Result};

/// A string-keyed map of attribute values.
///
/// Used both for the overrides a caller passes to a factory and for the
/// fully resolved set handed to the construction function. `null` counts
/// as undefined: it never overwrites a value from an earlier layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: Map<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(FactoryError::NotAnObject {
                kind: json_kind(&other),
            }),
        }
    }

    /// Serialize a struct into attributes.
    pub fn from_serialized(value: &impl Serialize) -> Result<Self> {
        Self::from_json(serde_json::to_value(value)?)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_serialized(self, key: impl Into<String>, value: &impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.with(key, value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Lay `other` on top of `self`. Only defined values in `other` win.
    pub fn overlay(mut self, other: Attributes) -> Self {
        for (key, value) in other.values {
            if !value.is_null() {
                self.values.insert(key, value);
            }
        }
        self
    }

    /// Drop every undefined entry.
    pub fn defined(self) -> Self {
        Self::new().overlay(self)
    }

    /// Decode the whole attribute set into a typed record.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&Value::Object(self.values.clone()))?)
    }

    /// Decode a single attribute.
    pub fn parse_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.values.get(key).unwrap_or(&Value::Null);
        Ok(T::deserialize(value)?)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.values)
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
