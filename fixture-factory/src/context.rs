//! The per-test dependency context and its restricted views.
//!
//! A [`Context`] holds the values other fixtures provide to a test. Fields
//! never see the whole context: each derivation receives a [`ContextView`]
//! limited to the keys the field declared, so the declared dependency list
//! is the only way a field can reach into the context.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{FactoryError, Result};

/// Values supplied per test by the surrounding fixtures.
///
/// A key mapped to `null` is treated the same as an absent key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(FactoryError::NotAnObject {
                kind: json_kind(&other),
            }),
        }
    }

    /// Add a value, replacing any previous value under the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Add any serializable value, typically another fixture's output.
    pub fn with_serialized(self, key: impl Into<String>, value: &impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.with(key, value))
    }

    /// The defined value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Restrict the context to `keys`.
    pub fn pick<'a>(&'a self, keys: &'a [String]) -> ContextView<'a> {
        ContextView {
            context: self,
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A [`Context`] restricted to a field's declared dependency keys.
#[derive(Debug, Clone, Copy)]
pub struct ContextView<'a> {
    context: &'a Context,
    keys: &'a [String],
}

impl<'a> ContextView<'a> {
    /// Keys this view is allowed to read.
    pub fn keys(&self) -> &'a [String] {
        self.keys
    }

    /// The raw defined value for a declared key.
    ///
    /// Reading a key that was not declared returns `None`.
    pub fn value(&self, key: &str) -> Option<&'a Value> {
        if !self.keys.iter().any(|k| k == key) {
            warn!(
                key,
                declared = ?self.keys,
                "context key read without being declared as a dependency"
            );
            return None;
        }
        self.context.get(key)
    }

    /// Decode a declared key into `T`.
    ///
    /// Undefined keys and values of the wrong shape both yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.value(key)?;
        match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(key, error = %err, "context value has an unexpected shape");
                None
            }
        }
    }

    /// True when every declared key has a defined value.
    pub fn is_complete(&self) -> bool {
        self.keys.iter().all(|k| self.context.is_defined(k))
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
