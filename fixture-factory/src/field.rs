//! Field descriptors and the fluent builder that produces them.
//!
//! ```rust,ignore
//! let name = field::<String>()
//!     .maybe_from(["name"], |ctx| ctx.get("name"))
//!     .default("Unknown".to_string());
//!
//! let author_id = field::<u64>()
//!     .depends_on(["author"])
//!     .using(|ctx| ctx.get::<Author>("author").map(|a| a.id));
//! ```
//!
//! Every step consumes the builder and returns a new one. Sequencing
//! mistakes are recorded on the builder and reported by [`FieldBuilder::build`]
//! (and therefore by `SchemaBuilder::build`), before any test runs.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::context::{Context, ContextView};
use crate::error::FieldError;

type Derivation = Arc<dyn Fn(&ContextView<'_>) -> Option<Value> + Send + Sync>;

fn reader<F>(read: F) -> Derivation
where
    F: Fn(&ContextView<'_>) -> Option<Value> + Send + Sync + 'static,
{
    Arc::new(read)
}

/// Where a field's fallback value comes from.
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    Computed(Derivation),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One declared attribute of a schema.
#[derive(Clone)]
pub struct Field {
    fixture_list: Vec<String>,
    is_required: bool,
    default: Option<DefaultValue>,
    derivation: Option<Derivation>,
}

impl Field {
    fn required() -> Self {
        Self {
            fixture_list: Vec::new(),
            is_required: true,
            default: None,
            derivation: None,
        }
    }

    /// Context keys this field reads.
    pub fn fixture_list(&self) -> &[String] {
        &self.fixture_list
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn has_derivation(&self) -> bool {
        self.derivation.is_some()
    }

    pub(crate) fn resolve_default(&self, context: &Context) -> Option<Value> {
        let value = match self.default.as_ref()? {
            DefaultValue::Constant(value) => Some(value.clone()),
            DefaultValue::Computed(compute) => compute(&context.pick(&self.fixture_list)),
        };
        value.filter(|v| !v.is_null())
    }

    pub(crate) fn derive(&self, context: &Context) -> Option<Value> {
        let derive = self.derivation.as_ref()?;
        derive(&context.pick(&self.fixture_list)).filter(|v| !v.is_null())
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("fixture_list", &self.fixture_list)
            .field("is_required", &self.is_required)
            .field("default", &self.default)
            .field("derivation", &self.derivation.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Begin a required field of value type `T`.
pub fn field<T>() -> FieldBuilder<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    FieldBuilder {
        state: Field::required(),
        error: None,
        _type: PhantomData,
    }
}

/// Immutable builder for a [`Field`] carrying values of type `T`.
pub struct FieldBuilder<T> {
    state: Field,
    error: Option<FieldError>,
    _type: PhantomData<fn() -> T>,
}

impl<T> FieldBuilder<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn fail(mut self, error: FieldError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// The field may stay undefined.
    pub fn optional(mut self) -> Self {
        self.state.is_required = false;
        self
    }

    /// Fallback used when neither an override nor the context provides a value.
    pub fn default(mut self, value: T) -> Self {
        match serde_json::to_value(&value) {
            Ok(value) => {
                self.state.is_required = false;
                self.state.default = Some(DefaultValue::Constant(value));
                self
            }
            Err(err) => self.fail(FieldError::InvalidDefault {
                message: err.to_string(),
            }),
        }
    }

    /// Fallback computed on every resolution, e.g. a fresh random id.
    pub fn default_with<F>(self, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.computed_default(reader(move |_| encode(compute())))
    }

    /// Fallback computed from the keys declared with [`depends_on`](Self::depends_on).
    pub fn default_with_context<F>(self, compute: F) -> Self
    where
        F: Fn(&ContextView<'_>) -> T + Send + Sync + 'static,
    {
        self.computed_default(reader(move |ctx| {
            if !ctx.is_complete() {
                return None;
            }
            encode(compute(ctx))
        }))
    }

    fn computed_default(mut self, compute: Derivation) -> Self {
        self.state.is_required = false;
        self.state.default = Some(DefaultValue::Computed(compute));
        self
    }

    /// Declare the context keys this field reads.
    pub fn depends_on<K, S>(mut self, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.state.fixture_list.is_empty() {
            return self.fail(FieldError::DependsOnTwice);
        }
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return self.fail(FieldError::EmptyDependencies);
        }
        self.state.fixture_list = keys;
        self
    }

    /// Derive the value from the declared keys; `None` leaves it undefined.
    pub fn using<F>(mut self, derive: F) -> Self
    where
        F: Fn(&ContextView<'_>) -> Option<T> + Send + Sync + 'static,
    {
        if self.state.derivation.is_some() {
            return self.fail(FieldError::UseTwice);
        }
        if self.state.fixture_list.is_empty() {
            return self.fail(FieldError::UseBeforeDependsOn);
        }
        self.state.derivation = Some(reader(move |ctx| derive(ctx).and_then(encode)));
        self
    }

    /// Take the context value under `key` as-is.
    pub fn from(self, key: impl Into<String>) -> Self {
        let key = key.into();
        let lookup = key.clone();
        self.depends_on([key]).using(move |ctx| ctx.get::<T>(&lookup))
    }

    /// Transform the declared keys into the value. Runs only when every key is defined.
    pub fn from_with<K, S, F>(self, keys: K, transform: F) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&ContextView<'_>) -> T + Send + Sync + 'static,
    {
        self.depends_on(keys).using(move |ctx| {
            if ctx.is_complete() {
                Some(transform(ctx))
            } else {
                None
            }
        })
    }

    /// Like [`from_with`](Self::from_with), but the transform may yield nothing.
    pub fn maybe_from<K, S, F>(self, keys: K, transform: F) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&ContextView<'_>) -> Option<T> + Send + Sync + 'static,
    {
        self.depends_on(keys).using(transform)
    }

    /// Finish the field, reporting the first sequencing error.
    pub fn build(self) -> Result<Field, FieldError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let reads_context = self.state.derivation.is_some()
            || matches!(self.state.default, Some(DefaultValue::Computed(_)));
        if !self.state.fixture_list.is_empty() && !reads_context {
            return Err(FieldError::UnusedDependencies);
        }
        Ok(self.state)
    }
}

fn encode<T: Serialize>(value: T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "derived field value could not be serialized");
            None
        }
    }
}
