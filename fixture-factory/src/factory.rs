//! Factories: named schemas bound to a construction function.
//!
//! ```rust,ignore
//! let users = Factory::<User>::new("User")?
//!     .with_schema(
//!         Schema::builder()
//!             .field("name", field::<String>().default("Unknown".into()))
//!             .build()?,
//!     )
//!     .fixture(|attrs, expose| async move {
//!         let user: User = attrs.parse()?;
//!         let id = user.id;
//!         expose.expose(user).await?;
//!         delete_user(id).await
//!     });
//!
//! let built = users.build(Attributes::new(), &Context::new()).await?;
//! assert_eq!(built.value().name, "Unknown");
//! built.release().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::attributes::Attributes;
use crate::config::FactoryConfig;
use crate::construct::{Construct, Produced};
use crate::context::Context;
use crate::dependencies::Dependencies;
use crate::error::{FactoryError, Result, Skipped, UndefinedFieldError};
use crate::fixture::{wrap_fixture_fn, Fixture};
use crate::handoff::{acquire, boxed_task, handoff, Expose, Release, Suspended};
use crate::schema::Schema;

/// Per-call lifecycle options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryOptions {
    /// Run teardown after the test body. Defaults to the inverse of
    /// `TFF_SKIP_DESTROY`.
    pub should_destroy: bool,
}

impl FactoryOptions {
    pub fn new(should_destroy: bool) -> Self {
        Self { should_destroy }
    }

    fn release(self) -> Release {
        Release::from_should_destroy(self.should_destroy)
    }
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self::new(!FactoryConfig::global().skip_destroy)
    }
}

struct FactoryState<V> {
    name: String,
    schema: Schema,
    construct: Option<Construct<V>>,
}

impl<V> FactoryState<V>
where
    V: Send + 'static,
{
    fn resolve(&self, context: &Context, overrides: &Attributes) -> Result<Attributes> {
        let data = self.schema.resolve(context, overrides);
        let missing = self.schema.validate(&data);
        if !missing.is_empty() {
            return Err(UndefinedFieldError::new(self.name.clone(), missing).into());
        }
        Ok(data)
    }

    /// Resolve, validate and run `construct` up to its expose point.
    async fn produce(
        &self,
        construct: &Construct<V>,
        context: &Context,
        overrides: &Attributes,
    ) -> Result<(V, Suspended)> {
        let attrs = self.resolve(context, overrides)?;
        debug!(factory = %self.name, attributes = attrs.len(), "constructing value");
        let (expose, exposure) = handoff();
        let task = boxed_task(construct.start(attrs, expose));
        acquire(&self.name, exposure, task).await
    }
}

/// A named schema plus the function that turns resolved attributes into `V`.
///
/// Cheap to clone; every builder step returns a new factory and leaves the
/// original untouched.
pub struct Factory<V> {
    state: Arc<FactoryState<V>>,
}

impl<V> Clone for Factory<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<V> fmt::Debug for Factory<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("name", &self.state.name)
            .field("schema", &self.state.schema)
            .field("construct", &self.state.construct)
            .finish()
    }
}

impl<V> Factory<V>
where
    V: Send + 'static,
{
    /// Start a factory with an empty schema and no construction function.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FactoryError::InvalidName);
        }
        Ok(Self::from_state(FactoryState {
            name,
            schema: Schema::empty(),
            construct: None,
        }))
    }

    fn from_state(state: FactoryState<V>) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    fn with_construct(self, construct: Construct<V>) -> Self {
        Self::from_state(FactoryState {
            name: self.state.name.clone(),
            schema: self.state.schema.clone(),
            construct: Some(construct),
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn schema(&self) -> &Schema {
        &self.state.schema
    }

    pub fn is_configured(&self) -> bool {
        self.state.construct.is_some()
    }

    /// Replace the schema. Any construction function is dropped, since it
    /// was written against the previous attributes.
    pub fn with_schema(self, schema: Schema) -> Self {
        Self::from_state(FactoryState {
            name: self.state.name.clone(),
            schema,
            construct: None,
        })
    }

    /// Attach a callback-style construction function.
    ///
    /// The function receives the resolved attributes and an [`Expose`]
    /// handle. Write the expose point as `expose.expose(value).await?`: the
    /// code after it is teardown and only runs when teardown was requested.
    /// On a skip the `?` leaves with [`Skipped`], which is not a failure.
    pub fn fixture<F, Fut>(self, construct: F) -> Self
    where
        F: Fn(Attributes, Expose<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.with_construct(Construct::uses_callback(construct))
    }

    /// Attach a value-returning construction function.
    pub fn with_value<F, Fut>(self, construct: F) -> Self
    where
        F: Fn(Attributes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Produced<V>>> + Send + 'static,
    {
        self.with_construct(Construct::returns_result(construct))
    }

    fn construct_for(&self, operation: &'static str) -> Result<Construct<V>> {
        self.state
            .construct
            .clone()
            .ok_or(FactoryError::NotConfigured { operation })
    }

    /// Resolve, validate and construct a single value outside any fixture.
    pub async fn build(&self, overrides: Attributes, context: &Context) -> Result<Built<V>> {
        let construct = self.construct_for("build")?;
        let (value, suspended) = self.state.produce(&construct, context, &overrides).await?;
        Ok(Built {
            factory: self.state.name.clone(),
            value,
            suspended: Some(suspended),
        })
    }

    /// A fixture exposing a [`Creator`] that builds any number of values.
    ///
    /// `preset` sits under the attributes passed to each `create` call.
    /// After the test body, every created value is released in creation
    /// order.
    pub fn use_create_value(
        &self,
        preset: Option<Attributes>,
        options: FactoryOptions,
    ) -> Result<Fixture<Creator<V>>> {
        let construct = self.construct_for("use_create_value")?;
        let state = Arc::clone(&self.state);
        let preset = preset.unwrap_or_default();

        Ok(wrap_fixture_fn(
            self.state.name.clone(),
            &self.state.schema,
            move |context, expose: Expose<Creator<V>>| {
                let pending = Arc::new(Mutex::new(Vec::new()));
                let creator = Creator {
                    state: Arc::clone(&state),
                    construct: construct.clone(),
                    context,
                    preset: preset.clone(),
                    pending: Arc::clone(&pending),
                };
                let factory = state.name.clone();
                async move {
                    let release = match expose.expose(creator).await {
                        Ok(()) => options.release(),
                        Err(Skipped) => Release::Skip,
                    };
                    drain(&factory, &pending, release).await
                }
            },
        ))
    }

    /// A fixture that builds one value from `attrs` and hands it to the test body.
    pub fn use_value(&self, attrs: Attributes, options: FactoryOptions) -> Result<Fixture<V>> {
        let construct = self.construct_for("use_value")?;
        let state = Arc::clone(&self.state);

        Ok(wrap_fixture_fn(
            self.state.name.clone(),
            &self.state.schema,
            move |context, expose: Expose<V>| {
                let state = Arc::clone(&state);
                let construct = construct.clone();
                let attrs = attrs.clone();
                async move {
                    let (value, suspended) = state.produce(&construct, &context, &attrs).await?;
                    let release = match expose.expose(value).await {
                        Ok(()) => options.release(),
                        Err(Skipped) => Release::Skip,
                    };
                    suspended.finish(release).await
                }
            },
        ))
    }
}

impl<V> Dependencies for Factory<V> {
    fn dependencies(&self) -> Vec<String> {
        self.state.schema.fixture_list()
    }
}

/// Finish every pending construction in creation order, keeping the first error.
async fn drain(factory: &str, pending: &Mutex<Vec<Suspended>>, release: Release) -> Result<()> {
    let pending = std::mem::take(&mut *pending.lock().await);
    debug!(factory, count = pending.len(), ?release, "finishing created values");

    let mut first_error = None;
    for suspended in pending {
        if let Err(err) = suspended.finish(release).await {
            warn!(factory, error = %err, "teardown failed");
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// A value produced by [`Factory::build`], still holding its teardown.
pub struct Built<V> {
    factory: String,
    value: V,
    suspended: Option<Suspended>,
}

impl<V> Built<V> {
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Run teardown and wait for the construction to finish.
    pub async fn release(self) -> Result<()> {
        self.finish(Release::Destroy).await
    }

    /// Let the construction finish without teardown.
    pub async fn skip(self) -> Result<()> {
        self.finish(Release::Skip).await
    }

    async fn finish(mut self, release: Release) -> Result<()> {
        match self.suspended.take() {
            Some(suspended) => suspended.finish(release).await,
            None => Ok(()),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Built<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Built")
            .field("factory", &self.factory)
            .field("value", &self.value)
            .field("released", &self.suspended.is_none())
            .finish()
    }
}

impl<V> Drop for Built<V> {
    fn drop(&mut self) {
        if self.suspended.is_some() {
            warn!(
                factory = %self.factory,
                "built value dropped without release; teardown will not run"
            );
        }
    }
}

/// Handed to test bodies by [`Factory::use_create_value`].
pub struct Creator<V> {
    state: Arc<FactoryState<V>>,
    construct: Construct<V>,
    context: Context,
    preset: Attributes,
    pending: Arc<Mutex<Vec<Suspended>>>,
}

impl<V> Creator<V>
where
    V: Send + 'static,
{
    /// Build a value from the preset attributes overlaid with `attrs`.
    pub async fn create(&self, attrs: Attributes) -> Result<V> {
        let overrides = self.preset.clone().overlay(attrs);
        let (value, suspended) = self
            .state
            .produce(&self.construct, &self.context, &overrides)
            .await?;
        self.pending.lock().await.push(suspended);
        Ok(value)
    }

    /// Build a value from the preset attributes alone.
    pub async fn create_default(&self) -> Result<V> {
        self.create(Attributes::new()).await
    }

    /// Number of created values still waiting for teardown.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl<V> fmt::Debug for Creator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Creator")
            .field("factory", &self.state.name)
            .field("preset", &self.preset)
            .finish_non_exhaustive()
    }
}
