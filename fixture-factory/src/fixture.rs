//! Fixture operations and the explicit dependency list that goes with them.
//!
//! A [`Fixture`] is what a test harness registers: an operation that
//! produces a value for one test body, plus the context keys it needs.
//! The keys come from the schema, so the harness never has to inspect the
//! operation itself.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::context::Context;
use crate::dependencies::Dependencies;
use crate::error::Result;
use crate::handoff::{acquire, handoff, Expose, Release};
use crate::schema::Schema;

type FixtureOp<T> = Arc<dyn Fn(Context, Expose<T>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A fixture operation with its declared dependencies.
pub struct Fixture<T> {
    name: String,
    dependencies: Vec<String>,
    op: FixtureOp<T>,
}

impl<T> Clone for Fixture<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            dependencies: self.dependencies.clone(),
            op: Arc::clone(&self.op),
        }
    }
}

impl<T> fmt::Debug for Fixture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl<T> Fixture<T>
where
    T: Send + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, dependencies: Vec<String>, op: F) -> Self
    where
        F: Fn(Context, Expose<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies,
            op: Arc::new(move |context, expose| op(context, expose).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the operation around one test body.
    ///
    /// The operation starts, `body` receives the exposed value, and once the
    /// body returns the operation's cleanup phase runs to completion. Errors
    /// from either phase are returned; the body's own output is passed
    /// through untouched.
    pub async fn run<F, Fut, R>(&self, context: &Context, body: F) -> Result<R>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let missing = self.missing_from(context);
        if !missing.is_empty() {
            debug!(fixture = %self.name, ?missing, "dependencies not provided by the test context");
        }

        let (expose, exposure) = handoff();
        let task = (self.op)(context.clone(), expose);
        let (value, suspended) = acquire(&self.name, exposure, task).await?;

        let output = body(value).await;

        suspended.finish(Release::Destroy).await?;
        Ok(output)
    }
}

impl<T> Dependencies for Fixture<T> {
    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }
}

/// Wrap `op` so it declares exactly the dependency keys of `schema`.
pub fn wrap_fixture_fn<T, F, Fut>(name: impl Into<String>, schema: &Schema, op: F) -> Fixture<T>
where
    T: Send + 'static,
    F: Fn(Context, Expose<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Fixture::new(name, schema.fixture_list(), op)
}
