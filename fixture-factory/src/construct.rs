//! Construction functions.
//!
//! A factory produces its value in one of two styles:
//!
//! - callback style: `|attrs, expose| async move { ... }`, where everything
//!   after `expose.expose(value).await` is cleanup;
//! - value style: `|attrs| async move { Ok(Produced::new(value)) }`, with an
//!   optional destroy callback.
//!
//! Both are adapted into the same shape by [`Construct::start`], so the
//! factory lifecycle has a single code path.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::attributes::Attributes;
use crate::handoff::Expose;

/// Teardown for a value-style construction.
pub type DestroyFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

type CallbackFn<V> =
    Arc<dyn Fn(Attributes, Expose<V>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

type ResultFn<V> =
    Arc<dyn Fn(Attributes) -> BoxFuture<'static, anyhow::Result<Produced<V>>> + Send + Sync>;

/// The output of a value-style construction function.
pub struct Produced<V> {
    pub value: V,
    destroy: Option<DestroyFn>,
}

impl<V> Produced<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            destroy: None,
        }
    }

    /// Attach the teardown for this value.
    pub fn with_destroy<F, Fut>(mut self, destroy: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.destroy = Some(Box::new(move || destroy().boxed()));
        self
    }

    pub fn has_destroy(&self) -> bool {
        self.destroy.is_some()
    }
}

impl<V: fmt::Debug> fmt::Debug for Produced<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Produced")
            .field("value", &self.value)
            .field("destroy", &self.destroy.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A construction function in either supported style.
pub enum Construct<V> {
    UsesCallback(CallbackFn<V>),
    ReturnsResult(ResultFn<V>),
}

impl<V> Clone for Construct<V> {
    fn clone(&self) -> Self {
        match self {
            Self::UsesCallback(f) => Self::UsesCallback(Arc::clone(f)),
            Self::ReturnsResult(f) => Self::ReturnsResult(Arc::clone(f)),
        }
    }
}

impl<V> fmt::Debug for Construct<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsesCallback(_) => f.write_str("UsesCallback(..)"),
            Self::ReturnsResult(_) => f.write_str("ReturnsResult(..)"),
        }
    }
}

impl<V> Construct<V>
where
    V: Send + 'static,
{
    pub fn uses_callback<F, Fut>(construct: F) -> Self
    where
        F: Fn(Attributes, Expose<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::UsesCallback(Arc::new(move |attrs, expose| construct(attrs, expose).boxed()))
    }

    pub fn returns_result<F, Fut>(construct: F) -> Self
    where
        F: Fn(Attributes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Produced<V>>> + Send + 'static,
    {
        Self::ReturnsResult(Arc::new(move |attrs| construct(attrs).boxed()))
    }

    /// Run the construction against `expose`.
    ///
    /// A value-style destroy callback runs only when the consumer asks for
    /// teardown; on a skip the adapter leaves with the `Skipped` error.
    pub fn start(
        &self,
        attrs: Attributes,
        expose: Expose<V>,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        match self {
            Self::UsesCallback(construct) => construct(attrs, expose),
            Self::ReturnsResult(construct) => {
                let produced = construct(attrs);
                async move {
                    let Produced { value, destroy } = produced.await?;
                    expose.expose(value).await?;
                    match destroy {
                        Some(destroy) => destroy().await,
                        None => Ok(()),
                    }
                }
                .boxed()
            }
        }
    }
}
