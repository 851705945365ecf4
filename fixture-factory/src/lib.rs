//! Schema-driven test-data factories
//!
//! `fixture-factory` builds test values from a declarative schema. Each
//! attribute is resolved from the attributes a test passes in, from values
//! other fixtures provide through the test [`Context`], or from a default,
//! and every required attribute must end up defined before the value is
//! constructed.
//!
//! # Architecture
//!
//! - **Fields and schemas**: [`field`] starts a fluent [`FieldBuilder`];
//!   [`Schema::builder`] collects fields in declaration order
//! - **Explicit dependencies**: fields declare the context keys they read,
//!   and every schema, fixture and factory reports them via [`Dependencies`]
//! - **Scoped construction**: construction functions expose their value and
//!   resume for teardown once the test is done with it
//! - **Lifecycles**: [`Factory::build`], [`Factory::use_create_value`] and
//!   [`Factory::use_value`]
//!
//! Teardown runs by default. Set `TFF_SKIP_DESTROY=1` to skip it globally,
//! or pass [`FactoryOptions`] per call.

pub mod attributes;
pub mod config;
pub mod construct;
pub mod context;
pub mod dependencies;
pub mod error;
pub mod factory;
pub mod field;
pub mod fixture;
pub mod handoff;
pub mod schema;

pub use attributes::Attributes;
pub use config::{parse_flag, EnvLoader, FactoryConfig};
pub use construct::{Construct, DestroyFn, Produced};
pub use context::{Context, ContextView};
pub use dependencies::{Dependencies, DependencyList};
pub use error::{
    FactoryError, FieldError, MissingField, Result, SchemaError, Skipped, UndefinedFieldError,
};
pub use factory::{Built, Creator, Factory, FactoryOptions};
pub use field::{field, DefaultValue, Field, FieldBuilder};
pub use fixture::{wrap_fixture_fn, Fixture};
pub use handoff::{handoff, Expose, Exposure, Release};
pub use schema::{get_fixture_list, resolve_schema, validate_schema_data, Schema, SchemaBuilder};
