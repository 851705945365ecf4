//! Explicit dependency declarations.
//!
//! Whatever runs fixtures needs to know which context keys a fixture reads
//! so it can supply them. Fields, schemas, fixtures and factories all answer
//! that question through [`Dependencies`].

use indexmap::IndexSet;

use crate::context::Context;

/// Something that reads named values from the test context.
pub trait Dependencies {
    /// Context keys read, deduplicated, in first-declared order.
    fn dependencies(&self) -> Vec<String>;

    /// Declared keys that `context` leaves undefined.
    fn missing_from(&self, context: &Context) -> Vec<String> {
        self.dependencies()
            .into_iter()
            .filter(|key| !context.is_defined(key))
            .collect()
    }
}

/// Deduplicating collector for dependency keys.
#[derive(Debug, Clone, Default)]
pub struct DependencyList {
    keys: IndexSet<String>,
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend_from<'a>(&mut self, keys: impl IntoIterator<Item = &'a String>) {
        self.keys.extend(keys.into_iter().cloned());
    }

    pub fn into_vec(self) -> Vec<String> {
        self.keys.into_iter().collect()
    }
}
