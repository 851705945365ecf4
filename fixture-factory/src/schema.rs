//! Schemas and the resolution engine.
//!
//! Resolution layers three sources, later layers winning on any key they
//! actually define:
//!
//! 1. field defaults
//! 2. values derived from the dependency context
//! 3. caller overrides
//!
//! No field sees another field's resolved value; cross-field relationships
//! have to flow through the context.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::attributes::Attributes;
use crate::context::Context;
use crate::dependencies::{Dependencies, DependencyList};
use crate::error::{MissingField, SchemaError};
use crate::field::{Field, FieldBuilder};

/// An ordered, immutable mapping from attribute name to [`Field`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, Field>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// A schema without fields.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn resolve(&self, context: &Context, overrides: &Attributes) -> Attributes {
        resolve_schema(self, context, overrides)
    }

    pub fn validate(&self, data: &Attributes) -> Vec<MissingField> {
        validate_schema_data(self, data)
    }

    pub fn fixture_list(&self) -> Vec<String> {
        get_fixture_list(self)
    }
}

impl Dependencies for Schema {
    fn dependencies(&self) -> Vec<String> {
        get_fixture_list(self)
    }
}

impl Dependencies for Field {
    fn dependencies(&self) -> Vec<String> {
        self.fixture_list().to_vec()
    }
}

/// Collects fields for a [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: IndexMap<String, Field>,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    /// Add a field under `key`.
    pub fn field<T>(mut self, key: impl Into<String>, builder: FieldBuilder<T>) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        let key = key.into();
        if key.trim().is_empty() {
            self.error = Some(SchemaError::EmptyFieldName);
            return self;
        }
        if self.fields.contains_key(&key) {
            self.error = Some(SchemaError::DuplicateField { key });
            return self;
        }
        match builder.build() {
            Ok(field) => {
                self.fields.insert(key, field);
            }
            Err(source) => {
                self.error = Some(SchemaError::InvalidField { key, source });
            }
        }
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(Schema {
                fields: self.fields,
            }),
        }
    }
}

/// Merge defaults, context-derived values and overrides into one attribute set.
pub fn resolve_schema(schema: &Schema, context: &Context, overrides: &Attributes) -> Attributes {
    let defaults: Attributes = schema
        .fields
        .iter()
        .filter_map(|(key, field)| Some((key.clone(), field.resolve_default(context)?)))
        .collect();

    let derived: Attributes = schema
        .fields
        .iter()
        .filter_map(|(key, field)| Some((key.clone(), field.derive(context)?)))
        .collect();

    trace!(
        defaults = defaults.len(),
        derived = derived.len(),
        overrides = overrides.len(),
        "resolving schema"
    );

    defaults.overlay(derived).overlay(overrides.clone())
}

/// Required fields left undefined in `data`, in declaration order.
pub fn validate_schema_data(schema: &Schema, data: &Attributes) -> Vec<MissingField> {
    schema
        .fields
        .iter()
        // optional fields are never reported
        .filter(|(_, field)| field.is_required())
        .filter(|(key, _)| !data.is_defined(key))
        .map(|(key, field)| MissingField {
            key: key.clone(),
            fixture_list: field.fixture_list().to_vec(),
        })
        .collect()
}

/// Union of every field's dependency keys.
pub fn get_fixture_list(schema: &Schema) -> Vec<String> {
    let mut list = DependencyList::new();
    for field in schema.fields.values() {
        list.extend_from(field.fixture_list());
    }
    list.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use serde_json::{json, Value};

    fn numbers() -> Schema {
        Schema::builder()
            .field("a", field::<i64>())
            .field("b", field::<i64>())
            .field("c", field::<i64>())
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolves_default_values() {
        let schema = Schema::builder()
            .field("a", field::<i64>().default(1))
            .field("b", field::<i64>().default(2))
            .field("c", field::<i64>().default_with(|| 3))
            .build()
            .unwrap();

        let result = resolve_schema(&schema, &Context::new(), &Attributes::new());
        assert_eq!(result.into_json(), json!({ "a": 1, "b": 2, "c": 3 }));
    }

    #[test]
    fn test_resolves_context_aware_defaults() {
        let schema = Schema::builder()
            .field(
                "a",
                field::<i64>()
                    .depends_on(["a"])
                    .default_with_context(|ctx| ctx.get("a").unwrap_or_default()),
            )
            .field(
                "bc",
                field::<i64>()
                    .depends_on(["b", "c"])
                    .default_with_context(|ctx| {
                        let b = ctx.get::<i64>("b").unwrap_or_default();
                        b + ctx.get::<i64>("c").unwrap_or_default()
                    }),
            )
            .build()
            .unwrap();

        let context = Context::new().with("a", 1).with("b", 2).with("c", 3);
        let result = resolve_schema(&schema, &context, &Attributes::new());
        assert_eq!(result.into_json(), json!({ "a": 1, "bc": 5 }));
    }

    #[test]
    fn test_resolves_attrs() {
        let overrides = Attributes::new().with("a", 1).with("b", 2).with("c", 3);
        let result = resolve_schema(&numbers(), &Context::new(), &overrides);
        assert_eq!(result.into_json(), json!({ "a": 1, "b": 2, "c": 3 }));
    }

    #[test]
    fn test_layer_precedence() {
        let schema = Schema::builder()
            .field(
                "name",
                field::<String>()
                    .maybe_from(["name"], |ctx| ctx.get("name"))
                    .default("Unknown".into()),
            )
            .build()
            .unwrap();

        let empty = Context::new();
        let named = Context::new().with("name", "Gregg");
        let overrides = Attributes::new().with("name", "Joseph");

        assert_eq!(
            schema.resolve(&empty, &Attributes::new()).get("name"),
            Some(&json!("Unknown"))
        );
        assert_eq!(
            schema.resolve(&named, &Attributes::new()).get("name"),
            Some(&json!("Gregg"))
        );
        assert_eq!(
            schema.resolve(&named, &overrides).get("name"),
            Some(&json!("Joseph"))
        );
    }

    #[test]
    fn test_null_override_does_not_erase_earlier_layers() {
        let schema = Schema::builder()
            .field("name", field::<String>().default("Unknown".into()))
            .build()
            .unwrap();

        let overrides = Attributes::new().with("name", Value::Null);
        let result = schema.resolve(&Context::new(), &overrides);
        assert_eq!(result.get("name"), Some(&json!("Unknown")));
    }

    #[test]
    fn test_validates_complete_data() {
        let data = Attributes::new().with("a", 1).with("b", 2).with("c", 3);
        assert!(validate_schema_data(&numbers(), &data).is_empty());
    }

    #[test]
    fn test_validates_missing_fields() {
        let data = Attributes::new().with("a", 1).with("b", 2).with("c", Value::Null);
        assert_eq!(
            validate_schema_data(&numbers(), &data),
            vec![MissingField {
                key: "c".into(),
                fixture_list: vec![],
            }]
        );
    }

    #[test]
    fn test_validation_skips_optional_fields() {
        let schema = Schema::builder()
            .field("nickname", field::<String>().optional())
            .field(
                "author_id",
                field::<u64>().maybe_from(["author"], |ctx| ctx.get("author")),
            )
            .build()
            .unwrap();

        let missing = schema.validate(&Attributes::new());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].key, "author_id");
        assert_eq!(missing[0].fixture_list, vec!["author".to_string()]);
    }

    #[test]
    fn test_fixture_list_is_deduplicated_union() {
        let schema = Schema::builder()
            .field(
                "a",
                field::<i64>()
                    .depends_on(["a"])
                    .default_with_context(|ctx| ctx.get("a").unwrap_or_default()),
            )
            .field(
                "bc",
                field::<i64>().maybe_from(["b", "c"], |ctx| ctx.get("b")),
            )
            .field("ab", field::<i64>().maybe_from(["a", "b"], |ctx| ctx.get("a")))
            .field("plain", field::<i64>())
            .build()
            .unwrap();

        assert_eq!(get_fixture_list(&schema), vec!["a", "b", "c"]);
        assert_eq!(schema.dependencies(), schema.fixture_list());
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let err = Schema::builder()
            .field("a", field::<i64>())
            .field("a", field::<String>())
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField { key: "a".into() });
    }

    #[test]
    fn test_blank_field_name_is_rejected() {
        let err = Schema::builder().field("  ", field::<i64>()).build().unwrap_err();
        assert_eq!(err, SchemaError::EmptyFieldName);
    }

    #[test]
    fn test_field_errors_surface_at_build() {
        let err = Schema::builder()
            .field("ok", field::<i64>())
            .field("broken", field::<i64>().using(|_| Some(1)))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid field 'broken': Cannot call .using() before .depends_on()!"
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let schema = Schema::builder()
            .field("a", field::<i64>().default(1))
            .field("b", field::<i64>().maybe_from(["b"], |ctx| ctx.get("b")))
            .build()
            .unwrap();
        let context = Context::new().with("b", 2);
        let overrides = Attributes::new().with("a", 5);

        assert_eq!(
            schema.resolve(&context, &overrides),
            schema.resolve(&context, &overrides)
        );
    }
}
