//! Schema registry: validation of type-specific entity payloads.
//!
//! Every entity names a schema, and the registry maps that name to a
//! validator capability. The registry is populated once at process startup;
//! the engine never hard-codes knowledge of any particular schema.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::entity::ALIAS_FIELD;
use crate::error::ValidationError;

/// Data fields every schema accepts regardless of its declared fields.
const BASE_FIELDS: [&str; 2] = ["name", ALIAS_FIELD];

/// Validates and normalizes the data payload for one schema.
pub trait Validator: Send + Sync {
    /// Validate a payload, returning its normalized form.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when the payload is malformed or
    /// contains fields the schema does not define.
    fn validate(&self, data: Map<String, Value>) -> Result<Map<String, Value>, ValidationError>;
}

/// Pass-through validator accepting any payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSchema;

impl Validator for OpenSchema {
    fn validate(&self, data: Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        Ok(data)
    }
}

/// Validator restricting payloads to a fixed set of fields.
///
/// The base properties `name` and `alias` are always allowed; any other
/// key must be declared. Values are passed through untouched.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    schema: String,
    fields: BTreeSet<String>,
}

impl FieldSchema {
    /// Creates a validator for `schema` allowing the given fields.
    #[must_use]
    pub fn new<I, S>(schema: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        for base in BASE_FIELDS {
            allowed.insert(base.to_string());
        }
        Self {
            schema: schema.into(),
            fields: allowed,
        }
    }
}

impl Validator for FieldSchema {
    fn validate(&self, data: Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        for field in data.keys() {
            if !self.fields.contains(field) {
                return Err(ValidationError::UnknownField {
                    schema: self.schema.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(data)
    }
}

/// Mapping from schema name to validator, populated at startup.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator under a schema name, replacing any previous
    /// registration.
    pub fn register(&mut self, schema: impl Into<String>, validator: Arc<dyn Validator>) {
        self.validators.insert(schema.into(), validator);
    }

    /// Returns the validator for a schema name, if registered.
    #[must_use]
    pub fn get(&self, schema: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(schema).cloned()
    }

    /// Returns true if the schema name is registered.
    #[must_use]
    pub fn contains(&self, schema: &str) -> bool {
        self.validators.contains_key(schema)
    }

    /// Validate a payload against the named schema.
    ///
    /// # Errors
    /// Returns [`ValidationError::UnknownSchema`] for unregistered names,
    /// or whatever the schema's validator rejects the payload with.
    pub fn validate(
        &self,
        schema: &str,
        data: Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationError> {
        let validator = self.get(schema).ok_or_else(|| ValidationError::UnknownSchema {
            schema: schema.to_string(),
        })?;
        validator.validate(data)
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemata", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_open_schema_passes_everything() {
        let data = map(json!({"name": "x", "anything": 1}));
        assert_eq!(OpenSchema.validate(data.clone()).unwrap(), data);
    }

    #[test]
    fn test_field_schema_allows_declared_and_base_fields() {
        let schema = FieldSchema::new("Person", ["nationality"]);
        let data = map(json!({"name": "Jane", "alias": ["J"], "nationality": "DE"}));
        assert!(schema.validate(data).is_ok());
    }

    #[test]
    fn test_field_schema_rejects_unknown_field() {
        let schema = FieldSchema::new("Person", ["nationality"]);
        let data = map(json!({"name": "Jane", "shoe_size": 42}));
        let err = schema.validate(data).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { field, .. } if field == "shoe_size"));
    }

    #[test]
    fn test_registry_unknown_schema() {
        let registry = SchemaRegistry::new();
        let err = registry.validate("Person", Map::new()).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownSchema { schema } if schema == "Person"));
    }

    #[test]
    fn test_registry_dispatches_by_name() {
        let mut registry = SchemaRegistry::new();
        registry.register("Person", Arc::new(FieldSchema::new("Person", ["nationality"])));
        registry.register("Company", Arc::new(OpenSchema));

        assert!(registry.contains("Person"));
        let data = map(json!({"name": "Acme", "jurisdiction": "US"}));
        assert!(registry.validate("Company", data.clone()).is_ok());
        assert!(registry.validate("Person", data).is_err());
    }
}
