//! Model registration and lookup.

use crate::error::{Error, Result, SchemaError, SchemaErrorKind};
use crate::schema::Schema;
use std::collections::HashMap;
use std::sync::Arc;

/// The per-process metadata registry.
///
/// Holds one immutable [`Schema`] per registered model. Registration is
/// idempotent for a structurally identical definition; re-registering a
/// model with a different definition is a fatal configuration error.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model schema.
    pub fn register(&mut self, schema: Schema) -> Result<()> {
        if let Some(existing) = self.schemas.get(schema.name()) {
            if **existing == schema {
                return Ok(());
            }
            return Err(Error::Schema(SchemaError {
                kind: SchemaErrorKind::ConflictingRegistration,
                model: schema.name().to_string(),
                name: schema.name().to_string(),
            }));
        }
        tracing::debug!(model = %schema.name(), table = %schema.dbname(), "registered model");
        self.schemas
            .insert(schema.name().to_string(), Arc::new(schema));
        Ok(())
    }

    /// Look up a schema by model name.
    pub fn schema(&self, model: &str) -> Result<&Arc<Schema>> {
        self.schemas
            .get(model)
            .ok_or_else(|| Error::model_not_found(model))
    }

    /// Check whether a model is registered.
    pub fn contains(&self, model: &str) -> bool {
        self.schemas.contains_key(model)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
