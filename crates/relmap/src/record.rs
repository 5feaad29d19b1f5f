//! Change-tracked records.
//!
//! A record tracks its column values against a snapshot taken at load
//! or last save. Saves touch only the changed columns; a record with no
//! changes saves without issuing any statement. Deletion is terminal:
//! every later mutation fails.

use crate::store::Store;
use relmap_core::{
    ColumnFlags, Context, Error, EventKind, InvalidReference, RecordErrorKind, Result, Row, Schema,
    Value,
};
use relmap_sql::{DeleteInput, StatementInput, UpdateInput, UpsertI18nInput};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Created locally, never stored
    New,
    /// Loaded or saved, no local changes
    Clean,
    /// Loaded, with local changes pending
    Modified,
    /// Deleted; terminal
    Deleted,
}

/// Related data attached to a record by expansion.
#[derive(Debug, Clone)]
pub enum Expansion {
    /// A single related record (reference column)
    One(Option<Box<Record>>),
    /// A set of related records (collector)
    Many(Vec<Record>),
}

/// One mapped record of a model.
#[derive(Clone)]
pub struct Record {
    store: Store,
    schema: Arc<Schema>,
    state: RecordState,
    values: BTreeMap<String, Value>,
    originals: BTreeMap<String, Value>,
    expansions: BTreeMap<String, Expansion>,
}

impl Record {
    /// Create an unsaved record with column defaults applied.
    pub(crate) fn new(store: Store, model: &str) -> Result<Self> {
        let schema = store.schema(model)?;
        let mut values = BTreeMap::new();
        for column in schema.columns_without(ColumnFlags::VIRTUAL) {
            let value = column.default().cloned().unwrap_or(Value::Null);
            values.insert(column.name().to_string(), value);
        }
        Ok(Self {
            store,
            schema,
            state: RecordState::New,
            values,
            originals: BTreeMap::new(),
            expansions: BTreeMap::new(),
        })
    }

    /// Inflate a record from a result row keyed by logical column names.
    pub(crate) fn from_row(store: Store, schema: Arc<Schema>, row: &Row) -> Self {
        let mut values = BTreeMap::new();
        for column in schema.columns_without(ColumnFlags::VIRTUAL) {
            let value = row.get_named(column.name()).cloned().unwrap_or(Value::Null);
            values.insert(column.name().to_string(), value);
        }
        Self {
            store,
            schema,
            state: RecordState::Clean,
            originals: values.clone(),
            values,
            expansions: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// The stored identity, if the record has one.
    pub fn id(&self) -> Option<&Value> {
        self.values
            .get(self.schema.id_column().name())
            .filter(|v| !v.is_null())
    }

    /// Read a column value.
    pub fn get(&self, name: &str) -> Result<Value> {
        let column = self.schema.column(name)?;
        Ok(self.values.get(column.name()).cloned().unwrap_or(Value::Null))
    }

    /// Related data attached by expansion, if any.
    pub fn expanded(&self, name: &str) -> Option<&Expansion> {
        self.expansions.get(name)
    }

    pub(crate) fn attach_expansion(&mut self, name: impl Into<String>, expansion: Expansion) {
        self.expansions.insert(name.into(), expansion);
    }

    /// Write a column value.
    ///
    /// Read-only columns reject writes; reference columns accept only a
    /// null or an integer identity.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.state == RecordState::Deleted {
            return Err(Error::record(
                RecordErrorKind::Deleted,
                format!("cannot modify deleted '{}' record", self.model()),
            ));
        }
        let column = self.schema.column(name)?;
        if column.has_flags(ColumnFlags::READ_ONLY) {
            return Err(Error::validation(name, "column is read-only"));
        }
        let value = value.into();
        if column.kind().is_reference() && !matches!(value, Value::Null | Value::Int(_)) {
            return Err(Error::InvalidReference(InvalidReference {
                column: name.to_string(),
                expected: "an integer identity or null".to_string(),
                actual: value.type_name().to_string(),
            }));
        }
        self.values.insert(column.name().to_string(), value);
        if self.state != RecordState::New {
            self.state = if self.changes().is_empty() {
                RecordState::Clean
            } else {
                RecordState::Modified
            };
        }
        Ok(())
    }

    /// Columns whose value differs from the loaded snapshot.
    pub fn changes(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .filter(|(name, value)| self.originals.get(*name) != Some(value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        matches!(self.state, RecordState::New | RecordState::Modified)
    }

    /// Check every column constraint without touching the database.
    pub fn validate(&self) -> Result<()> {
        for column in self.schema.columns_without(ColumnFlags::VIRTUAL) {
            let value = self.values.get(column.name()).unwrap_or(&Value::Null);
            if column.has_flags(ColumnFlags::REQUIRED)
                && !column.has_flags(ColumnFlags::AUTO_INCREMENT)
                && value.is_null()
            {
                return Err(Error::validation(column.name(), "required column is null"));
            }
            column.validate(value)?;
        }
        Ok(())
    }

    /// Persist the record: INSERT when new, UPDATE over the changed
    /// columns otherwise. I18n columns upsert into the side table under
    /// the ambient locale.
    ///
    /// Returns false when there was nothing to do or a pre-save hook
    /// vetoed the default action. Validation runs before any statement
    /// is compiled.
    pub fn save(&mut self) -> Result<bool> {
        if self.state == RecordState::Deleted {
            return Err(Error::record(
                RecordErrorKind::Deleted,
                format!("cannot save deleted '{}' record", self.model()),
            ));
        }
        self.validate()?;

        let changes = self.changes();
        if self.state != RecordState::New && changes.is_empty() {
            return Ok(false);
        }
        if self
            .store
            .hooks()
            .emit(EventKind::PreSave, self.schema.name(), &self.values)
        {
            tracing::debug!(model = %self.model(), "save vetoed by hook");
            return Ok(false);
        }

        let (mut i18n_changes, base_changes): (BTreeMap<_, _>, BTreeMap<_, _>) =
            changes.into_iter().partition(|(name, _)| {
                self.schema
                    .column(name)
                    .is_ok_and(|c| c.has_flags(ColumnFlags::I18N))
            });
        // a new record's untouched translatable columns are seeded
        // nulls, not translations to write
        if self.state == RecordState::New {
            i18n_changes.retain(|_, value| !value.is_null());
        }

        if self.state == RecordState::New {
            let insert_values: BTreeMap<String, Value> = self
                .schema
                .columns_without(
                    ColumnFlags::VIRTUAL | ColumnFlags::AUTO_INCREMENT | ColumnFlags::I18N,
                )
                .filter_map(|column| {
                    let value = self.values.get(column.name())?;
                    if value.is_null() {
                        None
                    } else {
                        Some((column.name().to_string(), value.clone()))
                    }
                })
                .collect();
            if let Some(id) = self.store.insert(&self.schema, &insert_values)? {
                self.values
                    .insert(self.schema.id_column().name().to_string(), id);
            }
        } else if !base_changes.is_empty() {
            let id = self.require_id()?;
            self.store.execute_write(
                relmap_sql::UPDATE,
                &StatementInput::Update(UpdateInput {
                    schema: &self.schema,
                    id: &id,
                    changes: &base_changes,
                }),
            )?;
        }

        if !i18n_changes.is_empty() {
            let id = self.require_id()?;
            let context = Context::current();
            self.store.execute_write(
                relmap_sql::UPSERT_I18N,
                &StatementInput::UpsertI18n(UpsertI18nInput {
                    schema: &self.schema,
                    id: &id,
                    locale: context.effective_locale(),
                    values: &i18n_changes,
                }),
            )?;
        }

        self.originals = self.values.clone();
        self.state = RecordState::Clean;
        self.store
            .hooks()
            .emit(EventKind::PostSave, self.schema.name(), &self.values);
        tracing::debug!(model = %self.model(), "record saved");
        Ok(true)
    }

    /// Delete the record. Returns false when a pre-delete hook vetoed
    /// the default action.
    pub fn delete(&mut self) -> Result<bool> {
        if self.state == RecordState::Deleted {
            return Err(Error::record(
                RecordErrorKind::Deleted,
                format!("'{}' record already deleted", self.model()),
            ));
        }
        let id = self.require_id()?;
        if self
            .store
            .hooks()
            .emit(EventKind::PreDelete, self.schema.name(), &self.values)
        {
            tracing::debug!(model = %self.model(), "delete vetoed by hook");
            return Ok(false);
        }
        self.store.execute_write(
            relmap_sql::DELETE,
            &StatementInput::Delete(DeleteInput {
                schema: &self.schema,
                ids: std::slice::from_ref(&id),
            }),
        )?;
        self.state = RecordState::Deleted;
        self.store
            .hooks()
            .emit(EventKind::PostDelete, self.schema.name(), &self.values);
        tracing::debug!(model = %self.model(), "record deleted");
        Ok(true)
    }

    fn require_id(&self) -> Result<Value> {
        self.id().cloned().ok_or_else(|| {
            Error::record(
                RecordErrorKind::Unsaved,
                format!("'{}' record has no stored identity", self.model()),
            )
        })
    }

    /// Serialize the record, excluding private and virtual columns.
    ///
    /// Reference columns serialize under `<name>_id`; attached
    /// expansions nest under their own name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for column in self
            .schema
            .columns_without(ColumnFlags::PRIVATE | ColumnFlags::VIRTUAL)
        {
            let value = self
                .values
                .get(column.name())
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null);
            let key = if column.kind().is_reference() {
                format!("{}_id", column.name())
            } else {
                column.name().to_string()
            };
            object.insert(key, value);
        }
        for (name, expansion) in &self.expansions {
            let value = match expansion {
                Expansion::One(None) => serde_json::Value::Null,
                Expansion::One(Some(record)) => record.to_json(),
                Expansion::Many(records) => {
                    serde_json::Value::Array(records.iter().map(Record::to_json).collect())
                }
            };
            object.insert(name.clone(), value);
        }
        serde_json::Value::Object(object)
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model())
            .field("state", &self.state)
            .field("values", &self.values)
            .finish()
    }
}
