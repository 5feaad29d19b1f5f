//! Static per-model schema metadata.

use crate::collector::Collector;
use crate::column::{Column, ColumnFlags, ColumnKind};
use crate::error::{Error, Result, SchemaError, SchemaErrorKind};
use std::collections::HashMap;

/// An ordered multi-column index definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

impl Index {
    /// Create an index over the given columns.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Mark the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the index enforces uniqueness.
    pub const fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Static description of one model: columns, indexes and collectors.
///
/// Schemas are built once, validated, and immutable after registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    dbname: String,
    id_column: String,
    columns: Vec<Column>,
    column_index: HashMap<String, usize>,
    indexes: Vec<Index>,
    collectors: Vec<Collector>,
    collector_index: HashMap<String, usize>,
}

impl Schema {
    /// Start building a schema for the given model name.
    ///
    /// The database table name defaults to the lowercased model name; the
    /// identity column defaults to `id` and is created automatically as an
    /// auto-incrementing read-only integer unless the builder declares one.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        let name = name.into();
        SchemaBuilder {
            dbname: name.to_lowercase(),
            name,
            id_column: "id".to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            collectors: Vec::new(),
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database table name.
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// Database table holding per-locale rows for I18n columns.
    pub fn i18n_dbname(&self) -> String {
        format!("{}_i18n", self.dbname)
    }

    /// The identity column.
    pub fn id_column(&self) -> &Column {
        // the builder guarantees the identity column exists
        &self.columns[self.column_index[&self.id_column]]
    }

    /// Look up a column by field name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.column_index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| Error::column_not_found(&self.name, name))
    }

    /// Check whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns carrying all of the given flags.
    pub fn columns_with(&self, flags: ColumnFlags) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.has_flags(flags))
    }

    /// Columns carrying none of the given flags.
    pub fn columns_without(&self, flags: ColumnFlags) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| !c.column_flags().intersects(flags))
    }

    /// Check whether the schema has any I18n-flagged columns.
    pub fn has_i18n_columns(&self) -> bool {
        self.columns_with(ColumnFlags::I18N).next().is_some()
    }

    /// Look up a collector by name.
    pub fn collector(&self, name: &str) -> Result<&Collector> {
        self.collector_index
            .get(name)
            .map(|&i| &self.collectors[i])
            .ok_or_else(|| Error::collector_not_found(&self.name, name))
    }

    /// Check whether a collector exists.
    pub fn has_collector(&self, name: &str) -> bool {
        self.collector_index.contains_key(name)
    }

    /// All collectors in declaration order.
    pub fn collectors(&self) -> &[Collector] {
        &self.collectors
    }

    /// All index definitions.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    dbname: String,
    id_column: String,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    collectors: Vec<Collector>,
}

impl SchemaBuilder {
    /// Set the database table name.
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    /// Name the identity column (default `id`).
    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = name.into();
        self
    }

    /// Add a column definition.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an index definition.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add a collector definition.
    pub fn collector(mut self, collector: Collector) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Validate and finish the schema.
    ///
    /// Fails on duplicate column names, duplicate collector names, and
    /// inconsistent flag combinations.
    pub fn finish(mut self) -> Result<Schema> {
        if !self.columns.iter().any(|c| c.name() == self.id_column) {
            self.columns.insert(
                0,
                Column::new(self.id_column.clone(), ColumnKind::Integer)
                    .flags(ColumnFlags::AUTO_INCREMENT | ColumnFlags::READ_ONLY),
            );
        }

        let mut column_index = HashMap::new();
        for (i, column) in self.columns.iter().enumerate() {
            if let Err(reason) = column.check_flags() {
                tracing::error!(model = %self.name, column = %column.name(), reason, "invalid column flags");
                return Err(Error::Schema(SchemaError {
                    kind: SchemaErrorKind::InvalidFlags,
                    model: self.name,
                    name: column.name().to_string(),
                }));
            }
            if column_index.insert(column.name().to_string(), i).is_some() {
                return Err(Error::Schema(SchemaError {
                    kind: SchemaErrorKind::DuplicateColumn,
                    model: self.name,
                    name: column.name().to_string(),
                }));
            }
        }

        let mut collector_index = HashMap::new();
        for (i, collector) in self.collectors.iter().enumerate() {
            let name = collector.name().to_string();
            if column_index.contains_key(&name) || collector_index.insert(name, i).is_some() {
                return Err(Error::Schema(SchemaError {
                    kind: SchemaErrorKind::DuplicateColumn,
                    model: self.name,
                    name: collector.name().to_string(),
                }));
            }
        }

        Ok(Schema {
            name: self.name,
            dbname: self.dbname,
            id_column: self.id_column,
            columns: self.columns,
            column_index,
            indexes: self.indexes,
            collectors: self.collectors,
            collector_index,
        })
    }
}
