//! Registries for statement compilers and flag fragments.
//!
//! Compilers are addressed by (dialect, statement name). Registering a
//! duplicate and requesting a missing compiler are both configuration
//! errors, never silent fallbacks. Flag fragments resolve through a
//! dialect-specific entry first and a neutral entry second.

use crate::dialect::Dialect;
use relmap_core::{Column, ColumnFlags, Context, Error, Result, Schema, Value};
use relmap_query::ResolvedQuery;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// A compiled statement: SQL text plus bound parameters in placeholder
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Input for SELECT and SELECT COUNT compilation.
#[derive(Debug)]
pub struct SelectInput<'a> {
    pub schema: &'a Schema,
    pub query: &'a ResolvedQuery,
    pub context: &'a Context,
}

/// Input for INSERT compilation. Keys are logical column names.
#[derive(Debug)]
pub struct InsertInput<'a> {
    pub schema: &'a Schema,
    pub values: &'a BTreeMap<String, Value>,
}

/// Input for UPDATE compilation. Keys are logical column names.
#[derive(Debug)]
pub struct UpdateInput<'a> {
    pub schema: &'a Schema,
    pub id: &'a Value,
    pub changes: &'a BTreeMap<String, Value>,
}

/// Input for DELETE compilation.
#[derive(Debug)]
pub struct DeleteInput<'a> {
    pub schema: &'a Schema,
    pub ids: &'a [Value],
}

/// Input for ALTER TABLE ADD COLUMN compilation.
#[derive(Debug)]
pub struct AddColumnInput<'a> {
    pub schema: &'a Schema,
    pub column: &'a Column,
}

/// Input for the per-locale side-table upsert.
#[derive(Debug)]
pub struct UpsertI18nInput<'a> {
    pub schema: &'a Schema,
    pub id: &'a Value,
    pub locale: &'a str,
    pub values: &'a BTreeMap<String, Value>,
}

/// The input variants a compiler can receive.
#[derive(Debug)]
pub enum StatementInput<'a> {
    Select(SelectInput<'a>),
    Count(SelectInput<'a>),
    Insert(InsertInput<'a>),
    Update(UpdateInput<'a>),
    Delete(DeleteInput<'a>),
    AddColumn(AddColumnInput<'a>),
    UpsertI18n(UpsertI18nInput<'a>),
}

impl StatementInput<'_> {
    /// Name of the variant, used in mismatch diagnostics.
    pub const fn variant(&self) -> &'static str {
        match self {
            StatementInput::Select(_) => "Select",
            StatementInput::Count(_) => "Count",
            StatementInput::Insert(_) => "Insert",
            StatementInput::Update(_) => "Update",
            StatementInput::Delete(_) => "Delete",
            StatementInput::AddColumn(_) => "AddColumn",
            StatementInput::UpsertI18n(_) => "UpsertI18n",
        }
    }
}

/// A named statement compiler for one dialect.
pub trait StatementCompiler: Send + Sync {
    /// Compile the input into SQL plus ordered parameters.
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement>;
}

impl std::fmt::Debug for dyn StatementCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StatementCompiler")
    }
}

/// Compilers addressed by (dialect, statement name).
#[derive(Default)]
pub struct StatementRegistry {
    compilers: HashMap<(Dialect, String), Arc<dyn StatementCompiler>>,
}

impl StatementRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in compilers for every
    /// dialect.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::statements::register_builtins(&mut registry);
        registry
    }

    // builtins are wired before any user registration can collide
    pub(crate) fn insert_builtin(
        &mut self,
        dialect: Dialect,
        name: &str,
        compiler: Arc<dyn StatementCompiler>,
    ) {
        self.compilers.insert((dialect, name.to_string()), compiler);
    }

    /// Register a compiler under (dialect, name).
    pub fn register(
        &mut self,
        dialect: Dialect,
        name: impl Into<String>,
        compiler: Arc<dyn StatementCompiler>,
    ) -> Result<()> {
        let name = name.into();
        // reject without touching the existing entry
        if self.compilers.contains_key(&(dialect, name.clone())) {
            return Err(Error::config(format!(
                "statement '{name}' already registered for dialect '{}'",
                dialect.name()
            )));
        }
        tracing::debug!(dialect = dialect.name(), statement = %name, "registered statement compiler");
        self.compilers.insert((dialect, name), compiler);
        Ok(())
    }

    /// Look up the compiler for (dialect, name).
    pub fn statement(&self, dialect: Dialect, name: &str) -> Result<&Arc<dyn StatementCompiler>> {
        self.compilers
            .get(&(dialect, name.to_string()))
            .ok_or_else(|| {
                Error::config(format!(
                    "no statement '{name}' registered for dialect '{}'",
                    dialect.name()
                ))
            })
    }

    /// Compile in one step.
    pub fn compile(
        &self,
        dialect: Dialect,
        name: &str,
        input: &StatementInput<'_>,
    ) -> Result<CompiledStatement> {
        self.statement(dialect, name)?.compile(dialect, input)
    }
}

impl std::fmt::Debug for StatementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementRegistry")
            .field("compilers", &self.compilers.len())
            .finish()
    }
}

/// DDL fragments keyed by column flag, with dialect overrides.
///
/// Lookup tries the (flag, dialect) entry first and falls back to the
/// neutral (flag, None) entry; a flag with neither renders nothing.
#[derive(Debug, Clone, Default)]
pub struct FragmentRegistry {
    fragments: HashMap<(u16, Option<Dialect>), String>,
}

impl FragmentRegistry {
    /// Create an empty fragment registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the standard constraint fragments.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ColumnFlags::REQUIRED, None, "NOT NULL");
        registry.register(ColumnFlags::UNIQUE, None, "UNIQUE");
        registry.register(
            ColumnFlags::AUTO_INCREMENT,
            Some(Dialect::Postgres),
            "GENERATED BY DEFAULT AS IDENTITY",
        );
        registry.register(
            ColumnFlags::AUTO_INCREMENT,
            Some(Dialect::Mysql),
            "AUTO_INCREMENT",
        );
        registry.register(
            ColumnFlags::AUTO_INCREMENT,
            Some(Dialect::Sqlite),
            "AUTOINCREMENT",
        );
        registry
    }

    /// Register a fragment for a flag, optionally per dialect.
    pub fn register(
        &mut self,
        flag: ColumnFlags,
        dialect: Option<Dialect>,
        fragment: impl Into<String>,
    ) {
        self.fragments.insert((flag.bits(), dialect), fragment.into());
    }

    /// Resolve the fragment for one flag under a dialect.
    pub fn fragment(&self, flag: ColumnFlags, dialect: Dialect) -> Option<&str> {
        self.fragments
            .get(&(flag.bits(), Some(dialect)))
            .or_else(|| self.fragments.get(&(flag.bits(), None)))
            .map(String::as_str)
    }

    /// Render the fragments for a flag set, in flag-bit order.
    pub fn render(&self, flags: ColumnFlags, dialect: Dialect) -> Vec<&str> {
        const ORDERED: [ColumnFlags; 3] = [
            ColumnFlags::REQUIRED,
            ColumnFlags::UNIQUE,
            ColumnFlags::AUTO_INCREMENT,
        ];
        ORDERED
            .iter()
            .filter(|flag| flags.contains(**flag))
            .filter_map(|flag| self.fragment(*flag, dialect))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::ColumnKind;

    struct Tagged(&'static str);

    impl StatementCompiler for Tagged {
        fn compile(
            &self,
            _dialect: Dialect,
            _input: &StatementInput<'_>,
        ) -> Result<CompiledStatement> {
            Ok(CompiledStatement {
                sql: self.0.to_string(),
                params: Vec::new(),
            })
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = StatementRegistry::new();
        registry
            .register(Dialect::Sqlite, "SELECT", Arc::new(Tagged("select")))
            .unwrap();
        let err = registry
            .register(Dialect::Sqlite, "SELECT", Arc::new(Tagged("select")))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        // other dialects are independent
        registry
            .register(Dialect::Mysql, "SELECT", Arc::new(Tagged("select")))
            .unwrap();
    }

    #[test]
    fn rejected_duplicate_leaves_the_original_in_place() {
        let schema = Schema::builder("Thing")
            .column(Column::new("name", ColumnKind::Text))
            .finish()
            .unwrap();
        let ids = [Value::Int(1)];
        let input = StatementInput::Delete(DeleteInput {
            schema: &schema,
            ids: &ids,
        });

        let mut registry = StatementRegistry::new();
        registry
            .register(Dialect::Sqlite, "CUSTOM", Arc::new(Tagged("original")))
            .unwrap();
        registry
            .register(Dialect::Sqlite, "CUSTOM", Arc::new(Tagged("replacement")))
            .unwrap_err();
        let compiled = registry.compile(Dialect::Sqlite, "CUSTOM", &input).unwrap();
        assert_eq!(compiled.sql, "original");
    }

    #[test]
    fn missing_statement_fails() {
        let registry = StatementRegistry::new();
        let err = registry.statement(Dialect::Postgres, "SELECT").unwrap_err();
        assert!(err.to_string().contains("no statement"));
    }

    #[test]
    fn fragment_fallback() {
        let registry = FragmentRegistry::with_builtins();
        assert_eq!(
            registry.fragment(ColumnFlags::UNIQUE, Dialect::Mysql),
            Some("UNIQUE")
        );
        assert_eq!(
            registry.fragment(ColumnFlags::AUTO_INCREMENT, Dialect::Mysql),
            Some("AUTO_INCREMENT")
        );
        assert_eq!(registry.fragment(ColumnFlags::PRIVATE, Dialect::Mysql), None);
    }

    #[test]
    fn fragments_render_in_flag_order() {
        let registry = FragmentRegistry::with_builtins();
        let rendered = registry.render(
            ColumnFlags::UNIQUE | ColumnFlags::REQUIRED,
            Dialect::Postgres,
        );
        assert_eq!(rendered, vec!["NOT NULL", "UNIQUE"]);
    }
}
