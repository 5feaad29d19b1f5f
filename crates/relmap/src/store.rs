//! The store: registry, hooks, compilers and pool wired together.
//!
//! A store is built once, during a registration phase, and then shared
//! immutably. Every query and mutation in the crate funnels through its
//! compile-and-execute helpers, so read statements always go through a
//! read connection and mutations through a write connection.

use crate::collection::Collection;
use crate::record::Record;
use relmap_core::{
    AccessMode, Column, Context, EventKind, ExecuteResult, HookRegistry, Registry, Result, Row,
    Schema, Value,
};
use relmap_pool::{ConnectionFactory, Pool, PoolConfig};
use relmap_query::{Filter, Resolver};
use relmap_sql::{
    AddColumnInput, Dialect, SelectInput, StatementCompiler, StatementInput, StatementRegistry,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builder for a [`Store`]; this is the registration phase.
pub struct StoreBuilder {
    dialect: Dialect,
    registry: Registry,
    hooks: HookRegistry,
    statements: StatementRegistry,
    pool_config: PoolConfig,
    factory: Option<ConnectionFactory>,
}

impl StoreBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            registry: Registry::new(),
            hooks: HookRegistry::new(),
            statements: StatementRegistry::with_builtins(),
            pool_config: PoolConfig::default(),
            factory: None,
        }
    }

    /// Register a model schema.
    pub fn register(mut self, schema: Schema) -> Result<Self> {
        self.registry.register(schema)?;
        Ok(self)
    }

    /// Subscribe a lifecycle hook for a model.
    pub fn subscribe<F>(mut self, model: impl Into<String>, kind: EventKind, hook: F) -> Self
    where
        F: Fn(&mut relmap_core::Event<'_>) + Send + Sync + 'static,
    {
        self.hooks.subscribe(model, kind, hook);
        self
    }

    /// Register an additional statement compiler.
    pub fn statement(
        mut self,
        dialect: Dialect,
        name: impl Into<String>,
        compiler: Arc<dyn StatementCompiler>,
    ) -> Result<Self> {
        self.statements.register(dialect, name, compiler)?;
        Ok(self)
    }

    /// Set pool connection limits.
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the factory that opens native connections.
    pub fn connection_factory(mut self, factory: ConnectionFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Finish registration and build the store.
    pub fn finish(self) -> Result<Store> {
        let factory = self
            .factory
            .ok_or_else(|| relmap_core::Error::config("store requires a connection factory"))?;
        let pool = Pool::new(self.pool_config, factory)?;
        tracing::debug!(
            dialect = self.dialect.name(),
            models = self.registry.len(),
            "store ready"
        );
        Ok(Store {
            inner: Arc::new(StoreInner {
                dialect: self.dialect,
                registry: self.registry,
                hooks: self.hooks,
                statements: self.statements,
                pool,
            }),
        })
    }
}

struct StoreInner {
    dialect: Dialect,
    registry: Registry,
    hooks: HookRegistry,
    statements: StatementRegistry,
    pool: Pool,
}

/// Shared handle over the immutable engine state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Start the registration phase.
    pub fn builder(dialect: Dialect) -> StoreBuilder {
        StoreBuilder::new(dialect)
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Look up a registered schema.
    pub fn schema(&self, model: &str) -> Result<Arc<Schema>> {
        Ok(Arc::clone(self.inner.registry.schema(model)?))
    }

    /// Every record of a model, as a lazy collection.
    pub fn all(&self, model: impl Into<String>) -> Collection {
        Collection::new(self.clone(), model.into(), Filter::Null, Context::new())
    }

    /// Records of a model matching a filter, as a lazy collection.
    pub fn select(&self, model: impl Into<String>, filter: Filter) -> Collection {
        Collection::new(self.clone(), model.into(), filter, Context::new())
    }

    /// Fetch one record by identity.
    pub fn fetch(&self, model: &str, id: impl Into<Value>) -> Result<Option<Record>> {
        let schema = self.schema(model)?;
        self.select(
            model,
            relmap_query::Query::new(schema.id_column().name())
                .is(id.into())
                .into(),
        )
        .first()
    }

    /// Create an unsaved record for a model.
    pub fn new_record(&self, model: &str) -> Result<Record> {
        Record::new(self.clone(), model)
    }

    /// Apply a column addition to the backing table.
    pub fn add_column(&self, model: &str, column: &Column) -> Result<()> {
        let schema = self.schema(model)?;
        let compiled = self.inner.statements.compile(
            self.inner.dialect,
            relmap_sql::ADD_COLUMN,
            &StatementInput::AddColumn(AddColumnInput {
                schema: &schema,
                column,
            }),
        )?;
        self.execute(AccessMode::Write, &compiled.sql, &compiled.params)?;
        Ok(())
    }

    /// Compile and run a SELECT, returning raw rows.
    pub(crate) fn select_rows(
        &self,
        model: &str,
        filter: &Filter,
        context: &Context,
    ) -> Result<Vec<Row>> {
        let schema = self.schema(model)?;
        let resolved = Resolver::new(&self.inner.registry).resolve(model, filter)?;
        let compiled = self.inner.statements.compile(
            self.inner.dialect,
            relmap_sql::SELECT,
            &StatementInput::Select(SelectInput {
                schema: &schema,
                query: &resolved,
                context,
            }),
        )?;
        let result = self.execute(AccessMode::Read, &compiled.sql, &compiled.params)?;
        Ok(result.rows)
    }

    /// Compile and run a SELECT COUNT.
    pub(crate) fn count_rows(&self, model: &str, filter: &Filter, context: &Context) -> Result<u64> {
        let schema = self.schema(model)?;
        let resolved = Resolver::new(&self.inner.registry).resolve(model, filter)?;
        let compiled = self.inner.statements.compile(
            self.inner.dialect,
            relmap_sql::SELECT_COUNT,
            &StatementInput::Count(SelectInput {
                schema: &schema,
                query: &resolved,
                context,
            }),
        )?;
        let result = self.execute(AccessMode::Read, &compiled.sql, &compiled.params)?;
        let count = result
            .rows
            .first()
            .and_then(|row| row.get_named("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Compile and run a mutating statement by registry name.
    pub(crate) fn execute_write(
        &self,
        name: &str,
        input: &StatementInput<'_>,
    ) -> Result<ExecuteResult> {
        let compiled = self.inner.statements.compile(self.inner.dialect, name, input)?;
        self.execute(AccessMode::Write, &compiled.sql, &compiled.params)
    }

    fn execute(&self, mode: AccessMode, sql: &str, params: &[Value]) -> Result<ExecuteResult> {
        tracing::debug!(mode = ?mode, sql, "executing statement");
        let mut connection = self.inner.pool.acquire(mode)?;
        connection.execute(sql, params)
    }

    /// Insert values for a model, returning the generated identity when
    /// the dialect reports one.
    pub(crate) fn insert(
        &self,
        schema: &Schema,
        values: &BTreeMap<String, Value>,
    ) -> Result<Option<Value>> {
        let result = self.execute_write(
            relmap_sql::INSERT,
            &StatementInput::Insert(relmap_sql::InsertInput { schema, values }),
        )?;
        let id = result
            .rows
            .first()
            .and_then(|row| {
                row.get_named(schema.id_column().field_name())
                    .or_else(|| row.get(0))
            })
            .cloned();
        Ok(id)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("dialect", &self.inner.dialect)
            .field("models", &self.inner.registry.len())
            .finish()
    }
}
