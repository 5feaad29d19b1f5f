//! Declarative queries, lazy collections and change-tracked records
//! over a pluggable SQL compilation engine.
//!
//! The facade ties the layers together: model schemas register into a
//! [`Store`], filters build from [`Query`] trees, [`Collection`]s
//! evaluate lazily with caching, and [`Record`]s track changes through
//! save and delete lifecycles with hook veto points.
//!
//! ```no_run
//! use relmap::{Column, ColumnKind, Dialect, Query, Schema, Store};
//!
//! # fn factory() -> relmap::ConnectionFactory { unimplemented!() }
//! # fn main() -> relmap::Result<()> {
//! let store = Store::builder(Dialect::Postgres)
//!     .register(
//!         Schema::builder("User")
//!             .dbname("users")
//!             .column(Column::new("username", ColumnKind::Text))
//!             .column(Column::new("group", ColumnKind::reference("Group")).field("group_id"))
//!             .finish()?,
//!     )?
//!     .connection_factory(factory())
//!     .finish()?;
//!
//! let admins = store.select("User", Query::new("group.name").is("admins").into());
//! for user in admins.records()? {
//!     println!("{}", user.get("username")?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod record;
pub mod store;

pub use collection::Collection;
pub use record::{Expansion, Record, RecordState};
pub use store::{Store, StoreBuilder};

pub use relmap_core::{
    AccessMode, Collector, CollectorKind, Column, ColumnFlags, ColumnKind, ColumnValidator,
    Connection, Context, ContextScope, DEFAULT_LOCALE, Direction, Error, Event, EventKind,
    ExecuteResult, ExecutedStatement, HookRegistry, Index, MockConnection, OrderClause,
    RecordErrorKind, Registry, Result, Row, Schema, SchemaErrorKind, Value,
};
pub use relmap_pool::{ConnectionFactory, Pool, PoolConfig, PoolStats};
pub use relmap_query::{Filter, Op, Query, QueryCompound, Resolver, Subselect};
pub use relmap_sql::{
    CompiledStatement, Dialect, FragmentRegistry, StatementCompiler, StatementInput,
    StatementRegistry,
};
