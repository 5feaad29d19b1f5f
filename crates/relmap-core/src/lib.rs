//! Core types and metadata handling for relmap.
//!
//! This crate is the foundation layer: dynamic SQL values and rows, the
//! error taxonomy, the per-model metadata registry (schemas, columns,
//! indexes, collectors), scoped operation contexts, lifecycle event
//! hooks, and the connection boundary the compiled statements execute
//! through.
//!
//! Higher layers build on these pieces: `relmap-query` resolves query
//! trees against the registry, `relmap-sql` compiles them per dialect,
//! and the `relmap` facade wires collections and records on top.

pub mod collector;
pub mod column;
pub mod connection;
pub mod context;
pub mod error;
pub mod events;
pub mod registry;
pub mod row;
pub mod schema;
pub mod value;

pub use collector::{Collector, CollectorKind};
pub use column::{Column, ColumnFlags, ColumnKind, ColumnValidator};
pub use connection::{Connection, ExecuteResult, ExecutedStatement, MockConnection};
pub use context::{
    AccessMode, Context, ContextScope, DEFAULT_LOCALE, Direction, OrderClause, parse_expand,
    parse_order,
};
pub use error::{
    ColumnValidationError, ConfigError, ConnectionError, ConnectionErrorKind, ContextError, Error,
    InvalidReference, PoolError, PoolErrorKind, RecordError, RecordErrorKind, Result, SchemaError,
    SchemaErrorKind, UnsupportedOperation,
};
pub use events::{Event, EventKind, Hook, HookRegistry};
pub use registry::Registry;
pub use row::{Row, RowColumns};
pub use schema::{Index, Schema, SchemaBuilder};
pub use value::Value;
