//! Declarative query trees and their resolution against model metadata.
//!
//! [`Query`] builds single predicates over dotted column paths,
//! [`Filter`] composes them with `&`/`|`, and [`Resolver`] turns a
//! filter into a deterministic join graph ready for SQL compilation.

pub mod query;
pub mod resolve;

pub use query::{BoolOp, Filter, Op, Operand, Query, QueryCompound, Subselect};
pub use resolve::{
    ColumnRef, I18nRef, Join, ROOT_ALIAS, ResolvedCondition, ResolvedFilter, ResolvedOperand,
    ResolvedQuery, ResolvedSubselect, Resolver,
};
