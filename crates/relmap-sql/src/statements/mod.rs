//! Built-in statement compilers.
//!
//! Each compiler is registered per dialect under a well-known name;
//! applications can register replacements or additions under new names
//! through the [`StatementRegistry`](crate::registry::StatementRegistry).

pub mod ddl;
pub mod i18n;
pub mod render;
pub mod select;
pub mod write;

use crate::dialect::Dialect;
use crate::registry::StatementRegistry;
use std::sync::Arc;

/// Name of the row-returning select compiler.
pub const SELECT: &str = "SELECT";
/// Name of the COUNT(*) compiler.
pub const SELECT_COUNT: &str = "SELECT COUNT";
/// Name of the insert compiler.
pub const INSERT: &str = "INSERT";
/// Name of the update compiler.
pub const UPDATE: &str = "UPDATE";
/// Name of the delete compiler.
pub const DELETE: &str = "DELETE";
/// Name of the column-addition compiler.
pub const ADD_COLUMN: &str = "ADD COLUMN";
/// Name of the I18n side-table upsert compiler.
pub const UPSERT_I18N: &str = "UPSERT I18N";

pub(crate) fn register_builtins(registry: &mut StatementRegistry) {
    for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlite] {
        registry.insert_builtin(dialect, SELECT, Arc::new(select::SelectCompiler));
        registry.insert_builtin(dialect, SELECT_COUNT, Arc::new(select::SelectCountCompiler));
        registry.insert_builtin(dialect, INSERT, Arc::new(write::InsertCompiler));
        registry.insert_builtin(dialect, UPDATE, Arc::new(write::UpdateCompiler));
        registry.insert_builtin(dialect, DELETE, Arc::new(write::DeleteCompiler));
        registry.insert_builtin(dialect, ADD_COLUMN, Arc::new(ddl::AddColumnCompiler::default()));
        registry.insert_builtin(dialect, UPSERT_I18N, Arc::new(i18n::UpsertI18nCompiler));
    }
}
