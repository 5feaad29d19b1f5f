//! ALTER TABLE ADD COLUMN compilation.

use crate::dialect::Dialect;
use crate::registry::{
    CompiledStatement, FragmentRegistry, StatementCompiler, StatementInput,
};
use relmap_core::{Error, Result};

/// Compiles column additions, rendering behavior flags through the
/// fragment registry.
pub struct AddColumnCompiler {
    fragments: FragmentRegistry,
}

impl AddColumnCompiler {
    pub fn new(fragments: FragmentRegistry) -> Self {
        Self { fragments }
    }
}

impl Default for AddColumnCompiler {
    fn default() -> Self {
        Self::new(FragmentRegistry::with_builtins())
    }
}

impl StatementCompiler for AddColumnCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::AddColumn(input) = input else {
            return Err(Error::config(format!(
                "ADD COLUMN compiler received {} input",
                input.variant()
            )));
        };

        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            dialect.quote(input.schema.dbname()),
            dialect.quote(input.column.field_name()),
            dialect.column_type(input.column.kind()),
        );
        for fragment in self.fragments.render(input.column.column_flags(), dialect) {
            sql.push(' ');
            sql.push_str(fragment);
        }

        tracing::debug!(
            model = %input.schema.name(),
            column = %input.column.name(),
            dialect = dialect.name(),
            "compiled ADD COLUMN"
        );
        Ok(CompiledStatement {
            sql,
            params: Vec::new(),
        })
    }
}
