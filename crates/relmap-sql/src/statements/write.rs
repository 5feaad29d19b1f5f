//! INSERT, UPDATE and DELETE compilation.

use crate::dialect::Dialect;
use crate::registry::{CompiledStatement, StatementCompiler, StatementInput};
use crate::statements::render::Renderer;
use relmap_core::{Error, Result};

/// Compiles single-record inserts.
///
/// Postgres appends a RETURNING clause so the generated identity comes
/// back with the insert; other dialects surface it through their native
/// last-insert-id channel.
pub struct InsertCompiler;

impl StatementCompiler for InsertCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::Insert(input) = input else {
            return Err(Error::config(format!(
                "INSERT compiler received {} input",
                input.variant()
            )));
        };

        let mut renderer = Renderer::new(dialect, relmap_core::DEFAULT_LOCALE);
        let table = renderer.quote(input.schema.dbname());

        let mut sql = if input.values.is_empty() {
            match dialect {
                Dialect::Mysql => format!("INSERT INTO {table} () VALUES ()"),
                _ => format!("INSERT INTO {table} DEFAULT VALUES"),
            }
        } else {
            let mut columns = Vec::with_capacity(input.values.len());
            let mut placeholders = Vec::with_capacity(input.values.len());
            for (name, value) in input.values {
                let column = input.schema.column(name)?;
                columns.push(renderer.quote(column.field_name()));
                placeholders.push(renderer.bind(value.clone()));
            }
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if dialect == Dialect::Postgres {
            sql.push_str(&format!(
                " RETURNING {}",
                renderer.quote(input.schema.id_column().field_name())
            ));
        }

        tracing::debug!(model = %input.schema.name(), dialect = dialect.name(), "compiled INSERT");
        Ok(CompiledStatement {
            sql,
            params: renderer.into_params(),
        })
    }
}

/// Compiles single-record updates over the changed columns only.
pub struct UpdateCompiler;

impl StatementCompiler for UpdateCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::Update(input) = input else {
            return Err(Error::config(format!(
                "UPDATE compiler received {} input",
                input.variant()
            )));
        };
        if input.changes.is_empty() {
            return Err(Error::config("UPDATE requires at least one changed column"));
        }

        let mut renderer = Renderer::new(dialect, relmap_core::DEFAULT_LOCALE);
        let mut assignments = Vec::with_capacity(input.changes.len());
        for (name, value) in input.changes {
            let column = input.schema.column(name)?;
            let placeholder = renderer.bind(value.clone());
            assignments.push(format!(
                "{} = {placeholder}",
                renderer.quote(column.field_name())
            ));
        }
        let id_placeholder = renderer.bind(input.id.clone());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {id_placeholder}",
            renderer.quote(input.schema.dbname()),
            assignments.join(", "),
            renderer.quote(input.schema.id_column().field_name()),
        );

        tracing::debug!(model = %input.schema.name(), dialect = dialect.name(), "compiled UPDATE");
        Ok(CompiledStatement {
            sql,
            params: renderer.into_params(),
        })
    }
}

/// Compiles deletes over a set of record identities.
pub struct DeleteCompiler;

impl StatementCompiler for DeleteCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::Delete(input) = input else {
            return Err(Error::config(format!(
                "DELETE compiler received {} input",
                input.variant()
            )));
        };
        if input.ids.is_empty() {
            return Err(Error::config("DELETE requires at least one identity"));
        }

        let mut renderer = Renderer::new(dialect, relmap_core::DEFAULT_LOCALE);
        let placeholders: Vec<String> = input
            .ids
            .iter()
            .map(|id| renderer.bind(id.clone()))
            .collect();
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            renderer.quote(input.schema.dbname()),
            renderer.quote(input.schema.id_column().field_name()),
            placeholders.join(", ")
        );

        tracing::debug!(
            model = %input.schema.name(),
            dialect = dialect.name(),
            ids = input.ids.len(),
            "compiled DELETE"
        );
        Ok(CompiledStatement {
            sql,
            params: renderer.into_params(),
        })
    }
}
