//! Per-locale side-table upsert compilation.
//!
//! I18n columns live in `<table>_i18n`, one row per (record, locale).
//! Saving translated values upserts that row: insert when the locale has
//! no row yet, update the changed columns when it does.

use crate::dialect::Dialect;
use crate::registry::{CompiledStatement, StatementCompiler, StatementInput};
use crate::statements::render::{I18N_LOCALE_COLUMN, I18N_RECORD_COLUMN, Renderer};
use relmap_core::{Error, Result, Value};

/// Compiles the side-table upsert for I18n columns.
pub struct UpsertI18nCompiler;

impl StatementCompiler for UpsertI18nCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::UpsertI18n(input) = input else {
            return Err(Error::config(format!(
                "UPSERT I18N compiler received {} input",
                input.variant()
            )));
        };
        if input.values.is_empty() {
            return Err(Error::config("I18n upsert requires at least one column"));
        }

        let mut renderer = Renderer::new(dialect, input.locale);
        let table = renderer.quote(&input.schema.i18n_dbname());

        let mut columns = vec![
            renderer.quote(I18N_RECORD_COLUMN),
            renderer.quote(I18N_LOCALE_COLUMN),
        ];
        let mut placeholders = vec![
            renderer.bind(input.id.clone()),
            renderer.bind(Value::Text(input.locale.to_string())),
        ];
        let mut fields = Vec::with_capacity(input.values.len());
        for (name, value) in input.values {
            let column = input.schema.column(name)?;
            let field = renderer.quote(column.field_name());
            placeholders.push(renderer.bind(value.clone()));
            columns.push(field.clone());
            fields.push(field);
        }

        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        match dialect {
            Dialect::Postgres | Dialect::Sqlite => {
                let assignments: Vec<String> = fields
                    .iter()
                    .map(|field| format!("{field} = excluded.{field}"))
                    .collect();
                sql.push_str(&format!(
                    " ON CONFLICT ({}, {}) DO UPDATE SET {}",
                    renderer.quote(I18N_RECORD_COLUMN),
                    renderer.quote(I18N_LOCALE_COLUMN),
                    assignments.join(", ")
                ));
            }
            Dialect::Mysql => {
                let assignments: Vec<String> = fields
                    .iter()
                    .map(|field| format!("{field} = VALUES({field})"))
                    .collect();
                sql.push_str(&format!(
                    " ON DUPLICATE KEY UPDATE {}",
                    assignments.join(", ")
                ));
            }
        }

        tracing::debug!(
            model = %input.schema.name(),
            locale = input.locale,
            dialect = dialect.name(),
            "compiled I18N upsert"
        );
        Ok(CompiledStatement {
            sql,
            params: renderer.into_params(),
        })
    }
}
