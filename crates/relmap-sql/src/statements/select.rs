//! SELECT and SELECT COUNT compilation.

use crate::dialect::Dialect;
use crate::registry::{CompiledStatement, SelectInput, StatementCompiler, StatementInput};
use crate::statements::render::{Renderer, collect_i18n_columns};
use relmap_core::{Column, ColumnFlags, Error, Result, Schema};
use relmap_query::{ColumnRef, I18nRef, ROOT_ALIAS};

/// Build a root-alias reference for a schema column.
pub(crate) fn root_ref(schema: &Schema, column: &Column) -> ColumnRef {
    let i18n = if column.has_flags(ColumnFlags::I18N) {
        Some(I18nRef {
            table: schema.i18n_dbname(),
            base_id_field: schema.id_column().field_name().to_string(),
        })
    } else {
        None
    };
    ColumnRef {
        alias: ROOT_ALIAS.to_string(),
        name: column.name().to_string(),
        field: column.field_name().to_string(),
        kind: column.kind().clone(),
        i18n,
    }
}

/// The columns a select projects: an explicit context projection, or
/// every stored column.
fn projection(input: &SelectInput<'_>) -> Result<Vec<ColumnRef>> {
    if input.context.columns.is_empty() {
        return Ok(input
            .schema
            .columns_without(ColumnFlags::VIRTUAL)
            .map(|column| root_ref(input.schema, column))
            .collect());
    }
    input
        .context
        .columns
        .iter()
        .map(|name| Ok(root_ref(input.schema, input.schema.column(name)?)))
        .collect()
}

fn order_refs(input: &SelectInput<'_>) -> Result<Vec<ColumnRef>> {
    input
        .context
        .order
        .iter()
        .map(|clause| Ok(root_ref(input.schema, input.schema.column(&clause.column)?)))
        .collect()
}

/// Compiles row-returning selects.
pub struct SelectCompiler;

impl StatementCompiler for SelectCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::Select(input) = input else {
            return Err(Error::config(format!(
                "SELECT compiler received {} input",
                input.variant()
            )));
        };
        input.context.validate()?;

        let mut renderer = Renderer::new(dialect, input.context.effective_locale());
        let projection = projection(input)?;
        let order = order_refs(input)?;

        let select_list: Vec<String> = projection
            .iter()
            .map(|column| {
                format!(
                    "{} AS {}",
                    renderer.column_expr(column),
                    renderer.quote(&column.name)
                )
            })
            .collect();
        let keyword = if input.context.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        };
        let mut sql = format!(
            "{keyword} {} FROM {} {}",
            select_list.join(", "),
            renderer.quote(&input.query.table),
            renderer.quote(&input.query.root_alias),
        );

        sql.push_str(&renderer.render_joins(input.query));
        let mut i18n_columns: Vec<&ColumnRef> = projection.iter().collect();
        i18n_columns.extend(order.iter());
        sql.push_str(
            &renderer.render_i18n_joins(&collect_i18n_columns(
                input.query.filter.as_ref(),
                &i18n_columns,
            )),
        );

        if let Some(filter) = &input.query.filter {
            let rendered = renderer.render_filter(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&rendered);
        }

        if !input.context.order.is_empty() {
            let terms: Vec<String> = input
                .context
                .order
                .iter()
                .zip(order.iter())
                .map(|(clause, column)| {
                    format!("{} {}", renderer.column_expr(column), clause.direction.as_sql())
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = input.context.effective_limit() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(start) = input.context.effective_start() {
            if start > 0 {
                sql.push_str(&format!(" OFFSET {start}"));
            }
        }

        tracing::debug!(model = %input.query.model, dialect = dialect.name(), "compiled SELECT");
        Ok(CompiledStatement {
            sql,
            params: renderer.into_params(),
        })
    }
}

/// Compiles COUNT(*) selects; ordering and paging do not apply.
pub struct SelectCountCompiler;

impl StatementCompiler for SelectCountCompiler {
    fn compile(&self, dialect: Dialect, input: &StatementInput<'_>) -> Result<CompiledStatement> {
        let StatementInput::Count(input) = input else {
            return Err(Error::config(format!(
                "SELECT COUNT compiler received {} input",
                input.variant()
            )));
        };

        let mut renderer = Renderer::new(dialect, input.context.effective_locale());
        let mut sql = format!(
            "SELECT COUNT(*) AS {} FROM {} {}",
            renderer.quote("count"),
            renderer.quote(&input.query.table),
            renderer.quote(&input.query.root_alias),
        );
        sql.push_str(&renderer.render_joins(input.query));
        sql.push_str(
            &renderer.render_i18n_joins(&collect_i18n_columns(input.query.filter.as_ref(), &[])),
        );
        if let Some(filter) = &input.query.filter {
            let rendered = renderer.render_filter(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&rendered);
        }

        tracing::debug!(model = %input.query.model, dialect = dialect.name(), "compiled SELECT COUNT");
        Ok(CompiledStatement {
            sql,
            params: renderer.into_params(),
        })
    }
}
