//! Shared rendering for filter trees, joins and I18n side tables.
//!
//! Parameters bind in the order their placeholders appear in the final
//! SQL text, so sections must be rendered in emission order: projection
//! first, then joins (locale parameters), then conditions.

use crate::dialect::Dialect;
use relmap_core::{Error, Result, Value};
use relmap_query::{
    ColumnRef, ResolvedCondition, ResolvedFilter, ResolvedOperand, ResolvedQuery,
    ResolvedSubselect,
};

/// Column holding the base-table identity in an I18n side table.
pub const I18N_RECORD_COLUMN: &str = "record_id";
/// Column holding the locale code in an I18n side table.
pub const I18N_LOCALE_COLUMN: &str = "locale";

/// Accumulates SQL text parameters in placeholder order.
pub struct Renderer {
    dialect: Dialect,
    locale: String,
    params: Vec<Value>,
}

impl Renderer {
    pub fn new(dialect: Dialect, locale: &str) -> Self {
        Self {
            dialect,
            locale: locale.to_string(),
            params: Vec::new(),
        }
    }

    /// Finish rendering and take the bound parameters.
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }

    /// Bind one value, returning its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    pub fn quote(&self, identifier: &str) -> String {
        self.dialect.quote(identifier)
    }

    /// `alias.column`, both quoted.
    pub fn qualified(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", self.quote(alias), self.quote(column))
    }

    /// The expression addressing a resolved column, routing I18n columns
    /// through their side-table alias.
    pub fn column_expr(&self, column: &ColumnRef) -> String {
        match &column.i18n {
            Some(_) => self.qualified(&i18n_alias(&column.alias), &column.field),
            None => self.qualified(&column.alias, &column.field),
        }
    }

    /// Render the join edges of a resolved query.
    pub fn render_joins(&mut self, query: &ResolvedQuery) -> String {
        let mut sql = String::new();
        for join in &query.joins {
            sql.push_str(&format!(
                " JOIN {} {} ON {} = {}",
                self.quote(&join.table),
                self.quote(&join.alias),
                self.qualified(&join.alias, &join.right_field),
                self.qualified(&join.left_alias, &join.left_field),
            ));
        }
        sql
    }

    /// Render LEFT JOINs for every I18n side table the given columns
    /// touch, binding the locale once per join.
    pub fn render_i18n_joins(&mut self, columns: &[&ColumnRef]) -> String {
        let mut seen: Vec<String> = Vec::new();
        let mut sql = String::new();
        for column in columns {
            let Some(i18n) = &column.i18n else { continue };
            let alias = i18n_alias(&column.alias);
            if seen.contains(&alias) {
                continue;
            }
            let locale = self.bind(Value::Text(self.locale.clone()));
            sql.push_str(&format!(
                " LEFT JOIN {} {} ON {} = {} AND {} = {locale}",
                self.quote(&i18n.table),
                self.quote(&alias),
                self.qualified(&alias, I18N_RECORD_COLUMN),
                self.qualified(&column.alias, &i18n.base_id_field),
                self.qualified(&alias, I18N_LOCALE_COLUMN),
            ));
            seen.push(alias);
        }
        sql
    }

    /// Render a condition tree.
    pub fn render_filter(&mut self, filter: &ResolvedFilter) -> Result<String> {
        match filter {
            ResolvedFilter::Leaf(condition) => self.render_condition(condition),
            ResolvedFilter::Compound { op, children } => {
                let glue = match op {
                    relmap_query::BoolOp::And => " AND ",
                    relmap_query::BoolOp::Or => " OR ",
                };
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.push(self.render_filter(child)?);
                }
                Ok(format!("({})", parts.join(glue)))
            }
        }
    }

    fn render_condition(&mut self, condition: &ResolvedCondition) -> Result<String> {
        use relmap_query::Op;

        let lhs = self.column_expr(&condition.column);
        match (condition.op, &condition.operand) {
            (Op::Is, ResolvedOperand::Value(Value::Null)) => Ok(format!("{lhs} IS NULL")),
            (Op::IsNot, ResolvedOperand::Value(Value::Null)) => Ok(format!("{lhs} IS NOT NULL")),
            (Op::Is, ResolvedOperand::Value(value)) => {
                let rhs = self.bind(value.clone());
                Ok(format!("{lhs} = {rhs}"))
            }
            (Op::IsNot, ResolvedOperand::Value(value)) => {
                let rhs = self.bind(value.clone());
                Ok(format!("{lhs} <> {rhs}"))
            }
            (Op::LessThan, ResolvedOperand::Value(value)) => {
                let rhs = self.bind(value.clone());
                Ok(format!("{lhs} < {rhs}"))
            }
            (Op::LessThanOrEqual, ResolvedOperand::Value(value)) => {
                let rhs = self.bind(value.clone());
                Ok(format!("{lhs} <= {rhs}"))
            }
            (Op::GreaterThan, ResolvedOperand::Value(value)) => {
                let rhs = self.bind(value.clone());
                Ok(format!("{lhs} > {rhs}"))
            }
            (Op::GreaterThanOrEqual, ResolvedOperand::Value(value)) => {
                let rhs = self.bind(value.clone());
                Ok(format!("{lhs} >= {rhs}"))
            }
            (Op::In | Op::NotIn, ResolvedOperand::Values(values)) => {
                Ok(self.render_in(&lhs, condition.op == Op::NotIn, values))
            }
            (Op::In | Op::NotIn, ResolvedOperand::Value(Value::List(values))) => {
                Ok(self.render_in(&lhs, condition.op == Op::NotIn, values))
            }
            (Op::In | Op::NotIn, ResolvedOperand::Subselect(sub)) => {
                let keyword = if condition.op == Op::NotIn {
                    "NOT IN"
                } else {
                    "IN"
                };
                let inner = self.render_subselect(sub)?;
                Ok(format!("{lhs} {keyword} ({inner})"))
            }
            (Op::Contains, ResolvedOperand::Value(value)) => {
                self.render_like(&lhs, value, condition.case_sensitive, true, true)
            }
            (Op::StartsWith, ResolvedOperand::Value(value)) => {
                self.render_like(&lhs, value, condition.case_sensitive, false, true)
            }
            (Op::EndsWith, ResolvedOperand::Value(value)) => {
                self.render_like(&lhs, value, condition.case_sensitive, true, false)
            }
            (Op::Matches | Op::DoesNotMatch, ResolvedOperand::Value(value)) => {
                self.render_regex(&lhs, value, condition)
            }
            (op, operand) => Err(Error::config(format!(
                "operator {} cannot take operand {:?}",
                op.as_str(),
                operand
            ))),
        }
    }

    fn render_in(&mut self, lhs: &str, negated: bool, values: &[Value]) -> String {
        if values.is_empty() {
            // empty IN can never match; empty NOT IN always matches
            return if negated {
                "1 = 1".to_string()
            } else {
                "1 = 0".to_string()
            };
        }
        let placeholders: Vec<String> = values.iter().map(|v| self.bind(v.clone())).collect();
        let keyword = if negated { "NOT IN" } else { "IN" };
        format!("{lhs} {keyword} ({})", placeholders.join(", "))
    }

    fn render_like(
        &mut self,
        lhs: &str,
        value: &Value,
        case_sensitive: bool,
        prefix_wild: bool,
        suffix_wild: bool,
    ) -> Result<String> {
        let text = value
            .as_str()
            .ok_or_else(|| Error::config("pattern operators require a text operand"))?;
        let mut pattern = String::new();
        if prefix_wild {
            pattern.push('%');
        }
        pattern.push_str(&escape_like(text));
        if suffix_wild {
            pattern.push('%');
        }
        let rhs = self.bind(Value::Text(pattern));
        let keyword = match (self.dialect, case_sensitive) {
            (Dialect::Postgres, false) => "ILIKE",
            (Dialect::Mysql, true) => "LIKE BINARY",
            _ => "LIKE",
        };
        // sqlite's LIKE has no default escape character; the mysql
        // string literal doubles the backslash
        let escape = match self.dialect {
            Dialect::Mysql => " ESCAPE '\\\\'",
            Dialect::Postgres | Dialect::Sqlite => " ESCAPE '\\'",
        };
        Ok(format!("{lhs} {keyword} {rhs}{escape}"))
    }

    fn render_regex(
        &mut self,
        lhs: &str,
        value: &Value,
        condition: &ResolvedCondition,
    ) -> Result<String> {
        use relmap_query::Op;

        let negated = condition.op == Op::DoesNotMatch;
        let rhs = self.bind(value.clone());
        match self.dialect {
            Dialect::Postgres => {
                let operator = match (negated, condition.case_sensitive) {
                    (false, true) => "~",
                    (false, false) => "~*",
                    (true, true) => "!~",
                    (true, false) => "!~*",
                };
                Ok(format!("{lhs} {operator} {rhs}"))
            }
            Dialect::Mysql => {
                let keyword = if negated { "NOT REGEXP" } else { "REGEXP" };
                Ok(format!("{lhs} {keyword} {rhs}"))
            }
            Dialect::Sqlite => Err(Error::unsupported(
                Dialect::Sqlite.name(),
                "regular-expression matching",
            )),
        }
    }

    /// Render an uncorrelated sub-select; inner aliases shadow the outer
    /// query's inside the parentheses.
    fn render_subselect(&mut self, sub: &ResolvedSubselect) -> Result<String> {
        let projection = self.column_expr(&sub.column);
        let mut sql = format!(
            "SELECT {projection} FROM {} {}",
            self.quote(&sub.query.table),
            self.quote(&sub.query.root_alias),
        );
        sql.push_str(&self.render_joins(&sub.query));
        let i18n_columns = collect_i18n_columns(sub.query.filter.as_ref(), &[&sub.column]);
        sql.push_str(&self.render_i18n_joins(&i18n_columns));
        if let Some(filter) = &sub.query.filter {
            let rendered = self.render_filter(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&rendered);
        }
        Ok(sql)
    }
}

/// Alias of the I18n side table joined for a base alias.
pub fn i18n_alias(base_alias: &str) -> String {
    format!("{base_alias}_i18n")
}

/// Escape LIKE wildcards in a literal fragment.
pub fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Every column a filter tree touches, plus extras, keeping first-use
/// order. Used to decide which I18n side tables need joining.
pub fn collect_i18n_columns<'a>(
    filter: Option<&'a ResolvedFilter>,
    extra: &[&'a ColumnRef],
) -> Vec<&'a ColumnRef> {
    fn walk<'a>(filter: &'a ResolvedFilter, out: &mut Vec<&'a ColumnRef>) {
        match filter {
            ResolvedFilter::Leaf(condition) => {
                if condition.column.is_i18n() {
                    out.push(&condition.column);
                }
            }
            ResolvedFilter::Compound { children, .. } => {
                for child in children {
                    walk(child, out);
                }
            }
        }
    }

    let mut out: Vec<&ColumnRef> = extra.iter().copied().filter(|c| c.is_i18n()).collect();
    if let Some(filter) = filter {
        walk(filter, &mut out);
    }
    out
}
