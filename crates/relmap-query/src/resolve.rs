//! Filter resolution against the metadata registry.
//!
//! Resolution turns a [`Filter`] of dotted column paths into a concrete
//! join graph plus a tree of column-level conditions. Each relationship
//! hop becomes one join (two for through collectors); repeated prefixes
//! reuse the join they introduced, and aliases are assigned in
//! first-visit order so identical inputs always resolve identically.

use crate::query::{BoolOp, Filter, Op, Operand, Query};
use relmap_core::{CollectorKind, ColumnFlags, ColumnKind, Error, Registry, Result, Schema, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Alias given to the root table of every resolved query.
pub const ROOT_ALIAS: &str = "t0";

/// A fully resolved column: which alias and database column to address.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Table alias the column is addressed through
    pub alias: String,
    /// Logical field name on its model
    pub name: String,
    /// Database column name
    pub field: String,
    /// Semantic kind of the column
    pub kind: ColumnKind,
    /// Per-locale side table descriptor, set for I18n columns
    pub i18n: Option<I18nRef>,
}

impl ColumnRef {
    /// Whether this column lives in a per-locale side table.
    pub fn is_i18n(&self) -> bool {
        self.i18n.is_some()
    }
}

/// How to reach the per-locale side table for an I18n column.
#[derive(Debug, Clone, PartialEq)]
pub struct I18nRef {
    /// Side table holding one row per (record, locale)
    pub table: String,
    /// Identity column on the base table the side table keys against
    pub base_id_field: String,
}

/// One join edge in the resolved graph.
///
/// Renders as `JOIN <table> <alias> ON <alias>.<right_field> =
/// <left_alias>.<left_field>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Database table being joined in
    pub table: String,
    /// Alias assigned to the joined table
    pub alias: String,
    /// Alias of the already-joined side
    pub left_alias: String,
    /// Database column on the already-joined side
    pub left_field: String,
    /// Database column on the joined table
    pub right_field: String,
}

/// A resolved right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOperand {
    Value(Value),
    Values(Vec<Value>),
    Subselect(Box<ResolvedSubselect>),
}

/// A resolved nested query, compiled as an uncorrelated IN-list select.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubselect {
    /// Column projected by the sub-select
    pub column: ColumnRef,
    /// The sub-query itself, with its own alias space
    pub query: ResolvedQuery,
}

/// A resolved leaf condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCondition {
    pub column: ColumnRef,
    pub op: Op,
    pub operand: ResolvedOperand,
    pub case_sensitive: bool,
}

/// The resolved filter tree, mirroring the input shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFilter {
    Leaf(ResolvedCondition),
    Compound {
        op: BoolOp,
        children: Vec<ResolvedFilter>,
    },
}

/// A filter resolved against one model: join graph plus condition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    /// Model the query runs against
    pub model: String,
    /// Root database table
    pub table: String,
    /// Alias of the root table, always [`ROOT_ALIAS`]
    pub root_alias: String,
    /// Join edges in first-visit order
    pub joins: Vec<Join>,
    /// Condition tree, absent for the null filter
    pub filter: Option<ResolvedFilter>,
}

/// Resolves filters against the registry.
#[derive(Debug)]
pub struct Resolver<'a> {
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Resolve a filter against a model into a join graph and condition
    /// tree.
    pub fn resolve(&self, model: &str, filter: &Filter) -> Result<ResolvedQuery> {
        let schema = self.registry.schema(model)?;
        let mut walk = PathWalk::new(self.registry, Arc::clone(schema));
        let resolved = match filter {
            Filter::Null => None,
            other => Some(walk.resolve_filter(other)?),
        };
        tracing::debug!(
            model,
            joins = walk.joins.len(),
            "resolved filter against registry"
        );
        Ok(ResolvedQuery {
            model: model.to_string(),
            table: schema.dbname().to_string(),
            root_alias: ROOT_ALIAS.to_string(),
            joins: walk.joins,
            filter: resolved,
        })
    }

    /// Resolve a single dotted path against a model.
    ///
    /// Used for ordering and projection columns; relationship hops add
    /// joins to the returned query's graph.
    pub fn resolve_path(&self, model: &str, path: &str) -> Result<(ResolvedQuery, ColumnRef)> {
        let schema = self.registry.schema(model)?;
        let mut walk = PathWalk::new(self.registry, Arc::clone(schema));
        let segments: Vec<String> = path.split('.').map(ToString::to_string).collect();
        let column = walk.resolve_segments(&segments)?;
        Ok((
            ResolvedQuery {
                model: model.to_string(),
                table: schema.dbname().to_string(),
                root_alias: ROOT_ALIAS.to_string(),
                joins: walk.joins,
                filter: None,
            },
            column,
        ))
    }
}

/// State of one resolution pass: the join list and the prefix-to-alias
/// memo that keeps repeated paths from joining the same table twice.
struct PathWalk<'a> {
    registry: &'a Registry,
    root: Arc<Schema>,
    joins: Vec<Join>,
    aliases: HashMap<String, (String, Arc<Schema>)>,
}

impl<'a> PathWalk<'a> {
    fn new(registry: &'a Registry, root: Arc<Schema>) -> Self {
        Self {
            registry,
            root,
            joins: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    fn resolve_filter(&mut self, filter: &Filter) -> Result<ResolvedFilter> {
        match filter {
            Filter::Null => Err(Error::config(
                "null filters cannot appear inside a compound",
            )),
            Filter::Leaf(query) => Ok(ResolvedFilter::Leaf(self.resolve_leaf(query)?)),
            Filter::Compound(compound) => {
                let mut children = Vec::with_capacity(compound.children().len());
                for child in compound.children() {
                    children.push(self.resolve_filter(child)?);
                }
                Ok(ResolvedFilter::Compound {
                    op: compound.op(),
                    children,
                })
            }
        }
    }

    fn resolve_leaf(&mut self, query: &Query) -> Result<ResolvedCondition> {
        let column = self.resolve_segments(query.path())?;
        let operand = match query.operand() {
            Operand::Value(value) => ResolvedOperand::Value(value.clone()),
            Operand::Values(values) => ResolvedOperand::Values(values.clone()),
            Operand::Subselect(sub) => {
                let resolver = Resolver::new(self.registry);
                let query = resolver.resolve(&sub.model, &sub.filter)?;
                let schema = self.registry.schema(&sub.model)?;
                let target = schema.column(&sub.column)?;
                let column = ColumnRef {
                    alias: ROOT_ALIAS.to_string(),
                    name: target.name().to_string(),
                    field: target.field_name().to_string(),
                    kind: target.kind().clone(),
                    i18n: i18n_for(schema, target),
                };
                ResolvedOperand::Subselect(Box::new(ResolvedSubselect { column, query }))
            }
        };
        Ok(ResolvedCondition {
            column,
            op: query.op(),
            operand,
            case_sensitive: query.is_case_sensitive(),
        })
    }

    /// Walk the segments of one dotted path, joining as needed, and
    /// return the column the final segment addresses.
    fn resolve_segments(&mut self, segments: &[String]) -> Result<ColumnRef> {
        let mut alias = ROOT_ALIAS.to_string();
        let mut schema = Arc::clone(&self.root);
        let mut prefix = String::new();

        let (last, hops) = segments
            .split_last()
            .ok_or_else(|| Error::config("query paths cannot be empty"))?;

        for segment in hops {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            (alias, schema) = self.hop(&alias, &schema, segment, &prefix)?;
        }

        if let Ok(column) = schema.column(last) {
            return Ok(ColumnRef {
                alias,
                name: column.name().to_string(),
                field: column.field_name().to_string(),
                kind: column.kind().clone(),
                i18n: i18n_for(&schema, column),
            });
        }
        // a trailing relationship segment addresses the far side's id
        if schema.has_collector(last) {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(last);
            let (alias, schema) = self.hop(&alias, &schema, last, &prefix)?;
            let id = schema.id_column();
            return Ok(ColumnRef {
                alias,
                name: id.name().to_string(),
                field: id.field_name().to_string(),
                kind: id.kind().clone(),
                i18n: None,
            });
        }
        Err(Error::column_not_found(schema.name(), last))
    }

    /// Follow one relationship segment, reusing or creating its joins.
    fn hop(
        &mut self,
        alias: &str,
        schema: &Arc<Schema>,
        segment: &str,
        prefix: &str,
    ) -> Result<(String, Arc<Schema>)> {
        if let Some((alias, schema)) = self.aliases.get(prefix) {
            return Ok((alias.clone(), Arc::clone(schema)));
        }

        let (next_alias, next_schema) = if let Ok(column) = schema.column(segment) {
            let target = column.kind().target().ok_or_else(|| {
                Error::config(format!(
                    "'{}.{}' is not a relationship and cannot be traversed",
                    schema.name(),
                    segment
                ))
            })?;
            let target_schema = Arc::clone(self.registry.schema(target)?);
            let next = self.push_join(Join {
                table: target_schema.dbname().to_string(),
                alias: String::new(),
                left_alias: alias.to_string(),
                left_field: column.field_name().to_string(),
                right_field: target_schema.id_column().field_name().to_string(),
            });
            (next, target_schema)
        } else {
            let collector = schema.collector(segment)?;
            match collector.kind() {
                CollectorKind::Reverse { model, reference } => {
                    let target_schema = Arc::clone(self.registry.schema(model)?);
                    let back = target_schema.column(reference)?;
                    let next = self.push_join(Join {
                        table: target_schema.dbname().to_string(),
                        alias: String::new(),
                        left_alias: alias.to_string(),
                        left_field: schema.id_column().field_name().to_string(),
                        right_field: back.field_name().to_string(),
                    });
                    (next, target_schema)
                }
                CollectorKind::Through {
                    through,
                    source,
                    target,
                } => {
                    let through_schema = self.registry.schema(through)?;
                    let source_col = through_schema.column(source)?;
                    let target_col = through_schema.column(target)?;
                    let far_model = target_col.kind().target().ok_or_else(|| {
                        Error::config(format!(
                            "through column '{through}.{target}' must be a reference"
                        ))
                    })?;
                    let far_schema = Arc::clone(self.registry.schema(far_model)?);

                    let through_table = through_schema.dbname().to_string();
                    let source_field = source_col.field_name().to_string();
                    let target_field = target_col.field_name().to_string();
                    let through_alias = self.push_join(Join {
                        table: through_table,
                        alias: String::new(),
                        left_alias: alias.to_string(),
                        left_field: schema.id_column().field_name().to_string(),
                        right_field: source_field,
                    });
                    let next = self.push_join(Join {
                        table: far_schema.dbname().to_string(),
                        alias: String::new(),
                        left_alias: through_alias,
                        left_field: target_field,
                        right_field: far_schema.id_column().field_name().to_string(),
                    });
                    (next, far_schema)
                }
            }
        };

        self.aliases.insert(
            prefix.to_string(),
            (next_alias.clone(), Arc::clone(&next_schema)),
        );
        Ok((next_alias, next_schema))
    }

    fn push_join(&mut self, mut join: Join) -> String {
        let alias = format!("j{}", self.joins.len() + 1);
        join.alias.clone_from(&alias);
        self.joins.push(join);
        alias
    }
}

fn i18n_for(schema: &Schema, column: &relmap_core::Column) -> Option<I18nRef> {
    if column.has_flags(ColumnFlags::I18N) {
        Some(I18nRef {
            table: schema.i18n_dbname(),
            base_id_field: schema.id_column().field_name().to_string(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Subselect;
    use relmap_core::{Collector, Column};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                Schema::builder("Group")
                    .dbname("groups")
                    .column(Column::new("name", ColumnKind::Text))
                    .finish()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Schema::builder("User")
                    .dbname("users")
                    .column(Column::new("username", ColumnKind::Text))
                    .column(Column::new("group", ColumnKind::reference("Group")).field("group_id"))
                    .collector(Collector::reverse("addresses", "Address", "user"))
                    .collector(Collector::through("teams", "TeamUser", "user", "team"))
                    .finish()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Schema::builder("Address")
                    .dbname("addresses")
                    .column(Column::new("city", ColumnKind::Text))
                    .column(Column::new("user", ColumnKind::reference("User")).field("user_id"))
                    .finish()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Schema::builder("Team")
                    .dbname("teams")
                    .column(Column::new("name", ColumnKind::Text))
                    .finish()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Schema::builder("TeamUser")
                    .dbname("team_users")
                    .column(Column::new("user", ColumnKind::reference("User")).field("user_id"))
                    .column(Column::new("team", ColumnKind::reference("Team")).field("team_id"))
                    .finish()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn root_column_needs_no_joins() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve("User", &Query::new("username").is("bob").into())
            .unwrap();
        assert!(resolved.joins.is_empty());
        let Some(ResolvedFilter::Leaf(cond)) = &resolved.filter else {
            panic!("expected a leaf");
        };
        assert_eq!(cond.column.alias, ROOT_ALIAS);
        assert_eq!(cond.column.field, "username");
    }

    #[test]
    fn dotted_reference_adds_one_join() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve("User", &Query::new("group.name").is("admins").into())
            .unwrap();
        assert_eq!(resolved.joins.len(), 1);
        let join = &resolved.joins[0];
        assert_eq!(join.table, "groups");
        assert_eq!(join.alias, "j1");
        assert_eq!(join.left_alias, "t0");
        assert_eq!(join.left_field, "group_id");
        assert_eq!(join.right_field, "id");
    }

    #[test]
    fn repeated_prefixes_share_joins() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let filter = Query::new("group.name").is("admins") & Query::new("group.id").greater_than(5);
        let resolved = resolver.resolve("User", &filter).unwrap();
        assert_eq!(resolved.joins.len(), 1);
    }

    #[test]
    fn reverse_collector_joins_back() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve("User", &Query::new("addresses.city").is("Berlin").into())
            .unwrap();
        assert_eq!(resolved.joins.len(), 1);
        let join = &resolved.joins[0];
        assert_eq!(join.table, "addresses");
        assert_eq!(join.left_field, "id");
        assert_eq!(join.right_field, "user_id");
    }

    #[test]
    fn through_collector_joins_twice() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve("User", &Query::new("teams.name").is("core").into())
            .unwrap();
        assert_eq!(resolved.joins.len(), 2);
        assert_eq!(resolved.joins[0].table, "team_users");
        assert_eq!(resolved.joins[1].table, "teams");
        assert_eq!(resolved.joins[1].left_alias, "j1");
    }

    #[test]
    fn trailing_collector_addresses_far_id() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve("User", &Query::new("teams").is_in(vec![Value::Int(3)]).into())
            .unwrap();
        let Some(ResolvedFilter::Leaf(cond)) = &resolved.filter else {
            panic!("expected a leaf");
        };
        assert_eq!(cond.column.field, "id");
        assert_eq!(cond.column.alias, "j2");
    }

    #[test]
    fn unknown_column_fails_before_sql() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let err = resolver
            .resolve("User", &Query::new("group.missing").is(1).into())
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn subselect_gets_its_own_alias_space() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let filter: Filter = Query::new("group")
            .in_query(Subselect {
                model: "Group".to_string(),
                column: "id".to_string(),
                filter: Query::new("name").starts_with("adm").into(),
            })
            .into();
        let resolved = resolver.resolve("User", &filter).unwrap();
        let Some(ResolvedFilter::Leaf(cond)) = &resolved.filter else {
            panic!("expected a leaf");
        };
        let ResolvedOperand::Subselect(sub) = &cond.operand else {
            panic!("expected a subselect");
        };
        assert_eq!(sub.query.root_alias, ROOT_ALIAS);
        assert_eq!(sub.query.table, "groups");
        assert_eq!(sub.column.field, "id");
    }

    #[test]
    fn identical_inputs_resolve_identically() {
        let registry = registry();
        let resolver = Resolver::new(&registry);
        let filter =
            Query::new("group.name").is("admins") & Query::new("addresses.city").is("Berlin");
        let first = resolver.resolve("User", &filter).unwrap();
        let second = resolver.resolve("User", &filter).unwrap();
        assert_eq!(first, second);
    }
}
