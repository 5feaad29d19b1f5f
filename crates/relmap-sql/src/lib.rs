//! Dialect-aware SQL compilation for resolved queries.
//!
//! Compilers turn resolved join graphs and record mutations into
//! parameterized SQL. Every compiler is addressed through the
//! [`StatementRegistry`] by (dialect, name), so applications can swap or
//! extend statement generation without touching the engine.

pub mod dialect;
pub mod registry;
pub mod statements;

pub use dialect::Dialect;
pub use registry::{
    AddColumnInput, CompiledStatement, DeleteInput, FragmentRegistry, InsertInput, SelectInput,
    StatementCompiler, StatementInput, StatementRegistry, UpdateInput, UpsertI18nInput,
};
pub use statements::{ADD_COLUMN, DELETE, INSERT, SELECT, SELECT_COUNT, UPDATE, UPSERT_I18N};

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::{
        Collector, Column, ColumnFlags, ColumnKind, Context, Registry, Schema, Value,
    };
    use relmap_query::{Query, Resolver};
    use std::collections::BTreeMap;

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
                    .column(
                        Column::new("username", ColumnKind::Text).flags(ColumnFlags::REQUIRED),
                    )
                    .column(Column::new("password", ColumnKind::Text).flags(ColumnFlags::PRIVATE))
                    .column(Column::new("group", ColumnKind::reference("Group")).field("group_id"))
                    .collector(Collector::reverse("addresses", "Address", "user"))
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
                Schema::builder("Page")
                    .dbname("pages")
                    .column(Column::new("slug", ColumnKind::Text))
                    .column(Column::new("title", ColumnKind::Text).flags(ColumnFlags::I18N))
                    .finish()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    fn compile_select(
        registry: &Registry,
        dialect: Dialect,
        model: &str,
        filter: relmap_query::Filter,
        context: &Context,
    ) -> CompiledStatement {
        let resolved = Resolver::new(registry).resolve(model, &filter).unwrap();
        let schema = registry.schema(model).unwrap();
        let statements = StatementRegistry::with_builtins();
        statements
            .compile(
                dialect,
                SELECT,
                &StatementInput::Select(SelectInput {
                    schema,
                    query: &resolved,
                    context,
                }),
            )
            .unwrap()
    }

    #[test]
    fn username_password_filter() {
        let registry = registry();
        let filter = Query::new("username").is("bob") & Query::new("password").is("s3cret");
        let compiled = compile_select(
            &registry,
            Dialect::Postgres,
            "User",
            filter,
            &Context::new(),
        );
        assert_eq!(
            compiled.sql,
            "SELECT \"t0\".\"id\" AS \"id\", \"t0\".\"username\" AS \"username\", \
             \"t0\".\"password\" AS \"password\", \"t0\".\"group_id\" AS \"group\" \
             FROM \"users\" \"t0\" \
             WHERE (\"t0\".\"username\" = $1 AND \"t0\".\"password\" = $2)"
        );
        assert_eq!(
            compiled.params,
            vec![Value::from("bob"), Value::from("s3cret")]
        );
    }

    #[test]
    fn dotted_path_compiles_to_join() {
        let registry = registry();
        let filter: relmap_query::Filter = Query::new("group.name").is("admins").into();
        let compiled = compile_select(
            &registry,
            Dialect::Sqlite,
            "User",
            filter,
            &Context::new(),
        );
        assert!(compiled.sql.contains(
            "JOIN \"groups\" \"j1\" ON \"j1\".\"id\" = \"t0\".\"group_id\""
        ));
        assert!(compiled.sql.contains("WHERE \"j1\".\"name\" = ?"));
        assert_eq!(compiled.params, vec![Value::from("admins")]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let registry = registry();
        let filter = Query::new("group.name").is("admins") & Query::new("addresses.city").is("Berlin");
        let first = compile_select(
            &registry,
            Dialect::Mysql,
            "User",
            filter.clone(),
            &Context::new(),
        );
        let second = compile_select(&registry, Dialect::Mysql, "User", filter, &Context::new());
        assert_eq!(first, second);
    }

    #[test]
    fn order_limit_and_paging() {
        let registry = registry();
        let context = Context::new()
            .with_order_text("-username")
            .with_page(3, 10);
        let compiled = compile_select(
            &registry,
            Dialect::Postgres,
            "User",
            relmap_query::Filter::Null,
            &context,
        );
        assert!(compiled.sql.ends_with(
            "ORDER BY \"t0\".\"username\" DESC LIMIT 10 OFFSET 20"
        ));
    }

    #[test]
    fn empty_in_never_matches() {
        let registry = registry();
        let filter: relmap_query::Filter = Query::new("id").is_in(Vec::new()).into();
        let compiled = compile_select(
            &registry,
            Dialect::Postgres,
            "User",
            filter,
            &Context::new(),
        );
        assert!(compiled.sql.ends_with("WHERE 1 = 0"));
        assert!(compiled.params.is_empty());

        let filter: relmap_query::Filter = Query::new("id").not_in(Vec::new()).into();
        let compiled = compile_select(
            &registry,
            Dialect::Postgres,
            "User",
            filter,
            &Context::new(),
        );
        assert!(compiled.sql.ends_with("WHERE 1 = 1"));
    }

    #[test]
    fn like_patterns_carry_an_explicit_escape() {
        let registry = registry();
        let filter: relmap_query::Filter = Query::new("name").contains("50%").into();
        let compiled = compile_select(
            &registry,
            Dialect::Sqlite,
            "Group",
            filter.clone(),
            &Context::new(),
        );
        // sqlite has no default escape character, so the backslash
        // escaping only works when declared
        assert!(compiled.sql.ends_with("WHERE \"t0\".\"name\" LIKE ? ESCAPE '\\'"));
        assert_eq!(compiled.params, vec![Value::from("%50\\%%")]);

        let compiled = compile_select(&registry, Dialect::Mysql, "Group", filter, &Context::new());
        assert!(compiled.sql.ends_with("LIKE BINARY ? ESCAPE '\\\\'"));
    }

    #[test]
    fn null_comparisons_use_is_null() {
        let registry = registry();
        let filter: relmap_query::Filter = Query::new("group").is(Value::Null).into();
        let compiled = compile_select(
            &registry,
            Dialect::Postgres,
            "User",
            filter,
            &Context::new(),
        );
        assert!(compiled.sql.ends_with("WHERE \"t0\".\"group_id\" IS NULL"));
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn i18n_columns_join_the_side_table() {
        let registry = registry();
        let filter: relmap_query::Filter = Query::new("title").is("Home").into();
        let context = Context::new().with_locale("fr_FR");
        let compiled = compile_select(&registry, Dialect::Postgres, "Page", filter, &context);
        assert!(compiled.sql.contains(
            "LEFT JOIN \"pages_i18n\" \"t0_i18n\" ON \"t0_i18n\".\"record_id\" = \"t0\".\"id\" \
             AND \"t0_i18n\".\"locale\" = $1"
        ));
        assert!(compiled.sql.contains("WHERE \"t0_i18n\".\"title\" = $2"));
        assert_eq!(
            compiled.params,
            vec![Value::from("fr_FR"), Value::from("Home")]
        );
    }

    #[test]
    fn regex_match_unsupported_on_sqlite() {
        let registry = registry();
        let resolved = Resolver::new(&registry)
            .resolve("User", &Query::new("username").matches("^b").into())
            .unwrap();
        let schema = registry.schema("User").unwrap();
        let statements = StatementRegistry::with_builtins();
        let context = Context::new();
        let err = statements
            .compile(
                Dialect::Sqlite,
                SELECT,
                &StatementInput::Select(SelectInput {
                    schema,
                    query: &resolved,
                    context: &context,
                }),
            )
            .unwrap_err();
        assert!(err.to_string().contains("sqlite"));

        let compiled = statements
            .compile(
                Dialect::Postgres,
                SELECT,
                &StatementInput::Select(SelectInput {
                    schema,
                    query: &resolved,
                    context: &context,
                }),
            )
            .unwrap();
        assert!(compiled.sql.contains("~ $1"));
    }

    #[test]
    fn count_ignores_paging() {
        let registry = registry();
        let resolved = Resolver::new(&registry)
            .resolve("User", &Query::new("username").is("bob").into())
            .unwrap();
        let schema = registry.schema("User").unwrap();
        let context = Context::new().with_page(4, 10).with_order_text("-username");
        let statements = StatementRegistry::with_builtins();
        let compiled = statements
            .compile(
                Dialect::Mysql,
                SELECT_COUNT,
                &StatementInput::Count(SelectInput {
                    schema,
                    query: &resolved,
                    context: &context,
                }),
            )
            .unwrap();
        assert!(compiled.sql.starts_with("SELECT COUNT(*)"));
        assert!(!compiled.sql.contains("LIMIT"));
        assert!(!compiled.sql.contains("ORDER BY"));
    }

    #[test]
    fn insert_returns_identity_on_postgres() {
        let registry = registry();
        let schema = registry.schema("User").unwrap();
        let mut values = BTreeMap::new();
        values.insert("username".to_string(), Value::from("bob"));
        let statements = StatementRegistry::with_builtins();
        let compiled = statements
            .compile(
                Dialect::Postgres,
                INSERT,
                &StatementInput::Insert(InsertInput { schema, values: &values }),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO \"users\" (\"username\") VALUES ($1) RETURNING \"id\""
        );

        let compiled = statements
            .compile(
                Dialect::Mysql,
                INSERT,
                &StatementInput::Insert(InsertInput { schema, values: &values }),
            )
            .unwrap();
        assert_eq!(compiled.sql, "INSERT INTO `users` (`username`) VALUES (?)");
    }

    #[test]
    fn update_touches_changed_columns_only() {
        let registry = registry();
        let schema = registry.schema("User").unwrap();
        let mut changes = BTreeMap::new();
        changes.insert("username".to_string(), Value::from("robert"));
        let statements = StatementRegistry::with_builtins();
        let compiled = statements
            .compile(
                Dialect::Postgres,
                UPDATE,
                &StatementInput::Update(UpdateInput {
                    schema,
                    id: &Value::Int(7),
                    changes: &changes,
                }),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "UPDATE \"users\" SET \"username\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(compiled.params, vec![Value::from("robert"), Value::Int(7)]);
    }

    #[test]
    fn delete_by_identity_set() {
        let registry = registry();
        let schema = registry.schema("User").unwrap();
        let statements = StatementRegistry::with_builtins();
        let compiled = statements
            .compile(
                Dialect::Sqlite,
                DELETE,
                &StatementInput::Delete(DeleteInput {
                    schema,
                    ids: &[Value::Int(1), Value::Int(2)],
                }),
            )
            .unwrap();
        assert_eq!(compiled.sql, "DELETE FROM \"users\" WHERE \"id\" IN (?, ?)");
    }

    #[test]
    fn add_column_renders_flag_fragments_per_dialect() {
        let registry = registry();
        let schema = registry.schema("User").unwrap();
        let column = Column::new("nickname", ColumnKind::Text)
            .flags(ColumnFlags::REQUIRED | ColumnFlags::UNIQUE);
        let statements = StatementRegistry::with_builtins();

        let compiled = statements
            .compile(
                Dialect::Postgres,
                ADD_COLUMN,
                &StatementInput::AddColumn(AddColumnInput {
                    schema,
                    column: &column,
                }),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "ALTER TABLE \"users\" ADD COLUMN \"nickname\" TEXT NOT NULL UNIQUE"
        );

        let compiled = statements
            .compile(
                Dialect::Mysql,
                ADD_COLUMN,
                &StatementInput::AddColumn(AddColumnInput {
                    schema,
                    column: &column,
                }),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "ALTER TABLE `users` ADD COLUMN `nickname` TEXT NOT NULL UNIQUE"
        );
    }

    #[test]
    fn i18n_upsert_per_dialect() {
        let registry = registry();
        let schema = registry.schema("Page").unwrap();
        let mut values = BTreeMap::new();
        values.insert("title".to_string(), Value::from("Accueil"));
        let statements = StatementRegistry::with_builtins();

        let compiled = statements
            .compile(
                Dialect::Postgres,
                UPSERT_I18N,
                &StatementInput::UpsertI18n(UpsertI18nInput {
                    schema,
                    id: &Value::Int(4),
                    locale: "fr_FR",
                    values: &values,
                }),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO \"pages_i18n\" (\"record_id\", \"locale\", \"title\") \
             VALUES ($1, $2, $3) \
             ON CONFLICT (\"record_id\", \"locale\") DO UPDATE SET \"title\" = excluded.\"title\""
        );
        assert_eq!(
            compiled.params,
            vec![Value::Int(4), Value::from("fr_FR"), Value::from("Accueil")]
        );

        let compiled = statements
            .compile(
                Dialect::Mysql,
                UPSERT_I18N,
                &StatementInput::UpsertI18n(UpsertI18nInput {
                    schema,
                    id: &Value::Int(4),
                    locale: "fr_FR",
                    values: &values,
                }),
            )
            .unwrap();
        assert!(compiled.sql.ends_with("ON DUPLICATE KEY UPDATE `title` = VALUES(`title`)"));
    }

    #[test]
    fn subselect_compiles_uncorrelated() {
        let registry = registry();
        let filter: relmap_query::Filter = Query::new("group")
            .in_query(relmap_query::Subselect {
                model: "Group".to_string(),
                column: "id".to_string(),
                filter: Query::new("name").starts_with("adm").into(),
            })
            .into();
        let compiled = compile_select(
            &registry,
            Dialect::Postgres,
            "User",
            filter,
            &Context::new(),
        );
        assert!(compiled.sql.contains(
            "\"t0\".\"group_id\" IN (SELECT \"t0\".\"id\" FROM \"groups\" \"t0\" \
             WHERE \"t0\".\"name\" LIKE $1 ESCAPE '\\')"
        ));
        assert_eq!(compiled.params, vec![Value::from("adm%")]);
    }
}
