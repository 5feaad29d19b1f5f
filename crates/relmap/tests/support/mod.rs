//! Shared fixtures: a scripted connection the pool can hand out, plus
//! the model set the tests run against.
#![allow(dead_code)] // each test binary uses a different subset

use relmap::{
    Collector, Column, ColumnFlags, ColumnKind, Connection, Dialect, ExecuteResult,
    ExecutedStatement, MockConnection, Result, Row, Schema, Store, StoreBuilder, Value,
};
use std::sync::{Arc, Mutex};

/// Handle for scripting and inspecting the mock from the test body.
#[derive(Clone, Default)]
pub struct MockHandle(Arc<Mutex<MockConnection>>);

impl MockHandle {
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.0.lock().unwrap().push_rows(rows);
    }

    pub fn push_affected(&self, affected: u64) {
        self.0.lock().unwrap().push_affected(affected);
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.0.lock().unwrap().executed().to_vec()
    }

    pub fn statement_count(&self) -> usize {
        self.0.lock().unwrap().statement_count()
    }
}

/// Pool-facing side of the handle; all clones share one script.
struct SharedMock(Arc<Mutex<MockConnection>>);

impl Connection for SharedMock {
    fn open(&mut self, write: bool) -> Result<()> {
        self.0.lock().unwrap().open(write)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecuteResult> {
        self.0.lock().unwrap().execute(sql, params)
    }

    fn close(&mut self) {
        self.0.lock().unwrap().close();
    }

    fn is_open(&self) -> bool {
        self.0.lock().unwrap().is_open()
    }
}

pub fn builder(dialect: Dialect) -> (StoreBuilder, MockHandle) {
    let handle = MockHandle::default();
    let factory: relmap::ConnectionFactory = {
        let inner = Arc::clone(&handle.0);
        Box::new(move |_mode| {
            Ok(Box::new(SharedMock(Arc::clone(&inner))) as Box<dyn Connection>)
        })
    };
    let builder = Store::builder(dialect)
        .register(group_schema())
        .unwrap()
        .register(user_schema())
        .unwrap()
        .register(address_schema())
        .unwrap()
        .register(page_schema())
        .unwrap()
        .connection_factory(factory);
    (builder, handle)
}

pub fn store(dialect: Dialect) -> (Store, MockHandle) {
    let (builder, handle) = builder(dialect);
    (builder.finish().unwrap(), handle)
}

pub fn group_schema() -> Schema {
    Schema::builder("Group")
        .dbname("groups")
        .column(Column::new("name", ColumnKind::Text))
        .finish()
        .unwrap()
}

pub fn user_schema() -> Schema {
    Schema::builder("User")
        .dbname("users")
        .column(Column::new("username", ColumnKind::Text).flags(ColumnFlags::REQUIRED))
        .column(Column::new("password", ColumnKind::Text).flags(ColumnFlags::PRIVATE))
        .column(Column::new("group", ColumnKind::reference("Group")).field("group_id"))
        .collector(Collector::reverse("addresses", "Address", "user"))
        .finish()
        .unwrap()
}

pub fn address_schema() -> Schema {
    Schema::builder("Address")
        .dbname("addresses")
        .column(Column::new("city", ColumnKind::Text))
        .column(Column::new("user", ColumnKind::reference("User")).field("user_id"))
        .finish()
        .unwrap()
}

pub fn page_schema() -> Schema {
    Schema::builder("Page")
        .dbname("pages")
        .column(Column::new("slug", ColumnKind::Text))
        .column(Column::new("title", ColumnKind::Text).flags(ColumnFlags::I18N))
        .finish()
        .unwrap()
}

/// A result row keyed the way the SELECT projection aliases columns.
pub fn user_row(id: i64, username: &str, group_id: Option<i64>) -> Row {
    Row::new(
        vec![
            "id".to_string(),
            "username".to_string(),
            "password".to_string(),
            "group".to_string(),
        ],
        vec![
            Value::Int(id),
            Value::from(username),
            Value::Null,
            group_id.map_or(Value::Null, Value::Int),
        ],
    )
}

pub fn group_row(id: i64, name: &str) -> Row {
    Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::Int(id), Value::from(name)],
    )
}

pub fn address_row(id: i64, city: &str, user_id: i64) -> Row {
    Row::new(
        vec!["id".to_string(), "city".to_string(), "user".to_string()],
        vec![Value::Int(id), Value::from(city), Value::Int(user_id)],
    )
}

pub fn count_row(count: i64) -> Row {
    Row::new(vec!["count".to_string()], vec![Value::Int(count)])
}

pub fn id_row(id: i64) -> Row {
    Row::new(vec!["id".to_string()], vec![Value::Int(id)])
}
