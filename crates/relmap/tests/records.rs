//! Record lifecycle: change tracking, save/delete orchestration, hook
//! veto points and validation ordering.

mod support;

use relmap::{Context, Dialect, EventKind, RecordErrorKind, RecordState, Value};
use support::{builder, id_row, store, user_row};

#[test]
fn new_records_insert_and_adopt_the_identity() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![id_row(7)]);

    let mut user = store.new_record("User").unwrap();
    assert_eq!(user.state(), RecordState::New);
    user.set("username", "bob").unwrap();
    assert!(user.save().unwrap());

    let insert = &mock.executed()[0];
    assert_eq!(
        insert.sql,
        "INSERT INTO \"users\" (\"username\") VALUES ($1) RETURNING \"id\""
    );
    assert_eq!(insert.params, vec![Value::from("bob")]);
    assert_eq!(user.id(), Some(&Value::Int(7)));
    assert_eq!(user.state(), RecordState::Clean);
}

#[test]
fn clean_saves_are_no_ops() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![user_row(7, "bob", None)]);

    let mut user = store.fetch("User", 7).unwrap().unwrap();
    assert_eq!(user.state(), RecordState::Clean);
    assert!(!user.save().unwrap());
    assert_eq!(mock.statement_count(), 1);
}

#[test]
fn updates_touch_changed_columns_only() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![user_row(7, "bob", None)]);

    let mut user = store.fetch("User", 7).unwrap().unwrap();
    user.set("username", "robert").unwrap();
    assert_eq!(user.state(), RecordState::Modified);
    assert!(user.save().unwrap());

    let update = &mock.executed()[1];
    assert_eq!(
        update.sql,
        "UPDATE \"users\" SET \"username\" = $1 WHERE \"id\" = $2"
    );
    assert_eq!(update.params, vec![Value::from("robert"), Value::Int(7)]);
    assert_eq!(user.state(), RecordState::Clean);
}

#[test]
fn setting_the_original_value_back_reverts_to_clean() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![user_row(7, "bob", None)]);

    let mut user = store.fetch("User", 7).unwrap().unwrap();
    user.set("username", "robert").unwrap();
    user.set("username", "bob").unwrap();
    assert_eq!(user.state(), RecordState::Clean);
    assert!(!user.save().unwrap());
    assert_eq!(mock.statement_count(), 1);
}

#[test]
fn required_null_fails_validation_before_any_sql() {
    let (store, mock) = store(Dialect::Postgres);
    let mut user = store.new_record("User").unwrap();
    let err = user.save().unwrap_err();
    assert!(err.to_string().contains("username"));
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn read_only_and_reference_guards() {
    let (store, _mock) = store(Dialect::Postgres);
    let mut user = store.new_record("User").unwrap();

    let err = user.set("id", 1).unwrap_err();
    assert!(err.to_string().contains("read-only"));

    let err = user.set("group", "admins").unwrap_err();
    assert!(err.to_string().contains("Invalid reference"));
    user.set("group", 5).unwrap();
    user.set("group", Value::Null).unwrap();

    let err = user.set("missing", 1).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn pre_save_hooks_can_veto() {
    let (builder, mock) = builder(Dialect::Postgres);
    let store = builder
        .subscribe("User", EventKind::PreSave, |event| {
            if event.values().get("username") == Some(&Value::from("root")) {
                event.prevent_default();
            }
        })
        .finish()
        .unwrap();

    let mut user = store.new_record("User").unwrap();
    user.set("username", "root").unwrap();
    assert!(!user.save().unwrap());
    assert_eq!(mock.statement_count(), 0);

    mock.push_rows(vec![id_row(1)]);
    user.set("username", "bob").unwrap();
    assert!(user.save().unwrap());
    assert_eq!(mock.statement_count(), 1);
}

#[test]
fn delete_lifecycle_is_terminal() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![user_row(7, "bob", None)]);
    mock.push_affected(1);

    let mut user = store.fetch("User", 7).unwrap().unwrap();
    assert!(user.delete().unwrap());
    assert_eq!(user.state(), RecordState::Deleted);
    assert_eq!(
        mock.executed()[1].sql,
        "DELETE FROM \"users\" WHERE \"id\" IN ($1)"
    );

    let err = user.delete().unwrap_err();
    assert!(err.is_record_error(RecordErrorKind::Deleted));
    let err = user.set("username", "ghost").unwrap_err();
    assert!(err.is_record_error(RecordErrorKind::Deleted));
    let err = user.save().unwrap_err();
    assert!(err.is_record_error(RecordErrorKind::Deleted));
}

#[test]
fn deleting_an_unsaved_record_fails() {
    let (store, mock) = store(Dialect::Postgres);
    let mut user = store.new_record("User").unwrap();
    let err = user.delete().unwrap_err();
    assert!(err.is_record_error(RecordErrorKind::Unsaved));
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn pre_delete_hooks_can_veto() {
    let (builder, mock) = builder(Dialect::Postgres);
    let store = builder
        .subscribe("User", EventKind::PreDelete, |event| {
            event.prevent_default();
        })
        .finish()
        .unwrap();

    mock.push_rows(vec![user_row(7, "bob", None)]);
    let mut user = store.fetch("User", 7).unwrap().unwrap();
    assert!(!user.delete().unwrap());
    assert_eq!(user.state(), RecordState::Clean);
    assert_eq!(mock.statement_count(), 1);
}

#[test]
fn i18n_columns_upsert_under_the_ambient_locale() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![id_row(4)]);

    let _scope = Context::new().with_locale("fr_FR").scoped();
    let mut page = store.new_record("Page").unwrap();
    page.set("slug", "home").unwrap();
    page.set("title", "Accueil").unwrap();
    assert!(page.save().unwrap());

    assert_eq!(mock.statement_count(), 2);
    let insert = &mock.executed()[0];
    assert_eq!(
        insert.sql,
        "INSERT INTO \"pages\" (\"slug\") VALUES ($1) RETURNING \"id\""
    );
    let upsert = &mock.executed()[1];
    assert!(upsert.sql.starts_with("INSERT INTO \"pages_i18n\""));
    assert_eq!(
        upsert.params,
        vec![Value::Int(4), Value::from("fr_FR"), Value::from("Accueil")]
    );
}

#[test]
fn untouched_translations_on_a_new_record_skip_the_side_table() {
    let (store, mock) = store(Dialect::Sqlite);
    mock.push_affected(1);

    let mut page = store.new_record("Page").unwrap();
    page.set("slug", "home").unwrap();
    assert!(page.save().unwrap());

    // one INSERT; the null title is not a translation to write
    assert_eq!(mock.statement_count(), 1);
    assert_eq!(
        mock.executed()[0].sql,
        "INSERT INTO \"pages\" (\"slug\") VALUES (?)"
    );
    assert_eq!(mock.executed()[0].params, vec![Value::from("home")]);
    assert_eq!(page.state(), RecordState::Clean);
}

#[test]
fn ddl_column_addition_goes_through_the_registry() {
    let (store, mock) = store(Dialect::Postgres);
    let column = relmap::Column::new("nickname", relmap::ColumnKind::Text)
        .flags(relmap::ColumnFlags::UNIQUE);
    store.add_column("User", &column).unwrap();
    assert_eq!(
        mock.executed()[0].sql,
        "ALTER TABLE \"users\" ADD COLUMN \"nickname\" TEXT UNIQUE"
    );
}

#[test]
fn record_json_hides_private_columns_and_nests_expansions() {
    let (store, mock) = store(Dialect::Postgres);
    mock.push_rows(vec![user_row(1, "bob", Some(5))]);
    mock.push_rows(vec![support::group_row(5, "admins")]);

    let users = store
        .all("User")
        .with_context(Context::new().with_expand_text("group"));
    let record = users.at(0).unwrap();
    let json = record.to_json();

    assert!(json.get("password").is_none());
    assert_eq!(json["group_id"], serde_json::json!(5));
    assert_eq!(json["group"]["name"], serde_json::json!("admins"));
}
