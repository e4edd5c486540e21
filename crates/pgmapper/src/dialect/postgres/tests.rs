use super::*;
use crate::model::FieldBuilder;
use serde_json::json;
use std::sync::Mutex;

/// Records statements and returns no rows.
#[derive(Default)]
struct RecordingClient {
    statements: Mutex<Vec<(String, usize)>>,
}

impl RecordingClient {
    fn statements(&self) -> Vec<(String, usize)> {
        self.statements.lock().unwrap().clone()
    }
}

impl GenericClient for RecordingClient {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> MapperResult<Vec<Row>> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.len()));
        Ok(vec![])
    }
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn returning(columns: &[&str]) -> Vec<Ident> {
    columns.iter().map(|c| Ident::column(c).unwrap()).collect()
}

fn pages_model() -> FieldModel {
    FieldModel::new(
        TableRef::new("pages"),
        vec![
            FieldBuilder::new("id", "uuid").primary_key(),
            FieldBuilder::new("title", "varchar"),
            FieldBuilder::new("body_content", "text"),
        ],
        Vec::new(),
    )
}

#[test]
fn postgres_capabilities() {
    let caps = Postgres::new().capabilities();
    assert!(caps.batch_insert);
    assert!(caps.enum_listing);
    assert!(!caps.inline_enum_labels);
    assert!(caps.typed_primary_keys);
    assert!(!Postgres::new().without_batch_insert().capabilities().batch_insert);
}

#[tokio::test]
async fn insert_one_binds_every_column() {
    let client = RecordingClient::default();
    let table = TableRef::with_schema("public", "pages");
    let err = Postgres::new()
        .insert_one(
            &client,
            &table,
            &record(json!({"title": "a", "body_content": "b"})),
            "id",
            false,
            &returning(&["id", "title"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::Other(_)));

    assert_eq!(
        client.statements(),
        vec![(
            r#"INSERT INTO "public"."pages" ("title", "body_content") VALUES ($1, $2) RETURNING "id", "title""#
                .to_string(),
            2
        )]
    );
}

#[tokio::test]
async fn insert_one_generates_uuid_keys() {
    let client = RecordingClient::default();
    let _ = Postgres::new()
        .insert_one(
            &client,
            &TableRef::new("pages"),
            &record(json!({"title": "a"})),
            "id",
            true,
            &returning(&["id"]),
        )
        .await;
    let (sql, params) = &client.statements()[0];
    assert_eq!(
        sql,
        r#"INSERT INTO "pages" ("title", "id") VALUES ($1, $2) RETURNING "id""#
    );
    assert_eq!(*params, 2);
}

#[tokio::test]
async fn blank_keys_are_replaced_by_uuids() {
    let client = RecordingClient::default();
    let model = pages_model();
    let naming = NameTranslator::new(&model).unwrap();
    let _ = Postgres::new()
        .insert_many(
            &client,
            &TableRef::new("pages"),
            vec![
                record(json!({"id": "", "title": "a"})),
                record(json!({"id": null, "title": "b"})),
            ],
            &naming,
            &model,
            &returning(&["id"]),
        )
        .await;
    assert_eq!(
        client.statements()[0],
        (
            r#"INSERT INTO "pages" ("title", "id") VALUES ($1, $2), ($3, $4) RETURNING "id""#
                .to_string(),
            4
        )
    );
}

#[tokio::test]
async fn empty_insert_uses_default_values() {
    let client = RecordingClient::default();
    let _ = Postgres::new()
        .insert_one(
            &client,
            &TableRef::new("pages"),
            &Record::new(),
            "id",
            false,
            &returning(&["id"]),
        )
        .await;
    assert_eq!(
        client.statements()[0].0,
        r#"INSERT INTO "pages" DEFAULT VALUES RETURNING "id""#
    );
}

#[tokio::test]
async fn insert_many_fills_missing_columns_with_default() {
    let client = RecordingClient::default();
    let model = pages_model();
    let naming = NameTranslator::new(&model).unwrap();
    let rows = vec![
        record(json!({"id": "00000000-0000-0000-0000-000000000001", "title": "a"})),
        record(json!({"id": "00000000-0000-0000-0000-000000000002", "bodyContent": "b"})),
    ];
    let out = Postgres::new()
        .insert_many(
            &client,
            &TableRef::new("pages"),
            rows,
            &naming,
            &model,
            &returning(&["id"]),
        )
        .await
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(
        client.statements(),
        vec![(
            r#"INSERT INTO "pages" ("id", "title", "body_content") VALUES ($1, $2, DEFAULT), ($3, DEFAULT, $4) RETURNING "id""#
                .to_string(),
            4
        )]
    );
}

#[tokio::test]
async fn insert_many_rejects_unknown_fields_before_executing() {
    let client = RecordingClient::default();
    let model = pages_model();
    let naming = NameTranslator::new(&model).unwrap();
    let err = Postgres::new()
        .insert_many(
            &client,
            &TableRef::new("pages"),
            vec![record(json!({"title": "a"})), record(json!({"nope": 1}))],
            &naming,
            &model,
            &returning(&["id"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::UnknownField(_)));
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn update_one_targets_primary_key() {
    let client = RecordingClient::default();
    let updated = Postgres::new()
        .update_one(
            &client,
            &TableRef::new("pages"),
            &record(json!({"id": 4, "title": "b"})),
            "id",
            &returning(&["id", "title"]),
        )
        .await
        .unwrap();
    assert!(updated.is_none());
    assert_eq!(
        client.statements()[0],
        (
            r#"UPDATE "pages" SET "id" = $1, "title" = $2 WHERE "id" = $3 RETURNING "id", "title""#
                .to_string(),
            3
        )
    );
}

#[tokio::test]
async fn update_and_delete_apply_criteria() {
    let client = RecordingClient::default();
    let mut predicate = Sql::empty();
    predicate.push(r#""title" = "#).push_value(json!("a"));

    Postgres::new()
        .update_many(
            &client,
            &TableRef::new("pages"),
            vec![predicate],
            &record(json!({"title": "b"})),
            &returning(&["id"]),
        )
        .await
        .unwrap();
    Postgres::new()
        .delete_all(&client, &TableRef::new("pages"), Vec::new(), &returning(&["id"]))
        .await
        .unwrap();

    let statements = client.statements();
    assert_eq!(
        statements[0].0,
        r#"UPDATE "pages" SET "title" = $1 WHERE "title" = $2 RETURNING "id""#
    );
    assert_eq!(statements[1].0, r#"DELETE FROM "pages" RETURNING "id""#);
}

#[tokio::test]
async fn introspection_defaults_to_public_schema() {
    let client = RecordingClient::default();
    let columns = Postgres::new()
        .list_columns(&client, &TableRef::new("pages"))
        .await
        .unwrap();
    assert!(columns.is_empty());
    let (sql, params) = &client.statements()[0];
    assert!(sql.contains("pg_catalog.pg_attribute"));
    assert_eq!(*params, 2);
}
