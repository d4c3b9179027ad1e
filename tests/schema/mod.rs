use rstest::rstest;
use schema_manager::schema::{SchemaRequest, SchemaResponse, TableInfo};
use schema_manager::service::SchemaError;
use serde_json::json;

use crate::{test_db, TestDatabase};

async fn list_tables(db: &TestDatabase) -> Vec<TableInfo> {
    db.context.service.get_schema().await.unwrap()
}

async fn run(db: &TestDatabase, request: serde_json::Value) -> Result<SchemaResponse, SchemaError> {
    let request = SchemaRequest::from_json(request)?;
    db.context.service.handle(request).await
}

#[rstest]
#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_add_and_delete_column(#[future] test_db: TestDatabase) {
    let db = test_db.await;

    let response = run(
        &db,
        json!({
            "action": "add_column",
            "table_name": "contracts",
            "column_name": "priority",
            "column_type": "integer",
            "is_nullable": true
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        serde_json::to_value(response).unwrap(),
        json!({"success": true, "message": "Column 'priority' added to 'contracts'"})
    );

    let tables = list_tables(&db).await;
    assert_eq!(
        tables.iter().map(|t| t.table_name.as_str()).collect::<Vec<_>>(),
        vec!["contracts"]
    );
    let priority = tables[0].column("priority").unwrap();
    assert_eq!(priority.friendly_type, "Integer");
    assert!(priority.nullable());

    // All existing values are null
    sqlx::query(&format!(
        "INSERT INTO \"{}\".contracts (title) VALUES ('first')",
        db.schema
    ))
    .execute(&db.pool)
    .await
    .unwrap();

    run(
        &db,
        json!({"action": "delete_column", "table_name": "contracts", "column_name": "priority"}),
    )
    .await
    .unwrap();
    assert!(list_tables(&db).await[0].column("priority").is_none());

    db.teardown().await;
}

#[rstest]
#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_column_with_data(#[future] test_db: TestDatabase) {
    let db = test_db.await;

    sqlx::query(&format!(
        "INSERT INTO \"{}\".contracts (title) VALUES ('first')",
        db.schema
    ))
    .execute(&db.pool)
    .await
    .unwrap();

    let error = run(
        &db,
        json!({"action": "delete_column", "table_name": "contracts", "column_name": "title"}),
    )
    .await
    .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Column 'title' contains data. Clear all data in this column before deleting."
    );
    assert!(list_tables(&db).await[0].column("title").is_some());

    db.teardown().await;
}

#[rstest]
#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_create_table(#[future] test_db: TestDatabase) {
    let db = test_db.await;

    run(
        &db,
        json!({
            "action": "create_table",
            "table_name": "invoices",
            "columns": [
                {"name": "amount", "type": "number", "is_nullable": false, "default_value": "0"}
            ],
            "foreign_keys": [
                {"column_name": "contract_id", "ref_table": "contracts", "on_delete": "set_null"}
            ]
        }),
    )
    .await
    .unwrap();

    let tables = list_tables(&db).await;
    let invoices = tables.iter().find(|t| t.table_name == "invoices").unwrap();
    assert_eq!(
        invoices
            .columns
            .iter()
            .map(|c| c.column_name.as_str())
            .collect::<Vec<_>>(),
        vec!["id", "created_at", "amount", "contract_id"]
    );

    let id = invoices.column("id").unwrap();
    assert!(id.is_primary);
    assert_eq!(id.friendly_type, "UUID");

    let amount = invoices.column("amount").unwrap();
    assert!(!amount.nullable());
    assert_eq!(amount.friendly_type, "Number");
    assert_eq!(amount.column_default.as_deref(), Some("0"));

    let contract_id = invoices.column("contract_id").unwrap();
    assert!(contract_id.nullable());
    assert!(contract_id.is_foreign_key);
    assert_eq!(contract_id.fk_table.as_deref(), Some("contracts"));
    assert_eq!(contract_id.fk_column.as_deref(), Some("id"));

    assert!(
        db.query_bool(&format!(
            "SELECT relrowsecurity FROM pg_class WHERE oid = '\"{}\".invoices'::regclass",
            db.schema
        ))
        .await
    );
    assert!(
        db.query_bool(&format!(
            "SELECT EXISTS (SELECT 1 FROM pg_policies WHERE schemaname = '{}' \
             AND tablename = 'invoices' AND policyname = 'Authenticated access')",
            db.schema
        ))
        .await
    );

    // Creating it again fails as a whole and leaves the first table alone
    let error = run(
        &db,
        json!({"action": "create_table", "table_name": "invoices", "columns": []}),
    )
    .await
    .unwrap_err();
    assert!(error.to_string().contains("already exists"));

    db.teardown().await;
}

#[rstest]
#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_rename_column(#[future] test_db: TestDatabase) {
    let db = test_db.await;

    run(
        &db,
        json!({"action": "rename_column", "table_name": "contracts", "old_name": "title", "new_name": "name"}),
    )
    .await
    .unwrap();
    let tables = list_tables(&db).await;
    assert!(tables[0].column("title").is_none());
    assert!(tables[0].column("name").is_some());

    let error = run(
        &db,
        json!({"action": "rename_column", "table_name": "table_settings", "old_name": "visible", "new_name": "is_visible"}),
    )
    .await
    .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Table 'table_settings' is protected and cannot be modified."
    );

    let error = run(
        &db,
        json!({"action": "rename_column", "table_name": "contracts", "old_name": "missing", "new_name": "other"}),
    )
    .await
    .unwrap_err();
    assert!(error.to_string().contains("does not exist"));

    db.teardown().await;
}
