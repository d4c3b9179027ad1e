use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use rstest::rstest;
use schema_manager::frontend::http::filters;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::{test_db, TestDatabase, PASSWORD};

#[rstest]
#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_http_round_trip(#[future] test_db: TestDatabase) {
    let db = test_db.await;

    let (tx, rx) = oneshot::channel::<()>();
    let (addr, server) = warp::serve(filters(Arc::new(db.context.clone())))
        .bind_with_graceful_shutdown(
            // Pass port :0 to pick a random free port
            "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            async {
                rx.await.ok();
            },
        );
    let server = tokio::spawn(server);

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/schema-manager");

    let response = client
        .post(&url)
        .json(&json!({"action": "get_schema"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(&url)
        .bearer_auth(PASSWORD)
        .json(&json!({
            "action": "add_column",
            "table_name": "contracts",
            "column_name": "due_date",
            "column_type": "date"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(&url)
        .bearer_auth(PASSWORD)
        .json(&json!({"action": "get_schema"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let columns = body["tables"][0]["columns"].as_array().unwrap();
    let due_date = columns
        .iter()
        .find(|c| c["column_name"] == "due_date")
        .unwrap();
    assert_eq!(due_date["friendly_type"], "Date");

    tx.send(()).unwrap();
    server.await.unwrap();
    db.teardown().await;
}
