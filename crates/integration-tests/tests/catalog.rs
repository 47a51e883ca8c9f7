//! End-to-end tests for `GET /products` and `GET /health`.

#![allow(clippy::unwrap_used)]

use pexpress_integration_tests::{ALLOWED_ORIGIN, FakeSanity, TestApp, status_and_json};
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn(FakeSanity::new()).await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
    assert_eq!(app.sanity.queries(), 0);
}

#[tokio::test]
async fn test_products_sorted_by_name_with_normalised_stock() {
    let sanity = FakeSanity::new()
        .with_product("p-sorvete", "Sorvete 2L", &[("a1", "Creme", json!(4))])
        .with_product(
            "p-acai",
            "Açaí 1L",
            &[("b1", "Tradicional", json!(12)), ("b2", "Banana", json!(null))],
        )
        .with_product("p-pote", "Pote 500ml", &[("c1", "Uva", json!("n/a"))]);
    let app = TestApp::spawn(sanity).await;

    let response = app.client.get(app.url("/products")).send().await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        ALLOWED_ORIGIN
    );
    let (status, body) = status_and_json(response).await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!([
            {
                "id": "p-acai",
                "name": "Açaí 1L",
                "rows": [
                    { "key": "b1", "flavor": "Tradicional", "stock": 12 },
                    { "key": "b2", "flavor": "Banana", "stock": 0 }
                ]
            },
            {
                "id": "p-pote",
                "name": "Pote 500ml",
                "rows": [{ "key": "c1", "flavor": "Uva", "stock": 0 }]
            },
            {
                "id": "p-sorvete",
                "name": "Sorvete 2L",
                "rows": [{ "key": "a1", "flavor": "Creme", "stock": 4 }]
            }
        ])
    );
}

#[tokio::test]
async fn test_products_upstream_failure() {
    let app = TestApp::spawn(FakeSanity::new()).await;
    app.sanity.fail_queries();

    let (status, body) =
        status_and_json(app.client.get(app.url("/products")).send().await.unwrap()).await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn test_products_rejects_post() {
    let app = TestApp::spawn(FakeSanity::new()).await;

    let (status, body) =
        status_and_json(app.client.post(app.url("/products")).send().await.unwrap()).await;
    assert_eq!(status, 405);
    assert_eq!(body, json!({ "error": "Method not allowed" }));
}
