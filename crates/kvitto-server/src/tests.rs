//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use kvitto_core::db::Database;
use kvitto_core::gateway::{ExpenseGateway, HttpGateway};
use tower::ServiceExt;

fn seeded_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.create_category("Travel").unwrap();
    db.create_category("Meals").unwrap();
    db.create_category("Office Supplies").unwrap();
    db.create_payment_method("Visa").unwrap();
    db.create_payment_method("Cash").unwrap();
    db
}

fn open_config() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        ..Default::default()
    }
}

fn setup_test_app() -> Router {
    create_router(seeded_db(), open_config())
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn delete_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn paper_expense() -> serde_json::Value {
    serde_json::json!({
        "date": "2024-03-01",
        "category_id": 3,
        "description": "Printer paper and toner",
        "amount": "42.50",
        "vat": "5.00",
        "payment_method_id": 1,
        "business_personal": "business"
    })
}

// ========== Category API Tests ==========

#[tokio::test]
async fn test_list_categories() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Travel", "Meals", "Office Supplies"]);
    assert_eq!(json[2]["id"], 3);
}

#[tokio::test]
async fn test_create_category_and_conflict() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/categories",
            serde_json::json!({ "name": "Software" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(get_body_json(response).await["name"], "Software");

    let response = app
        .oneshot(post_json(
            "/api/categories",
            serde_json::json!({ "name": "Software" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(get_body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_create_category_rejects_bad_json() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json("/api/categories", serde_json::json!({ "title": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_category() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(delete_req("/api/categories/Meals"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["success"], true);

    let response = app
        .oneshot(delete_req("/api/categories/Meals"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_category_in_use_conflicts() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", paper_expense()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(delete_req("/api/categories/Office%20Supplies"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ========== Payment Method API Tests ==========

#[tokio::test]
async fn test_payment_methods_crud() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/payment_methods",
            serde_json::json!({ "name": "Bank Transfer" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(delete_req(&format!("/api/payment_methods/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/payment_methods")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

// ========== Expense API Tests ==========

#[tokio::test]
async fn test_create_and_get_expense() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", paper_expense()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = get_body_json(response).await;
    let id = created["transaction_id"].as_i64().unwrap();
    assert_eq!(created["amount"], "42.50");

    let response = app
        .oneshot(get(&format!("/api/expenses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = get_body_json(response).await;
    assert_eq!(fetched["date"], "2024-03-01");
    assert_eq!(fetched["vat"], "5.00");
    assert_eq!(fetched["category_id"], 3);
    assert_eq!(fetched["business_personal"], "business");
}

#[tokio::test]
async fn test_create_expense_rejects_future_date() {
    let app = setup_test_app();
    let mut body = paper_expense();
    body["date"] = serde_json::json!("2999-01-01");

    let response = app.oneshot(post_json("/api/expenses", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("future"));
}

#[tokio::test]
async fn test_create_expense_rejects_unknown_category() {
    let app = setup_test_app();
    let mut body = paper_expense();
    body["category_id"] = serde_json::json!(99);

    let response = app.oneshot(post_json("/api/expenses", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_expenses_filters_and_404() {
    let app = setup_test_app();

    let response = app.clone().oneshot(get("/api/expenses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(post_json("/api/expenses", paper_expense()))
        .await
        .unwrap();
    let mut travel = paper_expense();
    travel["category_id"] = serde_json::json!(1);
    travel["date"] = serde_json::json!("2024-04-10");
    app.clone()
        .oneshot(post_json("/api/expenses", travel))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/expenses?category_id=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get("/api/expenses?start_date=2024-03-01&end_date=2024-03-31"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["category_id"], 3);

    let response = app
        .clone()
        .oneshot(get("/api/expenses?payment_method_id=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/api/expenses?start_date=2024-05-01&end_date=2024-04-01"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_expense() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", paper_expense()))
        .await
        .unwrap();
    let id = get_body_json(response).await["transaction_id"]
        .as_i64()
        .unwrap();

    let response = app
        .clone()
        .oneshot(delete_req(&format!("/api/expenses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/expenses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Health & Auth Tests ==========

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["categories"], 3);
    assert_eq!(json["payment_methods"], 2);
}

#[tokio::test]
async fn test_auth_requires_api_key() {
    let config = ServerConfig {
        api_keys: vec!["secret-key".to_string()],
        ..Default::default()
    };
    let app = create_router(seeded_db(), config);

    let response = app.clone().oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/categories")
                .header("authorization", "Bearer wrong-key!")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/categories")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health is open
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_parse_api_keys() {
    assert_eq!(parse_api_keys("a, b,,c "), vec!["a", "b", "c"]);
    assert!(parse_api_keys(" ").is_empty());
    assert!(validate_api_key("abc", &["abc".to_string()]));
    assert!(!validate_api_key("abd", &["abc".to_string()]));
    assert!(!validate_api_key("ab", &["abc".to_string()]));
}

// ========== Remote Gateway Tests ==========

async fn spawn_server(config: ServerConfig) -> (String, Database) {
    let db = seeded_db();
    let app = create_router(db.clone(), config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), db)
}

#[tokio::test]
async fn test_http_gateway_against_server() {
    let (url, db) = spawn_server(ServerConfig {
        api_keys: vec!["k".to_string()],
        ..Default::default()
    })
    .await;
    let gateway = HttpGateway::new(&url).with_api_key("k");

    let categories = gateway.list_categories().await.unwrap();
    assert_eq!(categories.len(), 3);

    let record: kvitto_core::models::NewExpense =
        serde_json::from_value(paper_expense()).unwrap();
    let stored = gateway.create_expense(&record).await.unwrap();
    assert_eq!(stored.amount, record.amount);
    assert_eq!(db.list_expenses(&Default::default()).unwrap().len(), 1);

    let fetched = gateway.get_expense(stored.transaction_id).await.unwrap();
    assert_eq!(fetched, Some(stored));
    assert_eq!(gateway.get_expense(999).await.unwrap(), None);

    let future = kvitto_core::models::NewExpense {
        date: chrono::NaiveDate::from_ymd_opt(2999, 1, 1).unwrap(),
        ..record
    };
    assert!(matches!(
        gateway.create_expense(&future).await,
        Err(kvitto_core::Error::InvalidData(_))
    ));

    let unauthorized = HttpGateway::new(&url);
    assert!(matches!(
        unauthorized.list_categories().await,
        Err(kvitto_core::Error::PersistenceFailed(_))
    ));
}

#[tokio::test]
async fn test_workflow_persists_through_server() {
    use kvitto_core::workflow::{ScriptedReviewer, WorkflowEngine, WorkflowState};
    use kvitto_core::{load_reference_data, MockBackend, ModelRouter, RouterConfig};

    let (url, db) = spawn_server(open_config()).await;
    let gateway = HttpGateway::new(&url);
    let reference = load_reference_data(&gateway).await.unwrap();
    let state = WorkflowState::new(reference, "receipt.jpg", b"jpeg", "vision-a", "text-a");

    let mut engine = WorkflowEngine::new(
        MockBackend::new(),
        gateway,
        ScriptedReviewer::new(["a"]),
        Arc::new(ModelRouter::with_config(RouterConfig::default())),
    );
    let done = engine.run(state).await.unwrap();

    let expense = done.expense().unwrap();
    assert_eq!(expense.category_id, 3);
    assert_eq!(expense.payment_method_id, 1);
    assert_eq!(
        db.get_expense(expense.transaction_id).unwrap().as_ref(),
        Some(expense)
    );
}
