use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use brick_site::{Config, ContentConfig, create_app, leads::Lead};
use serde_json::json;
use tempfile::TempDir;

async fn setup_test_server(webhook_secret: Option<&str>) -> (TempDir, TestServer) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config {
        content: ContentConfig {
            data_directory: temp_dir.path().join("data"),
            objects_directory: temp_dir.path().join("objects"),
            catalog_directory: temp_dir.path().join("catalog"),
        },
        ..Config::default()
    };
    config.app.webhook_secret = webhook_secret.map(str::to_string);

    let server = TestServer::new(create_app(config).await).unwrap();
    (temp_dir, server)
}

async fn list_leads(server: &TestServer) -> Vec<Lead> {
    let response = server.get("/api/admin/leads").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json()
}

#[tokio::test]
async fn test_lead_without_phone_is_rejected() {
    let (temp_dir, server) = setup_test_server(None).await;

    let response = server
        .post("/api/lead")
        .json(&json!({ "name": "Иван", "phone": "   " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["message"], json!("Заполните имя и телефон."));

    assert!(list_leads(&server).await.is_empty());
    assert!(!temp_dir.path().join("data/leads.json").exists());
}

#[tokio::test]
async fn test_form_lead_is_stored_with_defaults() {
    let (_temp_dir, server) = setup_test_server(None).await;

    let response = server
        .post("/api/lead")
        .form(&[
            ("name", "Иван"),
            ("phone", "9001234567"),
            ("message", "Нужен кирпич на баню"),
            ("fromCrm", "true"),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], json!(true));
    let id = body["id"].as_str().unwrap().to_string();

    let leads = list_leads(&server).await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id, id);
    assert_eq!(leads[0].name, "Иван");
    assert_eq!(leads[0].phone, "9001234567");
    assert_eq!(leads[0].source, "Сайт");
    assert!(!leads[0].from_crm);
    assert!(!leads[0].created_at.is_empty());
}

#[tokio::test]
async fn test_webhook_checks_token() {
    let (_temp_dir, server) = setup_test_server(Some("crm-token")).await;

    let denied = server
        .post("/api/webhook/lead")
        .add_query_param("token", "wrong")
        .json(&json!({ "name": "Ольга", "phone": "9000000000" }))
        .await;
    assert_eq!(denied.status_code(), StatusCode::UNAUTHORIZED);

    let missing = server
        .post("/api/webhook/lead")
        .json(&json!({ "name": "Ольга", "phone": "9000000000" }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let by_query = server
        .post("/api/webhook/lead")
        .add_query_param("token", "crm-token")
        .json(&json!({ "name": "Ольга", "phone": "9000000000" }))
        .await;
    assert_eq!(by_query.status_code(), StatusCode::OK);

    let by_header = server
        .post("/api/webhook/lead")
        .add_header(
            HeaderName::from_static("x-webhook-token"),
            HeaderValue::from_static("crm-token"),
        )
        .json(&json!({ "name": "Пётр", "phone": "9111111111", "source": "Авито" }))
        .await;
    assert_eq!(by_header.status_code(), StatusCode::OK);

    let leads = list_leads(&server).await;
    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0].name, "Пётр");
    assert_eq!(leads[0].source, "Авито");
    assert_eq!(leads[1].source, "CRM");
    assert!(leads.iter().all(|lead| lead.from_crm));
}

#[tokio::test]
async fn test_webhook_open_without_secret() {
    let (_temp_dir, server) = setup_test_server(None).await;

    let response = server
        .post("/api/webhook/lead")
        .json(&json!({ "name": "Анна", "phone": "9222222222" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(list_leads(&server).await.len(), 1);
}
