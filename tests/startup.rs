mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use softwaretest::build_app;
use softwaretest::data::BackendKind;
use softwaretest::routes::diagnostics::{GENERIC_ERROR_MESSAGE, HSTS_HEADER_VALUE};

#[actix_rt::test]
async fn test_linux_host_serves_from_embedded_database() {
    let plan = common::plan("Production");
    assert_eq!(plan.backend.kind, BackendKind::Embedded);
    assert_eq!(plan.backend.connection_name, "MockDBConnection");

    let state = common::app_state("Production").await;
    assert_eq!(state.backend, BackendKind::Embedded);

    let app = test::init_service(build_app(state)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "sqlite");
    assert_eq!(body["environment"], "Production");
}

#[actix_rt::test]
async fn test_production_pipeline() {
    let app = test::init_service(build_app(common::app_state("Production").await)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
        HSTS_HEADER_VALUE
    );

    let req = test::TestRequest::post()
        .uri("/ApplyDatabaseMigrations")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/Error").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"], GENERIC_ERROR_MESSAGE);
}

#[actix_rt::test]
async fn test_production_hides_server_errors_and_keeps_hsts() {
    let app = test::init_service(build_app(common::unmigrated_app_state("Production").await)).await;

    let req = test::TestRequest::post()
        .uri("/Account/Register")
        .set_json(json!({ "email": "down@example.com", "password": "Passw0rd!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.headers().get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
        HSTS_HEADER_VALUE
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": GENERIC_ERROR_MESSAGE }));
}

#[actix_rt::test]
async fn test_development_shows_server_error_details() {
    let app = test::init_service(build_app(common::unmigrated_app_state("Development").await)).await;

    let req = test::TestRequest::post()
        .uri("/Account/Register")
        .set_json(json!({ "email": "down@example.com", "password": "Passw0rd!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp
        .headers()
        .get(header::STRICT_TRANSPORT_SECURITY)
        .is_none());

    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert_ne!(message, GENERIC_ERROR_MESSAGE);
    assert!(message.contains("no such table"), "got {}", message);
}

#[actix_rt::test]
async fn test_development_pipeline() {
    let state = common::app_state("Development").await;
    let app = test::init_service(build_app(state.clone())).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp
        .headers()
        .get(header::STRICT_TRANSPORT_SECURITY)
        .is_none());

    let req = test::TestRequest::post()
        .uri("/ApplyDatabaseMigrations")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let roles = state.identity.list_roles().await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "Admin");

    // Applying twice is harmless.
    let req = test::TestRequest::post()
        .uri("/ApplyDatabaseMigrations")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
