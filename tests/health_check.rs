mod common;

use actix_web::{test, web, App};
use chrono::DateTime;

#[actix_web::test]
async fn test_health_check() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);

    // Create test app
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/health", web::get().to(storefront_server::health_check)),
    )
    .await;

    // Send request
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    // Assert response
    assert!(resp.status().is_success());

    // Parse response body
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    let timestamp = body["timestamp"].as_str().expect("timestamp present");
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}
