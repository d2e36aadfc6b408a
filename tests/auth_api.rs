//! HTTP-level integration tests for the /auth endpoints.

mod common;

use actix_web::{test, web, App};
use storefront_server::auth::handlers::{delete_me, login, logout, me, refresh, register, update_me};
use serde_json::json;

macro_rules! auth_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .route("/auth/register", web::post().to(register))
                .route("/auth/login", web::post().to(login))
                .route("/auth/logout", web::post().to(logout))
                .route("/auth/refresh", web::post().to(refresh))
                .route("/auth/me", web::get().to(me))
                .route("/auth/me", web::put().to(update_me))
                .route("/auth/me", web::delete().to(delete_me)),
        )
        .await
    };
}

#[actix_web::test]
async fn test_register_and_login() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    // Test registration
    let register_response = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "test@example.com",
            "password": "password123",
            "display_name": "Test User"
        }))
        .send_request(&app)
        .await;

    assert_eq!(register_response.status(), 201);
    let register_body: serde_json::Value = test::read_body_json(register_response).await;
    assert_eq!(register_body["email"], "test@example.com");
    assert_eq!(register_body["display_name"], "Test User");
    assert!(register_body.get("id").is_some());

    // Test login
    let login_response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({
            "email": "test@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;

    assert_eq!(login_response.status(), 200);
    let login_body: serde_json::Value = test::read_body_json(login_response).await;
    assert!(login_body.get("access_token").is_some());
    assert!(login_body.get("refresh_token").is_some());
    assert_eq!(login_body["token_type"], "bearer");

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}

#[actix_web::test]
async fn test_register_duplicate_email() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    let body = json!({
        "email": "dupe@example.com",
        "password": "password123"
    });
    let first = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(body.clone())
        .send_request(&app)
        .await;
    assert_eq!(first.status(), 201);

    let second = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(body)
        .send_request(&app)
        .await;
    assert_eq!(second.status(), 409);

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}

#[actix_web::test]
async fn test_invalid_login() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    let register_response = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "real@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    assert_eq!(register_response.status(), 201);

    // Unknown email and wrong password must be indistinguishable.
    let unknown = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({
            "email": "nonexistent@example.com",
            "password": "wrongpassword"
        }))
        .send_request(&app)
        .await;
    assert_eq!(unknown.status(), 401);
    let unknown_body: serde_json::Value = test::read_body_json(unknown).await;

    let wrong_pw = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({
            "email": "real@example.com",
            "password": "wrongpassword"
        }))
        .send_request(&app)
        .await;
    assert_eq!(wrong_pw.status(), 401);
    let wrong_pw_body: serde_json::Value = test::read_body_json(wrong_pw).await;

    assert_eq!(unknown_body, wrong_pw_body);

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}

#[actix_web::test]
async fn test_refresh_is_single_use() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "r@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login_response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "r@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login_body: serde_json::Value = test::read_body_json(login_response).await;
    let refresh_token = login_body["refresh_token"].as_str().unwrap().to_string();

    let first = test::TestRequest::post()
        .uri("/auth/refresh")
        .set_json(json!({"refresh_token": refresh_token}))
        .send_request(&app)
        .await;
    assert_eq!(first.status(), 200);
    let first_body: serde_json::Value = test::read_body_json(first).await;
    assert!(first_body.get("access_token").is_some());
    assert_ne!(first_body["access_token"], login_body["access_token"]);

    // The original refresh string no longer exists in the store.
    let second = test::TestRequest::post()
        .uri("/auth/refresh")
        .set_json(json!({"refresh_token": refresh_token}))
        .send_request(&app)
        .await;
    assert_eq!(second.status(), 401);

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}

#[actix_web::test]
async fn test_profile_endpoints() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "p@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login_response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "p@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login_body: serde_json::Value = test::read_body_json(login_response).await;
    let token = login_body["access_token"].as_str().unwrap().to_string();

    // No token: 401
    let anonymous = test::TestRequest::get().uri("/auth/me").send_request(&app).await;
    assert_eq!(anonymous.status(), 401);

    // Fetch profile
    let profile = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(profile.status(), 200);
    let profile_body: serde_json::Value = test::read_body_json(profile).await;
    assert_eq!(profile_body["email"], "p@example.com");

    // Update display name
    let updated = test::TestRequest::put()
        .uri("/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"display_name": "Pat"}))
        .send_request(&app)
        .await;
    assert_eq!(updated.status(), 200);
    let updated_body: serde_json::Value = test::read_body_json(updated).await;
    assert_eq!(updated_body["display_name"], "Pat");
    assert_eq!(updated_body["email"], "p@example.com");

    // Delete the account, after which the token's subject is gone
    let deleted = test::TestRequest::delete()
        .uri("/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(deleted.status(), 200);

    let after_delete = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(after_delete.status(), 401);

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}

#[actix_web::test]
async fn test_update_profile_email_conflict() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "first@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "second@example.com", "password": "password123"}))
        .send_request(&app)
        .await;

    let login_response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "second@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login_body: serde_json::Value = test::read_body_json(login_response).await;
    let token = login_body["access_token"].as_str().unwrap().to_string();

    let conflict = test::TestRequest::put()
        .uri("/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"email": "first@example.com"}))
        .send_request(&app)
        .await;
    assert_eq!(conflict.status(), 409);

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}

/// The documented revocation gap: logout revokes the persisted rows, but
/// an unexpired access token still passes the bearer gate afterwards.
#[actix_web::test]
async fn test_logout_does_not_invalidate_access_token() {
    let (pool, db_name) = common::setup_test_db().await;
    let state = common::test_state(pool);
    let app = auth_app!(state);

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "alice@example.com", "password": "pw123"}))
        .send_request(&app)
        .await;
    let login_response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": "alice@example.com", "password": "pw123"}))
        .send_request(&app)
        .await;
    let login_body: serde_json::Value = test::read_body_json(login_response).await;
    let token = login_body["access_token"].as_str().unwrap().to_string();

    let logout_response = test::TestRequest::post()
        .uri("/auth/logout")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(logout_response.status(), 200);

    // The access token is revoked in the store but the gate does not look
    // there, so the profile fetch still succeeds.
    let profile = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(profile.status(), 200);

    // Logging out twice is a no-op, not an error.
    let again = test::TestRequest::post()
        .uri("/auth/logout")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(again.status(), 200);

    state.db_pool.close().await;
    common::cleanup_test_db(&db_name).await;
}
