use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use avatarr::config::Config;

/// Credentials seeded by the initial migration.
const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "password";

const BOUNDARY: &str = "test-boundary-7f8a9b";

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // sqlite::memory: is per-connection; a pool of one keeps every request
    // on the same database.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;
    config.storage.photos_path = std::env::temp_dir()
        .join(format!("avatarr-api-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();

    let state = avatarr::api::create_app_state_from_config(config)
        .await
        .expect("Failed to create app state");
    avatarr::api::router(state).await
}

/// Log in as the seeded user and return the session cookie.
async fn login(app: &Router) -> String {
    let body = serde_json::json!({
        "email": ADMIN_EMAIL,
        "password": ADMIN_PASSWORD,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login response should set a session cookie")
        .to_str()
        .unwrap();

    set_cookie
        .split(';')
        .next()
        .expect("cookie value")
        .to_string()
}

fn multipart_photo_body(bytes: &[u8], content_type: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"photo\"; filename=\"avatar.png\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload_photo(app: &Router, cookie: &str, bytes: &[u8]) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/profile/photo")
                .header("Cookie", cookie)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_photo_body(
                    bytes,
                    mime::IMAGE_PNG.as_ref(),
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn get_json(app: &Router, cookie: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Cookie", cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = spawn_app().await;

    for uri in ["/api/profile", "/api/profile/photo/history"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = spawn_app().await;

    let body = serde_json::json!({
        "email": ADMIN_EMAIL,
        "password": "wrong-password",
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let (status, _) = get_json(&app, &cookie, "/api/profile").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = get_json(&app, &cookie, "/api/profile").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_returns_user_and_empty_history() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let (status, json) = get_json(&app, &cookie, "/api/profile").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(json["data"]["user"]["email"], ADMIN_EMAIL);
    assert!(json["data"]["user"]["avatar_url"].is_null());
    assert_eq!(json["data"]["photo_history"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_photo_upload_and_history_flow() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let first = upload_photo(&app, &cookie, b"first payload").await;
    assert_eq!(first["data"]["is_current"], true);

    let (_, profile) = get_json(&app, &cookie, "/api/profile").await;
    assert!(
        profile["data"]["user"]["avatar_url"]
            .as_str()
            .unwrap()
            .starts_with("/photos/")
    );

    let second = upload_photo(&app, &cookie, b"second payload").await;
    let second_id = second["data"]["id"].as_i64().unwrap();

    let (status, history) = get_json(&app, &cookie, "/api/profile/photo/history").await;
    assert_eq!(status, StatusCode::OK);

    let items = history["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"].as_i64().unwrap(), second_id);

    let current_count = items.iter().filter(|p| p["is_current"] == true).count();
    assert_eq!(current_count, 1);
}

#[tokio::test]
async fn test_restore_photo_from_history() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let first = upload_photo(&app, &cookie, b"first payload").await;
    let first_id = first["data"]["id"].as_i64().unwrap();
    upload_photo(&app, &cookie, b"second payload").await;

    let body = serde_json::json!({ "photo_id": first_id });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/profile/photo/set-current")
                .header("Cookie", &cookie)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["id"].as_i64().unwrap(), first_id);
    assert_eq!(json["data"]["is_current"], true);
}

#[tokio::test]
async fn test_delete_current_photo_conflicts() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let photo = upload_photo(&app, &cookie, b"payload").await;
    let photo_id = photo["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/profile/photo/{photo_id}"))
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_remove_then_delete_photo() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let photo = upload_photo(&app, &cookie, b"payload").await;
    let photo_id = photo["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/profile/photo")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, profile) = get_json(&app, &cookie, "/api/profile").await;
    assert!(profile["data"]["user"]["avatar_url"].is_null());

    // No longer current, so deletion is allowed.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/profile/photo/{photo_id}"))
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, history) = get_json(&app, &cookie, "/api/profile/photo/history").await;
    assert_eq!(history["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/profile/photo")
                .header("Cookie", &cookie)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_photo_body(
                    b"not an image",
                    "text/plain",
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_profile_validation() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let bad = serde_json::json!({ "name": "", "email": ADMIN_EMAIL });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/profile")
                .header("Cookie", &cookie)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&bad).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let good = serde_json::json!({ "name": "New Name", "email": "new@example.com" });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/profile")
                .header("Cookie", &cookie)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&good).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["user"]["name"], "New Name");
    assert_eq!(json["data"]["user"]["email"], "new@example.com");
    assert_eq!(json["data"]["user"]["email_verified"], false);
}

#[tokio::test]
async fn test_delete_account() {
    let app = spawn_app().await;
    let cookie = login(&app).await;

    let wrong = serde_json::json!({ "password": "wrong-password" });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/profile")
                .header("Cookie", &cookie)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&wrong).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let right = serde_json::json!({ "password": ADMIN_PASSWORD });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/profile")
                .header("Cookie", &cookie)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&right).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Session was flushed and the account is gone.
    let (status, _) = get_json(&app, &cookie, "/api/profile").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
