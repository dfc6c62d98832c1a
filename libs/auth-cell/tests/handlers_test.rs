use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::{auth_routes, AuthState};
use shared_config::AppConfig;
use shared_database::{Collection, DocumentStore, MemoryStore};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig, store: Arc<MemoryStore>) -> Router {
    auth_routes(Arc::new(AuthState::new(Arc::new(config), store)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn json_request(uri: &str, tab_id: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(tab_id) = tab_id {
        builder = builder.header("X-Tab-Id", tab_id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn mock_sign_in(server: &MockServer, user_id: &str, email: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockSupabaseResponses::auth_session(user_id, email)),
        )
        .mount(server)
        .await;
}

async fn seed_patient(store: &MemoryStore, user_id: &str, email: &str) {
    store
        .set(&Collection::Users, user_id, MockSupabaseResponses::base_user(user_id, email, "patient"))
        .await
        .unwrap();
    store
        .set(&Collection::Patients, user_id, MockSupabaseResponses::patient_profile(user_id, email))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config.clone(), Arc::new(MemoryStore::new()));

    let user = TestUser::patient("test@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["valid"], true);
    assert_eq!(json_response["user_id"], user.id);
    assert_eq!(json_response["email"], user.email);
}

#[tokio::test]
async fn test_verify_token_reports_invalid_tokens() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config, Arc::new(MemoryStore::new()));

    let request = Request::builder()
        .method("POST")
        .uri("/verify")
        .header(
            "authorization",
            format!("Bearer {}", JwtTestUtils::create_malformed_token()),
        )
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["valid"], false);
}

#[tokio::test]
async fn test_login_returns_session_and_profile() {
    let server = MockServer::start().await;
    let config = TestConfig::default().with_supabase_url(&server.uri()).to_app_config();
    let store = Arc::new(MemoryStore::new());
    seed_patient(&store, "user-1", "asha@example.com").await;
    mock_sign_in(&server, "user-1", "asha@example.com").await;

    let app = create_test_app(config, store);
    let response = app
        .oneshot(json_request(
            "/login",
            Some("tab-1"),
            json!({"email": "asha@example.com", "password": "s3cret-pass"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tab_id"], "tab-1");
    assert_eq!(body["session"]["user_id"], "user-1");
    assert_eq!(body["session"]["user_type"], "patient");
    assert_eq!(body["access_token"], "test-access-token");
    assert_eq!(body["profile"]["user_type"], "patient");
    assert_eq!(body["profile"]["name"], "Asha Rao");
}

#[tokio::test]
async fn test_login_with_bad_credentials_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let config = TestConfig::default().with_supabase_url(&server.uri()).to_app_config();
    let app = create_test_app(config, Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(json_request(
            "/login",
            None,
            json!({"email": "asha@example.com", "password": "wrong-pass"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_without_user_record_is_not_found() {
    let server = MockServer::start().await;
    mock_sign_in(&server, "orphan", "orphan@example.com").await;

    let config = TestConfig::default().with_supabase_url(&server.uri()).to_app_config();
    let app = create_test_app(config, Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(json_request(
            "/login",
            None,
            json!({"email": "orphan@example.com", "password": "s3cret-pass"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_email_never_reaches_supabase() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::default().with_supabase_url(&server.uri()).to_app_config();
    let app = create_test_app(config, Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(json_request(
            "/login",
            None,
            json!({"email": "not-an-email", "password": "s3cret-pass"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_creates_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({"data": {"user_type": "patient"}})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockSupabaseResponses::auth_session("new-user", "asha@example.com")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::default().with_supabase_url(&server.uri()).to_app_config();
    let store = Arc::new(MemoryStore::new());
    let app = create_test_app(config, store.clone());

    let response = app
        .oneshot(json_request(
            "/signup",
            Some("tab-9"),
            json!({
                "email": "asha@example.com",
                "password": "s3cret-pass",
                "user_type": "patient",
                "name": "Asha Rao",
                "gender": "female"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["session"]["user_id"], "new-user");
    assert!(body["profile"]["patient_id"].as_str().unwrap().starts_with("PAT"));
    assert!(store.get(&Collection::Patients, "new-user").await.unwrap().is_some());
}

#[tokio::test]
async fn test_logout_clears_only_that_tab() {
    let server = MockServer::start().await;
    let config = TestConfig::default().with_supabase_url(&server.uri()).to_app_config();
    let store = Arc::new(MemoryStore::new());
    seed_patient(&store, "user-1", "asha@example.com").await;
    mock_sign_in(&server, "user-1", "asha@example.com").await;

    let state = Arc::new(AuthState::new(Arc::new(config.clone()), store));
    let login = json!({"email": "asha@example.com", "password": "s3cret-pass"});
    for tab in ["tab-a", "tab-b"] {
        let response = auth_routes(state.clone())
            .oneshot(json_request("/login", Some(tab), login.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = auth_routes(state.clone())
        .oneshot(json_request("/logout", Some("tab-a"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = TestUser::patient("asha@example.com").with_id("user-1");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    let session_for = |tab: &str| {
        Request::builder()
            .method("GET")
            .uri("/session")
            .header("authorization", format!("Bearer {}", token))
            .header("X-Tab-Id", tab)
            .body(Body::empty())
            .unwrap()
    };

    let tab_a = body_json(auth_routes(state.clone()).oneshot(session_for("tab-a")).await.unwrap()).await;
    assert_eq!(tab_a["authenticated"], false);

    let tab_b = body_json(auth_routes(state.clone()).oneshot(session_for("tab-b")).await.unwrap()).await;
    assert_eq!(tab_b["authenticated"], true);
    assert_eq!(tab_b["session"]["user_id"], "user-1");
    assert_eq!(tab_b["profile"]["name"], "Asha Rao");
}

#[tokio::test]
async fn test_session_requires_a_token() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config, Arc::new(MemoryStore::new()));

    let request = Request::builder()
        .method("GET")
        .uri("/session")
        .header("X-Tab-Id", "tab-1")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
