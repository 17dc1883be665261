//! HTTP-level tests driving the full router against an in-memory database

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use floodwatch::api::{build_router, AppState};
use floodwatch::config::Config;
use floodwatch::db::{create_test_pool, migrations, Backend, DynDatabasePool};
use floodwatch::services::{Mailer, OutgoingEmail};

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">(\d{4})</p>").unwrap());

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    fn last_code_for(&self, to: &str) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|email| email.to == to)
            .find_map(|email| CODE_RE.captures(&email.html).map(|c| c[1].to_string()))
            .expect("no code sent")
    }

    fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.subject.clone()).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    mailer: Arc<RecordingMailer>,
    pool: DynDatabasePool,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_prediction_url("http://127.0.0.1:9/predict").await
    }

    async fn with_prediction_url(url: &str) -> Self {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let mut config = Config::default();
        config.prediction.url = url.to_string();
        config.prediction.timeout_secs = 5;

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(&pool, &config, mailer.clone()).unwrap();
        let router = build_router(state, &config.server.cors_origin).unwrap();
        Self {
            router,
            mailer,
            pool,
        }
    }

    /// Remove a user row directly, leaving any issued access tokens valid
    async fn delete_user(&self, id: &str) {
        let Backend::Sqlite(sqlite) = self.pool.backend() else {
            panic!("Expected a SQLite backend");
        };
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(sqlite)
            .await
            .unwrap();
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Sign up a user and return `(user_id, access_token, refresh_token)`
    async fn signup(&self, username: &str) -> (String, String, String) {
        let (status, body) = self
            .request(Method::POST, "/api/auth/signup", None, Some(signup_body(username)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

fn signup_body(username: &str) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Okafor",
        "username": username,
        "email": format!("{}@example.com", username),
        "password": "Rainfall2024",
    })
}

fn prediction_body() -> Value {
    json!({
        "aspect": 120.0, "dem": 12.5, "distroads": 300.0, "distwater": 45.0, "hand": 2.1,
        "ndvi": 0.35, "rainfreq": 14.0, "ratio": 0.6, "slope": 3.2, "twi": 9.8
    })
}

fn model_payload() -> Value {
    let best = json!({
        "model_name": "random_forest", "prediction": 1.0, "prediction_label": "Flood",
        "flood_probability": 0.87, "confidence": 0.74, "model_accuracy": 0.91, "model_auc": 0.95
    });
    json!({
        "input_summary": {"dem": 12.5},
        "predictions": [best.clone()],
        "consensus": {"flood_votes": 1, "total_models": 1},
        "best_model_prediction": best
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "API is running");
}

#[tokio::test]
async fn test_signup_verify_and_login() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::POST, "/api/auth/signup", None, Some(signup_body("adaok")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully. Please verify your email.");
    assert_eq!(body["data"]["user"]["isEmailVerified"], false);
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let code = app.mailer.last_code_for("adaok@example.com");
    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/verify-email",
            None,
            Some(json!({"code": code, "email": "adaok@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Email verified successfully");
    assert_eq!(body["data"]["user"]["isEmailVerified"], true);
    assert!(app.mailer.subjects().contains(&"Welcome to FloodWatch".to_string()));

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "adaok@example.com", "password": "Rainfall2024"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, body) = app.request(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "adaok");
}

#[tokio::test]
async fn test_verify_email_with_bearer_token() {
    let app = TestApp::new().await;
    let (_, token, _) = app.signup("adaok").await;
    let code = app.mailer.last_code_for("adaok@example.com");

    let (status, body) = app
        .request(Method::POST, "/api/auth/verify-email", Some(&token), Some(json!({"code": code})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = app
        .request(Method::POST, "/api/auth/verify-email", Some(&token), Some(json!({"code": code})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already verified");
}

#[tokio::test]
async fn test_duplicate_signup_conflict() {
    let app = TestApp::new().await;
    app.signup("adaok").await;

    let (status, body) = app
        .request(Method::POST, "/api/auth/signup", None, Some(signup_body("adaok")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(body["message"], "Email is already registered");
}

#[tokio::test]
async fn test_validation_failure_lists_fields() {
    let app = TestApp::new().await;
    let mut body = signup_body("adaok");
    body["email"] = json!("not-an-email");
    body["password"] = json!("short");

    let (status, body) = app.request(Method::POST, "/api/auth/signup", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/blogs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing authentication token");

    let (status, body) = app.request(Method::GET, "/api/blogs", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_blog_ownership() {
    let app = TestApp::new().await;
    let (ada_id, ada_token, _) = app.signup("adaok").await;
    let (_, ben_token, _) = app.signup("benmo").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/blogs",
            Some(&ada_token),
            Some(json!({
                "title": "Flood Risk 2024",
                "content": "10+ char body",
                "tags": ["flood", "risk"]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["authorId"], ada_id.as_str());
    assert_eq!(body["data"]["author"]["id"], ada_id.as_str());
    let blog_id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/blogs/{}", blog_id);

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&ben_token), Some(json!({"title": "Hijacked"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You can only update your own blogs");

    let (status, body) = app
        .request(Method::GET, "/api/blogs?page=abc&limit=5", Some(&ben_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 5);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "Flood Risk 2024");

    let (status, body) = app.request(Method::GET, "/api/blogs/my-blogs", Some(&ben_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);

    let (status, _) = app.request(Method::DELETE, &uri, Some(&ada_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.request(Method::GET, &uri, Some(&ada_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Blog not found");
}

#[tokio::test]
async fn test_feedback_lifecycle() {
    let app = TestApp::new().await;
    let (ada_id, token, _) = app.signup("adaok").await;

    let (status, body) = app
        .request(Method::POST, "/api/feedback", Some(&token), Some(json!({"content": "Great alerts"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["id"], ada_id.as_str());
    let uri = format!("/api/feedback/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&token), Some(json!({"content": "Even better alerts"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "Even better alerts");

    let (status, body) = app.request(Method::GET, "/api/feedback/my-feedback", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Your feedback fetched successfully");
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_refresh_rotation_and_logout() {
    let app = TestApp::new().await;
    let (_, access, refresh) = app.signup("adaok").await;

    let (status, body) = app
        .request(Method::POST, "/api/auth/refresh-token", None, Some(json!({"refreshToken": refresh})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    let (status, body) = app
        .request(Method::POST, "/api/auth/refresh-token", None, Some(json!({"refreshToken": refresh})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");

    let (status, body) = app
        .request(Method::POST, "/api/auth/logout", Some(&access), Some(json!({"refreshToken": rotated})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    let (status, _) = app
        .request(Method::POST, "/api/auth/refresh-token", None, Some(json!({"refreshToken": rotated})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new().await;
    let (_, _, refresh) = app.signup("adaok").await;

    let (status, _) = app
        .request(Method::POST, "/api/auth/forgot-password", None, Some(json!({"email": "adaok@example.com"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = app.mailer.last_code_for("adaok@example.com");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/verify-reset-otp",
            None,
            Some(json!({"email": "adaok@example.com", "code": code})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let reset_token = body["data"]["resetToken"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            Some(&reset_token),
            Some(json!({"newPassword": "Floodplain99", "confirmPassword": "Floodplain99"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Password reset successfully");

    let (status, _) = app
        .request(Method::POST, "/api/auth/refresh-token", None, Some(json!({"refreshToken": refresh})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "adaok@example.com", "password": "Floodplain99"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_requires_token() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({"newPassword": "Floodplain99", "confirmPassword": "Floodplain99"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"][0]["field"], "resetToken");
}

#[tokio::test]
async fn test_prediction_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_payload()))
        .mount(&server)
        .await;
    let app = TestApp::with_prediction_url(&format!("{}/predict", server.uri())).await;
    let (_, token, _) = app.signup("adaok").await;

    let (status, body) = app
        .request(Method::POST, "/api/predict", None, Some(prediction_body()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Prediction completed successfully");
    assert_eq!(body["data"], model_payload());

    let (status, _) = app
        .request(Method::POST, "/api/predict", Some(&token), Some(prediction_body()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::GET, "/api/predictions/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["totalPages"], 1);
    let id = body["data"]["predictions"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(Method::GET, &format!("/api/predictions/history/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Prediction fetched successfully");
}

#[tokio::test]
async fn test_prediction_returned_when_history_write_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_payload()))
        .mount(&server)
        .await;
    let app = TestApp::with_prediction_url(&format!("{}/predict", server.uri())).await;
    let (user_id, token, _) = app.signup("adaok").await;

    // The history row now violates its user foreign key
    app.delete_user(&user_id).await;

    let (status, body) = app
        .request(Method::POST, "/api/predict", Some(&token), Some(prediction_body()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], model_payload());

    let (status, body) = app
        .request(Method::GET, "/api/predictions/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_prediction_rejects_negative_features() {
    let app = TestApp::new().await;
    let mut body = prediction_body();
    body["slope"] = json!(-1.0);

    let (status, body) = app.request(Method::POST, "/api/predict", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"][0]["field"], "slope");
}

#[tokio::test]
async fn test_prediction_service_unreachable() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::POST, "/api/predict", None, Some(prediction_body()))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Unable to connect to prediction service");
}
