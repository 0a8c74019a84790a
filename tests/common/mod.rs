#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;

use alumnihub_api::auth::{AuthSettings, Claims};
use alumnihub_api::database::InMemorySurveyStore;
use alumnihub_api::handlers::{router, AppState};
use alumnihub_api::services::Persistence;

pub const SECRET: &str = "integration-secret";
pub const ISSUER: &str = "alumnihub";
pub const AUDIENCE: &str = "alumnihub-api";

/// Router over a fresh in-process store
pub struct TestApp {
    pub router: Router,
    pub store: InMemorySurveyStore,
}

impl TestApp {
    pub fn new() -> Self {
        let store = InMemorySurveyStore::new();
        let db = Persistence::new(Arc::new(store.clone()), Duration::from_secs(2));
        let auth = AuthSettings {
            secret: SECRET.to_string(),
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
        };
        let router = router(AppState::with_persistence(db, auth));
        Self { router, store }
    }

    /// Send a request and return status plus parsed JSON body (Null when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

pub fn token_for(user_id: i32, is_admin: bool) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        is_admin,
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
        .expect("failed to sign test token")
}

pub fn admin_token() -> String {
    token_for(1, true)
}

pub fn member_token(user_id: i32) -> String {
    token_for(user_id, false)
}

/// Two-question tracer study: a yes/no question whose "yes" reveals the second
pub fn tracer_study() -> Value {
    serde_json::json!({
        "title": "Tracer study",
        "description": "Where are our graduates now?",
        "questions": [
            {
                "question_text": "Are you employed?",
                "type": "multiple_choice",
                "options_array": ["yes", "no"],
                "extension": true,
                "question_extension": {
                    "followup_question_index": 1,
                    "followup_option_value": "yes"
                }
            },
            { "question_text": "Company name", "type": "short_text" }
        ]
    })
}
