mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

#[tokio::test]
async fn health_and_root_are_public() -> Result<()> {
    let app = common::TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = app.request(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_bearer_token() -> Result<()> {
    let app = common::TestApp::new();

    let (status, body) = app.request(Method::GET, "/forms", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/forms", "not-a-jwt").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/forms", &common::member_token(3)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() -> Result<()> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let app = common::TestApp::new();
    let now = chrono::Utc::now().timestamp();
    let claims = alumnihub_api::auth::Claims {
        sub: "3".into(),
        is_admin: true,
        iss: common::ISSUER.into(),
        aud: common::AUDIENCE.into(),
        exp: now + 60,
        iat: now,
    };
    let forged = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"guess"))?;

    let (status, _) = app.get("/forms", &forged).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
