use crate::helpers::{assert_is_unauthorized, spawn_app};
use chrono::{Duration, Utc};
use credential_core::authentication::{TokenAuthority, TOKEN_TTL_DAYS};
use secrecy::Secret;

#[tokio::test]
async fn valid_bearer_token_returns_its_claims() {
    let app = spawn_app().await;
    let claims = serde_json::json!({ "userId": "u1", "role": "admin" });
    let token = app.issue(&claims);

    let response = app.get_me(Some(&format!("Bearer {}", token))).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Body was not JSON");
    assert_eq!(body, claims);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = spawn_app().await;

    let response = app.get_me(None).await;

    assert_is_unauthorized(&response);
}

#[tokio::test]
async fn requests_with_other_schemes_are_rejected() {
    let app = spawn_app().await;
    let token = app.issue(&serde_json::json!({ "userId": "u1" }));

    for header in [
        format!("Basic {}", token),
        format!("Bearer  {}", token),
        "Bearer".to_string(),
    ] {
        let response = app.get_me(Some(&header)).await;
        assert_is_unauthorized(&response);
    }
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let app = spawn_app().await;
    let foreign = TokenAuthority::new(&Secret::new("not-the-server-secret".to_string()))
        .issue(&serde_json::json!({ "userId": "u1" }))
        .expect("Failed to issue token");

    let response = app.get_me(Some(&format!("Bearer {}", foreign))).await;

    assert_is_unauthorized(&response);
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = spawn_app().await;

    let response = app.get_me(Some("Bearer not.a.token")).await;

    assert_is_unauthorized(&response);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = spawn_app().await;
    let claims = serde_json::json!({ "userId": "u1", "role": "admin" });
    let issued_at = Utc::now() - Duration::days(TOKEN_TTL_DAYS + 1);
    let expired = app.issue_at(&claims, issued_at);

    let response = app.get_me(Some(&format!("Bearer {}", expired))).await;

    assert_is_unauthorized(&response);
}

#[tokio::test]
async fn token_near_the_end_of_its_lifetime_is_still_accepted() {
    let app = spawn_app().await;
    let claims = serde_json::json!({ "userId": "u1" });
    let issued_at = Utc::now() - Duration::days(TOKEN_TTL_DAYS) + Duration::hours(1);
    let token = app.issue_at(&claims, issued_at);

    let response = app.get_me(Some(&format!("Bearer {}", token))).await;

    assert_eq!(response.status().as_u16(), 200);
}
