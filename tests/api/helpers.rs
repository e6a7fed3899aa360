use actix_web::web;
use chrono::{DateTime, Utc};
use credential_core::{
    authentication::{Clock, PasswordVault, Token, TokenAuthority},
    configuration::{get_configuration, Settings},
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};
use once_cell::sync::Lazy;
use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber("test".into(), "debug".into(), std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber("test".into(), "debug".into(), std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub token_authority: TokenAuthority,
    pub password_vault: web::Data<PasswordVault>,
    signing_secret: Secret<String>,
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl TestApp {
    pub async fn get_me(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = reqwest::Client::new().get(format!("{}/me", &self.address));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub fn issue(&self, claims: &serde_json::Value) -> Token {
        self.token_authority
            .issue(claims)
            .expect("Failed to issue token")
    }

    /// Issues a token as if it had been signed by the app at `issued_at`.
    pub fn issue_at(&self, claims: &serde_json::Value, issued_at: DateTime<Utc>) -> Token {
        TokenAuthority::with_clock(&self.signing_secret, Arc::new(FixedClock(issued_at)))
            .issue(claims)
            .expect("Failed to issue token")
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customise: impl FnOnce(&mut Settings)) -> TestApp {
    Lazy::force(&TRACING);

    let signing_secret = Secret::new(Uuid::new_v4().to_string());
    let configuration = {
        let mut config = get_configuration().expect("Unable to read configuration files");
        // Use random os port
        config.application.port = 0;
        config.application.host = "127.0.0.1".into();
        config.auth.signing_secret = Some(signing_secret.clone());
        config.auth.allow_insecure_default_secret = false;
        customise(&mut config);
        config
    };

    let app = Application::build(&configuration)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());
    let password_vault = app.password_vault();
    let _ = tokio::spawn(app.run_until_stopped());

    TestApp {
        address,
        token_authority: TokenAuthority::new(&signing_secret),
        password_vault,
        signing_secret,
    }
}

pub fn assert_is_unauthorized(response: &reqwest::Response) {
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        response
            .headers()
            .get("WWW-Authenticate")
            .expect("Missing WWW-Authenticate header"),
        "Bearer"
    );
}
