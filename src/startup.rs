use crate::authentication::{reject_unauthenticated, PasswordVault, TokenAuthority};
use crate::configuration::Settings;
use crate::routes::{health_check, me};
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use actix_web_lab::middleware::from_fn;
use anyhow::Context;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub struct Application {
    server: Server,
    port: u16,
    password_vault: web::Data<PasswordVault>,
}

impl Application {
    pub async fn build(settings: &Settings) -> Result<Self, anyhow::Error> {
        let token_authority = TokenAuthority::from_settings(&settings.auth)?;
        let password_vault = web::Data::new(PasswordVault::new(
            settings.auth.password_hashing.clone(),
        ));

        let listener = TcpListener::bind(format!(
            "{}:{}",
            settings.application.host, settings.application.port
        ))
        .context("Failed to bind the application listener")?;
        let port = listener.local_addr()?.port();
        let server = run(listener, token_authority, password_vault.clone())?;

        Ok(Self {
            port,
            server,
            password_vault,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The vault shared with request handlers, configured from
    /// `auth.password_hashing`.
    pub fn password_vault(&self) -> web::Data<PasswordVault> {
        self.password_vault.clone()
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

fn run(
    listener: TcpListener,
    token_authority: TokenAuthority,
    password_vault: web::Data<PasswordVault>,
) -> Result<Server, std::io::Error> {
    // Wraps it in an Arc
    let token_authority = web::Data::new(token_authority);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(token_authority.clone())
            .app_data(password_vault.clone())
            .service(health_check)
            .service(
                web::resource("/me")
                    .wrap(from_fn(reject_unauthenticated))
                    .route(web::get().to(me)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
