use std::ops::Deref;

use crate::authentication::{extract_bearer_token, Claims, TokenAuthority};
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    error::InternalError,
    http::header,
    web, HttpMessage, HttpResponse,
};
use actix_web_lab::middleware::Next;

/// Claims of the caller, inserted into request extensions once the bearer
/// token has been verified.
#[derive(Clone, Debug)]
pub struct AuthenticatedClaims(Claims);

impl AuthenticatedClaims {
    pub fn into_inner(self) -> Claims {
        self.0
    }
}

impl Deref for AuthenticatedClaims {
    type Target = Claims;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn unauthorized(e: anyhow::Error) -> actix_web::Error {
    let response = HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
        .finish();
    InternalError::from_response(e, response).into()
}

pub async fn reject_unauthenticated(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let authority = req
        .app_data::<web::Data<TokenAuthority>>()
        .cloned()
        .ok_or_else(|| {
            actix_web::error::ErrorInternalServerError("Token authority is not configured")
        })?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = extract_bearer_token(header_value)
        .ok_or_else(|| unauthorized(anyhow::anyhow!("Missing or malformed bearer token")))?;

    match authority.verify(&token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthenticatedClaims(claims));
            next.call(req).await
        }
        Err(e) => {
            if let Some(reason) = e.rejection() {
                tracing::info!(rejection = %reason, "Rejected bearer token");
            }
            Err(unauthorized(e.into()))
        }
    }
}
