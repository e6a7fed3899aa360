use crate::authentication::AuthenticatedClaims;
use actix_web::{web, HttpResponse};

/// Echoes the verified claims of the caller.
#[tracing::instrument(name = "Describe the authenticated caller", skip(claims))]
pub async fn me(claims: web::ReqData<AuthenticatedClaims>) -> HttpResponse {
    HttpResponse::Ok().json(claims.into_inner().into_inner())
}
