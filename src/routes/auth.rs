/// Authentication Routes
///
/// Thin HTTP layer over [`AuthService`]: input validation, context
/// extraction and status codes. No protocol decisions are made here.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, Tokens};
use crate::error::AppError;
use crate::middleware::{AuthContext, RefreshContext};
use crate::validators::{is_valid_email, is_valid_password};

/// Email + password credentials for sign-up and sign-in
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<Tokens> for TokensResponse {
    fn from(tokens: Tokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

fn validate(form: &CredentialsRequest) -> Result<String, AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;
    Ok(email)
}

/// POST /auth/local/signup
///
/// # Errors
/// - 400: invalid email or password
/// - 409: email already registered
/// - 500: account or session could not be written
pub async fn sign_up(
    form: web::Json<CredentialsRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = validate(&form)?;
    let tokens = service.sign_up(&email, &form.password).await?;
    Ok(HttpResponse::Created().json(TokensResponse::from(tokens)))
}

/// POST /auth/local/signin
///
/// Unknown email and wrong password both answer 401 with the same body.
pub async fn sign_in(
    form: web::Json<CredentialsRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = validate(&form)?;
    let tokens = service.sign_in(&email, &form.password).await?;
    Ok(HttpResponse::Ok().json(TokensResponse::from(tokens)))
}

/// POST /auth/logout
///
/// Requires a valid access token.
pub async fn logout(
    auth: web::ReqData<AuthContext>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    service.logout(auth.user_id).await?;
    Ok(HttpResponse::Ok().finish())
}

/// POST /auth/refresh
///
/// Requires a valid refresh token as bearer. The token is rotated: it will
/// not be accepted again.
pub async fn refresh(
    session: web::ReqData<RefreshContext>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = service
        .refresh(session.user_id, &session.refresh_token)
        .await?;
    Ok(HttpResponse::Ok().json(TokensResponse::from(tokens)))
}
