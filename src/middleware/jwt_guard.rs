/// JWT Guard Middleware
///
/// Verifies the bearer token for one purpose (access or refresh) and injects
/// an explicit authenticated context into request extensions. Handlers take
/// that context as a `web::ReqData<..>` parameter.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::{Claims, TokenPurpose, TokenVerifier};
use crate::error::{AppError, AuthError};

/// Identity proven by a valid access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
}

/// Identity proven by a valid refresh token, with the raw token kept for
/// comparison against the stored fingerprint
#[derive(Clone)]
pub struct RefreshContext {
    pub user_id: Uuid,
    pub email: String,
    pub refresh_token: String,
}

/// Guard for routes that require a bearer token of a given purpose
pub struct JwtGuard {
    verifier: TokenVerifier,
    purpose: TokenPurpose,
}

impl JwtGuard {
    pub fn access(verifier: TokenVerifier) -> Self {
        Self {
            verifier,
            purpose: TokenPurpose::Access,
        }
    }

    pub fn refresh(verifier: TokenVerifier) -> Self {
        Self {
            verifier,
            purpose: TokenPurpose::Refresh,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtGuardService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
            purpose: self.purpose,
        }))
    }
}

pub struct JwtGuardService<S> {
    service: Rc<S>,
    verifier: TokenVerifier,
    purpose: TokenPurpose,
}

impl<S> JwtGuardService<S> {
    fn authenticate(&self, req: &ServiceRequest) -> Result<(), AuthError> {
        let token = bearer_token(req).ok_or_else(|| {
            tracing::warn!(
                purpose = self.purpose.as_str(),
                "Missing or malformed Authorization header"
            );
            AuthError::InvalidToken
        })?;

        let claims = self.verifier.verify(&token, self.purpose)?;
        let user_id = claims.user_id()?;

        tracing::debug!(user_id = %user_id, purpose = self.purpose.as_str(), "JWT validated");

        let Claims { email, .. } = claims;
        match self.purpose {
            TokenPurpose::Access => {
                req.extensions_mut().insert(AuthContext { user_id, email });
            }
            TokenPurpose::Refresh => {
                req.extensions_mut().insert(RefreshContext {
                    user_id,
                    email,
                    refresh_token: token,
                });
            }
        }
        Ok(())
    }
}

impl<S, B> Service<ServiceRequest> for JwtGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Err(e) = self.authenticate(&req) {
            return Box::pin(async move { Err(AppError::from(e).into()) });
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
