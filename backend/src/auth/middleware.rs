use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use super::jwt::{JwtError, JwtService};
use super::models::Claims;
use crate::error::ApiError;

/// Rejects requests without a valid `Authorization: Bearer` token and stores
/// the verified claims in the request extensions.
#[derive(Clone)]
pub struct AuthMiddleware {
    jwt_service: Arc<JwtService>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self {
            jwt_service: Arc::new(jwt_service),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("Authorization header is not valid UTF-8")]
    UnreadableHeader,
    #[error("Authorization scheme is not Bearer")]
    WrongScheme,
    #[error("{0}")]
    Token(#[from] JwtError),
}

impl Rejection {
    fn into_api_error(self) -> ApiError {
        match self {
            Rejection::Token(_) => ApiError::Unauthorized("Could not validate credentials".into()),
            _ => ApiError::Unauthorized("Not authenticated".into()),
        }
    }
}

fn bearer_claims(req: &ServiceRequest, jwt_service: &JwtService) -> Result<Claims, Rejection> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(Rejection::MissingHeader)?
        .to_str()
        .map_err(|_| Rejection::UnreadableHeader)?;
    let (scheme, token) = header.split_once(' ').ok_or(Rejection::WrongScheme)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(Rejection::WrongScheme);
    }
    Ok(jwt_service.verify_token(token.trim())?)
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = BearerAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthService {
            service: Rc::new(service),
            jwt_service: Arc::clone(&self.jwt_service),
        }))
    }
}

pub struct BearerAuthService<S> {
    service: Rc<S>,
    jwt_service: Arc<JwtService>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = bearer_claims(&req, &self.jwt_service);
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            match claims {
                Ok(claims) => {
                    log::debug!("Authenticated {} for {}", claims.email, req.path());
                    req.extensions_mut().insert(claims);
                    Ok(service.call(req).await?.map_into_left_body())
                }
                Err(rejection) => {
                    log::warn!("Rejected request to {}: {}", req.path(), rejection);
                    let response = rejection.into_api_error().error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

/// Claims of the caller, available behind [`AuthMiddleware`].
pub struct AuthenticatedUser(pub Claims);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        ready(claims.map(AuthenticatedUser).ok_or_else(|| {
            log::warn!("No verified claims on request to {}", req.path());
            ApiError::Unauthorized("Not authenticated".into())
        }))
    }
}
