//! Handles user authentication in API requests
use crate::api::v1::{ApiError, AuthenticationError};
use crate::identity::{CurrentUser, IdentityContext, IdentityError};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::Error;
use actix_web::http::header::Header;
use actix_web::web::Data;
use actix_web::HttpMessage;
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use core::future::ready;
use std::future::{Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Middleware factory
///
/// Transforms into [`BearerAuthMiddleware`]
pub struct BearerAuth {
    pub identity_ctx: Data<IdentityContext>,
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = BearerAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthMiddleware {
            service: Rc::new(service),
            identity_ctx: self.identity_ctx.clone(),
        }))
    }
}

/// Authentication middleware
///
/// Whenever an API request is received, the BearerAuthMiddleware resolves
/// the bearer credential against the identity service and provides the
/// caller as [`ReqData`](actix_web::web::ReqData) for subsequent services.
pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
    identity_ctx: Data<IdentityContext>,
}

type ResultFuture<O, E> = Pin<Box<dyn Future<Output = Result<O, E>>>>;

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = ResultFuture<Self::Response, Self::Error>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let identity_ctx = self.identity_ctx.clone();

        let auth = match Authorization::<Bearer>::parse(&req) {
            Ok(a) => a,
            Err(e) => {
                log::warn!("Unable to parse access token, {}", e);
                let error = ApiError::unauthorized()
                    .with_www_authenticate(AuthenticationError::InvalidAccessToken);
                return Box::pin(ready(Err(error.into())));
            }
        };

        let access_token = auth.into_scheme().token().to_string();

        Box::pin(async move {
            let current_user = resolve_current_user(&identity_ctx, access_token).await?;

            req.extensions_mut().insert(current_user);
            service.call(req).await
        })
    }
}

/// Resolves a bearer credential to the calling user.
///
/// A rejected credential is a 401 for the caller; an unreachable identity
/// service is a 502 and never treated as an authentication failure.
async fn resolve_current_user(
    identity_ctx: &IdentityContext,
    access_token: String,
) -> Result<CurrentUser, ApiError> {
    let profile = match identity_ctx.resolve(&access_token).await {
        Ok(profile) => profile,
        Err(IdentityError::Rejected(status)) => {
            log::warn!("The identity service rejected a credential, status {}", status);
            return Err(ApiError::unauthorized()
                .with_www_authenticate(AuthenticationError::CredentialRejected));
        }
        Err(IdentityError::Unreachable(e)) => {
            log::error!("The identity service could not be reached: {}", e);
            return Err(ApiError::bad_gateway());
        }
    };

    Ok(CurrentUser {
        id: profile.id,
        display_name: profile.display_name().to_string(),
        access_token,
    })
}
