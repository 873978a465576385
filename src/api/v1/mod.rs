//! REST API v1
//!
//! Contains the error type shared by all endpoints and the endpoint
//! modules themselves.
use crate::bookings::BookingApiError;
use crate::services::participation::ParticipationError;
use crate::store::StoreError;
use actix_web::body::BoxBody;
use actix_web::http::header::{self, HeaderValue, TryIntoHeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, ResponseError};
use actix_web_httpauth::headers::www_authenticate::bearer::{Bearer, Error};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

pub mod bookings;
pub mod events;
pub mod middleware;

/// JSON body sent with every error response
#[derive(Debug, Serialize)]
struct ErrorBody {
    // Machine readable error code
    code: Cow<'static, str>,
    // Human readable message
    message: Cow<'static, str>,
}

/// Error variants for the WWW-Authenticate header
#[derive(Debug)]
pub enum AuthenticationError {
    /// The Authorization header is missing or not a parsable bearer token
    InvalidAccessToken,
    /// The identity service rejected the credential
    CredentialRejected,
}

impl AuthenticationError {
    fn error(&self) -> Error {
        match self {
            Self::InvalidAccessToken => Error::InvalidRequest,
            Self::CredentialRejected => Error::InvalidToken,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::InvalidAccessToken => "The provided access token is invalid",
            Self::CredentialRejected => "The credential was rejected by the identity service",
        }
    }
}

/// Error type of all REST endpoints
///
/// Built via the associated functions for the various HTTP errors. Each
/// error carries a default code and message in a JSON body, both of which
/// can be overwritten when creating an error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    www_authenticate: Option<HeaderValue>,
    body: ErrorBody,
}

impl ApiError {
    fn new<T>(status: StatusCode, code: T, message: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        Self {
            status,
            www_authenticate: None,
            body: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Override the default code for an error
    pub fn with_code<T>(mut self, code: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.body.code = code.into();
        self
    }

    /// Override the default message for an error
    pub fn with_message<T>(mut self, message: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.body.message = message.into();
        self
    }

    /// Add a WWW-Authenticate bearer header to the response
    pub fn with_www_authenticate(mut self, authentication_error: AuthenticationError) -> Self {
        let header_value = Bearer::build()
            .error_description(authentication_error.message())
            .error(authentication_error.error())
            .finish()
            .try_into_value()
            .expect("Bearer challenges must be convertible to a header value");

        self.www_authenticate = Some(header_value);

        self
    }

    /// Create a new 400 Bad Request error
    pub fn bad_request() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Invalid request due to malformed syntax",
        )
    }

    /// Create a new 401 Unauthorized error
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Authentication failed",
        )
    }

    /// Create a new 404 Not Found error
    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "A requested resource could not be found",
        )
    }

    /// Create a new 500 Internal Server Error
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_server_error",
            "An internal server error occurred",
        )
    }

    /// Create a new 502 Bad Gateway error
    pub fn bad_gateway() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "upstream_unavailable",
            "An upstream service could not be reached",
        )
    }

    /// Forward a non-success status reported by an upstream service
    pub fn upstream(status: StatusCode) -> Self {
        Self::new(
            status,
            Cow::Borrowed("upstream_error"),
            Cow::Owned(format!(
                "An upstream service responded with status {status}"
            )),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status={}, code={}, message={}",
            self.status, self.body.code, self.body.message
        )
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        let mut response = HttpResponse::new(self.status_code());

        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/json; charset=utf-8"),
        );

        if let Some(www_authenticate) = self.www_authenticate.clone() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, www_authenticate);
        }

        let body = serde_json::to_string(&self.body).expect("Unable to serialize API error body");

        response.set_body(BoxBody::new(body))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        log::error!("REST API threw internal error: {:?}", e);
        Self::internal()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::not_found(),
            e => {
                log::error!("REST API threw internal error from store error: {}", e);
                Self::internal()
            }
        }
    }
}

impl From<ParticipationError> for ApiError {
    fn from(e: ParticipationError) -> Self {
        match e {
            ParticipationError::EventNotFound => Self::not_found(),
            ParticipationError::EventFull => Self::bad_request()
                .with_code("event_full")
                .with_message("The event has no more spots available"),
            ParticipationError::Store(e) => {
                log::error!("REST API threw internal error from store error: {}", e);
                Self::internal()
            }
        }
    }
}

impl From<BookingApiError> for ApiError {
    fn from(e: BookingApiError) -> Self {
        match e {
            BookingApiError::Status(status) => Self::upstream(status),
            BookingApiError::Unreachable(e) => {
                log::error!("The booking service could not be reached: {}", e);
                Self::bad_gateway()
            }
        }
    }
}

/// Represents a 204 No Content HTTP response
pub struct NoContent;

impl Responder for NoContent {
    type Body = BoxBody;

    fn respond_to(self, _: &HttpRequest) -> HttpResponse<BoxBody> {
        HttpResponse::NoContent().finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_with_code_and_message() {
        let error = ApiError::not_found()
            .with_code("custom_code")
            .with_message("A custom message");

        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(&error.body).unwrap(),
            serde_json::json!({
                "code": "custom_code",
                "message": "A custom message"
            })
        );
    }

    #[test]
    fn event_full_maps_to_bad_request() {
        let error = ApiError::from(ParticipationError::EventFull);

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.body.code, "event_full");
    }

    #[test]
    fn upstream_status_is_forwarded() {
        let error = ApiError::from(BookingApiError::Status(StatusCode::CONFLICT));

        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.body.code, "upstream_error");
    }

    #[test]
    fn unauthorized_carries_www_authenticate() {
        let error = ApiError::unauthorized()
            .with_www_authenticate(AuthenticationError::CredentialRejected);
        let response = error.error_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
