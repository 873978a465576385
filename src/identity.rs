//! Resolves the calling user against the external identity service.
use crate::settings;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The identity service rejected the credential. Never retried; an
    /// expired credential must surface to the caller.
    #[error("The identity service rejected the credential (status {0})")]
    Rejected(StatusCode),
    #[error("The identity service could not be reached: `{0}`")]
    Unreachable(#[from] reqwest::Error),
}

/// Profile of the caller as reported by the identity service
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    /// Display name of the user, falling back to the login name
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

/// The authenticated caller of the current request.
///
/// Inserted into the request extensions by the auth middleware and
/// extracted by handlers as [`ReqData`](actix_web::web::ReqData). Carries
/// the bearer credential so upstream calls are made on the caller's behalf.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub display_name: String,
    pub access_token: String,
}

/// The `IdentityContext` wraps all calls to the identity service.
#[derive(Debug)]
pub struct IdentityContext {
    client: reqwest::Client,
    profile_url: Url,
}

impl IdentityContext {
    /// Create the IdentityContext from the configuration.
    pub fn from_config(identity_config: &settings::Identity) -> Result<Self> {
        let profile_url = identity_config
            .base_url
            .join("api/auth/me")
            .context("Invalid identity service base url")?;

        Ok(Self {
            client: reqwest::Client::new(),
            profile_url,
        })
    }

    /// Resolves a bearer credential to the caller's profile.
    pub async fn resolve(&self, access_token: &str) -> std::result::Result<UserProfile, IdentityError> {
        let response = self
            .client
            .get(self.profile_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            return Err(IdentityError::Rejected(status));
        }

        Ok(response.json().await?)
    }
}
