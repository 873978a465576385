//! Client for the booking service, the system of record for paid
//! reservations.
//!
//! The booking service enforces ownership itself: fetching or deleting a
//! booking with a foreign credential fails upstream. It keeps no reference
//! back to the participation ledger.
use crate::settings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum BookingApiError {
    /// The booking service answered with a non-success status
    #[error("The booking service responded with status {0}")]
    Status(StatusCode),
    #[error("The booking service could not be reached: `{0}`")]
    Unreachable(#[from] reqwest::Error),
}

/// A paid reservation as reported by the booking service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    #[serde(deserialize_with = "event_id_from_any")]
    pub event_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub status: Option<String>,
}

/// The booking service reports event ids as integers while the
/// participation ledger keys records by string id.
fn event_id_from_any<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBooking<'a> {
    event_id: &'a str,
    quantity: u32,
}

/// Operations of the booking service.
///
/// All calls carry the caller's bearer credential; the service scopes
/// bookings to their owner.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Records a paid reservation for the calling user
    async fn create_booking(
        &self,
        access_token: &str,
        event_id: &str,
        quantity: u32,
    ) -> std::result::Result<Booking, BookingApiError>;

    /// Fetches a booking by id
    async fn fetch_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> std::result::Result<Booking, BookingApiError>;

    /// Deletes a booking by id
    async fn delete_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> std::result::Result<(), BookingApiError>;
}

/// HTTP client for the booking service REST API
#[derive(Debug)]
pub struct BookingApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BookingApiClient {
    /// Create the client from the configuration.
    pub fn from_config(booking_config: &settings::Booking) -> Result<Self> {
        let base_url = booking_config
            .base_url
            .join("api/bookings")
            .context("Invalid booking service base url")?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn booking_url(&self, booking_id: i64) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base url cannot be a base")
            .push(&booking_id.to_string());
        url
    }
}

#[async_trait]
impl BookingApi for BookingApiClient {
    async fn create_booking(
        &self,
        access_token: &str,
        event_id: &str,
        quantity: u32,
    ) -> std::result::Result<Booking, BookingApiError> {
        let response = self
            .client
            .post(self.base_url.clone())
            .bearer_auth(access_token)
            .json(&CreateBooking { event_id, quantity })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingApiError::Status(status));
        }

        Ok(response.json().await?)
    }

    async fn fetch_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> std::result::Result<Booking, BookingApiError> {
        let response = self
            .client
            .get(self.booking_url(booking_id))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingApiError::Status(status));
        }

        Ok(response.json().await?)
    }

    async fn delete_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> std::result::Result<(), BookingApiError> {
        let response = self
            .client
            .delete(self.booking_url(booking_id))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingApiError::Status(status));
        }

        Ok(())
    }
}
