//! Event participation endpoints
use crate::api::v1::ApiError;
use crate::bookings::BookingApiClient;
use crate::identity::CurrentUser;
use crate::services::participation::{self, JoinOutcome, LeaveOutcome};
use crate::store::{EventRecord, ParticipationStore};
use actix_web::web::{Data, Json, Path, ReqData};
use actix_web::{get, post, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinedResponse {
    joined: bool,
    booking_recorded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyJoinedResponse {
    already_joined: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeftResponse {
    left: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotJoinedResponse {
    not_joined: bool,
}

/// API Endpoint *POST /events/{event_id}/join*
///
/// Appends the caller to the event roster and records a booking on their
/// behalf. A failed booking still counts as a successful join; the response
/// carries `bookingRecorded: false` in that case.
#[post("/events/{event_id}/join")]
pub async fn join(
    store: Data<ParticipationStore>,
    booking_api: Data<BookingApiClient>,
    current_user: ReqData<CurrentUser>,
    event_id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    let outcome =
        participation::join_event(&store, booking_api.get_ref(), &current_user, &event_id).await?;

    let response = match outcome {
        JoinOutcome::Joined { booking_recorded } => HttpResponse::Ok().json(JoinedResponse {
            joined: true,
            booking_recorded,
        }),
        JoinOutcome::AlreadyJoined => HttpResponse::Ok().json(AlreadyJoinedResponse {
            already_joined: true,
        }),
    };

    Ok(response)
}

/// API Endpoint *POST /events/{event_id}/leave*
///
/// Removes the caller's roster entry. Bookings are untouched; a paid
/// reservation must be cancelled explicitly.
#[post("/events/{event_id}/leave")]
pub async fn leave(
    store: Data<ParticipationStore>,
    current_user: ReqData<CurrentUser>,
    event_id: Path<String>,
) -> Result<HttpResponse, ApiError> {
    let outcome = participation::leave_event(&store, &current_user, &event_id).await?;

    let response = match outcome {
        LeaveOutcome::Left => HttpResponse::Ok().json(LeftResponse { left: true }),
        LeaveOutcome::NotJoined => {
            HttpResponse::Ok().json(NotJoinedResponse { not_joined: true })
        }
    };

    Ok(response)
}

/// API Endpoint *GET /events/{event_id}*
///
/// Returns the stored event record including its current roster.
#[get("/events/{event_id}")]
pub async fn get(
    store: Data<ParticipationStore>,
    event_id: Path<String>,
) -> Result<Json<EventRecord>, ApiError> {
    let event = store.get(&event_id).await?;

    Ok(Json(event))
}
