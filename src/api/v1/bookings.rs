//! Booking cancellation endpoint
use crate::api::v1::{ApiError, NoContent};
use crate::bookings::BookingApiClient;
use crate::identity::CurrentUser;
use crate::services::participation;
use crate::store::ParticipationStore;
use actix_web::delete;
use actix_web::web::{Data, Path, ReqData};

/// API Endpoint *DELETE /bookings/{booking_id}*
///
/// Cancels a booking with the booking service and reduces the owner's
/// roster entry by the booked quantity. A failed delete aborts the request
/// with the upstream status; a failed roster update after a successful
/// delete is logged and still answered with 204.
#[delete("/bookings/{booking_id}")]
pub async fn cancel(
    store: Data<ParticipationStore>,
    booking_api: Data<BookingApiClient>,
    current_user: ReqData<CurrentUser>,
    booking_id: Path<i64>,
) -> Result<NoContent, ApiError> {
    participation::cancel_booking(&store, booking_api.get_ref(), &current_user, *booking_id)
        .await?;

    Ok(NoContent)
}
