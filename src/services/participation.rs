//! Join, leave and cancellation flows.
//!
//! All roster mutation goes through [`ParticipationStore::update_event`].
//! Calls to the booking service never happen while a per-event lock is
//! held: join creates the booking after the roster update has been
//! committed, cancellation deletes the booking before the roster lock is
//! taken.
//!
//! The two ledgers are reconciled asymmetrically. The roster is
//! authoritative for capacity, so a booking-service failure during join is
//! logged and reported as a warning instead of rolling back the claimed
//! seat. Deleting a paid booking is the user's primary intent during
//! cancellation, so an upstream failure there aborts the whole operation
//! while a roster failure after a confirmed delete is logged only.
use crate::bookings::{Booking, BookingApi, BookingApiError};
use crate::identity::CurrentUser;
use crate::store::{ParticipationStore, StoreError, Update};

#[derive(Debug, thiserror::Error)]
pub enum ParticipationError {
    #[error("The requested event could not be found")]
    EventNotFound,
    #[error("The event has no more spots available")]
    EventFull,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ParticipationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::EventNotFound,
            e => Self::Store(e),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The caller was appended to the roster with a single ticket.
    ///
    /// `booking_recorded` is `false` when the booking service failed to
    /// record the reservation; the seat is kept regardless.
    Joined { booking_recorded: bool },
    /// The caller already holds a membership row; nothing changed
    AlreadyJoined,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// The caller holds no membership row; nothing changed
    NotJoined,
}

/// Roster side of a completed cancellation.
///
/// The booking is deleted in every one of these cases; the variants make
/// the consistency window between the two ledgers visible to callers.
#[derive(Debug, PartialEq, Eq)]
pub enum RosterUpdate {
    /// Ticket count reduced, participant removed when it reached zero
    Updated,
    /// Booking details were unavailable, reconciliation was skipped
    Skipped,
    /// The booking's user no longer holds a roster entry
    ParticipantMissing,
    /// The store failed after the booking was already deleted
    Failed,
}

#[derive(Debug)]
pub struct CancelOutcome {
    pub roster: RosterUpdate,
}

/// Adds the caller to the event roster and records a best-effort booking.
pub async fn join_event(
    store: &ParticipationStore,
    booking_api: &dyn BookingApi,
    user: &CurrentUser,
    event_id: &str,
) -> Result<JoinOutcome, ParticipationError> {
    let fresh_join = store
        .update_event(event_id, |event| {
            if event.participant(user.id).is_some() {
                return Ok(Update::Unchanged(false));
            }

            if event.is_full() {
                return Err(ParticipationError::EventFull);
            }

            event.add_participant(user.id, user.display_name.clone());
            Ok(Update::Changed(true))
        })
        .await?;

    if !fresh_join {
        return Ok(JoinOutcome::AlreadyJoined);
    }

    match booking_api.create_booking(&user.access_token, event_id, 1).await {
        Ok(booking) => {
            log::debug!(
                "recorded booking {} for user {} on event {}",
                booking.id,
                user.id,
                event_id
            );
            Ok(JoinOutcome::Joined {
                booking_recorded: true,
            })
        }
        Err(e) => {
            log::warn!(
                "user {} joined event {} but the booking could not be recorded: {}",
                user.id,
                event_id,
                e
            );
            Ok(JoinOutcome::Joined {
                booking_recorded: false,
            })
        }
    }
}

/// Removes the caller from the event roster. The booking ledger is left
/// alone; only cancellation reconciles bookings.
pub async fn leave_event(
    store: &ParticipationStore,
    user: &CurrentUser,
    event_id: &str,
) -> Result<LeaveOutcome, ParticipationError> {
    store
        .update_event(event_id, |event| {
            if event.remove_participant(user.id) {
                Ok(Update::Changed(LeaveOutcome::Left))
            } else {
                Ok(Update::Unchanged(LeaveOutcome::NotJoined))
            }
        })
        .await
}

/// Deletes a booking and reconciles the caller's ticket count.
///
/// An upstream failure of the delete aborts the operation with the roster
/// untouched. Everything after the confirmed delete is best effort.
pub async fn cancel_booking(
    store: &ParticipationStore,
    booking_api: &dyn BookingApi,
    user: &CurrentUser,
    booking_id: i64,
) -> Result<CancelOutcome, BookingApiError> {
    let booking = match booking_api.fetch_booking(&user.access_token, booking_id).await {
        Ok(booking) => Some(booking),
        Err(e) => {
            log::warn!(
                "unable to fetch booking {} before deletion, roster reconciliation will be skipped: {}",
                booking_id,
                e
            );
            None
        }
    };

    booking_api.delete_booking(&user.access_token, booking_id).await?;

    let roster = match booking {
        Some(booking) => reconcile_roster(store, user, &booking).await,
        None => RosterUpdate::Skipped,
    };

    Ok(CancelOutcome { roster })
}

async fn reconcile_roster(
    store: &ParticipationStore,
    user: &CurrentUser,
    booking: &Booking,
) -> RosterUpdate {
    let result = store
        .update_event::<RosterUpdate, StoreError, _>(&booking.event_id, |event| {
            if event.reduce_tickets(user.id, booking.quantity) {
                Ok(Update::Changed(RosterUpdate::Updated))
            } else {
                Ok(Update::Unchanged(RosterUpdate::ParticipantMissing))
            }
        })
        .await;

    match result {
        Ok(RosterUpdate::ParticipantMissing) => {
            log::warn!(
                "cancelled booking {} for user {} who is no longer on the roster of event {}",
                booking.id,
                user.id,
                booking.event_id
            );
            RosterUpdate::ParticipantMissing
        }
        Ok(update) => update,
        Err(e) => {
            log::error!(
                "booking {} was deleted but the roster of event {} could not be updated: {}",
                booking.id,
                booking.event_id,
                e
            );
            RosterUpdate::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EventRecord, Participant};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockBookingApi {
        bookings: Mutex<HashMap<i64, Booking>>,
        fail_create: bool,
        fail_fetch: bool,
        fail_delete: bool,
        delete_called: AtomicBool,
    }

    impl MockBookingApi {
        fn with_booking(booking_id: i64, event_id: &str, quantity: u32) -> Self {
            let mock = Self::default();
            mock.bookings.lock().insert(
                booking_id,
                Booking {
                    id: booking_id,
                    event_id: event_id.to_owned(),
                    quantity,
                    status: Some("CONFIRMED".to_owned()),
                },
            );
            mock
        }
    }

    #[async_trait]
    impl BookingApi for MockBookingApi {
        async fn create_booking(
            &self,
            _access_token: &str,
            event_id: &str,
            quantity: u32,
        ) -> Result<Booking, BookingApiError> {
            if self.fail_create {
                return Err(BookingApiError::Status(StatusCode::SERVICE_UNAVAILABLE));
            }

            let mut bookings = self.bookings.lock();
            let id = bookings.len() as i64 + 1;
            let booking = Booking {
                id,
                event_id: event_id.to_owned(),
                quantity,
                status: Some("CONFIRMED".to_owned()),
            };
            bookings.insert(id, booking.clone());
            Ok(booking)
        }

        async fn fetch_booking(
            &self,
            _access_token: &str,
            booking_id: i64,
        ) -> Result<Booking, BookingApiError> {
            if self.fail_fetch {
                return Err(BookingApiError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }

            self.bookings
                .lock()
                .get(&booking_id)
                .cloned()
                .ok_or(BookingApiError::Status(StatusCode::NOT_FOUND))
        }

        async fn delete_booking(
            &self,
            _access_token: &str,
            booking_id: i64,
        ) -> Result<(), BookingApiError> {
            self.delete_called.store(true, Ordering::SeqCst);

            if self.fail_delete {
                return Err(BookingApiError::Status(StatusCode::NOT_FOUND));
            }

            self.bookings
                .lock()
                .remove(&booking_id)
                .map(|_| ())
                .ok_or(BookingApiError::Status(StatusCode::NOT_FOUND))
        }
    }

    fn open_store() -> (tempfile::TempDir, ParticipationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ParticipationStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn user(id: i64) -> CurrentUser {
        CurrentUser {
            id,
            display_name: format!("user-{id}"),
            access_token: "token".to_owned(),
        }
    }

    async fn seed_event(store: &ParticipationStore, id: &str, capacity: u32) {
        store.insert(EventRecord::new(id, capacity)).await.unwrap();
    }

    async fn seed_participant(store: &ParticipationStore, event_id: &str, user_id: i64, tickets: u32) {
        store
            .update_event::<_, StoreError, _>(event_id, |event| {
                event.participants.push(Participant {
                    user_id,
                    user_name: format!("user-{user_id}"),
                    ticket_count: tickets,
                    joined_at: Utc::now(),
                });
                event.participants_count += tickets;
                Ok(Update::Changed(()))
            })
            .await
            .unwrap();
    }

    fn assert_count_invariant(record: &EventRecord) {
        let sum: u32 = record.participants.iter().map(|p| p.ticket_count).sum();
        assert_eq!(record.participants_count, sum);
        assert!(record.participants.iter().all(|p| p.ticket_count > 0));
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::default();
        seed_event(&store, "e1", 0).await;

        let first = join_event(&store, &booking_api, &user(1), "e1").await.unwrap();
        assert_eq!(
            first,
            JoinOutcome::Joined {
                booking_recorded: true
            }
        );

        let second = join_event(&store, &booking_api, &user(1), "e1").await.unwrap();
        assert_eq!(second, JoinOutcome::AlreadyJoined);

        let record = store.get("e1").await.unwrap();
        assert_eq!(record.participant(1).unwrap().ticket_count, 1);
        assert_eq!(record.participants_count, 1);
        // only the first join creates a booking
        assert_eq!(booking_api.bookings.lock().len(), 1);
        assert_count_invariant(&record);
    }

    #[tokio::test]
    async fn join_unknown_event() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::default();

        let result = join_event(&store, &booking_api, &user(1), "missing").await;

        assert!(matches!(result, Err(ParticipationError::EventNotFound)));
        assert!(booking_api.bookings.lock().is_empty());
    }

    #[tokio::test]
    async fn join_rejects_when_full() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::default();
        seed_event(&store, "e1", 1).await;

        join_event(&store, &booking_api, &user(1), "e1").await.unwrap();
        let result = join_event(&store, &booking_api, &user(2), "e1").await;

        assert!(matches!(result, Err(ParticipationError::EventFull)));

        let record = store.get("e1").await.unwrap();
        assert_eq!(record.participants.len(), 1);
        assert!(record.participant(2).is_none());
        // the rejected join must not create a booking either
        assert_eq!(booking_api.bookings.lock().len(), 1);
    }

    #[tokio::test]
    async fn join_keeps_seat_when_booking_fails() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi {
            fail_create: true,
            ..Default::default()
        };
        seed_event(&store, "e1", 0).await;

        let outcome = join_event(&store, &booking_api, &user(1), "e1").await.unwrap();

        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                booking_recorded: false
            }
        );
        let record = store.get("e1").await.unwrap();
        assert_eq!(record.participant(1).unwrap().ticket_count, 1);
        assert_count_invariant(&record);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_fill_exactly_one_seat() {
        let (_dir, store) = open_store();
        let store = Arc::new(store);
        let booking_api = Arc::new(MockBookingApi::default());
        seed_event(&store, "e1", 1).await;

        let mut handles = Vec::new();
        for user_id in 0..16 {
            let store = Arc::clone(&store);
            let booking_api = Arc::clone(&booking_api);
            handles.push(tokio::spawn(async move {
                join_event(&store, booking_api.as_ref(), &user(user_id), "e1").await
            }));
        }

        let mut joined = 0;
        let mut full = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(JoinOutcome::Joined { .. }) => joined += 1,
                Err(ParticipationError::EventFull) => full += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(joined, 1);
        assert_eq!(full, 15);
        assert_eq!(store.get("e1").await.unwrap().participants_count, 1);
    }

    #[tokio::test]
    async fn leave_removes_the_whole_entry() {
        let (_dir, store) = open_store();
        seed_event(&store, "e1", 0).await;
        seed_participant(&store, "e1", 1, 3).await;

        let outcome = leave_event(&store, &user(1), "e1").await.unwrap();

        assert_eq!(outcome, LeaveOutcome::Left);
        let record = store.get("e1").await.unwrap();
        assert!(record.participant(1).is_none());
        assert_eq!(record.participants_count, 0);
    }

    #[tokio::test]
    async fn leave_without_membership() {
        let (_dir, store) = open_store();
        seed_event(&store, "e1", 0).await;

        let outcome = leave_event(&store, &user(1), "e1").await.unwrap();

        assert_eq!(outcome, LeaveOutcome::NotJoined);
    }

    #[tokio::test]
    async fn cancel_decrements_partially() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::with_booking(10, "e1", 2);
        seed_event(&store, "e1", 0).await;
        seed_participant(&store, "e1", 1, 3).await;

        let outcome = cancel_booking(&store, &booking_api, &user(1), 10).await.unwrap();

        assert_eq!(outcome.roster, RosterUpdate::Updated);
        let record = store.get("e1").await.unwrap();
        assert_eq!(record.participant(1).unwrap().ticket_count, 1);
        assert_eq!(record.participants_count, 1);
        assert_count_invariant(&record);
    }

    #[tokio::test]
    async fn cancel_removes_participant_at_zero() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::with_booking(10, "e1", 2);
        seed_event(&store, "e1", 0).await;
        seed_participant(&store, "e1", 1, 2).await;

        let before = store.get("e1").await.unwrap().participants_count;
        let outcome = cancel_booking(&store, &booking_api, &user(1), 10).await.unwrap();

        assert_eq!(outcome.roster, RosterUpdate::Updated);
        let record = store.get("e1").await.unwrap();
        assert!(record.participant(1).is_none());
        assert_eq!(before - record.participants_count, 2);
        assert_count_invariant(&record);
    }

    #[tokio::test]
    async fn cancel_aborts_when_delete_fails() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::with_booking(10, "e1", 2);
        let booking_api = MockBookingApi {
            fail_delete: true,
            ..booking_api
        };
        seed_event(&store, "e1", 0).await;
        seed_participant(&store, "e1", 1, 2).await;

        let before = store.get("e1").await.unwrap();
        let result = cancel_booking(&store, &booking_api, &user(1), 10).await;

        assert!(matches!(
            result,
            Err(BookingApiError::Status(StatusCode::NOT_FOUND))
        ));
        // the roster must be exactly as it was
        assert_eq!(store.get("e1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn cancel_without_booking_details_still_deletes() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::with_booking(10, "e1", 2);
        let booking_api = MockBookingApi {
            fail_fetch: true,
            ..booking_api
        };
        seed_event(&store, "e1", 0).await;
        seed_participant(&store, "e1", 1, 2).await;

        let outcome = cancel_booking(&store, &booking_api, &user(1), 10).await.unwrap();

        assert_eq!(outcome.roster, RosterUpdate::Skipped);
        assert!(booking_api.delete_called.load(Ordering::SeqCst));
        // no reconciliation happened
        assert_eq!(store.get("e1").await.unwrap().participant(1).unwrap().ticket_count, 2);
    }

    #[tokio::test]
    async fn cancel_for_departed_participant() {
        let (_dir, store) = open_store();
        let booking_api = MockBookingApi::with_booking(10, "e1", 2);
        seed_event(&store, "e1", 0).await;

        let outcome = cancel_booking(&store, &booking_api, &user(1), 10).await.unwrap();

        assert_eq!(outcome.roster, RosterUpdate::ParticipantMissing);
        assert!(store.get("e1").await.unwrap().participants.is_empty());
    }

    #[tokio::test]
    async fn cancel_survives_roster_failure_after_delete() {
        let (_dir, store) = open_store();
        // booking points at an event the store never had
        let booking_api = MockBookingApi::with_booking(10, "ghost", 2);

        let outcome = cancel_booking(&store, &booking_api, &user(1), 10).await.unwrap();

        assert_eq!(outcome.roster, RosterUpdate::Failed);
        // the booking stays deleted
        assert!(booking_api.bookings.lock().is_empty());
    }
}
