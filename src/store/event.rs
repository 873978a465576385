//! Event record and roster types persisted by the participation store.
//!
//! The wire form (camelCase JSON, one document per event) is what the
//! REST API exposes for persisted event records.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single event's participation ledger.
///
/// `participants_count` is derived state and must always equal the sum of
/// all ticket counts on the roster. Every mutator recomputes it through
/// [`EventRecord::recount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    /// Maximum number of roster entries. `0` means unlimited.
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub participants_count: u32,
}

/// A user holding one or more seats of an event.
///
/// A participant with a ticket count of zero must not exist on the roster;
/// mutators remove the entry instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: i64,
    pub user_name: String,
    pub ticket_count: u32,
    pub joined_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new<T: Into<String>>(id: T, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            participants: Vec::new(),
            participants_count: 0,
        }
    }

    /// Returns the roster entry of the given user
    pub fn participant(&self, user_id: i64) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    fn position(&self, user_id: i64) -> Option<usize> {
        self.participants.iter().position(|p| p.user_id == user_id)
    }

    /// A capacity of `0` means unlimited and is never full
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.participants.len() >= self.capacity as usize
    }

    /// Appends a new participant holding a single ticket
    pub fn add_participant(&mut self, user_id: i64, user_name: String) {
        self.participants.push(Participant {
            user_id,
            user_name,
            ticket_count: 1,
            joined_at: Utc::now(),
        });
        self.recount();
    }

    /// Removes the user's roster entry entirely, regardless of ticket count.
    ///
    /// Returns `false` if the user holds no entry.
    pub fn remove_participant(&mut self, user_id: i64) -> bool {
        match self.position(user_id) {
            Some(index) => {
                self.participants.remove(index);
                self.recount();
                true
            }
            None => false,
        }
    }

    /// Reduces the user's ticket count by `quantity`, removing the entry
    /// when it reaches zero.
    ///
    /// Returns `false` if the user holds no entry.
    pub fn reduce_tickets(&mut self, user_id: i64, quantity: u32) -> bool {
        let Some(index) = self.position(user_id) else {
            return false;
        };

        let participant = &mut self.participants[index];
        participant.ticket_count = participant.ticket_count.saturating_sub(quantity);

        if participant.ticket_count == 0 {
            self.participants.remove(index);
        }

        self.recount();
        true
    }

    fn recount(&mut self) {
        self.participants_count = self.participants.iter().map(|p| p.ticket_count).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_tickets(tickets: &[(i64, u32)]) -> EventRecord {
        let mut record = EventRecord::new("concert-1", 0);
        for &(user_id, count) in tickets {
            record.participants.push(Participant {
                user_id,
                user_name: format!("user-{user_id}"),
                ticket_count: count,
                joined_at: Utc::now(),
            });
        }
        record.recount();
        record
    }

    fn assert_count_invariant(record: &EventRecord) {
        let sum: u32 = record.participants.iter().map(|p| p.ticket_count).sum();
        assert_eq!(record.participants_count, sum);
        assert!(record.participants.iter().all(|p| p.ticket_count > 0));
    }

    #[test]
    fn add_participant_counts_tickets() {
        let mut record = EventRecord::new("concert-1", 0);

        record.add_participant(1, "alice".into());
        record.add_participant(2, "bob".into());

        assert_eq!(record.participants.len(), 2);
        assert_eq!(record.participants_count, 2);
        assert_count_invariant(&record);
    }

    #[test]
    fn capacity_zero_is_never_full() {
        let mut record = EventRecord::new("concert-1", 0);
        for user_id in 0..100 {
            assert!(!record.is_full());
            record.add_participant(user_id, format!("user-{user_id}"));
        }
        assert!(!record.is_full());
    }

    #[test]
    fn full_uses_roster_length() {
        let record = record_with_tickets(&[(1, 5)]);
        let mut record = EventRecord {
            capacity: 2,
            ..record
        };
        // one entry holding five tickets still leaves a second slot
        assert!(!record.is_full());
        record.add_participant(2, "bob".into());
        assert!(record.is_full());
    }

    #[test]
    fn remove_participant_ignores_ticket_count() {
        let mut record = record_with_tickets(&[(1, 3), (2, 1)]);

        assert!(record.remove_participant(1));
        assert_eq!(record.participants_count, 1);
        assert!(record.participant(1).is_none());
        assert_count_invariant(&record);

        assert!(!record.remove_participant(1));
    }

    #[test]
    fn reduce_tickets_partial() {
        let mut record = record_with_tickets(&[(1, 3)]);

        assert!(record.reduce_tickets(1, 2));

        assert_eq!(record.participant(1).unwrap().ticket_count, 1);
        assert_eq!(record.participants_count, 1);
        assert_count_invariant(&record);
    }

    #[test]
    fn reduce_tickets_to_zero_removes_entry() {
        let mut record = record_with_tickets(&[(1, 2), (2, 1)]);

        assert!(record.reduce_tickets(1, 2));

        assert!(record.participant(1).is_none());
        assert_eq!(record.participants_count, 1);
        assert_count_invariant(&record);
    }

    #[test]
    fn reduce_tickets_saturates_below_zero() {
        let mut record = record_with_tickets(&[(1, 1)]);

        assert!(record.reduce_tickets(1, 5));

        assert!(record.participant(1).is_none());
        assert_eq!(record.participants_count, 0);
    }

    #[test]
    fn reduce_tickets_unknown_user() {
        let mut record = record_with_tickets(&[(1, 2)]);

        assert!(!record.reduce_tickets(42, 1));
        assert_eq!(record.participant(1).unwrap().ticket_count, 2);
    }

    #[test]
    fn wire_form_is_camel_case() {
        let record = record_with_tickets(&[(7, 2)]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["participantsCount"], 2);
        assert_eq!(json["participants"][0]["userId"], 7);
        assert_eq!(json["participants"][0]["ticketCount"], 2);
        assert!(json["participants"][0]["joinedAt"].is_string());
    }
}
