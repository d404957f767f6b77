//! This module is about the audit log and live notifications of tournament events, for process
//! logging see the `log` records emitted everywhere else.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tourney_core::{Format, Outcome, ParticipantId};

use crate::id::{LogEntryId, MatchId, RegistrationId, TournamentId, UserId};
use crate::model::{Match, OrganizerRole, RegistrationStatus, TournamentStatus};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub author: UserId,
    pub at: DateTime<Utc>,
    pub event: Event,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Event {
    /// The tournament was created.
    CreateTournament { name: String, format: Format },
    UpdateStatus {
        from: TournamentStatus,
        to: TournamentStatus,
        reason: Option<String>,
    },
    AddOrganizer { user: UserId, role: OrganizerRole },
    Register {
        registration: RegistrationId,
        participant: ParticipantId,
        status: RegistrationStatus,
    },
    UpdateRegistration {
        registration: RegistrationId,
        from: RegistrationStatus,
        to: RegistrationStatus,
    },
    /// A participant left a running tournament.
    Withdraw { participant: ParticipantId },
    StartMatch { id: MatchId },
    ReportScore {
        id: MatchId,
        scores: [u32; 2],
        outcome: Outcome,
    },
    /// `participant` is `None` if the match was decided without a report, e.g. because of a
    /// withdrawal.
    Forfeit {
        id: MatchId,
        participant: Option<ParticipantId>,
        outcome: Outcome,
    },
    ResetMatch {
        id: MatchId,
        reason: Option<String>,
        cascaded: Vec<MatchId>,
        removed: Vec<MatchId>,
    },
    NewRound { round: u32, matches: usize },
}

/// A change broadcast to subscribers of a tournament.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Status {
        tournament: TournamentId,
        status: TournamentStatus,
    },
    Registration {
        tournament: TournamentId,
        registration: RegistrationId,
        status: RegistrationStatus,
    },
    UpdateMatch(Box<Match>),
    ResetMatch { id: MatchId },
    RemoveMatch { id: MatchId },
    Round { tournament: TournamentId, round: u32 },
}

/// The log and the change channel of a single tournament.
#[derive(Debug)]
pub(crate) struct Journal {
    entries: Mutex<Vec<LogEntry>>,
    tx: broadcast::Sender<Change>,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));

        Self {
            entries: Mutex::new(Vec::new()),
            tx,
        }
    }

    pub fn with_entries(capacity: usize, entries: Vec<LogEntry>) -> Self {
        let this = Self::new(capacity);
        *this.entries.lock() = entries;
        this
    }

    pub fn record(&self, author: UserId, at: DateTime<Utc>, event: Event) {
        log::debug!("Recording event {:?} by {}", event, author);

        self.entries.lock().push(LogEntry {
            id: LogEntryId::generate(),
            author,
            at,
            event,
        });
    }

    /// Broadcasts `change`. Changes without subscribers are dropped.
    pub fn notify(&self, change: Change) {
        let _ = self.tx.send(change);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tourney_core::Format;

    use crate::id::{TournamentId, UserId};
    use crate::model::TournamentStatus;

    use super::{Change, Event, Journal};

    #[test]
    fn test_journal_record() {
        let journal = Journal::new(4);
        journal.record(
            UserId(1),
            Utc::now(),
            Event::CreateTournament {
                name: String::from("Cup"),
                format: Format::Swiss,
            },
        );

        let entries = journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].author, UserId(1));
    }

    #[test]
    fn test_journal_notify() {
        let journal = Journal::new(4);

        // Nobody listens yet.
        journal.notify(Change::Round {
            tournament: TournamentId(1),
            round: 1,
        });

        let mut rx = journal.subscribe();
        journal.notify(Change::Status {
            tournament: TournamentId(1),
            status: TournamentStatus::Finished,
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            Change::Status {
                tournament: TournamentId(1),
                status: TournamentStatus::Finished,
            }
        );
    }
}
