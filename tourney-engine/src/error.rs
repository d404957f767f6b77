use std::fmt::{self, Display, Formatter};

use thiserror::Error;
use tourney_core::{Format, ParticipantId};

use crate::id::{MatchId, RegistrationId, TournamentId, UserId};

pub type Result<T> = std::result::Result<T, Error>;

/// The entity an [`enum@Error`] refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Tournament(TournamentId),
    Match(MatchId),
    Registration(RegistrationId),
    Round(TournamentId, u32),
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tournament(id) => write!(f, "tournament {}", id),
            Self::Match(id) => write!(f, "match {}", id),
            Self::Registration(id) => write!(f, "registration {}", id),
            Self::Round(id, round) => write!(f, "round {} of tournament {}", round, id),
        }
    }
}

/// Why a [`Error::ConcurrentModification`] was raised.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Conflict {
    /// Another operation holds the entity right now.
    Locked,
    /// The entity changed since the caller last read it.
    Version { expected: u64, found: u64 },
}

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("another operation is in progress"),
            Self::Version { expected, found } => {
                write!(f, "expected version {} but found {}", expected, found)
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("{entity} is {current}, expected {expected}")]
    InvalidTransition {
        entity: Entity,
        current: &'static str,
        expected: &'static str,
    },
    #[error("round {round} of tournament {tournament} has {pending} undecided matches")]
    RoundNotComplete {
        tournament: TournamentId,
        round: u32,
        pending: usize,
    },
    #[error("{entity} was modified concurrently: {conflict}")]
    ConcurrentModification { entity: Entity, conflict: Conflict },
    #[error("match {match_id} cannot end in a draw in a {format} tournament")]
    DrawNotAllowed { match_id: MatchId, format: Format },
    #[error("tournament {tournament} needs {required} participants but has {found}")]
    InsufficientParticipants {
        tournament: TournamentId,
        required: u32,
        found: u32,
    },
    #[error("user {user} is not allowed to {action} on {entity}")]
    Forbidden {
        user: UserId,
        action: &'static str,
        entity: Entity,
    },
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("inconsistent bracket in tournament {tournament} at slot {slot}: {reason}")]
    InconsistentBracket {
        tournament: TournamentId,
        slot: usize,
        reason: String,
    },
    #[error("registration for tournament {tournament} is closed: {reason}")]
    RegistrationClosed {
        tournament: TournamentId,
        reason: &'static str,
    },
    #[error("participant {participant} is already registered for tournament {tournament}")]
    AlreadyRegistered {
        tournament: TournamentId,
        participant: ParticipantId,
    },
    #[error("tournament {tournament} is full ({max} participants)")]
    TournamentFull { tournament: TournamentId, max: u32 },
    #[error("participant {participant} does not play in match {match_id}")]
    NotParticipant {
        match_id: MatchId,
        participant: ParticipantId,
    },
    #[error("match {match_id} is still waiting for its participants")]
    MatchNotReady { match_id: MatchId },
    #[error("{operation} is not supported for {format} tournaments")]
    Unsupported {
        operation: &'static str,
        format: Format,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Core(#[from] tourney_core::Error),
}

impl Error {
    /// Converts an error of a pairing generator raised while operating on `tournament`.
    pub(crate) fn from_core(tournament: TournamentId, err: tourney_core::Error) -> Self {
        match err {
            tourney_core::Error::UndecidedMatch { round, .. } => Self::RoundNotComplete {
                tournament,
                round,
                pending: 1,
            },
            tourney_core::Error::InconsistentBracket { slot, reason } => {
                log::error!(
                    "Inconsistent bracket in tournament {} at slot {}: {}",
                    tournament,
                    slot,
                    reason
                );

                Self::InconsistentBracket {
                    tournament,
                    slot,
                    reason,
                }
            }
            tourney_core::Error::Options(err) => Self::InvalidInput(err.to_string()),
            err => Self::Core(err),
        }
    }

    /// Returns `true` if the caller may retry the operation as is.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::id::{MatchId, TournamentId};

    use super::{Conflict, Entity, Error};

    #[test]
    fn test_error_context() {
        let err = Error::InvalidTransition {
            entity: Entity::Match(MatchId(7)),
            current: "finished",
            expected: "scheduled",
        };
        assert_eq!(err.to_string(), "match 7 is finished, expected scheduled");

        let err = Error::ConcurrentModification {
            entity: Entity::Match(MatchId(3)),
            conflict: Conflict::Version {
                expected: 1,
                found: 2,
            },
        };
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "match 3 was modified concurrently: expected version 1 but found 2"
        );
    }

    #[test]
    fn test_error_from_core() {
        let err = Error::from_core(
            TournamentId(1),
            tourney_core::Error::UndecidedMatch { round: 2, slot: 5 },
        );
        assert!(matches!(err, Error::RoundNotComplete { round: 2, .. }));
        assert!(!err.is_retryable());
    }
}
