//! The records owned by the engine.
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourney_core::options::TournamentOptionValues;
use tourney_core::{EntrantSpot, Entrants, Format, MatchRecord, Outcome, ParticipantId, Phase};

use crate::id::{MatchId, RegistrationId, TournamentId, UserId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Draft,
    RegistrationOpen,
    RegistrationClosed,
    InProgress,
    Finished,
    Cancelled,
}

impl TournamentStatus {
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::RegistrationOpen,
        Self::RegistrationClosed,
        Self::InProgress,
        Self::Finished,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::RegistrationOpen => "registration_open",
            Self::RegistrationClosed => "registration_closed",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` if no further transition leaves this status.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Returns `true` if the participant pool is not fixed yet.
    #[inline]
    pub fn is_before_start(self) -> bool {
        matches!(
            self,
            Self::Draft | Self::RegistrationOpen | Self::RegistrationClosed
        )
    }
}

impl Display for TournamentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role of a user within a single tournament.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizerRole {
    Owner,
    Admin,
    Moderator,
    Judge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Organizer {
    pub user: UserId,
    pub role: OrganizerRole,
}

/// The role of a user across all tournaments.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    Admin,
    Moderator,
    User,
}

/// The authenticated caller of an engine operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user: UserId,
    pub role: SystemRole,
}

impl Actor {
    #[inline]
    pub fn user(user: UserId) -> Self {
        Self {
            user,
            role: SystemRole::User,
        }
    }

    #[inline]
    pub fn admin(user: UserId) -> Self {
        Self {
            user,
            role: SystemRole::Admin,
        }
    }

    /// The actor the engine acts as on its own.
    #[inline]
    pub fn system() -> Self {
        Self::admin(UserId::SYSTEM)
    }

    #[inline]
    pub fn participant(&self) -> ParticipantId {
        self.user.into()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: Format,
    pub status: TournamentStatus,
    pub current_round: u32,
    /// The maximum number of rounds. Set when the tournament starts.
    pub total_rounds: u32,
    pub min_players: u32,
    pub max_players: Option<u32>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub requires_approval: bool,
    pub allow_late_registration: bool,
    pub requires_check_in: bool,
    pub options: TournamentOptionValues,
    pub organizers: Vec<Organizer>,
    /// The participant pool in seeding order. Fixed when the tournament starts.
    pub entrants: Entrants,
    /// Participants that left after the start. They forfeit every remaining match.
    pub withdrawn: Vec<ParticipantId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Tournament {
    pub fn organizer_role(&self, user: UserId) -> Option<OrganizerRole> {
        self.organizers
            .iter()
            .find(|o| o.user == user)
            .map(|o| o.role)
    }

    #[inline]
    pub fn is_withdrawn(&self, participant: ParticipantId) -> bool {
        self.withdrawn.contains(&participant)
    }

    /// Returns `true` if the registration deadline lies before `now`.
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        match self.registration_deadline {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }
}

/// The input for creating a [`Tournament`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub format: Format,
    /// Falls back to the configured default.
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub requires_approval: bool,
    pub allow_late_registration: bool,
    pub requires_check_in: bool,
    pub options: TournamentOptionValues,
}

impl NewTournament {
    pub fn new<T>(name: T, format: Format) -> Self
    where
        T: ToString,
    {
        Self {
            name: name.to_string(),
            format,
            min_players: None,
            max_players: None,
            registration_deadline: None,
            requires_approval: false,
            allow_late_registration: false,
            requires_check_in: false,
            options: TournamentOptionValues::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Waiting for approval by an organizer.
    Pending,
    Confirmed,
    /// Admitted while the tournament was full.
    Waitlisted,
    CheckedIn,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Waitlisted => "waitlisted",
            Self::CheckedIn => "checked_in",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for registrations occupying a seat.
    #[inline]
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed | Self::CheckedIn)
    }
}

impl Display for RegistrationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub tournament: TournamentId,
    pub participant: ParticipantId,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Finished,
    Forfeit,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Forfeit => "forfeit",
        }
    }

    /// Returns `true` for [`Finished`] and [`Forfeit`].
    ///
    /// [`Finished`]: Self::Finished
    /// [`Forfeit`]: Self::Forfeit
    #[inline]
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Finished | Self::Forfeit)
    }
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament: TournamentId,
    pub round: u32,
    pub phase: Phase,
    /// The bracket slot for elimination formats, the table otherwise.
    pub slot: usize,
    /// Player A and player B.
    pub entrants: [EntrantSpot<ParticipantId>; 2],
    pub scores: [u32; 2],
    pub status: MatchStatus,
    pub outcome: Outcome,
    /// Incremented on every change.
    pub version: u64,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Match {
    #[inline]
    pub fn player_a(&self) -> Option<ParticipantId> {
        self.entrants[0].entrant()
    }

    #[inline]
    pub fn player_b(&self) -> Option<ParticipantId> {
        self.entrants[1].entrant()
    }

    #[inline]
    pub fn winner(&self) -> Option<ParticipantId> {
        match self.outcome {
            Outcome::Winner(id) => Some(id),
            _ => None,
        }
    }

    /// Returns `true` if exactly one spot is permanently empty.
    pub fn is_bye(&self) -> bool {
        self.entrants[0].is_empty() != self.entrants[1].is_empty()
    }

    /// Returns `true` if both participants are known and the match can be played.
    pub fn is_playable(&self) -> bool {
        self.entrants.iter().all(|spot| spot.is_entrant())
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.entrants
            .iter()
            .any(|spot| *spot == EntrantSpot::Entrant(participant))
    }

    /// Returns the spot index of `participant`.
    pub fn position(&self, participant: ParticipantId) -> Option<usize> {
        self.entrants
            .iter()
            .position(|spot| *spot == EntrantSpot::Entrant(participant))
    }

    /// Returns the match as seen by the pairing generators.
    pub fn record(&self) -> MatchRecord {
        MatchRecord {
            round: self.round,
            phase: self.phase,
            slot: self.slot,
            entrants: self.entrants,
            outcome: self.outcome,
        }
    }
}

/// A score report for a single match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Scores of player A and player B.
    pub scores: [u32; 2],
    /// Rejects the report if the match changed since this version was read.
    pub expected_version: Option<u64>,
}

impl ScoreReport {
    #[inline]
    pub fn new(player_a: u32, player_b: u32) -> Self {
        Self {
            scores: [player_a, player_b],
            expected_version: None,
        }
    }

    #[inline]
    pub fn with_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tourney_core::{EntrantSpot, Outcome, ParticipantId, Phase};

    use crate::id::{MatchId, TournamentId};

    use super::{Match, MatchStatus, TournamentStatus};

    fn bye() -> Match {
        Match {
            id: MatchId(1),
            tournament: TournamentId(1),
            round: 1,
            phase: Phase::Main,
            slot: 2,
            entrants: [EntrantSpot::Entrant(ParticipantId(4)), EntrantSpot::Empty],
            scores: [0, 0],
            status: MatchStatus::Finished,
            outcome: Outcome::Winner(ParticipantId(4)),
            version: 0,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            notes: None,
        }
    }

    #[test]
    fn test_match_bye() {
        let m = bye();
        assert!(m.is_bye());
        assert!(!m.is_playable());
        assert_eq!(m.player_a(), Some(ParticipantId(4)));
        assert_eq!(m.player_b(), None);
        assert_eq!(m.position(ParticipantId(4)), Some(0));
        assert_eq!(m.record().winner(), Some(ParticipantId(4)));
    }

    #[test]
    fn test_status_flags() {
        assert!(TournamentStatus::Finished.is_terminal());
        assert!(TournamentStatus::Cancelled.is_terminal());
        assert!(!TournamentStatus::InProgress.is_terminal());
        assert!(TournamentStatus::RegistrationClosed.is_before_start());
        assert!(MatchStatus::Forfeit.is_decided());
        assert!(!MatchStatus::InProgress.is_decided());
    }
}
