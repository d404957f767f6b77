//! Authorization decisions consulted before every mutation.
use std::fmt::Debug;

use crate::model::{Actor, Match, OrganizerRole, SystemRole, Tournament};

/// Decides what an [`Actor`] may do. The engine performs no authentication itself, it only
/// asks these questions and fails with `Forbidden` on a denial.
pub trait Permissions: Debug + Send + Sync {
    /// Status transitions, round advancement and registration approval.
    fn can_manage_tournament(&self, actor: &Actor, tournament: &Tournament) -> bool;

    /// Starting and resetting matches.
    fn can_moderate_matches(&self, actor: &Actor, tournament: &Tournament) -> bool {
        self.can_manage_tournament(actor, tournament)
    }

    /// Reporting a score or a forfeit for `m`.
    fn can_report_score(&self, actor: &Actor, tournament: &Tournament, m: &Match) -> bool;
}

/// [`Permissions`] derived from the system role of the actor and its organizer role within the
/// tournament.
#[derive(Copy, Clone, Debug, Default)]
pub struct RolePermissions;

impl Permissions for RolePermissions {
    fn can_manage_tournament(&self, actor: &Actor, tournament: &Tournament) -> bool {
        match actor.role {
            SystemRole::Admin | SystemRole::Moderator => true,
            SystemRole::User => matches!(
                tournament.organizer_role(actor.user),
                Some(OrganizerRole::Owner | OrganizerRole::Admin)
            ),
        }
    }

    fn can_moderate_matches(&self, actor: &Actor, tournament: &Tournament) -> bool {
        self.can_manage_tournament(actor, tournament)
            || matches!(
                tournament.organizer_role(actor.user),
                Some(OrganizerRole::Moderator | OrganizerRole::Judge)
            )
    }

    fn can_report_score(&self, actor: &Actor, tournament: &Tournament, m: &Match) -> bool {
        self.can_moderate_matches(actor, tournament) || m.contains(actor.participant())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tourney_core::options::TournamentOptionValues;
    use tourney_core::{EntrantSpot, Entrants, Format, Outcome, ParticipantId, Phase};

    use crate::id::{MatchId, TournamentId, UserId};
    use crate::model::{
        Actor, Match, MatchStatus, Organizer, OrganizerRole, SystemRole, Tournament,
        TournamentStatus,
    };

    use super::{Permissions, RolePermissions};

    fn tournament() -> Tournament {
        Tournament {
            id: TournamentId(1),
            name: String::from("Cup"),
            format: Format::SingleElimination,
            status: TournamentStatus::InProgress,
            current_round: 1,
            total_rounds: 2,
            min_players: 2,
            max_players: None,
            registration_deadline: None,
            requires_approval: false,
            allow_late_registration: false,
            requires_check_in: false,
            options: TournamentOptionValues::new(),
            organizers: vec![
                Organizer {
                    user: UserId(1),
                    role: OrganizerRole::Owner,
                },
                Organizer {
                    user: UserId(2),
                    role: OrganizerRole::Judge,
                },
            ],
            entrants: Entrants::new(),
            withdrawn: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            cancel_reason: None,
        }
    }

    fn game() -> Match {
        Match {
            id: MatchId(1),
            tournament: TournamentId(1),
            round: 1,
            phase: Phase::Winners,
            slot: 0,
            entrants: [
                EntrantSpot::Entrant(ParticipantId(10)),
                EntrantSpot::Entrant(ParticipantId(11)),
            ],
            scores: [0, 0],
            status: MatchStatus::Scheduled,
            outcome: Outcome::Pending,
            version: 0,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            notes: None,
        }
    }

    #[test]
    fn test_role_permissions() {
        let t = tournament();
        let m = game();
        let perms = RolePermissions;

        let owner = Actor::user(UserId(1));
        assert!(perms.can_manage_tournament(&owner, &t));
        assert!(perms.can_moderate_matches(&owner, &t));

        let judge = Actor::user(UserId(2));
        assert!(!perms.can_manage_tournament(&judge, &t));
        assert!(perms.can_moderate_matches(&judge, &t));
        assert!(perms.can_report_score(&judge, &t, &m));

        let player = Actor::user(UserId(10));
        assert!(!perms.can_moderate_matches(&player, &t));
        assert!(perms.can_report_score(&player, &t, &m));

        let stranger = Actor::user(UserId(99));
        assert!(!perms.can_report_score(&stranger, &t, &m));

        let moderator = Actor {
            user: UserId(99),
            role: SystemRole::Moderator,
        };
        assert!(perms.can_manage_tournament(&moderator, &t));
    }
}
