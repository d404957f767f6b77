//! The tournament state machine.
//!
//! Every legal transition is listed in [`RULES`]. A transition is enforced and projected by the
//! same precondition check, so [`Engine::get_available_transitions`] never disagrees with
//! [`Engine::update_status`].
use serde::Serialize;
use tourney_core::options::OptionValue;
use tourney_core::{Generator, RoundOutcome, Seeding, System};

use crate::error::{Entity, Error, Result};
use crate::event_log::{Change, Event};
use crate::id::{TournamentId, UserId};
use crate::model::{Actor, NewTournament, Organizer, OrganizerRole, Registration, Tournament};
use crate::model::TournamentStatus::{self, *};
use crate::registration::eligible;
use crate::store::{Matches, State, TournamentCell};
use crate::Engine;

/// A status change that is currently possible.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Transition {
    pub from: TournamentStatus,
    pub to: TournamentStatus,
    pub description: &'static str,
}

const RULES: [Transition; 10] = [
    rule(Draft, RegistrationOpen, "Open registration"),
    rule(Draft, Cancelled, "Cancel the tournament"),
    rule(RegistrationOpen, RegistrationClosed, "Close registration"),
    rule(RegistrationOpen, InProgress, "Start the tournament"),
    rule(RegistrationOpen, Cancelled, "Cancel the tournament"),
    rule(RegistrationClosed, RegistrationOpen, "Reopen registration"),
    rule(RegistrationClosed, InProgress, "Start the tournament"),
    rule(RegistrationClosed, Cancelled, "Cancel the tournament"),
    rule(InProgress, Finished, "Finish the tournament"),
    rule(InProgress, Cancelled, "Cancel the tournament"),
];

const fn rule(from: TournamentStatus, to: TournamentStatus, description: &'static str) -> Transition {
    Transition {
        from,
        to,
        description,
    }
}

/// Returns the statuses `to` can be reached from, for error messages.
fn sources(to: TournamentStatus) -> &'static str {
    match to {
        Draft => "never",
        RegistrationOpen => "draft or registration_closed",
        RegistrationClosed => "registration_open",
        InProgress => "registration_open or registration_closed",
        Finished => "in_progress",
        Cancelled => "draft, registration_open, registration_closed or in_progress",
    }
}

impl Engine {
    pub fn create_tournament(&self, actor: &Actor, new: NewTournament) -> Result<Tournament> {
        if new.name.trim().is_empty() {
            return Err(Error::InvalidInput(String::from("name must not be empty")));
        }

        let min_players = new.min_players.unwrap_or(self.config.defaults.min_players);
        if min_players < 2 {
            return Err(Error::InvalidInput(format!(
                "min_players must be at least 2, got {}",
                min_players
            )));
        }

        if let Some(max_players) = new.max_players {
            if max_players < min_players {
                return Err(Error::InvalidInput(format!(
                    "max_players ({}) must not be less than min_players ({})",
                    max_players, min_players
                )));
            }
        }

        let mut options = self.config.defaults.option_values();
        for (key, value) in new.options.iter() {
            options.set(key, value.clone());
        }
        // A random seeding without a seed draws one now, so that the order can be replayed.
        if options.get(Seeding::OPTION) == Some(&OptionValue::from("random"))
            && !options.contains(Seeding::SEED_OPTION)
        {
            options.set(Seeding::SEED_OPTION, rand::random::<u64>());
        }

        let options = options
            .merge(Generator::options(new.format))
            .map_err(|err| Error::InvalidInput(err.to_string()))?;
        Seeding::from_values(&options).map_err(|err| Error::InvalidInput(err.to_string()))?;

        let now = self.clock.now();
        let tournament = Tournament {
            id: TournamentId::generate(),
            name: new.name,
            format: new.format,
            status: Draft,
            current_round: 0,
            total_rounds: 0,
            min_players,
            max_players: new.max_players,
            registration_deadline: new.registration_deadline,
            requires_approval: new.requires_approval,
            allow_late_registration: new.allow_late_registration,
            requires_check_in: new.requires_check_in,
            options,
            organizers: vec![Organizer {
                user: actor.user,
                role: OrganizerRole::Owner,
            }],
            entrants: Default::default(),
            withdrawn: Vec::new(),
            created_at: now,
            started_at: None,
            finished_at: None,
            cancel_reason: None,
        };

        let journal = crate::event_log::Journal::new(self.config.events.capacity);
        journal.record(
            actor.user,
            now,
            Event::CreateTournament {
                name: tournament.name.clone(),
                format: tournament.format,
            },
        );

        log::info!(
            "Created {} tournament {} ({})",
            tournament.format,
            tournament.id,
            tournament.name
        );

        self.store
            .insert(TournamentCell::new(tournament.clone(), journal))?;
        Ok(tournament)
    }

    /// Grants `user` the organizer `role`, replacing any role the user had before.
    pub fn add_organizer(
        &self,
        actor: &Actor,
        id: TournamentId,
        user: UserId,
        role: OrganizerRole,
    ) -> Result<Tournament> {
        let cell = self.store.get(id)?;
        let mut state = cell.state.write();

        if !self.permissions.can_manage_tournament(actor, &state.tournament) {
            return Err(Self::forbidden(actor, "add organizers", Entity::Tournament(id)));
        }

        let organizers = &mut state.tournament.organizers;
        match organizers.iter_mut().find(|o| o.user == user) {
            Some(organizer) => organizer.role = role,
            None => organizers.push(Organizer { user, role }),
        }

        cell.journal
            .record(actor.user, self.clock.now(), Event::AddOrganizer { user, role });

        Ok(state.tournament.clone())
    }

    /// Returns every transition that [`update_status`] would currently accept, ignoring
    /// permissions.
    ///
    /// [`update_status`]: Self::update_status
    pub fn get_available_transitions(&self, id: TournamentId) -> Result<Vec<Transition>> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let state = cell.state.read();
        let registrations = cell.registrations.lock();
        let matches = cell.matches.read();

        Ok(RULES
            .iter()
            .filter(|rule| {
                self.check_transition(&state, &registrations, &matches, rule.to)
                    .is_ok()
            })
            .copied()
            .collect())
    }

    /// Moves the tournament to the status `to`, validated against the state machine.
    ///
    /// Moving to [`InProgress`] generates the first round; moving to [`Finished`] is only
    /// possible once no rounds are left.
    ///
    /// [`InProgress`]: TournamentStatus::InProgress
    /// [`Finished`]: TournamentStatus::Finished
    pub fn update_status(
        &self,
        actor: &Actor,
        id: TournamentId,
        to: TournamentStatus,
        reason: Option<String>,
    ) -> Result<Tournament> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let mut state = cell.state.write();
        if !self.permissions.can_manage_tournament(actor, &state.tournament) {
            return Err(Self::forbidden(actor, "change the status", Entity::Tournament(id)));
        }

        let registrations = cell.registrations.lock();
        let mut matches = cell.matches.write();

        self.check_transition(&state, &registrations, &matches, to)?;

        match to {
            InProgress => {
                let entrants = eligible(&state.tournament, &registrations);
                self.start(&cell, &mut state, &mut matches, entrants, actor.user)?;
            }
            Finished => self.finish(&cell, &mut state, actor.user),
            _ => self.set_status(&cell, &mut state.tournament, to, actor.user, reason),
        }

        Ok(state.tournament.clone())
    }

    pub fn open_registration(&self, actor: &Actor, id: TournamentId) -> Result<Tournament> {
        self.update_status(actor, id, RegistrationOpen, None)
    }

    pub fn close_registration(&self, actor: &Actor, id: TournamentId) -> Result<Tournament> {
        self.update_status(actor, id, RegistrationClosed, None)
    }

    pub fn start_tournament(&self, actor: &Actor, id: TournamentId) -> Result<Tournament> {
        self.update_status(actor, id, InProgress, None)
    }

    pub fn cancel_tournament(
        &self,
        actor: &Actor,
        id: TournamentId,
        reason: Option<String>,
    ) -> Result<Tournament> {
        self.update_status(actor, id, Cancelled, reason)
    }

    fn check_transition(
        &self,
        state: &State,
        registrations: &[Registration],
        matches: &Matches,
        to: TournamentStatus,
    ) -> Result<()> {
        let tournament = &state.tournament;
        let from = tournament.status;

        if !RULES.iter().any(|rule| rule.from == from && rule.to == to) {
            return Err(Error::InvalidTransition {
                entity: Entity::Tournament(tournament.id),
                current: from.as_str(),
                expected: sources(to),
            });
        }

        let now = self.clock.now();
        match to {
            RegistrationOpen if tournament.deadline_passed(now) => Err(Error::RegistrationClosed {
                tournament: tournament.id,
                reason: "the registration deadline has passed",
            }),
            InProgress => {
                if from == RegistrationOpen && tournament.allow_late_registration {
                    return Err(Error::InvalidTransition {
                        entity: Entity::Tournament(tournament.id),
                        current: from.as_str(),
                        expected: "registration_closed while late registration is allowed",
                    });
                }

                let found = eligible(tournament, registrations).len() as u32;
                if found < tournament.min_players {
                    return Err(Error::InsufficientParticipants {
                        tournament: tournament.id,
                        required: tournament.min_players,
                        found,
                    });
                }

                Ok(())
            }
            Finished => {
                let history = matches.history();

                let pending = history.iter().filter(|r| !r.outcome.is_decided()).count();
                if pending > 0 {
                    return Err(Error::RoundNotComplete {
                        tournament: tournament.id,
                        round: tournament.current_round,
                        pending,
                    });
                }

                let Some(generator) = &state.generator else {
                    return Err(Error::InvalidTransition {
                        entity: Entity::Tournament(tournament.id),
                        current: from.as_str(),
                        expected: "a started tournament",
                    });
                };

                match generator.generate_round(&history, tournament.current_round) {
                    Ok(RoundOutcome::Terminal) => Ok(()),
                    Ok(RoundOutcome::Round(_)) => Err(Error::InvalidTransition {
                        entity: Entity::Round(tournament.id, tournament.current_round + 1),
                        current: "pending",
                        expected: "no rounds left to play",
                    }),
                    Err(err) => Err(Error::from_core(tournament.id, err)),
                }
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn set_status(
        &self,
        cell: &TournamentCell,
        tournament: &mut Tournament,
        to: TournamentStatus,
        author: UserId,
        reason: Option<String>,
    ) {
        let from = tournament.status;
        let now = self.clock.now();

        tournament.status = to;
        match to {
            InProgress => tournament.started_at = Some(now),
            Finished => tournament.finished_at = Some(now),
            Cancelled => tournament.cancel_reason = reason.clone(),
            _ => (),
        }

        log::info!("Tournament {} changed from {} to {}", tournament.id, from, to);

        cell.journal
            .record(author, now, Event::UpdateStatus { from, to, reason });
        cell.journal.notify(Change::Status {
            tournament: tournament.id,
            status: to,
        });
    }

    /// Closes registration once the deadline passed, unless late registrations are allowed.
    pub(crate) fn close_expired(&self, cell: &TournamentCell) {
        let now = self.clock.now();
        let expired = |tournament: &Tournament| {
            tournament.status == RegistrationOpen
                && !tournament.allow_late_registration
                && tournament.deadline_passed(now)
        };

        if !expired(&cell.state.read().tournament) {
            return;
        }

        let mut state = cell.state.write();
        if expired(&state.tournament) {
            self.set_status(
                cell,
                &mut state.tournament,
                RegistrationClosed,
                UserId::SYSTEM,
                Some(String::from("registration deadline passed")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{sources, RULES};
    use crate::model::TournamentStatus;

    #[test]
    fn test_rules_terminal() {
        for rule in RULES {
            assert!(!rule.from.is_terminal());
            assert_ne!(rule.from, rule.to);
            assert!(sources(rule.to).contains(rule.from.as_str()));
        }

        assert!(RULES
            .iter()
            .all(|rule| rule.to != TournamentStatus::Draft));
    }
}
