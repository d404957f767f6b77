//! The registration manager. It feeds the participant pool of a tournament.
use tourney_core::ParticipantId;

use crate::error::{Entity, Error, Result};
use crate::event_log::{Change, Event};
use crate::id::{RegistrationId, TournamentId};
use crate::model::{Actor, Registration, RegistrationStatus, Tournament, TournamentStatus};
use crate::store::TournamentCell;
use crate::Engine;

/// Returns the participants that would be seeded if the tournament started now, in
/// registration order.
pub(crate) fn eligible(tournament: &Tournament, registrations: &[Registration]) -> Vec<ParticipantId> {
    let mut eligible: Vec<&Registration> = registrations
        .iter()
        .filter(|r| match tournament.requires_check_in {
            true => r.status == RegistrationStatus::CheckedIn,
            false => r.status.is_confirmed(),
        })
        .collect();

    eligible.sort_by_key(|r| (r.registered_at, r.id));
    eligible.into_iter().map(|r| r.participant).collect()
}

fn confirmed_count(registrations: &[Registration]) -> u32 {
    registrations
        .iter()
        .filter(|r| r.status.is_confirmed())
        .count() as u32
}

fn is_full(tournament: &Tournament, registrations: &[Registration]) -> bool {
    match tournament.max_players {
        Some(max) => confirmed_count(registrations) >= max,
        None => false,
    }
}

fn find(registrations: &mut [Registration], id: RegistrationId) -> Result<&mut Registration> {
    registrations
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(Error::NotFound(Entity::Registration(id)))
}

impl Engine {
    /// Registers `participant` for the tournament.
    ///
    /// The registration is `pending` if the tournament requires approval or the deadline has
    /// passed, `waitlisted` if the tournament is full and `confirmed` otherwise. A previously
    /// cancelled registration is reactivated.
    pub fn register(
        &self,
        actor: &Actor,
        id: TournamentId,
        participant: ParticipantId,
        notes: Option<String>,
    ) -> Result<Registration> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let state = cell.state.read();
        let tournament = &state.tournament;

        if actor.participant() != participant
            && !self.permissions.can_manage_tournament(actor, tournament)
        {
            return Err(Self::forbidden(actor, "register others", Entity::Tournament(id)));
        }

        if tournament.status != TournamentStatus::RegistrationOpen {
            return Err(Error::RegistrationClosed {
                tournament: id,
                reason: "registration is not open",
            });
        }

        let now = self.clock.now();
        let late = tournament.deadline_passed(now);
        if late && !tournament.allow_late_registration {
            return Err(Error::RegistrationClosed {
                tournament: id,
                reason: "the registration deadline has passed",
            });
        }

        let mut registrations = cell.registrations.lock();

        let status = if tournament.requires_approval || late {
            RegistrationStatus::Pending
        } else if is_full(tournament, &registrations) {
            RegistrationStatus::Waitlisted
        } else {
            RegistrationStatus::Confirmed
        };

        let registration = match registrations
            .iter_mut()
            .find(|r| r.participant == participant)
        {
            Some(r) if r.status != RegistrationStatus::Cancelled => {
                return Err(Error::AlreadyRegistered {
                    tournament: id,
                    participant,
                });
            }
            Some(r) => {
                log::debug!("Reactivating registration {} of {}", r.id, participant);

                cell.journal.record(
                    actor.user,
                    now,
                    Event::UpdateRegistration {
                        registration: r.id,
                        from: r.status,
                        to: status,
                    },
                );

                r.status = status;
                r.registered_at = now;
                r.checked_in_at = None;
                r.notes = notes;
                r.clone()
            }
            None => {
                let r = Registration {
                    id: RegistrationId::generate(),
                    tournament: id,
                    participant,
                    status,
                    registered_at: now,
                    checked_in_at: None,
                    notes,
                };

                cell.journal.record(
                    actor.user,
                    now,
                    Event::Register {
                        registration: r.id,
                        participant,
                        status,
                    },
                );

                registrations.push(r.clone());
                r
            }
        };

        log::info!(
            "Registered {} for tournament {} as {}",
            participant,
            id,
            registration.status
        );

        notify(&cell, &registration);
        Ok(registration)
    }

    /// Confirms a `pending` or `waitlisted` registration.
    pub fn confirm_registration(
        &self,
        actor: &Actor,
        id: TournamentId,
        registration: RegistrationId,
    ) -> Result<Registration> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let state = cell.state.read();
        let tournament = &state.tournament;

        if !self.permissions.can_manage_tournament(actor, tournament) {
            return Err(Self::forbidden(
                actor,
                "confirm registrations",
                Entity::Registration(registration),
            ));
        }

        if !tournament.status.is_before_start() {
            return Err(Error::RegistrationClosed {
                tournament: id,
                reason: "the participant pool is fixed",
            });
        }

        let mut registrations = cell.registrations.lock();
        let full = is_full(tournament, &registrations);

        let r = find(&mut registrations, registration)?;
        if !matches!(
            r.status,
            RegistrationStatus::Pending | RegistrationStatus::Waitlisted
        ) {
            return Err(Error::InvalidTransition {
                entity: Entity::Registration(registration),
                current: r.status.as_str(),
                expected: "pending or waitlisted",
            });
        }

        if full {
            return Err(Error::TournamentFull {
                tournament: id,
                max: tournament.max_players.unwrap_or_default(),
            });
        }

        let r = update(&cell, actor, r, RegistrationStatus::Confirmed, self.clock.now());
        Ok(r)
    }

    /// Cancels a registration. Cancelling a confirmed registration before the start promotes
    /// the oldest waitlisted registration; cancelling after the start withdraws the participant
    /// and forfeits every remaining match.
    pub fn cancel_registration(
        &self,
        actor: &Actor,
        id: TournamentId,
        registration: RegistrationId,
        reason: Option<String>,
    ) -> Result<Registration> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let mut state = cell.state.write();
        let status = state.tournament.status;
        if status.is_terminal() {
            return Err(Error::InvalidTransition {
                entity: Entity::Tournament(id),
                current: status.as_str(),
                expected: "not finished or cancelled",
            });
        }

        let mut registrations = cell.registrations.lock();
        let now = self.clock.now();

        let r = find(&mut registrations, registration)?;
        if actor.participant() != r.participant
            && !self.permissions.can_manage_tournament(actor, &state.tournament)
        {
            return Err(Self::forbidden(
                actor,
                "cancel registrations",
                Entity::Registration(registration),
            ));
        }

        if r.status == RegistrationStatus::Cancelled {
            return Err(Error::InvalidTransition {
                entity: Entity::Registration(registration),
                current: r.status.as_str(),
                expected: "not cancelled",
            });
        }

        let held_seat = r.status.is_confirmed();
        if let Some(reason) = reason {
            r.notes = Some(format!("Cancelled: {}", reason));
        }
        let cancelled = update(&cell, actor, r, RegistrationStatus::Cancelled, now);

        if status.is_before_start() {
            if held_seat && !is_full(&state.tournament, &registrations) {
                let waitlisted = registrations
                    .iter_mut()
                    .filter(|r| r.status == RegistrationStatus::Waitlisted)
                    .min_by_key(|r| (r.registered_at, r.id));

                if let Some(next) = waitlisted {
                    log::info!("Promoting {} from the waitlist", next.participant);
                    update(&cell, actor, next, RegistrationStatus::Confirmed, now);
                }
            }
        } else if state.tournament.entrants.contains(&cancelled.participant) {
            drop(registrations);
            self.withdraw(&cell, &mut state, cancelled.participant, actor.user)?;
        }

        Ok(cancelled)
    }

    /// Checks in a confirmed registration.
    pub fn check_in(
        &self,
        actor: &Actor,
        id: TournamentId,
        registration: RegistrationId,
    ) -> Result<Registration> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let state = cell.state.read();
        let tournament = &state.tournament;

        if !matches!(
            tournament.status,
            TournamentStatus::RegistrationOpen | TournamentStatus::RegistrationClosed
        ) {
            return Err(Error::RegistrationClosed {
                tournament: id,
                reason: "check-in is not open",
            });
        }

        let mut registrations = cell.registrations.lock();
        let r = find(&mut registrations, registration)?;

        if actor.participant() != r.participant
            && !self.permissions.can_manage_tournament(actor, tournament)
        {
            return Err(Self::forbidden(
                actor,
                "check in",
                Entity::Registration(registration),
            ));
        }

        if r.status != RegistrationStatus::Confirmed {
            return Err(Error::InvalidTransition {
                entity: Entity::Registration(registration),
                current: r.status.as_str(),
                expected: "confirmed",
            });
        }

        let now = self.clock.now();
        r.checked_in_at = Some(now);
        Ok(update(&cell, actor, r, RegistrationStatus::CheckedIn, now))
    }

    pub fn get_registration(&self, id: TournamentId, registration: RegistrationId) -> Result<Registration> {
        let cell = self.store.get(id)?;
        let mut registrations = cell.registrations.lock();
        find(&mut registrations, registration).map(|r| r.clone())
    }

    /// Returns all registrations in registration order, optionally only those with `status`.
    pub fn list_registrations(
        &self,
        id: TournamentId,
        status: Option<RegistrationStatus>,
    ) -> Result<Vec<Registration>> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let mut list: Vec<Registration> = cell
            .registrations
            .lock()
            .iter()
            .filter(|r| status.map_or(true, |status| r.status == status))
            .cloned()
            .collect();

        list.sort_by_key(|r| (r.registered_at, r.id));
        Ok(list)
    }

    /// Returns the participant pool: the seeded entrants once the tournament started, the
    /// eligible registrations before.
    pub fn list_confirmed_participants(&self, id: TournamentId) -> Result<Vec<ParticipantId>> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let state = cell.state.read();
        if state.generator.is_some() {
            return Ok(state.tournament.entrants.to_vec());
        }

        let registrations = cell.registrations.lock();
        Ok(eligible(&state.tournament, &registrations))
    }
}

fn update(
    cell: &TournamentCell,
    actor: &Actor,
    r: &mut Registration,
    to: RegistrationStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> Registration {
    log::debug!("Registration {} changed from {} to {}", r.id, r.status, to);

    cell.journal.record(
        actor.user,
        now,
        Event::UpdateRegistration {
            registration: r.id,
            from: r.status,
            to,
        },
    );

    r.status = to;
    notify(cell, r);
    r.clone()
}

fn notify(cell: &TournamentCell, r: &Registration) {
    cell.journal.notify(Change::Registration {
        tournament: r.tournament,
        registration: r.id,
        status: r.status,
    });
}
