//! The match lifecycle.
//!
//! ```text
//! scheduled -> in_progress -> finished
//!     |             |
//!     +-------------+-------> forfeit
//! ```
//!
//! A reset returns a match to `scheduled`. In elimination brackets the reset cascades into
//! every match that was fed by the reset result.
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tourney_core::{EntrantSpot, Generator, MatchRecord, Outcome, ParticipantId, Phase, System};

use crate::error::{Conflict, Entity, Error, Result};
use crate::event_log::{Change, Event};
use crate::id::{MatchId, TournamentId, UserId};
use crate::model::{Actor, Match, MatchStatus, ScoreReport, Tournament, TournamentStatus};
use crate::store::{Matches, State, TournamentCell};
use crate::Engine;

/// The matches changed by [`Engine::reset_match`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetOutcome {
    /// The requested match first, followed by every match reset by the cascade.
    pub reset: Vec<Match>,
    /// Matches that no longer exist, e.g. a bracket reset whose grand final was reset.
    pub removed: Vec<MatchId>,
}

fn ensure_running(tournament: &Tournament) -> Result<()> {
    match tournament.status {
        TournamentStatus::InProgress => Ok(()),
        status => Err(Error::InvalidTransition {
            entity: Entity::Tournament(tournament.id),
            current: status.as_str(),
            expected: "in_progress",
        }),
    }
}

fn ensure_open(m: &Match) -> Result<()> {
    match m.status {
        MatchStatus::Scheduled | MatchStatus::InProgress => Ok(()),
        status => Err(Error::InvalidTransition {
            entity: Entity::Match(m.id),
            current: status.as_str(),
            expected: "scheduled or in_progress",
        }),
    }
}

/// Locks the match for the calling operation. Losing the race is reported instead of waited
/// out.
fn try_lock(id: MatchId, handle: &Mutex<Match>) -> Result<MutexGuard<'_, Match>> {
    match handle.try_lock() {
        Some(guard) => Ok(guard),
        None => {
            log::warn!("Rejecting concurrent modification of match {}", id);

            Err(Error::ConcurrentModification {
                entity: Entity::Match(id),
                conflict: Conflict::Locked,
            })
        }
    }
}

fn inconsistent(tournament: TournamentId, slot: usize, reason: String) -> Error {
    log::error!(
        "Inconsistent bracket in tournament {} at slot {}: {}",
        tournament,
        slot,
        reason
    );

    Error::InconsistentBracket {
        tournament,
        slot,
        reason,
    }
}

fn clear(m: &mut Match, reason: Option<&str>) {
    m.status = MatchStatus::Scheduled;
    m.outcome = Outcome::Pending;
    m.scores = [0, 0];
    m.started_at = None;
    m.finished_at = None;
    m.version += 1;

    if let Some(reason) = reason {
        m.notes = Some(format!("Reset: {}", reason));
    }
}

impl Engine {
    pub fn get_match(&self, id: MatchId) -> Result<Match> {
        let cell = self.store.locate(id)?;
        let matches = cell.matches.read();

        let handle = matches.get(id).ok_or(Error::NotFound(Entity::Match(id)))?;
        let m = handle.lock().clone();
        Ok(m)
    }

    /// Moves a `scheduled` match to `in_progress`.
    pub fn start_match(&self, actor: &Actor, id: MatchId, notes: Option<String>) -> Result<Match> {
        let cell = self.store.locate(id)?;
        let state = cell.state.read();
        ensure_running(&state.tournament)?;

        if !self.permissions.can_moderate_matches(actor, &state.tournament) {
            return Err(Self::forbidden(actor, "start matches", Entity::Match(id)));
        }

        let matches = cell.matches.read();
        let handle = matches.get(id).ok_or(Error::NotFound(Entity::Match(id)))?;
        let mut m = try_lock(id, handle)?;

        if m.status != MatchStatus::Scheduled {
            return Err(Error::InvalidTransition {
                entity: Entity::Match(id),
                current: m.status.as_str(),
                expected: "scheduled",
            });
        }

        if !m.is_playable() {
            return Err(Error::MatchNotReady { match_id: id });
        }

        let now = self.clock.now();
        m.status = MatchStatus::InProgress;
        m.started_at = Some(now);
        m.version += 1;
        if notes.is_some() {
            m.notes = notes;
        }

        log::info!("Started match {} in tournament {}", id, cell.id);

        cell.journal
            .record(actor.user, now, Event::StartMatch { id });
        cell.journal.notify(Change::UpdateMatch(Box::new(m.clone())));

        Ok(m.clone())
    }

    /// Reports the final score of a match, starting it implicitly if it is still `scheduled`.
    /// The higher score wins; equal scores are a draw where the format allows draws.
    pub fn report_score(&self, actor: &Actor, id: MatchId, report: ScoreReport) -> Result<Match> {
        let cell = self.store.locate(id)?;
        let state = cell.state.read();
        ensure_running(&state.tournament)?;

        let matches = cell.matches.read();
        let handle = matches.get(id).ok_or(Error::NotFound(Entity::Match(id)))?;
        let mut m = try_lock(id, handle)?;

        if !self
            .permissions
            .can_report_score(actor, &state.tournament, &m)
        {
            return Err(Self::forbidden(actor, "report scores", Entity::Match(id)));
        }

        if let Some(expected) = report.expected_version {
            if expected != m.version {
                log::warn!(
                    "Rejecting score for match {}: version {} expected, found {}",
                    id,
                    expected,
                    m.version
                );

                return Err(Error::ConcurrentModification {
                    entity: Entity::Match(id),
                    conflict: Conflict::Version {
                        expected,
                        found: m.version,
                    },
                });
            }
        }

        ensure_open(&m)?;

        let (Some(a), Some(b)) = (m.player_a(), m.player_b()) else {
            return Err(Error::MatchNotReady { match_id: id });
        };

        let format = state.tournament.format;
        let outcome = match report.scores[0].cmp(&report.scores[1]) {
            Ordering::Greater => Outcome::Winner(a),
            Ordering::Less => Outcome::Winner(b),
            Ordering::Equal if format.allows_draws() => Outcome::Draw,
            Ordering::Equal => return Err(Error::DrawNotAllowed { match_id: id, format }),
        };

        let now = self.clock.now();
        if m.started_at.is_none() {
            m.started_at = Some(now);
        }
        m.scores = report.scores;

        cell.journal.record(
            actor.user,
            now,
            Event::ReportScore {
                id,
                scores: report.scores,
                outcome,
            },
        );

        self.decide(&cell, &state, &matches, &mut m, outcome, MatchStatus::Finished, actor.user)?;
        Ok(m.clone())
    }

    /// Marks `participant` as forfeiting the match. The opponent wins, unless the opponent
    /// withdrew as well.
    pub fn forfeit(&self, actor: &Actor, id: MatchId, participant: ParticipantId) -> Result<Match> {
        let cell = self.store.locate(id)?;
        let state = cell.state.read();
        ensure_running(&state.tournament)?;

        let matches = cell.matches.read();
        let handle = matches.get(id).ok_or(Error::NotFound(Entity::Match(id)))?;
        let mut m = try_lock(id, handle)?;

        if !self
            .permissions
            .can_report_score(actor, &state.tournament, &m)
        {
            return Err(Self::forbidden(actor, "forfeit matches", Entity::Match(id)));
        }

        // Players may only give up their own spot.
        if participant != actor.participant()
            && !self.permissions.can_moderate_matches(actor, &state.tournament)
        {
            return Err(Self::forbidden(
                actor,
                "forfeit for other participants",
                Entity::Match(id),
            ));
        }

        ensure_open(&m)?;

        if !m.is_playable() {
            return Err(Error::MatchNotReady { match_id: id });
        }

        let position = m.position(participant).ok_or(Error::NotParticipant {
            match_id: id,
            participant,
        })?;

        let outcome = match m.entrants[1 - position] {
            EntrantSpot::Entrant(other) if !state.tournament.is_withdrawn(other) => {
                Outcome::Winner(other)
            }
            _ => Outcome::NoWinner,
        };

        cell.journal.record(
            actor.user,
            self.clock.now(),
            Event::Forfeit {
                id,
                participant: Some(participant),
                outcome,
            },
        );

        self.decide(&cell, &state, &matches, &mut m, outcome, MatchStatus::Forfeit, actor.user)?;
        Ok(m.clone())
    }

    /// Returns a started or decided match to `scheduled`.
    ///
    /// In elimination formats every match that was fed by the old result is reset as well,
    /// recursively, and its spot returns to TBD. A bracket reset match is removed entirely if
    /// its grand final is reset.
    ///
    /// With an `expected_version` the reset is rejected if the match changed in between.
    pub fn reset_match(
        &self,
        actor: &Actor,
        id: MatchId,
        reason: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<ResetOutcome> {
        let cell = self.store.locate(id)?;
        let mut state = cell.state.write();
        ensure_running(&state.tournament)?;

        if !self.permissions.can_moderate_matches(actor, &state.tournament) {
            return Err(Self::forbidden(actor, "reset matches", Entity::Match(id)));
        }

        let mut matches = cell.matches.write();
        let handle = matches
            .get(id)
            .cloned()
            .ok_or(Error::NotFound(Entity::Match(id)))?;

        let previous = {
            let mut m = handle.lock();

            if let Some(expected) = expected_version {
                if expected != m.version {
                    log::warn!(
                        "Rejecting reset of match {}: version {} expected, found {}",
                        id,
                        expected,
                        m.version
                    );

                    return Err(Error::ConcurrentModification {
                        entity: Entity::Match(id),
                        conflict: Conflict::Version {
                            expected,
                            found: m.version,
                        },
                    });
                }
            }

            if m.status == MatchStatus::Scheduled {
                return Err(Error::InvalidTransition {
                    entity: Entity::Match(id),
                    current: m.status.as_str(),
                    expected: "in_progress, finished or forfeit",
                });
            }

            if m.is_bye() {
                return Err(Error::InvalidTransition {
                    entity: Entity::Match(id),
                    current: "bye",
                    expected: "a playable match",
                });
            }

            let previous = m.record();
            clear(&mut m, reason.as_deref());
            previous
        };

        let mut outcome = ResetOutcome {
            reset: vec![handle.lock().clone()],
            removed: Vec::new(),
        };

        let State {
            tournament,
            generator,
        } = &mut *state;
        if let Some(generator) = generator {
            self.cascade(tournament, generator, &mut matches, &previous, &mut outcome)?;
        }

        cell.standings.invalidate();

        let cascaded: Vec<MatchId> = outcome.reset.iter().skip(1).map(|m| m.id).collect();
        for id in &outcome.removed {
            self.store.unindex_match(*id);
            cell.journal.notify(Change::RemoveMatch { id: *id });
        }
        for m in &outcome.reset {
            cell.journal.notify(Change::ResetMatch { id: m.id });
        }

        log::info!(
            "Reset match {} in tournament {} ({} cascaded, {} removed)",
            id,
            cell.id,
            cascaded.len(),
            outcome.removed.len()
        );

        cell.journal.record(
            actor.user,
            self.clock.now(),
            Event::ResetMatch {
                id,
                reason,
                cascaded,
                removed: outcome.removed.clone(),
            },
        );

        Ok(outcome)
    }

    /// Resets every existing match fed by the slot of `previous`.
    fn cascade(
        &self,
        tournament: &mut Tournament,
        generator: &Generator,
        matches: &mut Matches,
        previous: &MatchRecord,
        outcome: &mut ResetOutcome,
    ) -> Result<()> {
        for dependent in generator.dependents(previous.slot) {
            let Some(handle) = matches.by_slot(dependent.slot).cloned() else {
                continue;
            };

            let (id, phase, round) = {
                let m = handle.lock();
                (m.id, m.phase, m.round)
            };

            // A bracket reset only exists because of the grand final result.
            if phase == Phase::BracketReset {
                if matches.remove(id, true).is_some() && !outcome.removed.contains(&id) {
                    log::debug!("Removing bracket reset match {}", id);

                    outcome.removed.push(id);
                    tournament.current_round = tournament.current_round.min(round - 1);
                }

                continue;
            }

            let prior = {
                let mut m = handle.lock();
                let spot = m.entrants[dependent.position];

                if previous.outcome.is_decided() {
                    let expected = dependent
                        .feed
                        .take_from(previous.slot, previous)
                        .map_err(|err| Error::from_core(tournament.id, err))?;

                    if spot != expected {
                        return Err(inconsistent(
                            tournament.id,
                            dependent.slot,
                            format!(
                                "spot {} holds {:?} but slot {} yielded {:?}",
                                dependent.position, spot, previous.slot, expected
                            ),
                        ));
                    }
                } else if !spot.is_tbd() {
                    return Err(inconsistent(
                        tournament.id,
                        dependent.slot,
                        format!(
                            "spot {} is filled although slot {} was never decided",
                            dependent.position, previous.slot
                        ),
                    ));
                } else {
                    continue;
                }

                let prior = m.record();
                m.entrants[dependent.position] = EntrantSpot::TBD;
                if m.status == MatchStatus::Scheduled {
                    m.version += 1;
                } else {
                    clear(&mut m, Some("feeding match was reset"));
                }

                outcome.reset.push(m.clone());
                prior
            };

            if prior.outcome.is_decided() {
                self.cascade(tournament, generator, matches, &prior, outcome)?;
            }
        }

        Ok(())
    }

    /// Decides `m` and fills the spots fed by it.
    #[allow(clippy::too_many_arguments)]
    fn decide(
        &self,
        cell: &TournamentCell,
        state: &State,
        matches: &Matches,
        m: &mut Match,
        outcome: Outcome,
        status: MatchStatus,
        author: UserId,
    ) -> Result<()> {
        m.outcome = outcome;
        m.status = status;
        m.finished_at = Some(self.clock.now());
        m.version += 1;

        log::info!(
            "Match {} in round {} of tournament {} is {} with {:?}",
            m.id,
            m.round,
            cell.id,
            status,
            outcome
        );

        cell.standings.invalidate();
        cell.journal.notify(Change::UpdateMatch(Box::new(m.clone())));

        self.propagate(cell, state, matches, &m.record(), author)
    }

    /// Fills the spots of existing matches fed by the decided `record`. Only reached after a
    /// reset, since new rounds are generated from complete history.
    fn propagate(
        &self,
        cell: &TournamentCell,
        state: &State,
        matches: &Matches,
        record: &MatchRecord,
        author: UserId,
    ) -> Result<()> {
        let Some(generator) = &state.generator else {
            return Ok(());
        };

        for dependent in generator.dependents(record.slot) {
            let Some(handle) = matches.by_slot(dependent.slot) else {
                continue;
            };

            let mut m = handle.lock();
            if m.phase == Phase::BracketReset {
                continue;
            }

            let spot = dependent
                .feed
                .take_from(record.slot, record)
                .map_err(|err| Error::from_core(cell.id, err))?;

            let current = m.entrants[dependent.position];
            if current == spot {
                continue;
            }

            if !current.is_tbd() {
                return Err(inconsistent(
                    cell.id,
                    dependent.slot,
                    format!(
                        "spot {} already holds {:?}, cannot take {:?} from slot {}",
                        dependent.position, current, spot, record.slot
                    ),
                ));
            }

            log::debug!(
                "Filling spot {} of match {} with {:?}",
                dependent.position,
                m.id,
                spot
            );

            m.entrants[dependent.position] = spot;
            m.version += 1;
            cell.journal.notify(Change::UpdateMatch(Box::new(m.clone())));

            if self.settle(cell, &state.tournament, &mut m, author) {
                let record = m.record();
                self.propagate(cell, state, matches, &record, author)?;
            }
        }

        Ok(())
    }

    /// Decides a match that needs no report: byes, matches without any participant and
    /// matches with withdrawn participants. Returns `true` if `m` was decided.
    pub(crate) fn settle(
        &self,
        cell: &TournamentCell,
        tournament: &Tournament,
        m: &mut Match,
        author: UserId,
    ) -> bool {
        if m.status.is_decided() || m.entrants.iter().any(|spot| spot.is_tbd()) {
            return false;
        }

        let (outcome, status) = match m.entrants {
            [EntrantSpot::Entrant(p), EntrantSpot::Empty]
            | [EntrantSpot::Empty, EntrantSpot::Entrant(p)] => {
                (Outcome::Winner(p), MatchStatus::Finished)
            }
            [EntrantSpot::Entrant(a), EntrantSpot::Entrant(b)] => {
                match (tournament.is_withdrawn(a), tournament.is_withdrawn(b)) {
                    (false, false) => return false,
                    (true, true) => (Outcome::NoWinner, MatchStatus::Forfeit),
                    (true, false) => (Outcome::Winner(b), MatchStatus::Forfeit),
                    (false, true) => (Outcome::Winner(a), MatchStatus::Forfeit),
                }
            }
            _ => (Outcome::NoWinner, MatchStatus::Forfeit),
        };

        let now: DateTime<Utc> = self.clock.now();
        m.outcome = outcome;
        m.status = status;
        m.finished_at = Some(now);
        m.version += 1;

        if status == MatchStatus::Forfeit {
            log::info!("Match {} forfeited with {:?}", m.id, outcome);

            cell.journal.record(
                author,
                now,
                Event::Forfeit {
                    id: m.id,
                    participant: None,
                    outcome,
                },
            );
        } else {
            log::debug!("Match {} is a bye for {:?}", m.id, m.winner());
        }

        cell.standings.invalidate();
        cell.journal.notify(Change::UpdateMatch(Box::new(m.clone())));
        true
    }

    /// Withdraws `participant` from a running tournament. Every open match of the participant
    /// is forfeited now, matches generated later are forfeited on creation.
    pub(crate) fn withdraw(
        &self,
        cell: &TournamentCell,
        state: &mut State,
        participant: ParticipantId,
        author: UserId,
    ) -> Result<()> {
        if state.tournament.is_withdrawn(participant) {
            return Ok(());
        }

        log::warn!(
            "Participant {} withdrew from tournament {}",
            participant,
            cell.id
        );

        state.tournament.withdrawn.push(participant);
        cell.journal
            .record(author, self.clock.now(), Event::Withdraw { participant });

        let matches = cell.matches.read();
        let handles: Vec<_> = matches.iter().cloned().collect();
        for handle in handles {
            let record = {
                let mut m = handle.lock();
                if !m.contains(participant) || !self.settle(cell, &state.tournament, &mut m, author) {
                    continue;
                }

                m.record()
            };

            self.propagate(cell, state, &matches, &record, author)?;
        }

        let active = state
            .tournament
            .entrants
            .iter()
            .filter(|p| !state.tournament.is_withdrawn(**p))
            .count();
        if active <= 1 {
            log::info!(
                "Tournament {} has {} active participants left, finishing",
                cell.id,
                active
            );

            drop(matches);
            self.finish(cell, state, author);
        }

        Ok(())
    }
}
