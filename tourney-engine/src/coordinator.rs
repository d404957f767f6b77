//! Round advancement.
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tourney_core::{
    EntrantSpot, Generator, NewRound, Outcome, ParticipantId, RoundOutcome, Seeding, Standings,
    System,
};

use crate::error::{Conflict, Entity, Error, Result};
use crate::event_log::{Change, Event};
use crate::id::{MatchId, TournamentId, UserId};
use crate::model::{Actor, Match, MatchStatus, TournamentStatus};
use crate::store::{Matches, State, TournamentCell};
use crate::Engine;

/// The result of [`Engine::advance_round`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Advance {
    Round(RoundSummary),
    /// No rounds are left and the tournament is finished.
    Finished { standings: Arc<Standings> },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub new_round: u32,
    pub matches_created: usize,
    /// Participants booked in the new round, including byes.
    pub players_advanced: usize,
    /// Participants eliminated in the round that just completed.
    pub players_eliminated: usize,
}

impl Engine {
    /// Generates the next round once every match is decided, or finishes the tournament if
    /// the format has no rounds left.
    ///
    /// If `expected_round` is given, the call only succeeds if the tournament is still in
    /// that round.
    pub fn advance_round(
        &self,
        actor: &Actor,
        id: TournamentId,
        expected_round: Option<u32>,
    ) -> Result<Advance> {
        let cell = self.store.get(id)?;
        let mut state = cell.state.write();

        if !self.permissions.can_manage_tournament(actor, &state.tournament) {
            return Err(Self::forbidden(actor, "advance rounds", Entity::Tournament(id)));
        }

        if state.tournament.status != TournamentStatus::InProgress {
            return Err(Error::InvalidTransition {
                entity: Entity::Tournament(id),
                current: state.tournament.status.as_str(),
                expected: "in_progress",
            });
        }

        let current = state.tournament.current_round;
        if let Some(expected) = expected_round {
            if expected != current {
                log::warn!(
                    "Rejecting round advance of tournament {}: round {} expected, found {}",
                    id,
                    expected,
                    current
                );

                return Err(Error::ConcurrentModification {
                    entity: Entity::Round(id, expected),
                    conflict: Conflict::Version {
                        expected: u64::from(expected),
                        found: u64::from(current),
                    },
                });
            }
        }

        let mut matches = cell.matches.write();
        let history = matches.history();

        let pending = history.iter().filter(|r| !r.outcome.is_decided()).count();
        if pending > 0 {
            log::debug!(
                "Round {} of tournament {} has {} pending matches",
                current,
                id,
                pending
            );

            return Err(Error::RoundNotComplete {
                tournament: id,
                round: current,
                pending,
            });
        }

        let Some(generator) = &state.generator else {
            return Err(Error::InvalidTransition {
                entity: Entity::Tournament(id),
                current: "not started",
                expected: "a started tournament",
            });
        };

        let eliminated = generator
            .standings(&history)
            .iter()
            .filter(|r| r.eliminated_in == Some(current))
            .count();

        let outcome = generator
            .generate_round(&history, current)
            .map_err(|err| Error::from_core(id, err))?;

        Ok(self.apply_round(&cell, &mut state, &mut matches, outcome, eliminated, actor.user))
    }

    /// Starts the tournament with the final participant pool and generates the first round.
    pub(crate) fn start(
        &self,
        cell: &TournamentCell,
        state: &mut State,
        matches: &mut Matches,
        entrants: Vec<ParticipantId>,
        author: UserId,
    ) -> Result<()> {
        let tournament = &state.tournament;
        let entrants = Seeding::from_values(&tournament.options)
            .map_err(|err| Error::from_core(tournament.id, err.into()))?
            .apply(entrants);

        let generator = Generator::new(tournament.format, entrants.clone(), tournament.options.clone())
            .map_err(|err| Error::from_core(tournament.id, err))?;
        let outcome = generator
            .generate_round(&[], 0)
            .map_err(|err| Error::from_core(tournament.id, err))?;

        log::info!(
            "Starting tournament {} with {} participants over at most {} rounds",
            tournament.id,
            entrants.len(),
            generator.total_rounds()
        );

        state.tournament.entrants = entrants;
        state.tournament.current_round = 0;
        state.tournament.total_rounds = generator.total_rounds();
        state.generator = Some(generator);

        self.set_status(cell, &mut state.tournament, TournamentStatus::InProgress, author, None);
        self.apply_round(cell, state, matches, outcome, 0, author);
        Ok(())
    }

    pub(crate) fn finish(&self, cell: &TournamentCell, state: &mut State, author: UserId) {
        self.set_status(cell, &mut state.tournament, TournamentStatus::Finished, author, None);
        cell.standings.invalidate();
    }

    fn apply_round(
        &self,
        cell: &TournamentCell,
        state: &mut State,
        matches: &mut Matches,
        outcome: RoundOutcome,
        eliminated: usize,
        author: UserId,
    ) -> Advance {
        let new = match outcome {
            RoundOutcome::Round(new) => new,
            RoundOutcome::Terminal => {
                self.finish(cell, state, author);

                let history = matches.history();
                let standings = match &state.generator {
                    Some(generator) => cell
                        .standings
                        .get_or_compute(|| generator.standings(&history)),
                    None => Arc::new(Standings::default()),
                };

                if let Some(first) = standings.first() {
                    log::info!(
                        "Tournament {} finished, winner is {}",
                        cell.id,
                        first.participant
                    );
                }

                return Advance::Finished { standings };
            }
        };

        let summary = RoundSummary {
            new_round: new.round,
            matches_created: new.pairings.len(),
            players_advanced: booked(&new),
            players_eliminated: eliminated,
        };

        let bracket = state
            .generator
            .as_ref()
            .map_or(false, |generator| generator.bracket().is_some());
        let now = self.clock.now();

        let mut ids: Vec<MatchId> = Vec::with_capacity(new.pairings.len());
        for pairing in new.pairings {
            let mut m = Match {
                id: MatchId::generate(),
                tournament: cell.id,
                round: new.round,
                phase: pairing.phase,
                slot: pairing.slot,
                entrants: pairing.entrants,
                scores: [0, 0],
                status: MatchStatus::Scheduled,
                outcome: Outcome::Pending,
                version: 0,
                scheduled_at: now,
                started_at: None,
                finished_at: None,
                notes: None,
            };

            self.settle(cell, &state.tournament, &mut m, author);

            ids.push(m.id);
            matches.push(m, bracket);
        }

        self.store.index_matches(cell.id, ids);
        state.tournament.current_round = new.round;
        cell.standings.invalidate();

        log::info!(
            "Tournament {} advanced to round {} with {} matches",
            cell.id,
            new.round,
            summary.matches_created
        );

        cell.journal.record(
            author,
            now,
            Event::NewRound {
                round: new.round,
                matches: summary.matches_created,
            },
        );
        cell.journal.notify(Change::Round {
            tournament: cell.id,
            round: new.round,
        });

        Advance::Round(summary)
    }
}

/// Returns the number of distinct participants booked in `round`.
fn booked(round: &NewRound) -> usize {
    round
        .pairings
        .iter()
        .flat_map(|pairing| pairing.entrants.iter())
        .filter_map(|spot| match spot {
            EntrantSpot::Entrant(id) => Some(*id),
            _ => None,
        })
        .collect::<HashSet<_>>()
        .len()
}
