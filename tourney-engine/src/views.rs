//! Read-side projections of a tournament.
//!
//! Views never mutate results. They only ever hold one match lock at a time.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tourney_core::bracket::Bracket;
use tourney_core::{Format, Generator, NewRound, Pairing, ParticipantId, Phase, Standings, System};

use crate::error::{Entity, Error, Result};
use crate::event_log::{Change, Journal, LogEntry};
use crate::id::{MatchId, TournamentId};
use crate::model::{Match, MatchStatus, Registration, Tournament, TournamentStatus};
use crate::registration::eligible;
use crate::store::TournamentCell;
use crate::Engine;

/// All matches of an elimination or round based tournament grouped by round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BracketView {
    pub tournament: TournamentId,
    pub format: Format,
    pub current_round: u32,
    pub total_rounds: u32,
    pub rounds: Vec<RoundView>,
    /// The slot layout of elimination formats.
    pub layout: Option<Bracket>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoundView {
    pub round: u32,
    pub matches: Vec<Match>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub status: TournamentStatus,
    /// Generated matches that have to be played, byes excluded.
    pub total_matches: usize,
    pub completed_matches: usize,
    pub percentage: f64,
    pub current_round: u32,
    pub total_rounds: u32,
    /// Participants still in the tournament. Before the start, the participants that would
    /// be seeded.
    pub active_players: usize,
    pub eliminated_players: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub round: Option<u32>,
    pub phase: Option<Phase>,
    pub status: Option<MatchStatus>,
    pub participant: Option<ParticipantId>,
}

impl MatchFilter {
    fn accepts(&self, m: &Match) -> bool {
        self.round.map_or(true, |round| m.round == round)
            && self.phase.map_or(true, |phase| m.phase == phase)
            && self.status.map_or(true, |status| m.status == status)
            && self.participant.map_or(true, |id| m.contains(id))
    }
}

/// The complete state of a single tournament.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    pub tournament: Tournament,
    pub registrations: Vec<Registration>,
    pub matches: Vec<Match>,
    pub log: Vec<LogEntry>,
}

impl TournamentSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::InvalidInput(err.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|err| Error::InvalidInput(err.to_string()))
    }
}

impl Engine {
    pub fn get_tournament(&self, id: TournamentId) -> Result<Tournament> {
        let cell = self.store.get(id)?;
        self.close_expired(&cell);

        let tournament = cell.state.read().tournament.clone();
        Ok(tournament)
    }

    pub fn list_tournaments(&self) -> Vec<Tournament> {
        self.store
            .list()
            .iter()
            .map(|cell| {
                self.close_expired(cell);
                cell.state.read().tournament.clone()
            })
            .collect()
    }

    pub fn get_bracket(&self, id: TournamentId) -> Result<BracketView> {
        let cell = self.store.get(id)?;
        let state = cell.state.read();
        let matches = cell.matches.read().snapshot();

        let mut rounds: Vec<RoundView> = Vec::new();
        for m in matches {
            match rounds.iter_mut().find(|r| r.round == m.round) {
                Some(round) => round.matches.push(m),
                None => rounds.push(RoundView {
                    round: m.round,
                    matches: vec![m],
                }),
            }
        }

        rounds.sort_by_key(|r| r.round);
        for round in &mut rounds {
            round.matches.sort_by_key(|m| m.slot);
        }

        Ok(BracketView {
            tournament: id,
            format: state.tournament.format,
            current_round: state.tournament.current_round,
            total_rounds: state.tournament.total_rounds,
            rounds,
            layout: state
                .generator
                .as_ref()
                .and_then(|generator| generator.bracket().cloned()),
        })
    }

    /// Returns the pairings of `round`. Round robin rounds are known before they are played,
    /// Swiss rounds only once generated.
    pub fn get_pairings(&self, id: TournamentId, round: u32) -> Result<NewRound> {
        let cell = self.store.get(id)?;
        let state = cell.state.read();

        let format = state.tournament.format;
        if format.is_elimination() {
            return Err(Error::Unsupported {
                operation: "get_pairings",
                format,
            });
        }

        let mut pairings: Vec<Pairing> = cell
            .matches
            .read()
            .snapshot()
            .into_iter()
            .filter(|m| m.round == round)
            .map(|m| Pairing {
                phase: m.phase,
                slot: m.slot,
                entrants: m.entrants,
            })
            .collect();

        if pairings.is_empty() {
            let scheduled = state
                .generator
                .as_ref()
                .and_then(Generator::schedule)
                .and_then(|schedule| schedule.into_iter().find(|r| r.round == round));

            return scheduled.ok_or(Error::NotFound(Entity::Round(id, round)));
        }

        pairings.sort_by_key(|p| p.slot);
        Ok(NewRound { round, pairings })
    }

    /// Returns the current standings. Empty until the tournament starts.
    pub fn get_rankings(&self, id: TournamentId) -> Result<Arc<Standings>> {
        let cell = self.store.get(id)?;
        let state = cell.state.read();

        let Some(generator) = &state.generator else {
            return Ok(Arc::new(Standings::default()));
        };

        let matches = cell.matches.read();
        Ok(cell
            .standings
            .get_or_compute(|| generator.standings(&matches.history())))
    }

    pub fn get_progress(&self, id: TournamentId) -> Result<Progress> {
        let cell = self.store.get(id)?;
        let state = cell.state.read();
        let tournament = &state.tournament;

        let (active_players, eliminated_players) = match &state.generator {
            Some(generator) => {
                let matches = cell.matches.read();
                let standings = cell
                    .standings
                    .get_or_compute(|| generator.standings(&matches.history()));

                let eliminated = standings
                    .iter()
                    .filter(|r| r.eliminated_in.is_some())
                    .count();
                let active = standings
                    .iter()
                    .filter(|r| {
                        r.eliminated_in.is_none() && !tournament.is_withdrawn(r.participant)
                    })
                    .count();

                (active, eliminated)
            }
            None => (eligible(tournament, &cell.registrations.lock()).len(), 0),
        };

        let matches = cell.matches.read().snapshot();

        let playable = matches.iter().filter(|m| !m.is_bye());
        let total_matches = playable.clone().count();
        let completed_matches = playable.filter(|m| m.status.is_decided()).count();

        let percentage = if total_matches == 0 {
            0.0
        } else {
            completed_matches as f64 * 100.0 / total_matches as f64
        };

        Ok(Progress {
            status: tournament.status,
            total_matches,
            completed_matches,
            percentage,
            current_round: tournament.current_round,
            total_rounds: tournament.total_rounds,
            active_players,
            eliminated_players,
        })
    }

    /// Returns the matches accepted by `filter` ordered by round and slot.
    pub fn matches(&self, id: TournamentId, filter: &MatchFilter) -> Result<Vec<Match>> {
        let cell = self.store.get(id)?;

        let mut list: Vec<Match> = cell
            .matches
            .read()
            .snapshot()
            .into_iter()
            .filter(|m| filter.accepts(m))
            .collect();

        list.sort_by_key(|m| (m.round, m.slot));
        Ok(list)
    }

    pub fn matches_by_round(&self, id: TournamentId, round: u32) -> Result<Vec<Match>> {
        self.matches(
            id,
            &MatchFilter {
                round: Some(round),
                ..Default::default()
            },
        )
    }

    pub fn player_matches(&self, id: TournamentId, participant: ParticipantId) -> Result<Vec<Match>> {
        self.matches(
            id,
            &MatchFilter {
                participant: Some(participant),
                ..Default::default()
            },
        )
    }

    /// Returns the audit log of the tournament, oldest entry first.
    pub fn log(&self, id: TournamentId) -> Result<Vec<LogEntry>> {
        let cell = self.store.get(id)?;
        Ok(cell.journal.entries())
    }

    /// Subscribes to live changes of the tournament.
    pub fn subscribe(&self, id: TournamentId) -> Result<broadcast::Receiver<Change>> {
        let cell = self.store.get(id)?;
        Ok(cell.journal.subscribe())
    }

    pub fn snapshot(&self, id: TournamentId) -> Result<TournamentSnapshot> {
        let cell = self.store.get(id)?;

        let state = cell.state.read();
        let registrations = cell.registrations.lock().clone();
        let matches = cell.matches.read().snapshot();

        Ok(TournamentSnapshot {
            tournament: state.tournament.clone(),
            registrations,
            matches,
            log: cell.journal.entries(),
        })
    }

    /// Loads a tournament from a snapshot. Generators are deterministic, so a started
    /// tournament continues exactly where the snapshot was taken.
    pub fn restore(&self, snapshot: TournamentSnapshot) -> Result<Tournament> {
        let TournamentSnapshot {
            tournament,
            registrations,
            matches,
            log,
        } = snapshot;
        let id = tournament.id;

        if let Some(m) = matches.iter().find(|m| m.tournament != id) {
            return Err(Error::InvalidInput(format!(
                "match {} belongs to tournament {}, not {}",
                m.id, m.tournament, id
            )));
        }

        let generator = match tournament.started_at {
            Some(_) => Some(
                Generator::new(
                    tournament.format,
                    tournament.entrants.clone(),
                    tournament.options.clone(),
                )
                .map_err(|err| Error::from_core(id, err))?,
            ),
            None => None,
        };
        let bracket = generator
            .as_ref()
            .map_or(false, |generator| generator.bracket().is_some());

        let mut cell = TournamentCell::new(
            tournament.clone(),
            Journal::with_entries(self.config.events.capacity, log),
        );
        cell.state.get_mut().generator = generator;
        *cell.registrations.get_mut() = registrations;

        let mut ids: Vec<MatchId> = Vec::with_capacity(matches.len());
        let list = cell.matches.get_mut();
        for m in matches {
            ids.push(m.id);
            list.push(m, bracket);
        }

        self.store.insert(cell)?;
        self.store.index_matches(id, ids);

        log::info!("Restored tournament {} in status {}", id, tournament.status);
        Ok(tournament)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tourney_core::{EntrantSpot, Outcome, ParticipantId, Phase};

    use super::MatchFilter;
    use crate::id::{MatchId, TournamentId};
    use crate::model::{Match, MatchStatus};

    #[test]
    fn test_match_filter() {
        let m = Match {
            id: MatchId(1),
            tournament: TournamentId(1),
            round: 2,
            phase: Phase::Main,
            slot: 0,
            entrants: [
                EntrantSpot::Entrant(ParticipantId(1)),
                EntrantSpot::Entrant(ParticipantId(2)),
            ],
            scores: [0, 0],
            status: MatchStatus::Scheduled,
            outcome: Outcome::Pending,
            version: 0,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            notes: None,
        };

        assert!(MatchFilter::default().accepts(&m));
        assert!(MatchFilter {
            round: Some(2),
            participant: Some(ParticipantId(2)),
            ..Default::default()
        }
        .accepts(&m));
        assert!(!MatchFilter {
            round: Some(1),
            ..Default::default()
        }
        .accepts(&m));
        assert!(!MatchFilter {
            status: Some(MatchStatus::Finished),
            ..Default::default()
        }
        .accepts(&m));
        assert!(!MatchFilter {
            participant: Some(ParticipantId(3)),
            ..Default::default()
        }
        .accepts(&m));
    }
}
