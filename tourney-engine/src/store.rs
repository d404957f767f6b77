//! In-memory storage with per-entity locks.
//!
//! Locks are always taken in the order `state`, `registrations`, `matches`, then individual
//! matches in ascending bracket slot order. The standings cache is a leaf and never held while
//! taking another lock.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tourney_core::{Generator, MatchRecord, Standings};

use crate::error::{Entity, Error, Result};
use crate::event_log::Journal;
use crate::id::{MatchId, TournamentId};
use crate::model::{Match, Registration, Tournament};

#[derive(Debug, Default)]
pub(crate) struct Store {
    tournaments: RwLock<HashMap<TournamentId, Arc<TournamentCell>>>,
    matches: RwLock<HashMap<MatchId, TournamentId>>,
}

impl Store {
    pub fn insert(&self, cell: TournamentCell) -> Result<Arc<TournamentCell>> {
        let id = cell.id;
        let cell = Arc::new(cell);

        let mut tournaments = self.tournaments.write();
        if tournaments.contains_key(&id) {
            return Err(Error::InvalidInput(format!("tournament {} already exists", id)));
        }

        tournaments.insert(id, cell.clone());
        Ok(cell)
    }

    pub fn get(&self, id: TournamentId) -> Result<Arc<TournamentCell>> {
        self.tournaments
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(Entity::Tournament(id)))
    }

    /// Returns all tournaments ordered by id.
    pub fn list(&self) -> Vec<Arc<TournamentCell>> {
        let mut cells: Vec<_> = self.tournaments.read().values().cloned().collect();
        cells.sort_by_key(|cell| cell.id);
        cells
    }

    /// Returns the tournament owning the match `id`.
    pub fn locate(&self, id: MatchId) -> Result<Arc<TournamentCell>> {
        let tournament = self
            .matches
            .read()
            .get(&id)
            .copied()
            .ok_or(Error::NotFound(Entity::Match(id)))?;

        self.get(tournament)
    }

    pub fn index_matches<I>(&self, tournament: TournamentId, ids: I)
    where
        I: IntoIterator<Item = MatchId>,
    {
        let mut matches = self.matches.write();
        for id in ids {
            matches.insert(id, tournament);
        }
    }

    pub fn unindex_match(&self, id: MatchId) {
        self.matches.write().remove(&id);
    }
}

#[derive(Debug)]
pub(crate) struct TournamentCell {
    pub id: TournamentId,
    pub state: RwLock<State>,
    pub registrations: Mutex<Vec<Registration>>,
    pub matches: RwLock<Matches>,
    pub standings: StandingsCache,
    pub journal: Journal,
}

impl TournamentCell {
    pub fn new(tournament: Tournament, journal: Journal) -> Self {
        Self {
            id: tournament.id,
            state: RwLock::new(State {
                tournament,
                generator: None,
            }),
            registrations: Mutex::new(Vec::new()),
            matches: RwLock::new(Matches::default()),
            standings: StandingsCache::default(),
            journal,
        }
    }
}

#[derive(Debug)]
pub(crate) struct State {
    pub tournament: Tournament,
    /// Set once the tournament has started.
    pub generator: Option<Generator>,
}

/// All matches of a tournament in creation order.
#[derive(Debug, Default)]
pub(crate) struct Matches {
    list: Vec<Arc<Mutex<Match>>>,
    by_id: HashMap<MatchId, usize>,
    /// Bracket slots of elimination formats.
    by_slot: HashMap<usize, usize>,
}

impl Matches {
    pub fn push(&mut self, m: Match, bracket: bool) {
        let index = self.list.len();
        self.by_id.insert(m.id, index);
        if bracket {
            self.by_slot.insert(m.slot, index);
        }

        self.list.push(Arc::new(Mutex::new(m)));
    }

    pub fn get(&self, id: MatchId) -> Option<&Arc<Mutex<Match>>> {
        self.by_id.get(&id).map(|index| &self.list[*index])
    }

    pub fn by_slot(&self, slot: usize) -> Option<&Arc<Mutex<Match>>> {
        self.by_slot.get(&slot).map(|index| &self.list[*index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mutex<Match>>> {
        self.list.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Removes the match `id`. Only used when a bracket reset match loses its reason to exist.
    pub fn remove(&mut self, id: MatchId, bracket: bool) -> Option<Match> {
        let index = self.by_id.get(&id).copied()?;
        let m = self.list.remove(index);

        self.by_id.clear();
        self.by_slot.clear();
        for (index, m) in self.list.iter().enumerate() {
            let m = m.lock();
            self.by_id.insert(m.id, index);
            if bracket {
                self.by_slot.insert(m.slot, index);
            }
        }

        let m = m.lock().clone();
        Some(m)
    }

    /// Returns copies of all matches.
    pub fn snapshot(&self) -> Vec<Match> {
        self.list.iter().map(|m| m.lock().clone()).collect()
    }

    /// Returns the match history as seen by the pairing generators.
    pub fn history(&self) -> Vec<MatchRecord> {
        self.list.iter().map(|m| m.lock().record()).collect()
    }
}

/// Cached standings, dropped whenever a result changes.
#[derive(Debug, Default)]
pub(crate) struct StandingsCache {
    inner: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    revision: u64,
    standings: Option<Arc<Standings>>,
}

impl StandingsCache {
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        inner.revision += 1;
        inner.standings = None;
    }

    /// Returns the cached standings or computes them with `f`. A result computed while the
    /// cache was invalidated is returned but not stored.
    pub fn get_or_compute<F>(&self, f: F) -> Arc<Standings>
    where
        F: FnOnce() -> Standings,
    {
        let revision = {
            let inner = self.inner.lock();
            if let Some(standings) = &inner.standings {
                return standings.clone();
            }

            inner.revision
        };

        let standings = Arc::new(f());

        let mut inner = self.inner.lock();
        if inner.revision == revision {
            inner.standings = Some(standings.clone());
        }

        standings
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tourney_core::Standings;

    use super::StandingsCache;

    #[test]
    fn test_standings_cache() {
        let cache = StandingsCache::default();
        let calls = Cell::new(0);

        let compute = || {
            calls.set(calls.get() + 1);
            Standings::default()
        };

        cache.get_or_compute(compute);
        cache.get_or_compute(compute);
        assert_eq!(calls.get(), 1);

        cache.invalidate();
        cache.get_or_compute(compute);
        assert_eq!(calls.get(), 2);
    }
}
