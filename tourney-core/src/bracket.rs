//! # Bracket slots
//!
//! Elimination formats are modeled as an arena of integer-indexed [`Slot`]s. Every slot knows
//! where its two entrants come from (a seed, a bye, or the winner/loser of another slot) and
//! in which round it is played. All structural questions, like "which match is fed by this
//! one", become index lookups on the arena instead of pointer traversal.
//!
//! A slot only turns into a [`MatchRecord`] once its round is generated. A slot whose feeds
//! are both permanently empty is *void* and never produces a record.
use std::collections::HashMap;

use crate::{
    EntrantSpot, Entrants, Error, MatchRecord, NewRound, Outcome, Pairing, ParticipantId, Phase,
    Result, RoundOutcome,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where an entrant of a [`Slot`] comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Feed {
    /// The entrant at the given position of the pool.
    Seed(usize),
    /// Bracket padding. The spot stays empty forever.
    Bye,
    Winner(usize),
    Loser(usize),
}

impl Feed {
    /// Returns the slot this feed is taken from.
    #[inline]
    pub fn source(self) -> Option<usize> {
        match self {
            Self::Winner(slot) | Self::Loser(slot) => Some(slot),
            _ => None,
        }
    }

    /// Resolves the spot this feed yields from the decided record of its source slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndecidedMatch`] if `record` is not decided and
    /// [`Error::InconsistentBracket`] if `record` ended in a way a bracket does not allow.
    pub fn take_from(self, slot: usize, record: &MatchRecord) -> Result<EntrantSpot<ParticipantId>> {
        match record.outcome {
            Outcome::Pending => Err(Error::UndecidedMatch {
                round: record.round,
                slot,
            }),
            Outcome::NoWinner => Ok(EntrantSpot::Empty),
            Outcome::Draw => Err(Error::InconsistentBracket {
                slot,
                reason: String::from("bracket match ended in a draw"),
            }),
            Outcome::Winner(winner) => match self {
                Self::Winner(_) => Ok(EntrantSpot::Entrant(winner)),
                Self::Loser(_) => record.loser().ok_or_else(|| Error::InconsistentBracket {
                    slot,
                    reason: format!("winner {} is not part of the match", winner),
                }),
                Self::Seed(_) | Self::Bye => Err(Error::InconsistentBracket {
                    slot,
                    reason: String::from("feed does not take from a match"),
                }),
            },
        }
    }
}

/// A single match position in the bracket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Slot {
    pub phase: Phase,
    pub round: u32,
    pub feeds: [Feed; 2],
}

/// A spot of a slot that is fed by another slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dependent {
    pub slot: usize,
    /// The index of the spot within the dependent slot.
    pub position: usize,
    pub feed: Feed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bracket {
    slots: Vec<Slot>,
}

impl Bracket {
    #[inline]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Appends a new slot and returns its index.
    pub(crate) fn push(&mut self, phase: Phase, round: u32, feeds: [Feed; 2]) -> usize {
        self.slots.push(Slot {
            phase,
            round,
            feeds,
        });

        self.slots.len() - 1
    }

    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[inline]
    pub fn get(&self, slot: usize) -> Option<&Slot> {
        self.slots.get(slot)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of rounds of the bracket.
    pub fn rounds(&self) -> u32 {
        self.slots.iter().map(|slot| slot.round).max().unwrap_or(0)
    }

    /// Returns the indices of all slots played in `round`.
    pub fn round(&self, round: u32) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, slot)| slot.round == round)
            .map(|(index, _)| index)
    }

    /// Returns every spot that takes the winner or loser of `slot`.
    pub fn dependents(&self, slot: usize) -> Vec<Dependent> {
        let mut dependents = Vec::new();

        for (index, other) in self.slots.iter().enumerate() {
            for (position, feed) in other.feeds.iter().enumerate() {
                if feed.source() == Some(slot) {
                    dependents.push(Dependent {
                        slot: index,
                        position,
                        feed: *feed,
                    });
                }
            }
        }

        dependents
    }

    /// Resolves the spot a `feed` yields given the current match history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndecidedMatch`] if the feeding slot is not decided yet.
    pub fn resolve(
        &self,
        feed: Feed,
        entrants: &Entrants,
        records: &HashMap<usize, &MatchRecord>,
    ) -> Result<EntrantSpot<ParticipantId>> {
        match feed {
            Feed::Seed(index) => match entrants.get(index) {
                Some(id) => Ok(EntrantSpot::Entrant(*id)),
                None => Err(Error::InvalidEntrant {
                    index,
                    length: entrants.len(),
                }),
            },
            Feed::Bye => Ok(EntrantSpot::Empty),
            Feed::Winner(slot) | Feed::Loser(slot) => match records.get(&slot) {
                Some(record) => feed.take_from(slot, record),
                None if self.is_void(slot, entrants, records) => Ok(EntrantSpot::Empty),
                None => Err(Error::UndecidedMatch {
                    round: self.slots.get(slot).map(|s| s.round).unwrap_or(0),
                    slot,
                }),
            },
        }
    }

    /// Returns `true` if both feeds of `slot` are permanently empty.
    fn is_void(&self, slot: usize, entrants: &Entrants, records: &HashMap<usize, &MatchRecord>) -> bool {
        match self.slots.get(slot) {
            Some(s) => s.feeds.iter().all(|feed| {
                matches!(self.resolve(*feed, entrants, records), Ok(EntrantSpot::Empty))
            }),
            None => false,
        }
    }

    /// Returns the pairings of all non-void slots in `round`.
    pub fn pairings(
        &self,
        round: u32,
        entrants: &Entrants,
        records: &HashMap<usize, &MatchRecord>,
    ) -> Result<Vec<Pairing>> {
        let mut pairings = Vec::new();

        for index in self.round(round) {
            let slot = &self.slots[index];

            let a = self.resolve(slot.feeds[0], entrants, records)?;
            let b = self.resolve(slot.feeds[1], entrants, records)?;

            if a.is_empty() && b.is_empty() {
                log::debug!("Slot {} in round {} is void", index, round);
                continue;
            }

            pairings.push(Pairing {
                phase: slot.phase,
                slot: index,
                entrants: [a, b],
            });
        }

        Ok(pairings)
    }

    /// Generates the first round after `current` that contains at least one pairing, up to and
    /// including `last`.
    pub fn next_round(
        &self,
        current: u32,
        last: u32,
        entrants: &Entrants,
        history: &[MatchRecord],
    ) -> Result<RoundOutcome> {
        let records = index_by_slot(history);

        let mut round = current + 1;
        while round <= last {
            let pairings = self.pairings(round, entrants, &records)?;
            if !pairings.is_empty() {
                return Ok(RoundOutcome::Round(NewRound { round, pairings }));
            }

            round += 1;
        }

        Ok(RoundOutcome::Terminal)
    }
}

/// Indexes the records of a bracket by their slot.
pub fn index_by_slot(history: &[MatchRecord]) -> HashMap<usize, &MatchRecord> {
    history.iter().map(|record| (record.slot, record)).collect()
}
