//! # tourney-core
//!
//! This crate contains the pure parts of a tournament: the pairing generators for every
//! supported [`Format`] and the standings calculation. Nothing in here locks, performs I/O or
//! reads a clock; given the same inputs every function returns the same output.
//!
//! Important types:
//! - [`System`]: A trait implemented by every pairing generator.
//! - [`Generator`]: The [`System`] selected by a [`Format`] at runtime.
//! - [`Entrants`]: The ordered participant pool of a tournament. The position in the pool is
//! the seed.
//! - [`MatchRecord`]: A match as seen by the generators: round, bracket slot, the two spots and
//! the outcome.
//! - [`EntrantSpot`]: A *spot* within a match, which can contain an entrant, be permanently empty
//! (a bye) or contain a to-be-done spot.
//! - [`Standings`]: The ranking derived from a match history.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to almost all types.
//!
pub mod bracket;
pub mod options;
pub mod seeding;
pub mod standings;
pub mod system;

mod double_elimination;
mod round_robin;
mod single_elimination;
mod swiss;
mod utils;

pub use double_elimination::DoubleElimination;
pub use round_robin::RoundRobin;
pub use seeding::Seeding;
pub use single_elimination::SingleElimination;
pub use standings::{Ranking, Scoring, Standings};
pub use swiss::Swiss;
pub use system::{Generator, System};

use thiserror::Error;

use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::result;
use std::str::FromStr;
use std::vec::IntoIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The identifier of a participant. Participants are users; the engine converts its user ids
/// into `ParticipantId`s when registering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ParticipantId(pub u64);

impl Display for ParticipantId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for ParticipantId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The ordered participant pool of a tournament.
///
/// The index of a participant is its seed: `0` is the first registered participant. The pool
/// is fixed when the tournament starts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Entrants {
    entrants: Vec<ParticipantId>,
}

impl Entrants {
    /// Creates a new empty `Entrants` list.
    #[inline]
    pub fn new() -> Self {
        Self {
            entrants: Vec::new(),
        }
    }

    /// Returns the seed (position in the pool) of `participant`.
    pub fn seed_of(&self, participant: ParticipantId) -> Option<usize> {
        self.entrants.iter().position(|p| *p == participant)
    }
}

impl FromIterator<ParticipantId> for Entrants {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        let entrants = iter.into_iter().collect();

        Self { entrants }
    }
}

impl IntoIterator for Entrants {
    type Item = ParticipantId;
    type IntoIter = IntoIter<ParticipantId>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.entrants.into_iter()
    }
}

impl Deref for Entrants {
    type Target = [ParticipantId];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.entrants
    }
}

impl From<Vec<ParticipantId>> for Entrants {
    #[inline]
    fn from(entrants: Vec<ParticipantId>) -> Self {
        Self { entrants }
    }
}

/// The pairing format of a tournament.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Format {
    SingleElimination,
    DoubleElimination,
    #[cfg_attr(feature = "serde", serde(rename = "swiss_system"))]
    Swiss,
    RoundRobin,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Self::SingleElimination,
        Self::DoubleElimination,
        Self::Swiss,
        Self::RoundRobin,
    ];

    /// Returns `true` if a match of this format may end in a draw.
    #[inline]
    pub fn allows_draws(self) -> bool {
        matches!(self, Self::Swiss | Self::RoundRobin)
    }

    /// Returns `true` if participants of this format are eliminated and ranked by elimination
    /// depth instead of points.
    #[inline]
    pub fn is_elimination(self) -> bool {
        matches!(self, Self::SingleElimination | Self::DoubleElimination)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleElimination => "single_elimination",
            Self::DoubleElimination => "double_elimination",
            Self::Swiss => "swiss_system",
            Self::RoundRobin => "round_robin",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s {
            "single_elimination" => Ok(Self::SingleElimination),
            "double_elimination" => Ok(Self::DoubleElimination),
            "swiss_system" | "swiss" => Ok(Self::Swiss),
            "round_robin" => Ok(Self::RoundRobin),
            _ => Err(Error::UnknownFormat(s.to_owned())),
        }
    }
}

/// The part of a bracket a match belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Any match of a format without separate brackets.
    Main,
    Winners,
    Losers,
    GrandFinal,
    BracketReset,
    ThirdPlace,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Winners => "winners",
            Self::Losers => "losers",
            Self::GrandFinal => "grand_final",
            Self::BracketReset => "bracket_reset",
            Self::ThirdPlace => "third_place",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spot for an Entrant in the bracket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntrantSpot<T> {
    Entrant(T),
    /// The spot will never be filled. A match with an `Empty` spot is a bye.
    Empty,
    /// The spot is filled once the feeding match is decided.
    TBD,
}

impl<T> EntrantSpot<T> {
    /// Creates a new `EntrantSpot` from an [`Option`]. A `Some(T)` value will translate into
    /// a `Entrant(T)` value, a `None` value will translate into a `Empty` value.
    pub fn new(entrant: Option<T>) -> Self {
        match entrant {
            Some(entrant) => Self::Entrant(entrant),
            None => Self::Empty,
        }
    }

    /// Returns `true` if the `EntrantSpot` is [`Entrant`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use tourney_core::EntrantSpot;
    /// let spot = EntrantSpot::Entrant(());
    /// assert!(spot.is_entrant());
    /// ```
    /// [`Entrant`]: Self::Entrant
    pub fn is_entrant(&self) -> bool {
        matches!(self, Self::Entrant(_))
    }

    /// Returns `true` if the `EntrantSpot` is [`Empty`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use tourney_core::EntrantSpot;
    /// let spot: EntrantSpot<()> = EntrantSpot::Empty;
    /// assert!(spot.is_empty());
    /// ```
    ///
    /// [`Empty`]: Self::Empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if the `EntrantSpot` is [`TBD`].
    ///
    /// [`TBD`]: Self::TBD
    pub fn is_tbd(&self) -> bool {
        matches!(self, Self::TBD)
    }

    /// Converts from `&EntrantSpot<T>` to `EntrantSpot<&T>`.
    pub fn as_ref(&self) -> EntrantSpot<&T> {
        match self {
            Self::Entrant(entrant) => EntrantSpot::Entrant(entrant),
            Self::Empty => EntrantSpot::Empty,
            Self::TBD => EntrantSpot::TBD,
        }
    }

    /// Returns the contained entrant, or `None` for an `Empty` or `TBD` spot.
    pub fn entrant(self) -> Option<T> {
        match self {
            Self::Entrant(entrant) => Some(entrant),
            _ => None,
        }
    }
}

impl<T> Default for EntrantSpot<T> {
    #[inline]
    fn default() -> Self {
        Self::TBD
    }
}

/// How a match was decided.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Outcome {
    /// The match has not been decided.
    Pending,
    Winner(ParticipantId),
    Draw,
    /// Both participants forfeited; nobody advances.
    NoWinner,
}

impl Outcome {
    #[inline]
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A match as consumed by the generators and the standings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchRecord {
    pub round: u32,
    pub phase: Phase,
    /// The bracket slot for elimination formats, the table number otherwise.
    pub slot: usize,
    pub entrants: [EntrantSpot<ParticipantId>; 2],
    pub outcome: Outcome,
}

impl MatchRecord {
    /// Returns `true` if exactly one of the spots is [`EntrantSpot::Empty`].
    pub fn is_bye(&self) -> bool {
        self.entrants[0].is_empty() != self.entrants[1].is_empty()
    }

    /// Returns the winner if the match was won by a participant.
    pub fn winner(&self) -> Option<ParticipantId> {
        match self.outcome {
            Outcome::Winner(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the losing spot of a decided match. A bye has an `Empty` loser, a match without
    /// a winner has no loser spot.
    pub fn loser(&self) -> Option<EntrantSpot<ParticipantId>> {
        let winner = self.winner()?;

        match self.entrants {
            [EntrantSpot::Entrant(a), other] if a == winner => Some(other),
            [other, EntrantSpot::Entrant(b)] if b == winner => Some(other),
            _ => None,
        }
    }

    /// Returns the participants playing in this match.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.entrants.iter().filter_map(|spot| spot.entrant())
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.participants().any(|p| p == participant)
    }

    /// Returns the opponent of `participant` if both spots are filled.
    pub fn opponent(&self, participant: ParticipantId) -> Option<ParticipantId> {
        match self.entrants {
            [EntrantSpot::Entrant(a), EntrantSpot::Entrant(b)] if a == participant => Some(b),
            [EntrantSpot::Entrant(a), EntrantSpot::Entrant(b)] if b == participant => Some(a),
            _ => None,
        }
    }
}

/// A new match produced by a generator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pairing {
    pub phase: Phase,
    pub slot: usize,
    pub entrants: [EntrantSpot<ParticipantId>; 2],
}

impl Pairing {
    /// Returns the participant receiving a bye, if this pairing is one.
    pub fn bye(&self) -> Option<ParticipantId> {
        match self.entrants {
            [EntrantSpot::Entrant(p), EntrantSpot::Empty]
            | [EntrantSpot::Empty, EntrantSpot::Entrant(p)] => Some(p),
            _ => None,
        }
    }
}

/// All pairings of a freshly generated round.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewRound {
    pub round: u32,
    pub pairings: Vec<Pairing>,
}

/// The result of asking a generator for the next round.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoundOutcome {
    Round(NewRound),
    /// The format has no more rounds to play.
    Terminal,
}

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("match in round {round} at slot {slot} is not decided")]
    UndecidedMatch { round: u32, slot: usize },
    #[error("inconsistent bracket at slot {slot}: {reason}")]
    InconsistentBracket { slot: usize, reason: String },
    #[error(
        "invalid entrant: match refers to entrant at {index} but only {length} entrants are given"
    )]
    InvalidEntrant { index: usize, length: usize },
    #[error("{0} does not allow draws")]
    DrawNotAllowed(Format),
    #[error("unknown format {0}")]
    UnknownFormat(String),
    #[error(transparent)]
    Options(#[from] options::Error),
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{EntrantSpot, MatchRecord, Outcome, ParticipantId, Phase};

    #[macro_export]
    macro_rules! entrants {
        ($($x:expr),*$(,)?) => {
            $crate::Entrants::from(vec![$($crate::ParticipantId($x)),*])
        };
    }

    #[macro_export]
    macro_rules! option_values {
        ($($key:expr => $val:expr),*$(,)?) => {{
            #[allow(unused_mut)]
            let mut options = $crate::options::TournamentOptionValues::default();
            $(
                options.set($key, $val);
            )*

            options
        }};
    }

    pub(crate) fn decided(a: u64, b: u64, winner: Option<u64>) -> MatchRecord {
        MatchRecord {
            round: 1,
            phase: Phase::Main,
            slot: 0,
            entrants: [
                EntrantSpot::Entrant(ParticipantId(a)),
                EntrantSpot::Entrant(ParticipantId(b)),
            ],
            outcome: match winner {
                Some(w) => Outcome::Winner(ParticipantId(w)),
                None => Outcome::Draw,
            },
        }
    }

    #[test]
    fn test_match_record_loser() {
        let record = decided(1, 2, Some(2));
        assert_eq!(record.winner(), Some(ParticipantId(2)));
        assert_eq!(record.loser(), Some(EntrantSpot::Entrant(ParticipantId(1))));
        assert_eq!(record.opponent(ParticipantId(1)), Some(ParticipantId(2)));

        let draw = decided(1, 2, None);
        assert_eq!(draw.loser(), None);

        let bye = MatchRecord {
            entrants: [EntrantSpot::Entrant(ParticipantId(3)), EntrantSpot::Empty],
            outcome: Outcome::Winner(ParticipantId(3)),
            ..decided(0, 0, None)
        };
        assert!(bye.is_bye());
        assert_eq!(bye.loser(), Some(EntrantSpot::Empty));
        assert_eq!(bye.opponent(ParticipantId(3)), None);
    }

    #[test]
    fn test_format_from_str() {
        for format in crate::Format::ALL {
            assert_eq!(format.as_str().parse::<crate::Format>().unwrap(), format);
        }

        assert!("ladder".parse::<crate::Format>().is_err());
    }
}
