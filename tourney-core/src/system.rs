//! # Systems
//!
//! A [`System`] is a pairing generator: given the participant pool and the match history, it
//! produces the pairings of the next round or signals that the format has no rounds left.
//!
//! [`Generator`] selects one of the builtin systems by [`Format`] at runtime.
use std::collections::HashSet;

use crate::bracket::Dependent;
use crate::options::{TournamentOptionValues, TournamentOptions};
use crate::standings::{Scoring, Standings};
use crate::{
    DoubleElimination, Entrants, Error, Format, MatchRecord, Outcome, Result, RoundOutcome,
    RoundRobin, Seeding, SingleElimination, Swiss,
};

/// A pairing generator for a tournament format.
///
/// Implementations are pure: the same entrants, options and history always produce the same
/// output.
pub trait System {
    fn format(&self) -> Format;

    /// Returns the participant pool in seeding order.
    fn entrants(&self) -> &Entrants;

    fn scoring(&self) -> Scoring;

    /// Returns the maximum number of rounds the format can play.
    fn total_rounds(&self) -> u32;

    /// Generates the round after `current_round` from the complete match `history`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndecidedMatch`] if a match the next round depends on is not decided.
    fn generate_round(&self, history: &[MatchRecord], current_round: u32) -> Result<RoundOutcome>;

    /// Returns the bracket spots fed by the match in `slot`. Formats without a bracket have no
    /// dependents.
    fn dependents(&self, _slot: usize) -> Vec<Dependent> {
        Vec::new()
    }

    /// Returns `true` if losing `record` with `prior_losses` earlier losses eliminates the
    /// loser.
    fn is_eliminating(&self, _record: &MatchRecord, _prior_losses: u32) -> bool {
        false
    }

    /// Computes the current [`Standings`] from `history`.
    fn standings(&self, history: &[MatchRecord]) -> Standings
    where
        Self: Sized,
    {
        Standings::new(self, history)
    }
}

/// The [`System`] for a [`Format`] selected at runtime.
#[derive(Clone, Debug)]
pub struct Generator {
    inner: InnerGenerator,
}

#[derive(Clone, Debug)]
enum InnerGenerator {
    SingleElimination(SingleElimination),
    DoubleElimination(DoubleElimination),
    Swiss(Swiss),
    RoundRobin(RoundRobin),
}

impl Generator {
    /// Creates the generator for `format`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Options`] if `options` contains keys the format does not accept or
    /// values of the wrong type.
    pub fn new(format: Format, entrants: Entrants, options: TournamentOptionValues) -> Result<Self> {
        let options = options.merge(Self::options(format))?;

        let inner = match format {
            Format::SingleElimination => InnerGenerator::SingleElimination(
                SingleElimination::new_with_options(entrants, options),
            ),
            Format::DoubleElimination => InnerGenerator::DoubleElimination(
                DoubleElimination::new_with_options(entrants, options),
            ),
            Format::Swiss => InnerGenerator::Swiss(Swiss::new_with_options(entrants, options)),
            Format::RoundRobin => {
                InnerGenerator::RoundRobin(RoundRobin::new_with_options(entrants, options))
            }
        };

        Ok(Self { inner })
    }

    /// Returns the [`TournamentOptions`] accepted by `format`.
    pub fn options(format: Format) -> TournamentOptions {
        let mut options = match format {
            Format::SingleElimination => SingleElimination::options(),
            Format::DoubleElimination => DoubleElimination::options(),
            Format::Swiss => Swiss::options(),
            Format::RoundRobin => RoundRobin::options(),
        };

        Seeding::add_options(&mut options);
        options
    }

    fn system(&self) -> &dyn System {
        match &self.inner {
            InnerGenerator::SingleElimination(t) => t,
            InnerGenerator::DoubleElimination(t) => t,
            InnerGenerator::Swiss(t) => t,
            InnerGenerator::RoundRobin(t) => t,
        }
    }

    /// Returns the full precomputed schedule for round robin, `None` for other formats.
    pub fn schedule(&self) -> Option<Vec<crate::NewRound>> {
        match &self.inner {
            InnerGenerator::RoundRobin(t) => Some(t.schedule()),
            _ => None,
        }
    }

    /// Returns the bracket of elimination formats.
    pub fn bracket(&self) -> Option<&crate::bracket::Bracket> {
        match &self.inner {
            InnerGenerator::SingleElimination(t) => Some(t.bracket()),
            InnerGenerator::DoubleElimination(t) => Some(t.bracket()),
            _ => None,
        }
    }
}

impl System for Generator {
    fn format(&self) -> Format {
        self.system().format()
    }

    fn entrants(&self) -> &Entrants {
        self.system().entrants()
    }

    fn scoring(&self) -> Scoring {
        self.system().scoring()
    }

    fn total_rounds(&self) -> u32 {
        self.system().total_rounds()
    }

    /// Checks that `current_round` is complete before asking the selected system and that the
    /// new round books every participant at most once.
    fn generate_round(&self, history: &[MatchRecord], current_round: u32) -> Result<RoundOutcome> {
        if let Some(record) = history
            .iter()
            .find(|r| r.round == current_round && r.outcome == Outcome::Pending)
        {
            return Err(Error::UndecidedMatch {
                round: record.round,
                slot: record.slot,
            });
        }

        let outcome = self.system().generate_round(history, current_round)?;

        if let RoundOutcome::Round(new) = &outcome {
            let mut seen = HashSet::new();
            for pairing in &new.pairings {
                for id in pairing.entrants.iter().filter_map(|s| s.entrant()) {
                    if !seen.insert(id) {
                        log::error!("Participant {} booked twice in round {}", id, new.round);

                        return Err(Error::InconsistentBracket {
                            slot: pairing.slot,
                            reason: format!("participant {} booked twice in round {}", id, new.round),
                        });
                    }
                }
            }

            log::debug!(
                "Generated round {} with {} pairings",
                new.round,
                new.pairings.len()
            );
        }

        Ok(outcome)
    }

    fn dependents(&self, slot: usize) -> Vec<Dependent> {
        self.system().dependents(slot)
    }

    fn is_eliminating(&self, record: &MatchRecord, prior_losses: u32) -> bool {
        self.system().is_eliminating(record, prior_losses)
    }
}

#[cfg(test)]
mod tests {
    use crate::{entrants, option_values};
    use crate::{EntrantSpot, Format, MatchRecord, Outcome, ParticipantId, Phase, System};

    use super::Generator;

    #[test]
    fn test_generator_options() {
        for format in Format::ALL {
            let options = Generator::options(format);
            assert!(options.get("score_win").is_some());
            assert!(options.get("seeding").is_some());
        }

        assert!(Generator::options(Format::SingleElimination)
            .get("third_place_match")
            .is_some());
        assert!(Generator::options(Format::DoubleElimination)
            .get("bracket_reset")
            .is_some());

        let res = Generator::new(
            Format::Swiss,
            entrants![0, 1],
            option_values!("third_place_match" => true),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_generator_round_not_complete() {
        let generator =
            Generator::new(Format::RoundRobin, entrants![0, 1, 2, 3], option_values!()).unwrap();

        let pending = MatchRecord {
            round: 1,
            phase: Phase::Main,
            slot: 1,
            entrants: [
                EntrantSpot::Entrant(ParticipantId(1)),
                EntrantSpot::Entrant(ParticipantId(2)),
            ],
            outcome: Outcome::Pending,
        };

        assert_eq!(
            generator.generate_round(&[pending], 1),
            Err(crate::Error::UndecidedMatch { round: 1, slot: 1 })
        );
    }

    #[test]
    fn test_generator_dispatch() {
        let generator = Generator::new(
            Format::SingleElimination,
            entrants![0, 1, 2, 3, 4, 5, 6, 7],
            option_values!(),
        )
        .unwrap();

        assert_eq!(generator.format(), Format::SingleElimination);
        assert_eq!(generator.total_rounds(), 3);
        assert_eq!(generator.dependents(0).len(), 1);
        assert!(generator.bracket().is_some());
        assert!(generator.schedule().is_none());
        assert_eq!(generator.scoring().win, 3);
    }
}
