use crate::bracket::{index_by_slot, Bracket, Dependent, Feed};
use crate::options::{TournamentOptionValues, TournamentOptions};
use crate::single_elimination::first_round;
use crate::standings::Scoring;
use crate::utils::NumExt;
use crate::{
    Entrants, Error, Format, MatchRecord, NewRound, Outcome, Phase, Result, RoundOutcome, System,
};

/// A double elimination tournament.
///
/// The winners bracket is laid out exactly like a [`SingleElimination`] bracket. A loss in the
/// winners bracket drops the participant into the losers bracket, a loss in the losers bracket
/// eliminates. The champions of both brackets meet in the grand final. If the losers bracket
/// champion wins the grand final, a bracket reset match is played (unless disabled with the
/// `bracket_reset` option).
///
/// With `k` winners rounds the schedule is: winners round `j` in round `j`, losers round `m` in
/// round `m + 1`, the grand final in round `2k` and the bracket reset in round `2k + 1`.
///
/// [`SingleElimination`]: crate::SingleElimination
#[derive(Clone, Debug)]
pub struct DoubleElimination {
    entrants: Entrants,
    bracket: Bracket,
    /// Index of the first slot of the losers bracket.
    lower_bracket_index: usize,
    grand_final: Option<usize>,
    options: DoubleEliminationOptions,
}

impl DoubleElimination {
    /// Creates a new `DoubleElimination` tournament with the given `entrants`.
    pub fn new(entrants: Entrants) -> Self {
        Self::new_with_options(entrants, TournamentOptionValues::default())
    }

    /// Creates a new `DoubleElimination` tournament with the given `entrants` and `options`.
    pub fn new_with_options<O>(entrants: Entrants, options: O) -> Self
    where
        O: Into<TournamentOptionValues>,
    {
        let options = DoubleEliminationOptions::new(&options.into());

        log::debug!(
            "Creating a new DoubleElimination bracket with {} entrants",
            entrants.len()
        );

        let mut bracket = Bracket::new();
        let (lower_bracket_index, grand_final) =
            match build(&mut bracket, entrants.len(), options.bracket_reset) {
                Some((lower, gf)) => (lower, Some(gf)),
                None => (0, None),
            };

        Self {
            entrants,
            bracket,
            lower_bracket_index,
            grand_final,
            options,
        }
    }

    /// Returns the [`TournamentOptions`] accepted by this system.
    pub fn options() -> TournamentOptions {
        Scoring::add_options(TournamentOptions::builder().option(
            "bracket_reset",
            "Play a second grand final if the losers bracket champion wins the first one.",
            true,
        ))
        .build()
    }

    #[inline]
    pub fn bracket(&self) -> &Bracket {
        &self.bracket
    }

    /// Returns the index of the first slot of the losers bracket.
    #[inline]
    pub fn lower_bracket_index(&self) -> usize {
        self.lower_bracket_index
    }

    /// Returns the round the grand final is played in.
    fn grand_final_round(&self) -> u32 {
        match self.grand_final {
            Some(slot) => self.bracket.slots()[slot].round,
            None => 0,
        }
    }
}

/// Builds the complete bracket. Returns the index of the first losers bracket slot and the
/// index of the grand final, or `None` if there are not enough entrants for a bracket.
fn build(bracket: &mut Bracket, num_entrants: usize, bracket_reset: bool) -> Option<(usize, usize)> {
    if num_entrants < 2 {
        return None;
    }

    let rounds = num_entrants.ilog2_ceil();

    // (start, len) of every winners round.
    let mut winners = Vec::with_capacity(rounds);
    winners.push(first_round(bracket, num_entrants, Phase::Winners));

    for round in 2..=rounds {
        let (start, len) = winners[round - 2];
        let next = bracket.len();

        for index in 0..len / 2 {
            bracket.push(
                Phase::Winners,
                round as u32,
                [
                    Feed::Winner(start + index * 2),
                    Feed::Winner(start + index * 2 + 1),
                ],
            );
        }

        winners.push((next, len / 2));
    }

    let lower_bracket_index = bracket.len();

    // (start, len) of every losers round.
    let mut losers: Vec<(usize, usize)> = Vec::with_capacity(2 * (rounds - 1));
    for lround in 1..=2 * (rounds - 1) {
        let round = lround as u32 + 1;
        let next = bracket.len();

        let len = if lround == 1 {
            // Losers of neighbouring round 1 matches meet each other.
            let (start, len) = winners[0];
            for index in 0..len / 2 {
                bracket.push(
                    Phase::Losers,
                    round,
                    [
                        Feed::Loser(start + index * 2),
                        Feed::Loser(start + index * 2 + 1),
                    ],
                );
            }

            len / 2
        } else if lround % 2 == 0 {
            // Survivors meet the losers of the next winners round. Every other drop-in round
            // is mirrored so that a dropped participant does not meet the opponent it just
            // played in the winners bracket again.
            let wround = lround / 2;
            let (lstart, len) = losers[lround - 2];
            let (wstart, _) = winners[wround];

            for index in 0..len {
                let dropped = if wround % 2 == 1 {
                    len - 1 - index
                } else {
                    index
                };

                bracket.push(
                    Phase::Losers,
                    round,
                    [Feed::Winner(lstart + index), Feed::Loser(wstart + dropped)],
                );
            }

            len
        } else {
            let (start, len) = losers[lround - 2];
            for index in 0..len / 2 {
                bracket.push(
                    Phase::Losers,
                    round,
                    [
                        Feed::Winner(start + index * 2),
                        Feed::Winner(start + index * 2 + 1),
                    ],
                );
            }

            len / 2
        };

        losers.push((next, len));
    }

    let (winners_final, _) = winners[rounds - 1];
    let losers_champion = match losers.last() {
        Some((start, _)) => Feed::Winner(*start),
        // With two entrants the loser of the only winners match is the losers champion.
        None => Feed::Loser(winners_final),
    };

    let final_round = 2 * rounds as u32;
    let grand_final = bracket.push(
        Phase::GrandFinal,
        final_round,
        [Feed::Winner(winners_final), losers_champion],
    );

    if bracket_reset {
        bracket.push(
            Phase::BracketReset,
            final_round + 1,
            [Feed::Winner(grand_final), Feed::Loser(grand_final)],
        );
    }

    Some((lower_bracket_index, grand_final))
}

impl System for DoubleElimination {
    fn format(&self) -> Format {
        Format::DoubleElimination
    }

    fn entrants(&self) -> &Entrants {
        &self.entrants
    }

    fn scoring(&self) -> Scoring {
        self.options.scoring
    }

    fn total_rounds(&self) -> u32 {
        self.bracket.rounds()
    }

    fn generate_round(&self, history: &[MatchRecord], current_round: u32) -> Result<RoundOutcome> {
        let final_round = self.grand_final_round();
        if current_round < final_round {
            return self
                .bracket
                .next_round(current_round, final_round, &self.entrants, history);
        }

        let Some(grand_final) = self.grand_final else {
            return Ok(RoundOutcome::Terminal);
        };

        if current_round > final_round || !self.options.bracket_reset {
            return Ok(RoundOutcome::Terminal);
        }

        let records = index_by_slot(history);
        let Some(record) = records.get(&grand_final) else {
            // Void grand final, nobody reached it.
            return Ok(RoundOutcome::Terminal);
        };

        if record.outcome == Outcome::Pending {
            return Err(Error::UndecidedMatch {
                round: record.round,
                slot: grand_final,
            });
        }

        let losers_champion_won =
            !record.is_bye() && record.winner().is_some() && record.winner() == record.entrants[1].entrant();

        if !losers_champion_won {
            return Ok(RoundOutcome::Terminal);
        }

        log::debug!("Losers bracket champion won the grand final, playing bracket reset");

        let round = final_round + 1;
        let pairings = self.bracket.pairings(round, &self.entrants, &records)?;
        Ok(RoundOutcome::Round(NewRound { round, pairings }))
    }

    fn dependents(&self, slot: usize) -> Vec<Dependent> {
        self.bracket.dependents(slot)
    }

    fn is_eliminating(&self, record: &MatchRecord, prior_losses: u32) -> bool {
        prior_losses >= 1
            || record.phase == Phase::BracketReset
            || (record.phase == Phase::GrandFinal && !self.options.bracket_reset)
    }
}

#[derive(Copy, Clone, Debug)]
struct DoubleEliminationOptions {
    bracket_reset: bool,
    scoring: Scoring,
}

impl DoubleEliminationOptions {
    fn new(options: &TournamentOptionValues) -> Self {
        Self {
            bracket_reset: options.bool_or("bracket_reset", true),
            scoring: Scoring::from_values(options),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bracket::Feed;
    use crate::{entrants, option_values};
    use crate::{
        EntrantSpot, MatchRecord, Outcome, ParticipantId, Phase, RoundOutcome, System,
    };

    use super::DoubleElimination;

    /// Plays every round, letting `winner` pick the winning spot of each real match.
    fn play_all<F>(tournament: &DoubleElimination, winner: F) -> (u32, Vec<MatchRecord>)
    where
        F: Fn(&MatchRecord) -> usize,
    {
        let mut history = Vec::new();
        let mut current = 0;

        while let RoundOutcome::Round(new) = tournament.generate_round(&history, current).unwrap() {
            for pairing in new.pairings {
                let mut record = MatchRecord {
                    round: new.round,
                    phase: pairing.phase,
                    slot: pairing.slot,
                    entrants: pairing.entrants,
                    outcome: Outcome::Pending,
                };

                record.outcome = match pairing.bye() {
                    Some(id) => Outcome::Winner(id),
                    None => Outcome::Winner(record.entrants[winner(&record)].entrant().unwrap()),
                };

                history.push(record);
            }

            current = new.round;
        }

        (current, history)
    }

    #[test]
    fn test_double_elimination_layout() {
        let tournament = DoubleElimination::new(entrants![0, 1, 2, 3]);
        let slots = tournament.bracket().slots();

        // 3 winners, 2 losers, grand final, reset.
        assert_eq!(slots.len(), 7);
        assert_eq!(tournament.lower_bracket_index(), 3);
        assert_eq!(tournament.total_rounds(), 5);

        assert_eq!(slots[3].feeds, [Feed::Loser(0), Feed::Loser(1)]);
        assert_eq!(slots[3].round, 2);
        assert_eq!(slots[4].feeds, [Feed::Winner(3), Feed::Loser(2)]);
        assert_eq!(slots[4].round, 3);
        assert_eq!(slots[5].phase, Phase::GrandFinal);
        assert_eq!(slots[5].feeds, [Feed::Winner(2), Feed::Winner(4)]);
        assert_eq!(slots[5].round, 4);
        assert_eq!(slots[6].phase, Phase::BracketReset);
    }

    #[test]
    fn test_double_elimination_drop_mirrored() {
        let tournament = DoubleElimination::new(entrants![0, 1, 2, 3, 4, 5, 6, 7]);
        let slots = tournament.bracket().slots();

        // Winners: 0..4 round 1, 4..6 round 2, 6 final. Losers round 1: 7, 8.
        // Losers round 2 takes the winners round 2 losers in reverse.
        assert_eq!(slots[9].feeds, [Feed::Winner(7), Feed::Loser(5)]);
        assert_eq!(slots[10].feeds, [Feed::Winner(8), Feed::Loser(4)]);
    }

    #[test]
    fn test_double_elimination_winners_champion() {
        let tournament = DoubleElimination::new(entrants![0, 1, 2, 3]);
        let (rounds, history) = play_all(&tournament, |_| 0);

        // The grand final is won by the undefeated entrant, no reset.
        assert_eq!(rounds, 4);
        assert_eq!(history.len(), 6);

        let grand_final = history.last().unwrap();
        assert_eq!(grand_final.phase, Phase::GrandFinal);
        assert_eq!(grand_final.winner(), Some(ParticipantId(0)));
    }

    #[test]
    fn test_double_elimination_bracket_reset() {
        let tournament = DoubleElimination::new(entrants![0, 1, 2, 3]);
        let (rounds, history) = play_all(&tournament, |record| match record.phase {
            Phase::GrandFinal => 1,
            _ => 0,
        });

        assert_eq!(rounds, 5);
        let reset = history.last().unwrap();
        assert_eq!(reset.phase, Phase::BracketReset);
        assert_eq!(
            reset.entrants,
            [
                EntrantSpot::Entrant(ParticipantId(1)),
                EntrantSpot::Entrant(ParticipantId(0))
            ]
        );

        let tournament = DoubleElimination::new_with_options(
            entrants![0, 1, 2, 3],
            option_values!("bracket_reset" => false),
        );
        let (rounds, _) = play_all(&tournament, |record| match record.phase {
            Phase::GrandFinal => 1,
            _ => 0,
        });
        assert_eq!(rounds, 4);
    }

    #[test]
    fn test_double_elimination_small() {
        let tournament = DoubleElimination::new(entrants![0]);
        assert_eq!(tournament.generate_round(&[], 0), Ok(RoundOutcome::Terminal));

        let tournament = DoubleElimination::new(entrants![0, 1]);
        let (rounds, history) = play_all(&tournament, |_| 1);
        // 1 beats 0, loses the grand final rematch, wins the reset.
        assert_eq!(rounds, 3);
        assert_eq!(history.len(), 3);

        let tournament = DoubleElimination::new(entrants![0, 1, 2]);
        let (_, history) = play_all(&tournament, |_| 0);
        let real = history.iter().filter(|record| !record.is_bye()).count();
        assert_eq!(real, 4);
    }
}
