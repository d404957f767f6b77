use crate::bracket::{Bracket, Dependent, Feed};
use crate::options::{TournamentOptionValues, TournamentOptions};
use crate::standings::Scoring;
use crate::utils::NumExt;
use crate::{Entrants, Format, MatchRecord, Phase, Result, RoundOutcome, System};

/// A single elimination tournament.
///
/// Round 1 places the participants in seeding order into a bracket of the next power of two.
/// The slots that receive a bye are spread over the bracket so that no two byes meet in round
/// 2 unless the pool is less than half full.
#[derive(Clone, Debug)]
pub struct SingleElimination {
    entrants: Entrants,
    bracket: Bracket,
    options: SingleEliminationOptions,
}

impl SingleElimination {
    /// Creates a new `SingleElimination` tournament with the given `entrants`.
    pub fn new(entrants: Entrants) -> Self {
        Self::new_with_options(entrants, TournamentOptionValues::default())
    }

    /// Creates a new `SingleElimination` tournament with the given `entrants` and using the
    /// given `options`.
    ///
    /// If you don't need to specify the options consider using [`new`].
    ///
    /// [`new`]: Self::new
    pub fn new_with_options<O>(entrants: Entrants, options: O) -> Self
    where
        O: Into<TournamentOptionValues>,
    {
        let options = SingleEliminationOptions::new(&options.into());
        log::debug!("Using options: {:?}", options);

        log::debug!(
            "Creating new SingleElimination bracket with {} entrants",
            entrants.len()
        );

        let bracket = build(entrants.len(), options.third_place_match);

        Self {
            entrants,
            bracket,
            options,
        }
    }

    /// Returns the [`TournamentOptions`] accepted by this system.
    pub fn options() -> TournamentOptions {
        Scoring::add_options(TournamentOptions::builder().option(
            "third_place_match",
            "Include a match for third place.",
            false,
        ))
        .build()
    }

    #[inline]
    pub fn bracket(&self) -> &Bracket {
        &self.bracket
    }
}

/// Builds the slot arena for `num_entrants`.
pub(crate) fn build(num_entrants: usize, third_place_match: bool) -> Bracket {
    let mut bracket = Bracket::new();
    if num_entrants < 2 {
        return bracket;
    }

    let mut round_starts = first_round(&mut bracket, num_entrants, Phase::Main);

    let rounds = num_entrants.ilog2_ceil() as u32;
    for round in 2..=rounds {
        let (start, len) = round_starts;
        let next = bracket.len();

        for index in 0..len / 2 {
            bracket.push(
                Phase::Main,
                round,
                [
                    Feed::Winner(start + index * 2),
                    Feed::Winner(start + index * 2 + 1),
                ],
            );
        }

        round_starts = (next, len / 2);

        // The third place match is played alongside the final between the semifinal losers.
        // A semifinal against a bye has no loser.
        if round == rounds
            && third_place_match
            && !has_bye(&bracket, start)
            && !has_bye(&bracket, start + 1)
        {
            bracket.push(
                Phase::ThirdPlace,
                round,
                [Feed::Loser(start), Feed::Loser(start + 1)],
            );
        }
    }

    bracket
}

fn has_bye(bracket: &Bracket, slot: usize) -> bool {
    bracket
        .get(slot)
        .map_or(false, |slot| slot.feeds.contains(&Feed::Bye))
}

/// Pushes the first round of a bracket of `num_entrants` (at least 2) and returns the start
/// index and length of the round.
pub(crate) fn first_round(bracket: &mut Bracket, num_entrants: usize, phase: Phase) -> (usize, usize) {
    let size = num_entrants.next_power_of_two();
    let num_matches = size / 2;
    let bits = num_matches.ilog2_ceil() as u32;

    let byes = size - num_entrants;
    let mut is_bye = vec![false; num_matches];
    for index in 0..byes {
        is_bye[index.reverse_bits_lower(bits)] = true;
    }

    let start = bracket.len();
    let mut seed = 0;
    for bye in is_bye {
        let feeds = if bye {
            seed += 1;
            [Feed::Seed(seed - 1), Feed::Bye]
        } else {
            seed += 2;
            [Feed::Seed(seed - 2), Feed::Seed(seed - 1)]
        };

        bracket.push(phase, 1, feeds);
    }

    (start, num_matches)
}

impl System for SingleElimination {
    fn format(&self) -> Format {
        Format::SingleElimination
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
        self.bracket.next_round(
            current_round,
            self.bracket.rounds(),
            &self.entrants,
            history,
        )
    }

    fn dependents(&self, slot: usize) -> Vec<Dependent> {
        self.bracket.dependents(slot)
    }

    fn is_eliminating(&self, _record: &MatchRecord, _prior_losses: u32) -> bool {
        true
    }
}

#[derive(Copy, Clone, Debug)]
struct SingleEliminationOptions {
    third_place_match: bool,
    scoring: Scoring,
}

impl SingleEliminationOptions {
    fn new(options: &TournamentOptionValues) -> Self {
        Self {
            third_place_match: options.bool_or("third_place_match", false),
            scoring: Scoring::from_values(options),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bracket::Feed;
    use crate::{entrants, option_values};
    use crate::{EntrantSpot, MatchRecord, Outcome, ParticipantId, Phase, RoundOutcome, System};

    use super::SingleElimination;

    fn play(tournament: &SingleElimination, round: u32, history: &mut Vec<MatchRecord>) -> bool {
        let pairings = match tournament.generate_round(history, round).unwrap() {
            RoundOutcome::Round(new) => new.pairings,
            RoundOutcome::Terminal => return false,
        };

        // The first spot always wins.
        for pairing in pairings {
            let winner = match pairing.entrants[0] {
                EntrantSpot::Entrant(id) => id,
                _ => pairing.bye().unwrap(),
            };

            history.push(MatchRecord {
                round: round + 1,
                phase: pairing.phase,
                slot: pairing.slot,
                entrants: pairing.entrants,
                outcome: Outcome::Winner(winner),
            });
        }

        true
    }

    #[test]
    fn test_single_elimination() {
        let tournament = SingleElimination::new(entrants![]);
        assert!(tournament.bracket().is_empty());
        assert_eq!(tournament.generate_round(&[], 0), Ok(RoundOutcome::Terminal));

        let tournament = SingleElimination::new(entrants![0]);
        assert_eq!(tournament.total_rounds(), 0);
        assert_eq!(tournament.generate_round(&[], 0), Ok(RoundOutcome::Terminal));

        let tournament = SingleElimination::new(entrants![0, 1]);
        assert_eq!(tournament.total_rounds(), 1);
        assert_eq!(tournament.bracket().len(), 1);

        let tournament = SingleElimination::new(entrants![0, 1, 2]);
        assert_eq!(tournament.total_rounds(), 2);
        assert_eq!(
            tournament.bracket().slots()[0].feeds,
            [Feed::Seed(0), Feed::Bye]
        );
        assert_eq!(
            tournament.bracket().slots()[1].feeds,
            [Feed::Seed(1), Feed::Seed(2)]
        );

        let tournament = SingleElimination::new(entrants![0, 1, 2, 3]);
        assert_eq!(
            tournament.bracket().slots()[0].feeds,
            [Feed::Seed(0), Feed::Seed(1)]
        );
        assert_eq!(
            tournament.bracket().slots()[1].feeds,
            [Feed::Seed(2), Feed::Seed(3)]
        );
        assert_eq!(
            tournament.bracket().slots()[2].feeds,
            [Feed::Winner(0), Feed::Winner(1)]
        );
    }

    #[test]
    fn test_single_elimination_byes_spread() {
        // 5 entrants in a bracket of 8: 3 byes on slots 0, 2 and 1.
        let tournament = SingleElimination::new(entrants![0, 1, 2, 3, 4]);
        let feeds: Vec<_> = tournament.bracket().slots()[..4]
            .iter()
            .map(|slot| slot.feeds)
            .collect();

        assert_eq!(
            feeds,
            [
                [Feed::Seed(0), Feed::Bye],
                [Feed::Seed(1), Feed::Bye],
                [Feed::Seed(2), Feed::Bye],
                [Feed::Seed(3), Feed::Seed(4)],
            ]
        );

        let tournament = SingleElimination::new(entrants![0, 1, 2, 3, 4, 5]);
        let byes: Vec<_> = tournament.bracket().slots()[..4]
            .iter()
            .map(|slot| slot.feeds[1] == Feed::Bye)
            .collect();
        assert_eq!(byes, [true, false, true, false]);
    }

    #[test]
    fn test_single_elimination_play() {
        let tournament = SingleElimination::new(entrants![0, 1, 2, 3, 4, 5]);

        let mut history = Vec::new();
        let mut round = 0;
        while play(&tournament, round, &mut history) {
            round += 1;
        }

        assert_eq!(round, 3);
        let real = history.iter().filter(|record| !record.is_bye()).count();
        assert_eq!(real, 5);
        assert_eq!(history.last().unwrap().winner(), Some(ParticipantId(0)));
    }

    #[test]
    fn test_single_elimination_third_place() {
        let options = option_values!("third_place_match" => true);
        let tournament = SingleElimination::new_with_options(entrants![0, 1, 2, 3], options);

        let slots = tournament.bracket().slots();
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[3].phase, Phase::ThirdPlace);
        assert_eq!(slots[3].round, 2);
        assert_eq!(slots[3].feeds, [Feed::Loser(0), Feed::Loser(1)]);

        let mut history = Vec::new();
        assert!(play(&tournament, 0, &mut history));
        assert!(play(&tournament, 1, &mut history));
        assert!(!play(&tournament, 2, &mut history));

        let third = history.iter().find(|r| r.phase == Phase::ThirdPlace).unwrap();
        assert_eq!(
            third.entrants,
            [
                EntrantSpot::Entrant(ParticipantId(1)),
                EntrantSpot::Entrant(ParticipantId(3))
            ]
        );

        // Two entrants never play for third place.
        let tournament = SingleElimination::new_with_options(
            entrants![0, 1],
            option_values!("third_place_match" => true),
        );
        assert_eq!(tournament.bracket().len(), 1);
    }

    #[test]
    fn test_single_elimination_third_place_bye() {
        let tournament = SingleElimination::new_with_options(
            entrants![0, 1, 2],
            option_values!("third_place_match" => true),
        );

        let slots = tournament.bracket().slots();
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|slot| slot.phase != Phase::ThirdPlace));

        let mut history = Vec::new();
        assert!(play(&tournament, 0, &mut history));
        assert!(play(&tournament, 1, &mut history));
        assert!(!play(&tournament, 2, &mut history));
        assert!(history.iter().all(|r| r.phase != Phase::ThirdPlace));
    }

    #[test]
    fn test_single_elimination_dependents() {
        let tournament = SingleElimination::new(entrants![0, 1, 2, 3, 4, 5, 6, 7]);

        let dependents = tournament.dependents(5);
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].slot, 6);
        assert_eq!(dependents[0].position, 1);
        assert!(tournament.dependents(6).is_empty());
    }
}
