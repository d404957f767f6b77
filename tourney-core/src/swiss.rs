use std::collections::HashSet;

use crate::options::{TournamentOptionValues, TournamentOptions};
use crate::standings::{Scoring, Standings};
use crate::utils::NumExt;
use crate::{
    EntrantSpot, Entrants, Format, MatchRecord, NewRound, Pairing, ParticipantId, Phase, Result,
    RoundOutcome, System,
};

/// Upper bound of search steps for a single pairing attempt.
const PAIRING_BUDGET: usize = 100_000;

/// A swiss system tournament.
///
/// # Implementation notes
///
/// The number of rounds is `ceil(log2(n))`. Every round participants are ordered by the current
/// [`Standings`] and paired top-down, each with the nearest-scored opponent they have not
/// played yet. If the search gets stuck it backtracks; only if no complete pairing without a
/// rematch exists are rematches allowed.
///
/// With an odd number of participants the lowest ranked participant that received the fewest
/// byes so far sits out and receives a bye.
#[derive(Clone, Debug)]
pub struct Swiss {
    entrants: Entrants,
    options: SwissOptions,
}

impl Swiss {
    /// Creates a new `Swiss` tournament using the given `entrants`.
    pub fn new(entrants: Entrants) -> Self {
        Self::new_with_options(entrants, TournamentOptionValues::default())
    }

    /// Creates a new `Swiss` tournament using the given `entrants` and using the given `options`.
    ///
    /// If you don't need to specify the options consider using [`new`].
    ///
    /// [`new`]: Self::new
    pub fn new_with_options<O>(entrants: Entrants, options: O) -> Self
    where
        O: Into<TournamentOptionValues>,
    {
        let options = SwissOptions {
            scoring: Scoring::from_values(&options.into()),
        };

        Self { entrants, options }
    }

    /// Returns the [`TournamentOptions`] accepted by this system.
    pub fn options() -> TournamentOptions {
        Scoring::add_options(TournamentOptions::builder()).build()
    }
}

#[derive(Copy, Clone, Debug)]
struct SwissOptions {
    scoring: Scoring,
}

impl System for Swiss {
    fn format(&self) -> Format {
        Format::Swiss
    }

    fn entrants(&self) -> &Entrants {
        &self.entrants
    }

    fn scoring(&self) -> Scoring {
        self.options.scoring
    }

    fn total_rounds(&self) -> u32 {
        self.entrants.len().ilog2_ceil() as u32
    }

    fn generate_round(&self, history: &[MatchRecord], current_round: u32) -> Result<RoundOutcome> {
        if current_round >= self.total_rounds() {
            return Ok(RoundOutcome::Terminal);
        }

        let standings = Standings::new(self, history);

        let ids: Vec<ParticipantId> = standings.iter().map(|r| r.participant).collect();
        let points: Vec<u64> = standings.iter().map(|r| r.points).collect();

        let mut played = HashSet::new();
        for record in history {
            if let [EntrantSpot::Entrant(a), EntrantSpot::Entrant(b)] = record.entrants {
                played.insert(key(a, b));
            }
        }

        // Bye candidates: fewest byes first, then lowest ranked first.
        let candidates: Vec<Option<usize>> = if ids.len() % 2 == 0 {
            vec![None]
        } else {
            let mut positions: Vec<usize> = (0..ids.len()).collect();
            positions.sort_by_key(|pos| (standings[*pos].byes, usize::MAX - pos));
            positions.into_iter().map(Some).collect()
        };

        let ctx = Context {
            ids: &ids,
            points: &points,
            played: &played,
        };

        let mut chosen = None;
        for bye in &candidates {
            let pool: Vec<usize> = (0..ids.len()).filter(|pos| Some(*pos) != *bye).collect();

            let mut budget = PAIRING_BUDGET;
            let mut pairs = Vec::with_capacity(pool.len() / 2);
            if ctx.search(pool, &mut pairs, false, &mut budget) {
                chosen = Some((*bye, pairs));
                break;
            }
        }

        let (bye, pairs) = match chosen {
            Some(chosen) => chosen,
            None => {
                log::debug!(
                    "No pairing without rematches for round {}, allowing rematches",
                    current_round + 1
                );

                let bye = candidates.first().copied().flatten();
                let pool: Vec<usize> = (0..ids.len()).filter(|pos| Some(*pos) != bye).collect();

                let mut budget = PAIRING_BUDGET;
                let mut pairs = Vec::with_capacity(pool.len() / 2);
                ctx.search(pool, &mut pairs, true, &mut budget);
                (bye, pairs)
            }
        };

        let mut pairings: Vec<Pairing> = pairs
            .into_iter()
            .enumerate()
            .map(|(slot, (a, b))| Pairing {
                phase: Phase::Main,
                slot,
                entrants: [EntrantSpot::Entrant(ids[a]), EntrantSpot::Entrant(ids[b])],
            })
            .collect();

        if let Some(pos) = bye {
            log::debug!("Assigning bye to {}", ids[pos]);

            pairings.push(Pairing {
                phase: Phase::Main,
                slot: pairings.len(),
                entrants: [EntrantSpot::Entrant(ids[pos]), EntrantSpot::Empty],
            });
        }

        Ok(RoundOutcome::Round(NewRound {
            round: current_round + 1,
            pairings,
        }))
    }
}

fn key(a: ParticipantId, b: ParticipantId) -> (ParticipantId, ParticipantId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

struct Context<'a> {
    /// Participants in standings order.
    ids: &'a [ParticipantId],
    points: &'a [u64],
    played: &'a HashSet<(ParticipantId, ParticipantId)>,
}

impl<'a> Context<'a> {
    /// Pairs all positions in `remaining` (in standings order). Returns `false` if no complete
    /// pairing was found within `budget`.
    fn search(
        &self,
        remaining: Vec<usize>,
        pairs: &mut Vec<(usize, usize)>,
        allow_rematch: bool,
        budget: &mut usize,
    ) -> bool {
        let Some((&first, rest)) = remaining.split_first() else {
            return true;
        };

        if *budget == 0 {
            return false;
        }
        *budget -= 1;

        let mut candidates: Vec<usize> = rest
            .iter()
            .copied()
            .filter(|other| {
                allow_rematch || !self.played.contains(&key(self.ids[first], self.ids[*other]))
            })
            .collect();
        candidates.sort_by_key(|other| (self.points[first].abs_diff(self.points[*other]), *other));

        for other in candidates {
            let next: Vec<usize> = rest.iter().copied().filter(|pos| *pos != other).collect();

            pairs.push((first, other));
            if self.search(next, pairs, allow_rematch, budget) {
                return true;
            }
            pairs.pop();
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{entrants, EntrantSpot, MatchRecord, Outcome, ParticipantId, RoundOutcome, System};

    use super::Swiss;

    /// Plays every round, the lower participant id always wins.
    fn play_all(swiss: &Swiss) -> Vec<MatchRecord> {
        let mut history = Vec::new();
        let mut current = 0;

        while let RoundOutcome::Round(new) = swiss.generate_round(&history, current).unwrap() {
            for pairing in new.pairings {
                let outcome = match pairing.entrants {
                    [EntrantSpot::Entrant(a), EntrantSpot::Entrant(b)] => Outcome::Winner(a.min(b)),
                    _ => Outcome::Winner(pairing.bye().unwrap()),
                };

                history.push(MatchRecord {
                    round: new.round,
                    phase: pairing.phase,
                    slot: pairing.slot,
                    entrants: pairing.entrants,
                    outcome,
                });
            }

            current = new.round;
        }

        history
    }

    #[test]
    fn test_swiss_rounds() {
        assert_eq!(Swiss::new(entrants![]).total_rounds(), 0);
        assert_eq!(Swiss::new(entrants![0]).total_rounds(), 0);
        assert_eq!(Swiss::new(entrants![0, 1]).total_rounds(), 1);
        assert_eq!(Swiss::new(entrants![0, 1, 2, 3, 4]).total_rounds(), 3);
        assert_eq!(Swiss::new(entrants![0, 1, 2, 3, 4, 5, 6, 7]).total_rounds(), 3);

        let sixteen = Swiss::new((0..16).map(ParticipantId).collect());
        assert_eq!(sixteen.total_rounds(), 4);

        assert_eq!(
            Swiss::new(entrants![0]).generate_round(&[], 0),
            Ok(RoundOutcome::Terminal)
        );
    }

    #[test]
    fn test_swiss_first_round() {
        let swiss = Swiss::new(entrants![0, 1, 2, 3]);

        let RoundOutcome::Round(round) = swiss.generate_round(&[], 0).unwrap() else {
            panic!("expected a round");
        };

        let pairs: Vec<_> = round.pairings.iter().map(|p| p.entrants).collect();
        assert_eq!(
            pairs,
            [
                [
                    EntrantSpot::Entrant(ParticipantId(0)),
                    EntrantSpot::Entrant(ParticipantId(1))
                ],
                [
                    EntrantSpot::Entrant(ParticipantId(2)),
                    EntrantSpot::Entrant(ParticipantId(3))
                ],
            ]
        );
    }

    #[test]
    fn test_swiss_no_rematch() {
        let swiss = Swiss::new(entrants![0, 1, 2, 3, 4, 5, 6, 7]);
        let history = play_all(&swiss);

        assert_eq!(history.len(), 12);

        let mut seen = HashMap::new();
        for record in &history {
            let mut pair: Vec<_> = record.participants().collect();
            pair.sort();
            assert_eq!(seen.insert(pair, record.round), None, "rematch: {:?}", record);
        }

        // 0 wins every match.
        assert!(history
            .iter()
            .filter(|r| r.contains(ParticipantId(0)))
            .all(|r| r.winner() == Some(ParticipantId(0))));
    }

    #[test]
    fn test_swiss_bye_rotation() {
        let swiss = Swiss::new(entrants![0, 1, 2, 3, 4]);
        let history = play_all(&swiss);

        let byes: Vec<_> = history
            .iter()
            .filter(|r| r.is_bye())
            .map(|r| r.winner().unwrap())
            .collect();

        assert_eq!(byes.len(), 3);
        let unique: std::collections::HashSet<_> = byes.iter().collect();
        assert_eq!(unique.len(), 3);

        // The lowest seed sits out first.
        assert_eq!(byes[0], ParticipantId(4));
    }

    #[test]
    fn test_swiss_deterministic() {
        let swiss = Swiss::new(entrants![3, 1, 4, 5, 9, 2, 6]);
        assert_eq!(play_all(&swiss), play_all(&swiss));
    }
}
