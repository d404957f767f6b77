//! # Standings
//!
//! [`Standings`] are derived from the complete match history of a tournament and are never
//! patched incrementally. The same algorithm produces intermediate standings at a round
//! boundary and the final standings once the tournament is over.
//!
//! Point based formats ([`Swiss`], [`RoundRobin`]) order participants by points. Elimination
//! formats order participants by how deep they got into the bracket and share a rank between
//! everyone eliminated at the same depth.
//!
//! Ties are broken, in order, by:
//! 1. head-to-head: points earned in matches among the tied participants,
//! 2. win rate,
//! 3. strength of schedule: the sum of the points of every opponent played,
//! 4. seed (position in the seeded pool).
//!
//! [`Swiss`]: crate::Swiss
//! [`RoundRobin`]: crate::RoundRobin
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Deref;
use std::slice::Iter;

use crate::options::{Builder, TournamentOptionValues};
use crate::{MatchRecord, Outcome, ParticipantId, Phase, System};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The points awarded per match result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scoring {
    pub win: u64,
    pub draw: u64,
    pub loss: u64,
    pub bye: u64,
}

impl Scoring {
    /// Adds the scoring options accepted by every format to `builder`.
    pub(crate) fn add_options(builder: Builder) -> Builder {
        let default = Self::default();

        builder
            .option("score_win", "Points awarded for a win.", default.win)
            .option("score_draw", "Points awarded for a draw.", default.draw)
            .option("score_loss", "Points awarded for a loss.", default.loss)
            .option("score_bye", "Points awarded for a bye.", default.bye)
    }

    pub fn from_values(values: &TournamentOptionValues) -> Self {
        let default = Self::default();

        Self {
            win: values.u64_or("score_win", default.win),
            draw: values.u64_or("score_draw", default.draw),
            loss: values.u64_or("score_loss", default.loss),
            bye: values.u64_or("score_bye", default.bye),
        }
    }
}

impl Default for Scoring {
    #[inline]
    fn default() -> Self {
        Self {
            win: 3,
            draw: 1,
            loss: 0,
            bye: 3,
        }
    }
}

/// The standing of a single participant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ranking {
    pub participant: ParticipantId,
    pub rank: u32,
    pub points: u64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Byes received. Byes award points but do not count as played matches.
    pub byes: u32,
    /// Wins divided by played matches, `0.0` if no match was played.
    pub win_rate: f64,
    pub strength_of_schedule: u64,
    /// The round the participant was eliminated in. Always `None` for point based formats.
    pub eliminated_in: Option<u32>,
}

impl Ranking {
    #[inline]
    pub fn played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// The ordered standings of all participants of a tournament.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Standings {
    entries: Vec<Ranking>,
}

impl Standings {
    /// Computes the standings of `system` from all decided matches in `history`.
    pub fn new<S>(system: &S, history: &[MatchRecord]) -> Self
    where
        S: System + ?Sized,
    {
        let entrants = system.entrants();
        let scoring = system.scoring();
        let elimination = system.format().is_elimination();

        let seeds: HashMap<ParticipantId, usize> = entrants
            .iter()
            .enumerate()
            .map(|(seed, id)| (*id, seed))
            .collect();

        let mut cells: Vec<Cell> = entrants.iter().map(|id| Cell::new(*id)).collect();
        // Points earned by the first seed against the second seed.
        let mut head_to_head: HashMap<(usize, usize), u64> = HashMap::new();
        let mut opponents: Vec<Vec<usize>> = vec![Vec::new(); cells.len()];

        let mut decided: Vec<&MatchRecord> =
            history.iter().filter(|r| r.outcome.is_decided()).collect();
        decided.sort_by_key(|r| (r.round, r.slot));

        for record in decided {
            let spots: Vec<usize> = record
                .participants()
                .filter_map(|id| seeds.get(&id).copied())
                .collect();

            if record.is_bye() {
                if let Some(seed) = spots.first() {
                    cells[*seed].byes += 1;
                    cells[*seed].points += scoring.bye;
                }

                continue;
            }

            let [a, b] = match spots[..] {
                [a, b] => [a, b],
                _ => {
                    log::debug!("Skipping match with unknown participants: {:?}", record);
                    continue;
                }
            };

            opponents[a].push(b);
            opponents[b].push(a);

            match record.outcome {
                Outcome::Draw => {
                    for (seed, other) in [(a, b), (b, a)] {
                        cells[seed].draws += 1;
                        cells[seed].points += scoring.draw;
                        *head_to_head.entry((seed, other)).or_default() += scoring.draw;
                    }
                }
                Outcome::Winner(winner) => {
                    let (winner, loser) = if cells[a].participant == winner {
                        (a, b)
                    } else {
                        (b, a)
                    };

                    cells[winner].wins += 1;
                    cells[winner].points += scoring.win;
                    *head_to_head.entry((winner, loser)).or_default() += scoring.win;

                    let prior_losses = cells[loser].losses;
                    cells[loser].losses += 1;
                    cells[loser].points += scoring.loss;
                    *head_to_head.entry((loser, winner)).or_default() += scoring.loss;

                    if elimination {
                        if record.phase == Phase::ThirdPlace {
                            cells[winner].third_place = true;
                        }

                        if system.is_eliminating(record, prior_losses) {
                            cells[loser].eliminate(record.round);
                        }
                    }
                }
                // Both participants forfeited.
                Outcome::NoWinner => {
                    for seed in [a, b] {
                        cells[seed].losses += 1;
                        cells[seed].points += scoring.loss;

                        // Nobody advances from a double forfeit.
                        if elimination {
                            cells[seed].eliminate(record.round);
                        }
                    }
                }
                Outcome::Pending => (),
            }
        }

        let schedule: Vec<u64> = opponents
            .iter()
            .map(|list| list.iter().map(|o| cells[*o].points).sum())
            .collect();
        for (cell, sos) in cells.iter_mut().zip(schedule) {
            cell.strength_of_schedule = sos;
        }

        let order = order(&cells, &head_to_head, elimination);

        let mut entries = Vec::with_capacity(order.len());
        for (position, seed) in order.iter().enumerate() {
            let cell = &cells[*seed];

            let rank = if elimination {
                // Shared by everyone with the same depth.
                let first = order
                    .iter()
                    .position(|s| cells[*s].depth() == cell.depth())
                    .unwrap_or(position);
                first as u32 + 1
            } else {
                position as u32 + 1
            };

            let played = cell.wins + cell.losses + cell.draws;
            let win_rate = if played == 0 {
                0.0
            } else {
                f64::from(cell.wins) / f64::from(played)
            };

            entries.push(Ranking {
                participant: cell.participant,
                rank,
                points: cell.points,
                wins: cell.wins,
                losses: cell.losses,
                draws: cell.draws,
                byes: cell.byes,
                win_rate,
                strength_of_schedule: cell.strength_of_schedule,
                eliminated_in: cell.eliminated_in,
            });
        }

        Self { entries }
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, Ranking> {
        self.entries.iter()
    }

    /// Returns the standing of `participant`.
    pub fn get(&self, participant: ParticipantId) -> Option<&Ranking> {
        self.entries.iter().find(|r| r.participant == participant)
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Ranking> {
        self.entries
    }
}

impl Deref for Standings {
    type Target = [Ranking];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a Standings {
    type Item = &'a Ranking;
    type IntoIter = Iter<'a, Ranking>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Clone, Debug)]
struct Cell {
    participant: ParticipantId,
    points: u64,
    wins: u32,
    losses: u32,
    draws: u32,
    byes: u32,
    strength_of_schedule: u64,
    eliminated_in: Option<u32>,
    third_place: bool,
}

impl Cell {
    fn new(participant: ParticipantId) -> Self {
        Self {
            participant,
            points: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            byes: 0,
            strength_of_schedule: 0,
            eliminated_in: None,
            third_place: false,
        }
    }

    fn eliminate(&mut self, round: u32) {
        if self.eliminated_in.is_none() {
            self.eliminated_in = Some(round);
        }
    }

    /// How far the participant got. Participants still in the bracket (or the champion) rank
    /// above everyone eliminated.
    fn depth(&self) -> u64 {
        match self.eliminated_in {
            None => u64::MAX,
            Some(round) => u64::from(round) * 2 + u64::from(self.third_place),
        }
    }

    fn cmp_win_rate(&self, other: &Self) -> Ordering {
        let played = |c: &Self| u64::from(c.wins + c.losses + c.draws);

        match (played(self), played(other)) {
            (0, 0) => Ordering::Equal,
            (0, _) => 0.cmp(&other.wins),
            (_, 0) => self.wins.cmp(&0),
            (a, b) => (u64::from(self.wins) * b).cmp(&(u64::from(other.wins) * a)),
        }
    }
}

/// Returns the seeds in final order.
fn order(cells: &[Cell], head_to_head: &HashMap<(usize, usize), u64>, elimination: bool) -> Vec<usize> {
    let primary = |seed: usize| {
        let depth = if elimination { cells[seed].depth() } else { 0 };
        (depth, cells[seed].points)
    };

    let mut order: Vec<usize> = (0..cells.len()).collect();
    order.sort_by(|a, b| primary(*b).cmp(&primary(*a)).then(a.cmp(b)));

    // Break ties inside every group sharing the primary key.
    let mut start = 0;
    while start < order.len() {
        let key = primary(order[start]);
        let end = order[start..]
            .iter()
            .position(|seed| primary(*seed) != key)
            .map_or(order.len(), |len| start + len);

        if end - start > 1 {
            let group = order[start..end].to_vec();
            let mini = |seed: usize| -> u64 {
                group
                    .iter()
                    .filter_map(|other| head_to_head.get(&(seed, *other)))
                    .sum()
            };

            order[start..end].sort_by(|a, b| {
                mini(*b)
                    .cmp(&mini(*a))
                    .then_with(|| cells[*b].cmp_win_rate(&cells[*a]))
                    .then_with(|| {
                        cells[*b]
                            .strength_of_schedule
                            .cmp(&cells[*a].strength_of_schedule)
                    })
                    .then(a.cmp(b))
            });
        }

        start = end;
    }

    order
}

#[cfg(test)]
mod tests {
    use crate::tests::decided;
    use crate::{entrants, option_values};
    use crate::{
        EntrantSpot, MatchRecord, Outcome, ParticipantId, Phase, RoundRobin, SingleElimination,
    };

    use super::{Scoring, Standings};

    fn ranks(standings: &Standings) -> Vec<(u64, u32)> {
        standings.iter().map(|r| (r.participant.0, r.rank)).collect()
    }

    #[test]
    fn test_scoring_from_values() {
        assert_eq!(Scoring::from_values(&option_values!()), Scoring::default());

        let scoring = Scoring::from_values(&option_values!("score_win" => 2u64, "score_bye" => 1u64));
        assert_eq!(scoring.win, 2);
        assert_eq!(scoring.draw, 1);
        assert_eq!(scoring.bye, 1);
    }

    #[test]
    fn test_standings_points() {
        let system = RoundRobin::new(entrants![1, 2, 3]);
        let history = [decided(1, 2, Some(1)), decided(2, 3, None), decided(1, 3, Some(3))];

        let standings = Standings::new(&system, &history);
        // 1: 3 points, 2: 1 point, 3: 4 points.
        assert_eq!(ranks(&standings), [(3, 1), (1, 2), (2, 3)]);

        let three = standings.get(ParticipantId(3)).unwrap();
        assert_eq!(three.points, 4);
        assert_eq!(three.wins, 1);
        assert_eq!(three.draws, 1);
        assert_eq!(three.win_rate, 0.5);
        // Opponents 1 (3 points) and 2 (1 point).
        assert_eq!(three.strength_of_schedule, 4);
    }

    #[test]
    fn test_standings_head_to_head() {
        let system = RoundRobin::new(entrants![1, 2, 3, 4]);
        // 1 and 3 share 6 points, 2 and 4 share 3. Each pair is split by its direct match.
        let history = [
            decided(1, 2, Some(1)),
            decided(3, 4, Some(3)),
            decided(1, 3, Some(1)),
            decided(2, 4, Some(2)),
            decided(2, 3, Some(3)),
            decided(1, 4, Some(4)),
        ];

        let standings = Standings::new(&system, &history);
        let order: Vec<_> = standings.iter().map(|r| r.participant.0).collect();
        assert_eq!(order, [1, 3, 2, 4]);
    }

    #[test]
    fn test_standings_seed_fallback() {
        let system = RoundRobin::new(entrants![5, 6, 7]);
        let standings = Standings::new(&system, &[]);

        assert_eq!(ranks(&standings), [(5, 1), (6, 2), (7, 3)]);
        assert_eq!(standings, Standings::new(&system, &[]));
    }

    #[test]
    fn test_standings_byes() {
        let system = RoundRobin::new(entrants![1, 2, 3]);
        let bye = MatchRecord {
            entrants: [EntrantSpot::Entrant(ParticipantId(3)), EntrantSpot::Empty],
            outcome: Outcome::Winner(ParticipantId(3)),
            ..decided(0, 0, None)
        };

        let standings = Standings::new(&system, &[decided(1, 2, Some(1)), bye]);
        let three = standings.get(ParticipantId(3)).unwrap();
        assert_eq!(three.points, 3);
        assert_eq!(three.byes, 1);
        assert_eq!(three.wins, 0);
        assert_eq!(three.played(), 0);
    }

    #[test]
    fn test_standings_elimination_depth() {
        let system = SingleElimination::new(entrants![1, 2, 3, 4]);
        let mut history = vec![decided(1, 2, Some(1)), decided(3, 4, Some(3))];
        history[1].slot = 1;

        let mut last = decided(1, 3, Some(1));
        last.round = 2;
        last.slot = 2;
        history.push(last);

        let standings = Standings::new(&system, &history);
        assert_eq!(ranks(&standings), [(1, 1), (3, 2), (2, 3), (4, 3)]);
        assert_eq!(standings.get(ParticipantId(3)).unwrap().eliminated_in, Some(2));
        assert_eq!(standings.get(ParticipantId(1)).unwrap().eliminated_in, None);
    }

    #[test]
    fn test_standings_third_place() {
        let system = SingleElimination::new_with_options(
            entrants![1, 2, 3, 4],
            option_values!("third_place_match" => true),
        );

        let mut third = decided(2, 4, Some(4));
        third.round = 2;
        third.phase = Phase::ThirdPlace;
        third.slot = 3;

        let mut last = decided(1, 3, Some(1));
        last.round = 2;
        last.slot = 2;

        let mut second = decided(3, 4, Some(3));
        second.slot = 1;

        let history = [decided(1, 2, Some(1)), second, last, third];
        let standings = Standings::new(&system, &history);
        assert_eq!(ranks(&standings), [(1, 1), (3, 2), (4, 3), (2, 4)]);
    }
}
