use crate::options::{TournamentOptionValues, TournamentOptions};
use crate::standings::Scoring;
use crate::{
    EntrantSpot, Entrants, Format, MatchRecord, NewRound, Pairing, Phase, Result, RoundOutcome,
    System,
};

/// A round robin tournament.
///
/// The complete schedule is computed up front with the circle method: the first participant is
/// pinned, all others rotate by one position every round. With an odd number of participants a
/// phantom participant is added, whoever is paired against it receives a bye.
#[derive(Clone, Debug)]
pub struct RoundRobin {
    entrants: Entrants,
    /// Seeds of every table of every round. `None` is the phantom participant.
    schedule: Vec<Vec<[Option<usize>; 2]>>,
    options: RoundRobinOptions,
}

impl RoundRobin {
    pub fn new(entrants: Entrants) -> Self {
        Self::new_with_options(entrants, TournamentOptionValues::default())
    }

    pub fn new_with_options<O>(entrants: Entrants, options: O) -> Self
    where
        O: Into<TournamentOptionValues>,
    {
        let options = RoundRobinOptions {
            scoring: Scoring::from_values(&options.into()),
        };

        log::debug!(
            "Creating new RoundRobin bracket with {} entrants",
            entrants.len()
        );

        let schedule = Self::build_schedule(entrants.len());

        Self {
            entrants,
            schedule,
            options,
        }
    }

    /// Returns the [`TournamentOptions`] accepted by this system.
    pub fn options() -> TournamentOptions {
        Scoring::add_options(TournamentOptions::builder()).build()
    }

    fn build_schedule(num_entrants: usize) -> Vec<Vec<[Option<usize>; 2]>> {
        if num_entrants < 2 {
            return Vec::new();
        }

        // entrants.len() if even, entrants.len() + 1 if odd.
        let n = num_entrants + num_entrants % 2;
        let seat = |index: usize| (index < num_entrants).then_some(index);

        (0..n - 1)
            .map(|round| {
                (0..n / 2)
                    .map(|table| {
                        let first = Self::circle_entrant(n, round, table);
                        let second = Self::circle_entrant(n, round, n - table - 1);
                        [seat(first), seat(second)]
                    })
                    .collect()
            })
            .collect()
    }

    /// Returns the index of the entrant at the given `index` in a circle of length `n` at the
    /// given `round`.
    #[inline]
    fn circle_entrant(n: usize, round: usize, index: usize) -> usize {
        debug_assert!(n % 2 == 0);

        if index == 0 {
            return 0;
        }

        1 + (index - 1 + round) % (n - 1)
    }

    /// Returns the pairings of every round.
    pub fn schedule(&self) -> Vec<NewRound> {
        (0..self.schedule.len())
            .map(|round| self.round(round))
            .collect()
    }

    fn round(&self, round: usize) -> NewRound {
        let spot = |seat: Option<usize>| match seat {
            Some(seed) => EntrantSpot::Entrant(self.entrants[seed]),
            None => EntrantSpot::Empty,
        };

        let pairings = self.schedule[round]
            .iter()
            .enumerate()
            .map(|(slot, tables)| {
                // The participant receiving a bye always takes the first spot.
                let entrants = match tables {
                    [None, seat] | [seat, None] => [spot(*seat), EntrantSpot::Empty],
                    [a, b] => [spot(*a), spot(*b)],
                };

                Pairing {
                    phase: Phase::Main,
                    slot,
                    entrants,
                }
            })
            .collect();

        NewRound {
            round: round as u32 + 1,
            pairings,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct RoundRobinOptions {
    scoring: Scoring,
}

impl System for RoundRobin {
    fn format(&self) -> Format {
        Format::RoundRobin
    }

    #[inline]
    fn entrants(&self) -> &Entrants {
        &self.entrants
    }

    fn scoring(&self) -> Scoring {
        self.options.scoring
    }

    fn total_rounds(&self) -> u32 {
        self.schedule.len() as u32
    }

    fn generate_round(&self, _history: &[MatchRecord], current_round: u32) -> Result<RoundOutcome> {
        let round = current_round as usize;
        if round >= self.schedule.len() {
            return Ok(RoundOutcome::Terminal);
        }

        Ok(RoundOutcome::Round(self.round(round)))
    }
}
