//! # Seeding
//!
//! A [`Seeding`] method turns the registration order of the participants into the seeding
//! order of the [`Entrants`] pool. Generators only ever see the seeded pool.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::options::{Error, OptionValue, TournamentOption, TournamentOptionValues, TournamentOptions};
use crate::{Entrants, ParticipantId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the participant pool is ordered when a tournament starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Seeding {
    /// Seeds in the given order, usually the registration order.
    Registration,
    /// Shuffles the pool. The same `seed` always produces the same order.
    Random { seed: u64 },
}

impl Seeding {
    pub const OPTION: &'static str = "seeding";
    pub const SEED_OPTION: &'static str = "seeding_seed";

    /// Adds the seeding options accepted by every format to `options`.
    pub(crate) fn add_options(options: &mut TournamentOptions) {
        options.insert(
            Self::OPTION,
            TournamentOption {
                name: String::from("Seeding method: registration or random."),
                value: OptionValue::String(String::from("registration")),
            },
        );
        options.insert(
            Self::SEED_OPTION,
            TournamentOption {
                name: String::from("Seed of the random seeding method."),
                value: OptionValue::U64(0),
            },
        );
    }

    /// Reads the seeding method from `values`. A missing method means registration order.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the method is unknown or not a string.
    pub fn from_values(values: &TournamentOptionValues) -> Result<Self, Error> {
        match values.get(Self::OPTION) {
            None => Ok(Self::Registration),
            Some(OptionValue::String(method)) => match method.as_str() {
                "registration" | "manual" => Ok(Self::Registration),
                "random" => Ok(Self::Random {
                    seed: values.u64_or(Self::SEED_OPTION, 0),
                }),
                _ => Err(Error::UnknownValue {
                    key: String::from(Self::OPTION),
                    value: method.clone(),
                }),
            },
            Some(value) => Err(Error::InvalidValue {
                key: String::from(Self::OPTION),
                found: value.value_type(),
                expected: "string",
            }),
        }
    }

    /// Orders `participants` into the seeded pool.
    pub fn apply(self, mut participants: Vec<ParticipantId>) -> Entrants {
        if let Self::Random { seed } = self {
            log::debug!(
                "Shuffling {} participants with seed {}",
                participants.len(),
                seed
            );

            let mut rng = StdRng::seed_from_u64(seed);
            participants.shuffle(&mut rng);
        }

        Entrants::from(participants)
    }
}

impl Default for Seeding {
    #[inline]
    fn default() -> Self {
        Self::Registration
    }
}
