use std::env;
use std::fs;
use std::io;
use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tourney_core::options::TournamentOptionValues;

macro_rules! from_environment {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            {
                if let Ok(value) = env::var($key) {
                    if let Ok(value) = value.parse() {
                        $config.$name = value;
                    }
                }
            }
        )*
    }};
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: LevelFilter,
    pub defaults: Defaults,
    pub events: Events,
}

impl Config {
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let buf = fs::read_to_string(path)?;

        Ok(toml::from_str(&buf)?)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "TOURNEY_LOGLEVEL", loglevel);
        self.defaults = self.defaults.with_environment();
        self.events = self.events.with_environment();

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: LevelFilter::Info,
            defaults: Defaults::default(),
            events: Events::default(),
        }
    }
}

/// Values used for tournaments that do not set their own.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub min_players: u32,
    pub score_win: u64,
    pub score_draw: u64,
    pub score_loss: u64,
    pub score_bye: u64,
}

impl Defaults {
    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "TOURNEY_MIN_PLAYERS",
            min_players,
            "TOURNEY_SCORE_WIN",
            score_win,
            "TOURNEY_SCORE_DRAW",
            score_draw,
            "TOURNEY_SCORE_LOSS",
            score_loss,
            "TOURNEY_SCORE_BYE",
            score_bye,
        );

        self
    }

    /// Returns the scoring options every format accepts.
    pub fn option_values(&self) -> TournamentOptionValues {
        let mut values = TournamentOptionValues::new();
        values.set("score_win", self.score_win);
        values.set("score_draw", self.score_draw);
        values.set("score_loss", self.score_loss);
        values.set("score_bye", self.score_bye);
        values
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            min_players: 2,
            score_win: 3,
            score_draw: 1,
            score_loss: 0,
            score_bye: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Events {
    /// Capacity of the change notification channel of every tournament. Slow subscribers
    /// miss changes once it is exceeded.
    pub capacity: usize,
}

impl Events {
    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "TOURNEY_EVENT_CAPACITY", capacity);

        self
    }
}

impl Default for Events {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
