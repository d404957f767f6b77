use std::fs;
use std::path::PathBuf;

use clap::Args;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::error::RecvError;
use tokio::task;
use tourney_core::options::TournamentOptionValues;
use tourney_core::{Format, Generator, ParticipantId};
use tourney_engine::{
    Actor, Advance, Change, Config, Engine, Match, MatchStatus, NewTournament, ScoreReport,
    TournamentId, UserId,
};

use crate::Error;

const ORGANIZER: UserId = UserId(1);

#[derive(Debug, Args)]
pub struct Simulate {
    /// One of single_elimination, double_elimination, swiss_system or round_robin.
    #[clap(short, long)]
    format: Format,
    #[clap(short, long, default_value_t = 8)]
    players: u64,
    /// Seed for the registration order and all results.
    #[clap(short, long, default_value_t = 0)]
    seed: u64,
    /// A format option as `key=value`. Can be given multiple times.
    #[clap(short, long = "option")]
    options: Vec<String>,
    /// Print every change of the tournament as it happens.
    #[clap(long)]
    follow: bool,
    /// Write the final state of the tournament as JSON to this file.
    #[clap(long)]
    save: Option<PathBuf>,
}

impl Simulate {
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let options = self.parse_options()?;
        let engine = Engine::new(config);

        let mut new = NewTournament::new(format!("Simulated {}", self.format), self.format);
        new.options = options;
        let tournament = engine.create_tournament(&Actor::user(ORGANIZER), new)?;

        let follower = match self.follow {
            true => {
                let mut rx = engine.subscribe(tournament.id)?;
                Some(tokio::spawn(async move {
                    loop {
                        match rx.recv().await {
                            Ok(change) => print_change(&change),
                            Err(RecvError::Lagged(skipped)) => {
                                println!("~ skipped {} changes", skipped)
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                }))
            }
            false => None,
        };

        let id = tournament.id;
        let simulation = {
            let engine = engine.clone();
            task::spawn_blocking(move || self.play(&engine, id))
        };

        let res = simulation.await.map_err(|_| Error::Panicked)?;

        // Dropping the last handle closes the change channel.
        drop(engine);
        if let Some(follower) = follower {
            let _ = follower.await;
        }

        res
    }

    fn parse_options(&self) -> Result<TournamentOptionValues, Error> {
        let accepted = Generator::options(self.format);
        let mut values = TournamentOptionValues::new();

        for option in &self.options {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| Error::InvalidOption(option.clone()))?;

            let value = accepted
                .get(key)
                .and_then(|descriptor| descriptor.value.parse_as(value))
                .ok_or_else(|| Error::InvalidOption(option.clone()))?;

            values.set(key, value);
        }

        Ok(values)
    }

    fn play(self, engine: &Engine, id: TournamentId) -> Result<(), Error> {
        let organizer = Actor::user(ORGANIZER);
        let mut rng = StdRng::seed_from_u64(self.seed);

        engine.open_registration(&organizer, id)?;

        let mut users: Vec<UserId> = (0..self.players).map(|n| UserId(1000 + n)).collect();
        users.shuffle(&mut rng);
        for user in users {
            engine.register(&Actor::user(user), id, user.into(), None)?;
        }

        let tournament = engine.start_tournament(&organizer, id)?;
        println!(
            "{} | {} participants | {} rounds",
            tournament.name,
            tournament.entrants.len(),
            tournament.total_rounds
        );

        let mut round = tournament.current_round;
        loop {
            println!();
            println!("Round {}", round);
            println!("Match | Phase | Player A | Player B | Score | Result");

            for m in engine.matches_by_round(id, round)? {
                let m = match m.status == MatchStatus::Scheduled && m.is_playable() {
                    true => {
                        let report = random_report(&mut rng, self.format);
                        engine.report_score(&organizer, m.id, report)?
                    }
                    false => m,
                };

                print_match(&m);
            }

            match engine.advance_round(&organizer, id, Some(round))? {
                Advance::Round(summary) => {
                    log::debug!("Advanced to {:?}", summary);
                    round = summary.new_round;
                }
                Advance::Finished { standings } => {
                    println!();
                    println!("Rank | Player | Points | W | L | D | Byes | SOS");
                    for ranking in standings.iter() {
                        println!(
                            "{} | {} | {} | {} | {} | {} | {} | {}",
                            ranking.rank,
                            ranking.participant,
                            ranking.points,
                            ranking.wins,
                            ranking.losses,
                            ranking.draws,
                            ranking.byes,
                            ranking.strength_of_schedule
                        );
                    }

                    break;
                }
            }
        }

        if let Some(path) = &self.save {
            let json = engine.snapshot(id)?.to_json()?;
            fs::write(path, json).map_err(|err| Error::Save(path.clone(), err))?;
            println!();
            println!("Saved tournament to {}", path.display());
        }

        Ok(())
    }
}

fn random_report(rng: &mut StdRng, format: Format) -> ScoreReport {
    let a: u32 = rng.gen_range(0..=3);
    let mut b: u32 = rng.gen_range(0..=3);

    if a == b && !format.allows_draws() {
        b = if a == 0 { 1 } else { a - 1 };
    }

    ScoreReport::new(a, b)
}

fn player(m: &Match, index: usize) -> String {
    match m.entrants[index].entrant() {
        Some(ParticipantId(id)) => id.to_string(),
        None if m.entrants[index].is_empty() => String::from("-"),
        None => String::from("TBD"),
    }
}

fn print_match(m: &Match) {
    let result = match m.winner() {
        Some(winner) if m.is_bye() => format!("bye for {}", winner),
        Some(winner) => format!("{} wins", winner),
        None if m.status.is_decided() => String::from("draw or no winner"),
        None => String::from("pending"),
    };

    println!(
        "{} | {} | {} | {} | {}:{} | {} ({})",
        m.id,
        m.phase,
        player(m, 0),
        player(m, 1),
        m.scores[0],
        m.scores[1],
        result,
        m.status
    );
}

fn print_change(change: &Change) {
    match change {
        Change::Status { status, .. } => println!("~ tournament is now {}", status),
        Change::Registration {
            registration,
            status,
            ..
        } => println!("~ registration {} is now {}", registration, status),
        Change::UpdateMatch(m) => println!("~ match {} is now {}", m.id, m.status),
        Change::ResetMatch { id } => println!("~ match {} was reset", id),
        Change::RemoveMatch { id } => println!("~ match {} was removed", id),
        Change::Round { round, .. } => println!("~ round {} generated", round),
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tourney_core::Format;

    use super::random_report;

    #[test]
    fn test_random_report_no_draws() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let report = random_report(&mut rng, Format::SingleElimination);
            assert_ne!(report.scores[0], report.scores[1]);
        }
    }
}
