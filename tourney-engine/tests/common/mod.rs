#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tourney_core::{Format, ParticipantId};
use tourney_engine::{
    Actor, Config, Engine, ManualClock, Match, MatchId, MatchStatus, NewTournament,
    RolePermissions, ScoreReport, TournamentId, UserId,
};

pub const ORGANIZER: UserId = UserId(1);

pub fn organizer() -> Actor {
    Actor::user(ORGANIZER)
}

/// The participant registered `n`-th, starting at 0.
pub fn player(n: u64) -> ParticipantId {
    ParticipantId(100 + n)
}

pub fn actor(participant: ParticipantId) -> Actor {
    Actor::user(UserId(participant.0))
}

pub fn engine() -> (Engine, Arc<ManualClock>) {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));

    let engine = Engine::with_collaborators(
        Config::default(),
        clock.clone(),
        Arc::new(RolePermissions),
    );

    (engine, clock)
}

/// Creates a tournament with `players` confirmed registrations in seeding order and opens
/// registration.
pub fn open_tournament(
    engine: &Engine,
    clock: &ManualClock,
    new: NewTournament,
    players: u64,
) -> TournamentId {
    let id = engine.create_tournament(&organizer(), new).unwrap().id;
    engine.open_registration(&organizer(), id).unwrap();

    for n in 0..players {
        clock.advance(Duration::seconds(1));
        engine
            .register(&actor(player(n)), id, player(n), None)
            .unwrap();
    }

    id
}

/// Creates and starts a tournament of `format` with `players` participants.
pub fn started(engine: &Engine, clock: &ManualClock, format: Format, players: u64) -> TournamentId {
    let id = open_tournament(engine, clock, NewTournament::new("Cup", format), players);
    engine.start_tournament(&organizer(), id).unwrap();
    id
}

pub fn round(engine: &Engine, id: TournamentId, round: u32) -> Vec<Match> {
    engine.matches_by_round(id, round).unwrap()
}

/// Returns the match of `participant` in `round`.
pub fn match_of(engine: &Engine, id: TournamentId, round: u32, participant: ParticipantId) -> Match {
    self::round(engine, id, round)
        .into_iter()
        .find(|m| m.contains(participant))
        .unwrap()
}

/// Reports a 2-0 win of `winner` as the organizer.
pub fn win(engine: &Engine, m: MatchId, winner: ParticipantId) -> Match {
    let current = engine.get_match(m).unwrap();
    let report = match current.position(winner).unwrap() {
        0 => ScoreReport::new(2, 0),
        _ => ScoreReport::new(0, 2),
    };

    engine.report_score(&organizer(), m, report).unwrap()
}

/// Decides every open match of `round` in favor of the first spot.
pub fn play_round(engine: &Engine, id: TournamentId, round: u32) {
    for m in self::round(engine, id, round) {
        if m.status == MatchStatus::Scheduled && m.is_playable() {
            engine
                .report_score(&organizer(), m.id, ScoreReport::new(1, 0))
                .unwrap();
        }
    }
}
