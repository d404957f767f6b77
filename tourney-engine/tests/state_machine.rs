mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{engine, open_tournament, organizer, play_round, player, started};
use tourney_core::Format;
use tourney_engine::{
    Actor, Clock, Config, Engine, Error, ManualClock, NewTournament, RolePermissions, TournamentId,
    TournamentSnapshot, TournamentStatus, UserId,
};

/// Every status, in the order the state machine visits them.
const TARGETS: [TournamentStatus; 6] = [
    TournamentStatus::Draft,
    TournamentStatus::RegistrationOpen,
    TournamentStatus::RegistrationClosed,
    TournamentStatus::InProgress,
    TournamentStatus::Finished,
    TournamentStatus::Cancelled,
];

/// Asserts that the projected transitions are exactly those `update_status` accepts. Every
/// attempt runs on a fresh copy of the tournament.
fn assert_consistent(snapshot: &TournamentSnapshot, clock: &Arc<ManualClock>) {
    let id = snapshot.tournament.id;
    let copy = || {
        let engine = Engine::with_collaborators(
            Config::default(),
            clock.clone(),
            Arc::new(RolePermissions),
        );
        engine.restore(snapshot.clone()).unwrap();
        engine
    };

    let available: Vec<TournamentStatus> = copy()
        .get_available_transitions(id)
        .unwrap()
        .iter()
        .map(|t| t.to)
        .collect();

    for to in TARGETS {
        let result = copy().update_status(&Actor::admin(UserId(99)), id, to, None);
        assert_eq!(
            result.is_ok(),
            available.contains(&to),
            "{} -> {}: {:?}",
            snapshot.tournament.status,
            to,
            result
        );
    }
}

fn snapshot(engine: &Engine, id: TournamentId) -> TournamentSnapshot {
    engine.snapshot(id).unwrap()
}

#[test]
fn test_available_transitions_consistent() {
    let (engine, clock) = engine();
    let mut cases = Vec::new();

    let draft = engine
        .create_tournament(&organizer(), NewTournament::new("Draft", Format::Swiss))
        .unwrap();
    cases.push(snapshot(&engine, draft.id));

    let single = open_tournament(&engine, &clock, NewTournament::new("One", Format::Swiss), 1);
    cases.push(snapshot(&engine, single));

    let open = open_tournament(&engine, &clock, NewTournament::new("Open", Format::Swiss), 4);
    cases.push(snapshot(&engine, open));

    let mut late = NewTournament::new("Late", Format::RoundRobin);
    late.allow_late_registration = true;
    let late = open_tournament(&engine, &clock, late, 4);
    cases.push(snapshot(&engine, late));

    let closed = open_tournament(&engine, &clock, NewTournament::new("Closed", Format::Swiss), 4);
    engine.close_registration(&organizer(), closed).unwrap();
    cases.push(snapshot(&engine, closed));

    let mut expired = NewTournament::new("Expired", Format::Swiss);
    expired.registration_deadline = Some(clock.now() + Duration::hours(1));
    let expired = open_tournament(&engine, &clock, expired, 2);
    clock.advance(Duration::hours(2));
    cases.push(snapshot(&engine, expired));

    let running = started(&engine, &clock, Format::SingleElimination, 4);
    cases.push(snapshot(&engine, running));

    let last_round = started(&engine, &clock, Format::SingleElimination, 2);
    play_round(&engine, last_round, 1);
    cases.push(snapshot(&engine, last_round));

    let finished = started(&engine, &clock, Format::SingleElimination, 2);
    play_round(&engine, finished, 1);
    engine.advance_round(&organizer(), finished, None).unwrap();
    cases.push(snapshot(&engine, finished));

    let cancelled = open_tournament(&engine, &clock, NewTournament::new("Gone", Format::Swiss), 2);
    engine
        .cancel_tournament(&organizer(), cancelled, Some(String::from("venue closed")))
        .unwrap();
    cases.push(snapshot(&engine, cancelled));

    for case in &cases {
        assert_consistent(case, &clock);
    }
}

#[test]
fn test_transitions() {
    let (engine, clock) = engine();
    let id = open_tournament(&engine, &clock, NewTournament::new("Cup", Format::Swiss), 1);

    assert_eq!(
        engine.start_tournament(&organizer(), id),
        Err(Error::InsufficientParticipants {
            tournament: id,
            required: 2,
            found: 1
        })
    );

    engine
        .register(&common::actor(player(1)), id, player(1), None)
        .unwrap();
    engine.close_registration(&organizer(), id).unwrap();
    engine.open_registration(&organizer(), id).unwrap();

    let tournament = engine.start_tournament(&organizer(), id).unwrap();
    assert_eq!(tournament.status, TournamentStatus::InProgress);
    assert_eq!(tournament.current_round, 1);
    assert!(tournament.started_at.is_some());

    assert!(matches!(
        engine.update_status(&organizer(), id, TournamentStatus::Finished, None),
        Err(Error::RoundNotComplete { .. })
    ));
    assert!(matches!(
        engine.open_registration(&organizer(), id),
        Err(Error::InvalidTransition { .. })
    ));

    let tournament = engine
        .cancel_tournament(&organizer(), id, Some(String::from("rain")))
        .unwrap();
    assert_eq!(tournament.status, TournamentStatus::Cancelled);
    assert_eq!(tournament.cancel_reason.as_deref(), Some("rain"));
    assert!(engine.get_available_transitions(id).unwrap().is_empty());

    // Matches of a cancelled tournament are frozen.
    let m = &common::round(&engine, id, 1)[0];
    assert!(matches!(
        engine.report_score(&organizer(), m.id, tourney_engine::ScoreReport::new(1, 0)),
        Err(Error::InvalidTransition { .. })
    ));
}

#[test]
fn test_transitions_forbidden() {
    let (engine, clock) = engine();
    let id = open_tournament(&engine, &clock, NewTournament::new("Cup", Format::Swiss), 2);
    let stranger = Actor::user(UserId(5000));

    assert!(matches!(
        engine.start_tournament(&stranger, id),
        Err(Error::Forbidden { .. })
    ));

    engine
        .add_organizer(&organizer(), id, stranger.user, tourney_engine::OrganizerRole::Admin)
        .unwrap();
    engine.start_tournament(&stranger, id).unwrap();
}
