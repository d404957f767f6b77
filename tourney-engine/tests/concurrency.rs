mod common;

use std::sync::Barrier;
use std::thread;

use common::{engine, organizer, round, started};
use tourney_core::Format;
use tourney_engine::{Conflict, Error, MatchStatus, ScoreReport};

#[test]
fn test_concurrent_reports_same_match() {
    let (engine, clock) = engine();
    let id = started(&engine, &clock, Format::SingleElimination, 2);
    let m = round(&engine, id, 1).remove(0);
    let (match_id, version) = (m.id, m.version);

    let threads = 8;
    let barrier = Barrier::new(threads);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|n| {
                let engine = &engine;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    let report = ScoreReport::new(n as u32 + 1, 0).with_version(version);
                    engine.report_score(&organizer(), match_id, report)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let applied: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(applied.len(), 1);

    for result in &results {
        match result {
            Ok(_) => (),
            Err(err) => {
                assert!(
                    matches!(err, Error::ConcurrentModification { .. }),
                    "unexpected error {:?}",
                    err
                );
                assert!(err.is_retryable());
            }
        }
    }

    // The stored result is the one that was applied, never a mix of reports.
    let stored = engine.get_match(m.id).unwrap();
    assert_eq!(stored.status, MatchStatus::Finished);
    assert_eq!(stored.scores, applied[0].scores);
    assert_eq!(stored.version, m.version + 1);
}

#[test]
fn test_parallel_reports_different_matches() {
    let (engine, clock) = engine();
    let id = started(&engine, &clock, Format::SingleElimination, 32);
    let matches = round(&engine, id, 1);
    assert_eq!(matches.len(), 16);

    let barrier = Barrier::new(matches.len());
    thread::scope(|s| {
        for m in &matches {
            let engine = &engine;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                engine
                    .report_score(&organizer(), m.id, ScoreReport::new(2, 1))
                    .unwrap();
            });
        }
    });

    assert!(round(&engine, id, 1)
        .iter()
        .all(|m| m.status == MatchStatus::Finished));
    engine.advance_round(&organizer(), id, Some(1)).unwrap();
    assert_eq!(round(&engine, id, 2).len(), 8);
}

#[test]
fn test_concurrent_advance() {
    let (engine, clock) = engine();
    let id = started(&engine, &clock, Format::Swiss, 8);
    common::play_round(&engine, id, 1);

    let threads = 4;
    let barrier = Barrier::new(threads);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let engine = &engine;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine.advance_round(&organizer(), id, Some(1))
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            err,
            Error::ConcurrentModification {
                conflict: Conflict::Version {
                    expected: 1,
                    found: 2
                },
                ..
            }
        ));
    }

    assert_eq!(engine.get_tournament(id).unwrap().current_round, 2);
    assert_eq!(round(&engine, id, 2).len(), 4);
}
