//! High concurrency stress tests for group submission
//!
//! These tests submit groups from many tasks while cycles run and check
//! that every group ends up seated exactly once.

use futures::future::join_all;
use std::collections::HashSet;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use war_room::config::MatchingConfig;
use war_room::squad::Group;
use war_room::types::GroupState;

use crate::fixtures::{group, shared_all, TestSystem};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submission_while_cycling() {
    let system = TestSystem::new(MatchingConfig::default());
    let tasks = 10;
    let per_task = 100;

    let start = Instant::now();
    let cycler = {
        let matcher = system.matcher.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                matcher.run_cycle().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let submitters = (0..tasks).map(|t| {
        let matcher = system.matcher.clone();
        tokio::spawn(async move {
            let groups: Vec<_> = (0..per_task)
                .map(|i| group(&format!("t{:02}-{:03}", t, i), &[1000.0]))
                .collect();
            for batch in groups.chunks(10) {
                matcher.add_groups(shared_all(batch)).unwrap();
                tokio::task::yield_now().await;
            }
            groups
        })
    });
    let submitted: Vec<_> = join_all(submitters)
        .await
        .into_iter()
        .flat_map(|result| result.unwrap())
        .collect();
    cycler.await.unwrap();

    // Anything still waiting is a multiple of a room and fits one final cycle
    system.matcher.run_cycle().await.unwrap();
    let elapsed = start.elapsed();

    let total = tasks * per_task;
    let expected_rooms = total / 10;
    let deadline = Instant::now() + Duration::from_secs(5);
    while system.sink.room_count() < expected_rooms && Instant::now() < deadline {
        sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(submitted.len(), total);
    assert_eq!(system.sink.room_count(), expected_rooms);
    assert!(system.matcher.normal_queue().is_empty());
    assert!(submitted.iter().all(|g| g.state() == GroupState::Matched));

    let mut seen = HashSet::new();
    for room in system.sink.group_ids() {
        assert_eq!(room.len(), 10);
        for id in room {
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), total);

    let stats = system.matcher.get_stats().unwrap();
    assert_eq!(stats.groups_queued, total as u64);
    assert_eq!(stats.players_matched, total as u64);

    println!("Seated {} solos in {:?}", total, elapsed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cycles_are_serialized() {
    let system = TestSystem::new(MatchingConfig::default());
    let groups: Vec<_> = (0..200)
        .map(|i| group(&format!("g{:03}", i), &[1200.0]))
        .collect();
    system.matcher.add_groups(shared_all(&groups)).unwrap();

    let cycles = (0..8).map(|_| {
        let matcher = system.matcher.clone();
        tokio::spawn(async move { matcher.run_cycle().await.unwrap() })
    });
    let reports: Vec<_> = join_all(cycles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let rooms: usize = reports.iter().map(|r| r.rooms).sum();
    assert_eq!(rooms, 20);

    let mut numbers: Vec<u64> = reports.iter().map(|r| r.cycle).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=8).collect::<Vec<u64>>());
    assert!(system.matcher.normal_queue().is_empty());
}
