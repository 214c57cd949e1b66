//! Matcher lifecycle integration tests
//!
//! These tests run the periodic loop against real time and exercise
//! configuration refresh through a provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use war_room::config::{ConfigProvider, MatchingConfig, ReloadableConfigProvider};
use war_room::error::Result;
use war_room::matcher::{Matcher, MatcherOptions, RecordingRoomSink};
use war_room::squad::Group;
use war_room::types::{GroupState, MatchDomain};
use war_room::utils::ManualClock;

use crate::fixtures::{group, shared, shared_all, solos, TestSystem, START};

/// Provider that serves one good configuration, then only failures
struct FlakyProvider {
    config: MatchingConfig,
    calls: AtomicUsize,
}

impl ConfigProvider for FlakyProvider {
    fn matching_config(&self) -> Result<MatchingConfig> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < 3 {
            Ok(self.config.clone())
        } else {
            Err(anyhow::anyhow!("config store unreachable"))
        }
    }
}

fn matcher_with(provider: Arc<dyn ConfigProvider>) -> (Arc<Matcher>, Arc<RecordingRoomSink>) {
    let sink = Arc::new(RecordingRoomSink::new());
    let matcher = Matcher::with_options(
        MatchDomain::new("ranked", "1.0"),
        provider,
        sink.clone(),
        MatcherOptions {
            clock: Arc::new(ManualClock::new(START)),
            ..MatcherOptions::default()
        },
    )
    .unwrap();
    (Arc::new(matcher), sink)
}

async fn wait_for_rooms(sink: &RecordingRoomSink, rooms: usize, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if sink.room_count() >= rooms {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    sink.room_count() >= rooms
}

#[tokio::test]
async fn test_loop_matches_until_stopped() {
    let mut config = MatchingConfig::default();
    config.tick_interval_ms = 20;
    let system = TestSystem::new(config);

    let a = group("a", &[1500.0; 5]);
    let b = group("b", &[1510.0; 5]);
    system
        .matcher
        .add_groups(vec![shared(&a), shared(&b)])
        .unwrap();

    system.matcher.start().unwrap();
    assert!(system.matcher.start().is_err());

    assert!(wait_for_rooms(&system.sink, 1, Duration::from_secs(2)).await);
    assert_eq!(a.state(), GroupState::Matched);

    let cancelled = system.matcher.stop().await.unwrap();
    assert_eq!(cancelled, 0);
    assert!(system.matcher.get_stats().unwrap().cycles >= 1);
    assert!(system.matcher.start().is_err());
}

#[tokio::test]
async fn test_stop_waits_for_loop_and_cancels() {
    let mut config = MatchingConfig::default();
    config.tick_interval_ms = 10;
    let system = TestSystem::new(config);
    system.matcher.start().unwrap();

    let waiting = solos("solo", 3, 1000.0, 0.0);
    system.matcher.add_groups(shared_all(&waiting)).unwrap();
    sleep(Duration::from_millis(50)).await;

    let cancelled = system.matcher.stop().await.unwrap();
    assert_eq!(cancelled, 3);
    assert!(waiting.iter().all(|g| g.state() == GroupState::Unready));
    assert_eq!(system.sink.room_count(), 0);
}

#[tokio::test]
async fn test_config_refresh_applies_new_policy() {
    let mut config = MatchingConfig::default();
    config.config_refresh_cycles = 1;
    let provider = Arc::new(ReloadableConfigProvider::new(config.clone()).unwrap());
    let (matcher, sink) = matcher_with(provider.clone());

    let players = solos("solo", 5, 1000.0, 0.0);
    matcher.add_groups(shared_all(&players)).unwrap();

    // One team of solos cannot fill a two-sided room
    let report = matcher.run_cycle().await.unwrap();
    assert_eq!(report.rooms, 0);

    config.room_side_count = 1;
    provider.update(config).unwrap();

    let report = matcher.run_cycle().await.unwrap();
    assert_eq!(matcher.config().unwrap().room_side_count, 1);
    assert_eq!(matcher.normal_queue().config().unwrap().room_side_count, 1);
    assert_eq!(report.rooms, 1);
    assert!(wait_for_rooms(&sink, 1, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_config() {
    let mut config = MatchingConfig::default();
    config.config_refresh_cycles = 1;
    config.match_timeout_sec = 45;
    let provider = Arc::new(FlakyProvider {
        config,
        calls: AtomicUsize::new(0),
    });
    let (matcher, _sink) = matcher_with(provider);

    for _ in 0..3 {
        matcher.run_cycle().await.unwrap();
    }
    assert_eq!(matcher.config().unwrap().match_timeout_sec, 45);
    assert_eq!(matcher.get_stats().unwrap().cycles, 3);
}
