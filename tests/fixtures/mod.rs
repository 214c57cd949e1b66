//! Test fixtures and helper implementations for integration testing

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use war_room::config::{MatchingConfig, StaticConfigProvider};
use war_room::matcher::{Matcher, MatcherOptions, RecordingRoomSink};
use war_room::rating::RatedPlayer;
use war_room::squad::{EntityFactory, Group, PartyGroup, Room, StandardFactory, Team};
use war_room::types::{MatchDomain, UnixSeconds};
use war_room::utils::ManualClock;

/// Wall-clock second every fixture starts from
pub const START: UnixSeconds = 1_700_000_000;

/// Group whose members all started waiting at `wait_start`
pub fn group_at(id: &str, mmrs: &[f64], wait_start: UnixSeconds) -> Arc<PartyGroup> {
    let players = mmrs
        .iter()
        .enumerate()
        .map(|(i, mmr)| RatedPlayer::with_mmr(format!("{}-{}", id, i), *mmr, wait_start))
        .collect();
    Arc::new(PartyGroup::new(id, players).expect("fixture group must be non-empty"))
}

/// Group that started waiting at [`START`]
pub fn group(id: &str, mmrs: &[f64]) -> Arc<PartyGroup> {
    group_at(id, mmrs, START)
}

/// Solo players with evenly spaced ratings
pub fn solos(prefix: &str, count: usize, base_mmr: f64, step: f64) -> Vec<Arc<PartyGroup>> {
    (0..count)
        .map(|i| group(&format!("{}{:03}", prefix, i), &[base_mmr + step * i as f64]))
        .collect()
}

pub fn shared(group: &Arc<PartyGroup>) -> Arc<dyn Group> {
    group.clone()
}

pub fn shared_all(groups: &[Arc<PartyGroup>]) -> Vec<Arc<dyn Group>> {
    groups.iter().map(shared).collect()
}

/// Factory that panics when a pass tries to open a room
#[derive(Debug, Default)]
pub struct PanickingFactory {
    pub rooms_attempted: AtomicUsize,
}

impl EntityFactory for PanickingFactory {
    fn new_team(&self, seed: Arc<dyn Group>) -> Box<dyn Team> {
        StandardFactory.new_team(seed)
    }

    fn new_room(&self, _seed: Box<dyn Team>) -> Box<dyn Room> {
        self.rooms_attempted.fetch_add(1, Ordering::SeqCst);
        panic!("room construction failed");
    }

    fn new_room_with_bots(&self, team: Box<dyn Team>, bot_sides: usize) -> Box<dyn Room> {
        StandardFactory.new_room_with_bots(team, bot_sides)
    }
}

/// A matcher wired to a recording sink and a manual clock
pub struct TestSystem {
    pub matcher: Arc<Matcher>,
    pub sink: Arc<RecordingRoomSink>,
    pub clock: Arc<ManualClock>,
}

impl TestSystem {
    pub fn new(config: MatchingConfig) -> Self {
        Self::with_factory(config, Arc::new(StandardFactory))
    }

    pub fn with_factory(config: MatchingConfig, factory: Arc<dyn EntityFactory>) -> Self {
        let sink = Arc::new(RecordingRoomSink::new());
        let clock = Arc::new(ManualClock::new(START));
        let matcher = Matcher::with_options(
            MatchDomain::new("ranked", "1.0"),
            Arc::new(StaticConfigProvider::new(config)),
            sink.clone(),
            MatcherOptions {
                clock: clock.clone(),
                factory,
                ..MatcherOptions::default()
            },
        )
        .expect("fixture matcher must build");

        Self {
            matcher: Arc::new(matcher),
            sink,
            clock,
        }
    }

    /// Let fire-and-forget publishes land
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}
