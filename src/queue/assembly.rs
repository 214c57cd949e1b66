//! Single assembly pass over a queue snapshot
//!
//! The pass runs `BuildingTeams -> FillingBots -> BuildingRooms` over an
//! owned snapshot. All scratch state is local: teams and rooms that do not
//! fill up are dissolved, and their groups come back as leftovers. Given the
//! same snapshot, clock and configuration the pass always makes the same
//! groupings.

use crate::queue::matching::{can_group_join_team, can_team_join_room, MatchContext};
use crate::queue::search::SortedPool;
use crate::squad::{EntityFactory, Group, Room, Team};
use crate::types::UnixSeconds;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Result of one pass
#[derive(Debug, Default)]
pub struct AssemblyOutcome {
    /// Completed rooms; their groups are still `Queuing` until published
    pub rooms: Vec<Box<dyn Room>>,
    /// Groups to wait for the next cycle
    pub leftovers: Vec<Arc<dyn Group>>,
    /// How many of `rooms` were completed with bots
    pub bot_rooms: usize,
}

/// Matching order: key ascending, then earliest wait, then id
fn matching_order(a: (f64, UnixSeconds, &str), b: (f64, UnixSeconds, &str)) -> Ordering {
    a.0.total_cmp(&b.0)
        .then(a.1.cmp(&b.1))
        .then_with(|| a.2.cmp(b.2))
}

/// Run one pass over `groups`
pub fn assemble(
    groups: Vec<Arc<dyn Group>>,
    ctx: &MatchContext,
    factory: &dyn EntityFactory,
) -> AssemblyOutcome {
    let mut outcome = AssemblyOutcome::default();

    let (full_teams, mut leftovers) = build_teams(groups, ctx, factory);
    outcome.leftovers.append(&mut leftovers);

    let remaining = fill_bots(full_teams, ctx, factory, &mut outcome);
    build_rooms(remaining, ctx, factory, &mut outcome);

    debug!(
        "Assembly pass: {} rooms ({} with bots), {} leftover groups",
        outcome.rooms.len(),
        outcome.bot_rooms,
        outcome.leftovers.len()
    );

    outcome
}

/// Combine groups into full teams; everything else is returned as leftovers
fn build_teams(
    groups: Vec<Arc<dyn Group>>,
    ctx: &MatchContext,
    factory: &dyn EntityFactory,
) -> (Vec<Box<dyn Team>>, Vec<Arc<dyn Group>>) {
    let squad_size = ctx.rules.squad_size;
    let mut leftovers = Vec::new();

    // Groups that can never fit a team wait until they time out
    let (groups, oversized): (Vec<_>, Vec<_>) = groups
        .into_iter()
        .partition(|g| g.player_count() <= squad_size);
    leftovers.extend(oversized);

    let keys: Vec<f64> = groups.iter().map(|g| g.effective_mmr(&ctx.rules)).collect();
    let starts: Vec<UnixSeconds> = groups.iter().map(|g| g.start_match_time_sec()).collect();

    let mut by_mmr: Vec<usize> = (0..groups.len()).collect();
    by_mmr.sort_by(|&a, &b| {
        matching_order(
            (keys[a], starts[a], groups[a].id().as_str()),
            (keys[b], starts[b], groups[b].id().as_str()),
        )
    });
    let mut pool = SortedPool::from_sorted(by_mmr.iter().map(|&i| (i, keys[i])));

    let mut seeds: Vec<usize> = (0..groups.len()).collect();
    seeds.sort_by(|&a, &b| {
        starts[a]
            .cmp(&starts[b])
            .then_with(|| groups[a].id().cmp(groups[b].id()))
    });

    let mut taken = vec![false; groups.len()];
    let mut full_teams = Vec::new();

    for seed in seeds {
        if taken[seed] {
            continue;
        }
        taken[seed] = true;
        pool.remove(seed, keys[seed]);

        let mut team = factory.new_team(Arc::clone(&groups[seed]));
        while team.player_count() < squad_size {
            let room_left = squad_size - team.player_count();
            let target = team.effective_mmr(&ctx.rules);
            let found = pool.nearest(target, |c| {
                groups[c].player_count() <= room_left
                    && can_group_join_team(groups[c].as_ref(), team.as_ref(), ctx)
            });

            match found {
                Some(c) => {
                    taken[c] = true;
                    pool.remove(c, keys[c]);
                    team.add_group(Arc::clone(&groups[c]));
                }
                None => break,
            }
        }

        if team.is_full(squad_size) {
            full_teams.push(team);
        } else {
            leftovers.extend(team.into_groups());
        }
    }

    (full_teams, leftovers)
}

/// Complete a room for every full team whose groups all accept bots
fn fill_bots(
    teams: Vec<Box<dyn Team>>,
    ctx: &MatchContext,
    factory: &dyn EntityFactory,
    outcome: &mut AssemblyOutcome,
) -> Vec<Box<dyn Team>> {
    if ctx.room_side_count < 2 {
        return teams;
    }

    let mut remaining = Vec::with_capacity(teams.len());
    for team in teams {
        if team.can_fill_bots(ctx.now) {
            let room = factory.new_room_with_bots(team, ctx.room_side_count - 1);
            outcome.rooms.push(room);
            outcome.bot_rooms += 1;
        } else {
            remaining.push(team);
        }
    }
    remaining
}

/// Combine full teams into rooms
fn build_rooms(
    teams: Vec<Box<dyn Team>>,
    ctx: &MatchContext,
    factory: &dyn EntityFactory,
    outcome: &mut AssemblyOutcome,
) {
    let keys: Vec<f64> = teams.iter().map(|t| t.effective_mmr(&ctx.rules)).collect();
    let starts: Vec<UnixSeconds> = teams.iter().map(|t| t.start_match_time_sec()).collect();
    // Team ids are random; the seed group's id keeps the order stable
    let names: Vec<String> = teams
        .iter()
        .map(|t| t.groups().first().map(|g| g.id().clone()).unwrap_or_default())
        .collect();

    let mut by_mmr: Vec<usize> = (0..teams.len()).collect();
    by_mmr.sort_by(|&a, &b| {
        matching_order(
            (keys[a], starts[a], names[a].as_str()),
            (keys[b], starts[b], names[b].as_str()),
        )
    });
    let mut pool = SortedPool::from_sorted(by_mmr.iter().map(|&i| (i, keys[i])));

    let mut seeds: Vec<usize> = (0..teams.len()).collect();
    seeds.sort_by(|&a, &b| starts[a].cmp(&starts[b]).then_with(|| names[a].cmp(&names[b])));

    let mut slots: Vec<Option<Box<dyn Team>>> = teams.into_iter().map(Some).collect();

    for seed in seeds {
        let Some(seed_team) = slots[seed].take() else {
            continue;
        };
        pool.remove(seed, keys[seed]);

        let mut room = factory.new_room(seed_team);
        while !room.is_full(ctx.room_side_count) {
            let target = room.average_mmr(&ctx.rules);
            let found = pool.nearest(target, |c| {
                slots[c]
                    .as_deref()
                    .map_or(false, |t| can_team_join_room(t, room.as_ref(), ctx))
            });

            match found.and_then(|c| {
                pool.remove(c, keys[c]);
                slots[c].take()
            }) {
                Some(team) => room.add_team(team),
                None => break,
            }
        }

        if room.is_full(ctx.room_side_count) {
            outcome.rooms.push(room);
        } else {
            for team in room.into_teams() {
                outcome.leftovers.extend(team.into_groups());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::rating::RatedPlayer;
    use crate::squad::{PartyGroup, StandardFactory};
    use crate::types::GroupState;
    use std::collections::HashSet;

    fn group(id: &str, mmrs: &[f64], wait_start: i64) -> Arc<dyn Group> {
        let players = mmrs
            .iter()
            .enumerate()
            .map(|(i, mmr)| RatedPlayer::with_mmr(format!("{}-{}", id, i), *mmr, wait_start))
            .collect();
        Arc::new(PartyGroup::new(id, players).unwrap())
    }

    fn ctx(config: &MatchingConfig, now: UnixSeconds) -> MatchContext {
        MatchContext::new(config, now)
    }

    fn room_group_ids(room: &dyn Room) -> Vec<String> {
        let mut ids: Vec<String> = room.groups().iter().map(|g| g.id().clone()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_five_solos_form_one_team() {
        let mut config = MatchingConfig::default();
        config.room_side_count = 1;
        let groups: Vec<_> = (0..5).map(|i| group(&format!("s{}", i), &[1000.0], 0)).collect();

        let outcome = assemble(groups.clone(), &ctx(&config, 5), &StandardFactory);

        assert_eq!(outcome.rooms.len(), 1);
        assert!(outcome.leftovers.is_empty());
        assert_eq!(outcome.rooms[0].teams()[0].player_count(), 5);
        // The matcher marks groups when it publishes the room
        assert!(groups.iter().all(|g| g.state() == GroupState::Queuing));
    }

    #[test]
    fn test_partial_team_is_dissolved() {
        let config = MatchingConfig::default();
        let groups: Vec<_> = (0..4).map(|i| group(&format!("s{}", i), &[1000.0], 0)).collect();

        let outcome = assemble(groups, &ctx(&config, 5), &StandardFactory);

        assert!(outcome.rooms.is_empty());
        assert_eq!(outcome.leftovers.len(), 4);
        assert!(outcome
            .leftovers
            .iter()
            .all(|g| g.state() == GroupState::Queuing));
    }

    #[test]
    fn test_two_squads_form_a_room() {
        let config = MatchingConfig::default();
        let groups = vec![group("a", &[1000.0; 5], 0), group("b", &[1050.0; 5], 0)];

        let outcome = assemble(groups, &ctx(&config, 5), &StandardFactory);

        assert_eq!(outcome.rooms.len(), 1);
        assert_eq!(outcome.rooms[0].side_count(), 2);
        assert_eq!(outcome.rooms[0].player_count(), 10);
        assert!(outcome.leftovers.is_empty());
    }

    #[test]
    fn test_unmatched_team_is_dissolved() {
        let config = MatchingConfig::default();
        let groups = vec![group("a", &[1000.0; 5], 0), group("b", &[1300.0; 5], 0)];

        let outcome = assemble(groups, &ctx(&config, 5), &StandardFactory);

        assert!(outcome.rooms.is_empty());
        assert_eq!(outcome.leftovers.len(), 2);
    }

    #[test]
    fn test_bot_room() {
        let config = MatchingConfig::default();
        let fillable: Arc<dyn Group> = Arc::new(
            PartyGroup::new(
                "bots-ok",
                (0..5)
                    .map(|i| RatedPlayer::with_mmr(format!("p{}", i), 1000.0, 0))
                    .collect(),
            )
            .unwrap()
            .bot_fill_after(10),
        );

        let outcome = assemble(vec![fillable], &ctx(&config, 20), &StandardFactory);

        assert_eq!(outcome.rooms.len(), 1);
        assert_eq!(outcome.bot_rooms, 1);
        assert_eq!(outcome.rooms[0].bot_sides(), 1);
        assert!(outcome.rooms[0].has_bot());
    }

    #[test]
    fn test_oversized_group_is_left_over() {
        let config = MatchingConfig::default();
        let outcome = assemble(
            vec![group("big", &[1000.0; 6], 0)],
            &ctx(&config, 5),
            &StandardFactory,
        );
        assert!(outcome.rooms.is_empty());
        assert_eq!(outcome.leftovers.len(), 1);
    }

    #[test]
    fn test_no_group_assigned_twice() {
        let config = MatchingConfig::default();
        let groups: Vec<_> = (0..37)
            .map(|i| {
                let size = 1 + i % 3;
                group(&format!("g{:02}", i), &vec![1000.0 + i as f64; size], 0)
            })
            .collect();

        let outcome = assemble(groups.clone(), &ctx(&config, 100), &StandardFactory);

        let mut seen = HashSet::new();
        for room in &outcome.rooms {
            assert_eq!(room.player_count(), config.room_capacity());
            for g in room.groups() {
                assert!(seen.insert(g.id().clone()));
            }
        }
        for g in &outcome.leftovers {
            assert!(seen.insert(g.id().clone()));
        }
        assert_eq!(seen.len(), groups.len());
    }

    #[test]
    fn test_pass_is_deterministic() {
        let config = MatchingConfig::default();
        let build = || -> Vec<Arc<dyn Group>> {
            (0..40)
                .map(|i| group(&format!("g{:02}", i), &[900.0 + (i * 37 % 200) as f64], i as i64 % 7))
                .collect()
        };

        let first = assemble(build(), &ctx(&config, 100), &StandardFactory);
        let second = assemble(build(), &ctx(&config, 100), &StandardFactory);

        let first_rooms: Vec<_> = first.rooms.iter().map(|r| room_group_ids(&**r)).collect();
        let second_rooms: Vec<_> = second.rooms.iter().map(|r| room_group_ids(&**r)).collect();
        assert_eq!(first_rooms, second_rooms);

        let first_left: Vec<_> = first.leftovers.iter().map(|g| g.id().clone()).collect();
        let second_left: Vec<_> = second.leftovers.iter().map(|g| g.id().clone()).collect();
        assert_eq!(first_left, second_left);
    }
}
