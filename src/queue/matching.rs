//! Compatibility predicates for team and room assembly
//!
//! Every candidate is checked against each already-attached peer using the
//! fairness row for the shorter of the two waits, so a long-waiting
//! candidate never drags a fresh peer into a looser match.

use crate::config::MatchingConfig;
use crate::rating::SquadRules;
use crate::squad::{Group, Room, Team};
use crate::types::UnixSeconds;
use crate::wait_time::FairnessLadder;

/// Everything a pass needs to judge a pairing
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub now: UnixSeconds,
    pub rules: SquadRules,
    pub room_side_count: usize,
    pub newer_with_newer: bool,
    pub ladder: FairnessLadder,
}

impl MatchContext {
    pub fn new(config: &MatchingConfig, now: UnixSeconds) -> Self {
        Self {
            now,
            rules: config.squad_rules(),
            room_side_count: config.room_side_count,
            newer_with_newer: config.newer_with_newer,
            ladder: config.fairness_ladder.clone(),
        }
    }
}

/// Attributes compared between two sides of a pairing
#[derive(Debug, Clone, Copy)]
struct Profile {
    mmr: f64,
    star: f64,
    wait: i64,
    bot_fillable: bool,
    newcomer: bool,
    premade: bool,
}

impl Profile {
    fn of_group(group: &dyn Group, ctx: &MatchContext) -> Self {
        Self {
            mmr: group.effective_mmr(&ctx.rules),
            star: group.star(),
            wait: group.wait_seconds(ctx.now),
            bot_fillable: group.can_fill_bots(ctx.now),
            newcomer: group.is_newcomer(),
            premade: group.is_premade(),
        }
    }

    fn of_team(team: &dyn Team, ctx: &MatchContext) -> Self {
        Self {
            mmr: team.effective_mmr(&ctx.rules),
            star: team.star(),
            wait: team.wait_seconds(ctx.now),
            bot_fillable: team.can_fill_bots(ctx.now),
            newcomer: team.is_newcomer(),
            premade: team.has_premade(),
        }
    }
}

fn compatible(candidate: &Profile, peer: &Profile, ctx: &MatchContext, team_gate: bool) -> bool {
    let range = ctx.ladder.range_for(candidate.wait.min(peer.wait));

    if !range.allows_mmr_gap(candidate.mmr, peer.mmr) {
        return false;
    }
    if !range.allows_star_gap(candidate.star, peer.star) {
        return false;
    }
    if candidate.bot_fillable != peer.bot_fillable {
        return false;
    }
    if ctx.newer_with_newer && candidate.newcomer != peer.newcomer {
        return false;
    }
    if team_gate && (candidate.premade || peer.premade) && !range.can_join_team {
        return false;
    }

    true
}

/// Whether `group` may be attached to `team`
pub fn can_group_join_team(group: &dyn Group, team: &dyn Team, ctx: &MatchContext) -> bool {
    let candidate = Profile::of_group(group, ctx);
    team.groups()
        .iter()
        .all(|peer| compatible(&candidate, &Profile::of_group(peer.as_ref(), ctx), ctx, true))
}

/// Whether `team` may be attached to `room`
pub fn can_team_join_room(team: &dyn Team, room: &dyn Room, ctx: &MatchContext) -> bool {
    let candidate = Profile::of_team(team, ctx);
    room.teams()
        .iter()
        .all(|peer| compatible(&candidate, &Profile::of_team(peer.as_ref(), ctx), ctx, false))
}
