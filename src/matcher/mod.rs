//! Matcher orchestration
//!
//! This module drives the two queues of a matching domain on a periodic
//! cycle and publishes completed rooms through a [`RoomSink`].

pub mod manager;
pub mod sink;

pub use manager::{CycleReport, Matcher, MatcherOptions, MatcherStats};
pub use sink::{ChannelRoomSink, RecordingRoomSink, RoomSink};
