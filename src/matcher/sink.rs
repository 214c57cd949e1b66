//! Destinations for completed rooms

use crate::error::{MatchmakingError, Result};
use crate::squad::Room;
use crate::types::GroupId;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

/// Trait for publishing completed rooms
#[async_trait]
pub trait RoomSink: Send + Sync {
    /// Hand a completed room to its consumer
    async fn publish(&self, room: Box<dyn Room>) -> Result<()>;
}

/// Sink backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelRoomSink {
    sender: mpsc::Sender<Box<dyn Room>>,
    send_timeout: Duration,
}

impl ChannelRoomSink {
    /// Create a sink and the receiver its rooms arrive on
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Box<dyn Room>>) {
        Self::with_timeout(capacity, Duration::from_secs(5))
    }

    /// Create a sink that gives up when the consumer stalls for `send_timeout`
    pub fn with_timeout(
        capacity: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Box<dyn Room>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                send_timeout,
            },
            receiver,
        )
    }
}

#[async_trait]
impl RoomSink for ChannelRoomSink {
    async fn publish(&self, room: Box<dyn Room>) -> Result<()> {
        let room_id = room.id();
        match timeout(self.send_timeout, self.sender.send(room)).await {
            Ok(Ok(())) => {
                debug!("Published room {}", room_id);
                Ok(())
            }
            Ok(Err(_)) => Err(MatchmakingError::internal(format!(
                "Room channel closed, room {} dropped",
                room_id
            ))
            .into()),
            Err(_) => Err(MatchmakingError::internal(format!(
                "Timed out publishing room {}",
                room_id
            ))
            .into()),
        }
    }
}

/// Sink that keeps every room it receives
#[derive(Debug, Default)]
pub struct RecordingRoomSink {
    rooms: std::sync::Mutex<Vec<Box<dyn Room>>>,
}

impl RecordingRoomSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms received
    pub fn room_count(&self) -> usize {
        self.rooms.lock().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Group ids of every received room, in arrival order
    pub fn group_ids(&self) -> Vec<Vec<GroupId>> {
        self.rooms
            .lock()
            .map(|rooms| {
                rooms
                    .iter()
                    .map(|room| room.groups().iter().map(|g| g.id().clone()).collect())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bot sides of every received room, in arrival order
    pub fn bot_sides(&self) -> Vec<usize> {
        self.rooms
            .lock()
            .map(|rooms| rooms.iter().map(|room| room.bot_sides()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoomSink for RecordingRoomSink {
    async fn publish(&self, room: Box<dyn Room>) -> Result<()> {
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|_| MatchmakingError::internal("Failed to acquire recorded rooms lock"))?;
        rooms.push(room);
        Ok(())
    }
}
