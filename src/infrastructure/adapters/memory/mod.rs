//! In-memory transport for tests and embedding
//!
//! Records everything sent and lets the caller push inbound events.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::entities::{ForwardNode, FriendInfo, InboundEvent, Segment, UserProfile};
use crate::domain::traits::Transport;

/// A message handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Private { user_id: i64, message: Vec<Segment> },
    Group { group_id: i64, message: Vec<Segment> },
    PrivateForward { user_id: i64, nodes: Vec<ForwardNode> },
    GroupForward { group_id: i64, nodes: Vec<ForwardNode> },
}

pub struct MemoryTransport {
    sent: Mutex<Vec<SentMessage>>,
    friends: Mutex<Vec<FriendInfo>>,
    next_id: AtomicI64,
    sender: Mutex<Option<mpsc::Sender<InboundEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(64);
        Self {
            sent: Mutex::new(Vec::new()),
            friends: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub fn add_friend(&self, friend: FriendInfo) {
        self.friends.lock().unwrap_or_else(PoisonError::into_inner).push(friend);
    }

    /// Everything sent so far, oldest first
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Queue an inbound event for the subscriber
    pub async fn push(&self, event: InboundEvent) -> Result<(), TransportError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Closed)?;
        sender.send(event).await.map_err(|_| TransportError::Closed)
    }

    /// Close the event channel; the subscriber sees the end of the stream
    /// once queued events are drained
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn record(&self, message: SentMessage) -> i64 {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(message);
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn friend(&self, user_id: i64) -> Option<FriendInfo> {
        self.friends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|friend| friend.user_id == user_id)
            .cloned()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_private_msg(&self, user_id: i64, message: Vec<Segment>) -> Result<i64, TransportError> {
        Ok(self.record(SentMessage::Private { user_id, message }))
    }

    async fn send_group_msg(&self, group_id: i64, message: Vec<Segment>) -> Result<i64, TransportError> {
        Ok(self.record(SentMessage::Group { group_id, message }))
    }

    async fn send_private_forward_msg(&self, user_id: i64, nodes: Vec<ForwardNode>) -> Result<i64, TransportError> {
        Ok(self.record(SentMessage::PrivateForward { user_id, nodes }))
    }

    async fn send_group_forward_msg(&self, group_id: i64, nodes: Vec<ForwardNode>) -> Result<i64, TransportError> {
        Ok(self.record(SentMessage::GroupForward { group_id, nodes }))
    }

    async fn get_friend_list(&self) -> Result<Vec<FriendInfo>, TransportError> {
        Ok(self.friends.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn get_group_member_info(&self, _group_id: i64, user_id: i64) -> Result<UserProfile, TransportError> {
        self.get_stranger_info(user_id).await
    }

    async fn get_stranger_info(&self, user_id: i64) -> Result<UserProfile, TransportError> {
        self.friend(user_id)
            .map(|friend| UserProfile {
                user_id,
                nickname: friend.nickname,
                card: None,
            })
            .ok_or_else(|| TransportError::Rejected(format!("unknown user {}", user_id)))
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<InboundEvent>, TransportError> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TransportError::Rejected("already subscribed".to_string()))
    }
}
