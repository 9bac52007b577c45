use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::entities::{ForwardNode, FriendInfo, InboundEvent, Segment, UserProfile};

/// Transport trait - abstraction for the chat platform connection
///
/// Connection handling, reconnection and the wire protocol live behind this
/// trait; the host only sends messages, looks up users and consumes events.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a private message, returning the new message id
    async fn send_private_msg(&self, user_id: i64, message: Vec<Segment>) -> Result<i64, TransportError>;

    /// Send a group message, returning the new message id
    async fn send_group_msg(&self, group_id: i64, message: Vec<Segment>) -> Result<i64, TransportError>;

    async fn send_private_forward_msg(&self, user_id: i64, nodes: Vec<ForwardNode>) -> Result<i64, TransportError>;

    async fn send_group_forward_msg(&self, group_id: i64, nodes: Vec<ForwardNode>) -> Result<i64, TransportError>;

    async fn get_friend_list(&self) -> Result<Vec<FriendInfo>, TransportError>;

    async fn get_group_member_info(&self, group_id: i64, user_id: i64) -> Result<UserProfile, TransportError>;

    async fn get_stranger_info(&self, user_id: i64) -> Result<UserProfile, TransportError>;

    /// Subscribe to inbound message, notice and request events.
    ///
    /// Events are delivered one at a time in arrival order.
    async fn subscribe(&self) -> Result<mpsc::Receiver<InboundEvent>, TransportError>;
}

/// Where a message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Private {
        user_id: i64,
        message_id: Option<i64>,
    },
    Group {
        group_id: i64,
        user_id: Option<i64>,
        message_id: Option<i64>,
    },
}

impl MessageTarget {
    pub fn private(user_id: i64) -> Self {
        MessageTarget::Private {
            user_id,
            message_id: None,
        }
    }

    pub fn group(group_id: i64) -> Self {
        MessageTarget::Group {
            group_id,
            user_id: None,
            message_id: None,
        }
    }
}

impl From<&crate::domain::entities::MessageEvent> for MessageTarget {
    fn from(event: &crate::domain::entities::MessageEvent) -> Self {
        match event.group_id {
            Some(group_id) if event.is_group() => MessageTarget::Group {
                group_id,
                user_id: Some(event.user_id),
                message_id: Some(event.message_id),
            },
            _ => MessageTarget::Private {
                user_id: event.user_id,
                message_id: Some(event.message_id),
            },
        }
    }
}
