//! Console adapter for development/testing
//!
//! Every stdin line becomes a chat message from the configured user; every
//! outgoing message is printed.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::entities::{ForwardNode, FriendInfo, InboundEvent, MessageEvent, Segment, UserProfile};
use crate::domain::traits::Transport;

/// Console transport for local development
pub struct ConsoleAdapter {
    user_id: i64,
    group_id: Option<i64>,
    next_id: AtomicI64,
}

impl ConsoleAdapter {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            group_id: None,
            next_id: AtomicI64::new(1),
        }
    }

    /// Deliver input as group messages instead of private ones
    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn print(&self, target: &str, message: &[Segment]) -> i64 {
        println!("[BOT -> {}] {}", target, Segment::plain_text(message));
        self.next_id()
    }
}

#[async_trait]
impl Transport for ConsoleAdapter {
    async fn send_private_msg(&self, user_id: i64, message: Vec<Segment>) -> Result<i64, TransportError> {
        Ok(self.print(&format!("user {}", user_id), &message))
    }

    async fn send_group_msg(&self, group_id: i64, message: Vec<Segment>) -> Result<i64, TransportError> {
        Ok(self.print(&format!("group {}", group_id), &message))
    }

    async fn send_private_forward_msg(&self, user_id: i64, nodes: Vec<ForwardNode>) -> Result<i64, TransportError> {
        for node in &nodes {
            self.print(&format!("user {} (forward from {})", user_id, node.nickname), &node.content);
        }
        Ok(self.next_id())
    }

    async fn send_group_forward_msg(&self, group_id: i64, nodes: Vec<ForwardNode>) -> Result<i64, TransportError> {
        for node in &nodes {
            self.print(&format!("group {} (forward from {})", group_id, node.nickname), &node.content);
        }
        Ok(self.next_id())
    }

    async fn get_friend_list(&self) -> Result<Vec<FriendInfo>, TransportError> {
        Ok(vec![FriendInfo::new(self.user_id, "console")])
    }

    async fn get_group_member_info(&self, _group_id: i64, user_id: i64) -> Result<UserProfile, TransportError> {
        self.get_stranger_info(user_id).await
    }

    async fn get_stranger_info(&self, user_id: i64) -> Result<UserProfile, TransportError> {
        Ok(UserProfile {
            user_id,
            nickname: format!("console-{}", user_id),
            card: None,
        })
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<InboundEvent>, TransportError> {
        tracing::info!("Starting console transport (dev mode)");

        let (sender, receiver) = mpsc::channel(16);
        let user_id = self.user_id;
        let group_id = self.group_id;
        let first_id = self.next_id.fetch_add(1_000_000, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut message_id = first_id;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line.trim().to_string(),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if line.is_empty() {
                    continue;
                }

                message_id += 1;
                let event = match group_id {
                    Some(group_id) => MessageEvent::group(message_id, group_id, user_id, line),
                    None => MessageEvent::private(message_id, user_id, line),
                };
                if sender.send(InboundEvent::Message(event)).await.is_err() {
                    break;
                }
            }
        });

        Ok(receiver)
    }
}
