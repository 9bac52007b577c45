//! Bot - Transport, event buses and command parser composed together
//!
//! The bot is the handle plugins receive. It turns each inbound transport
//! event into an end point, runs the matching registrations and offers the
//! send / lookup capabilities handlers need.

use std::sync::Arc;

use super::errors::{BotError, TransportError};
use super::messaging::bus::BoxFuture;
use super::messaging::parser::display_name;
use super::messaging::{
    CommandContext, DispatchOutcome, EventBus, EventKind, EventRegistration, Flow, HandlerResult,
    MessageContext, NoticeContext, ParsedCommand, RequestContext,
};
use super::messaging::CommandParser;
use crate::domain::entities::{ForwardNode, FriendInfo, InboundEvent, MessageEvent, NoticeEvent, RequestEvent, Segment};
use crate::domain::traits::{MessageTarget, Transport};

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Single-character command prefixes, the first one is used for display
    pub prefix: Vec<String>,
    /// Users allowed through `need_admin` registrations
    pub admin_id: Vec<i64>,
}

/// Options for [`Bot::send_msg`]
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    /// Quote the original message (group chats only)
    pub reply: bool,
    /// Mention the original sender (group chats only)
    pub at: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { reply: true, at: true }
    }
}

impl SendOptions {
    /// Send the content exactly as given
    pub fn plain() -> Self {
        Self { reply: false, at: false }
    }
}

/// Entry of the help listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

pub struct Bot {
    config: BotConfig,
    transport: Arc<dyn Transport>,
    bus: EventBus,
    parser: CommandParser,
}

impl Bot {
    pub fn new(config: BotConfig, transport: Arc<dyn Transport>) -> Self {
        let parser = CommandParser::new(config.prefix.clone());
        Self {
            config,
            transport,
            bus: EventBus::new(),
            parser,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Register a handler on the bus of its kind
    pub fn register(&self, registration: impl Into<EventRegistration>) {
        self.bus.register(registration);
    }

    /// Pull events from the transport until its channel closes, handling
    /// them one at a time
    pub async fn run(&self) -> Result<(), BotError> {
        let mut events = self.transport.subscribe().await?;
        tracing::info!("Bot listening for events");

        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }

        tracing::info!("Transport closed, bot stopped");
        Ok(())
    }

    pub async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message(event) => {
                self.handle_message(event).await;
            }
            InboundEvent::Notice(event) => {
                self.handle_notice(event).await;
            }
            InboundEvent::Request(event) => {
                self.handle_request(event).await;
            }
        }
    }

    /// Dispatch a chat message to the message bus, then the command bus.
    ///
    /// A stop on the message bus does not keep commands from running.
    pub async fn handle_message(&self, event: MessageEvent) -> (DispatchOutcome, DispatchOutcome) {
        tracing::debug!("Received message: {:?}", event);

        let event = Arc::new(event);
        let end_point = event.end_point();
        let is_admin = self.config.admin_id.contains(&event.user_id);
        let is_reply = event.is_reply();

        let messages = self
            .bus
            .dispatch(EventKind::Message, &end_point, |registration| {
                let EventRegistration::Message(registration) = registration else {
                    return None;
                };
                if !registration.accepts(is_admin, is_reply, &event.raw_message) {
                    return None;
                }
                Some(registration.invoke(MessageContext { event: event.clone() }))
            })
            .await;

        let commands = self
            .bus
            .dispatch(EventKind::Command, &end_point, |registration| {
                let EventRegistration::Command(registration) = registration else {
                    return None;
                };
                if !registration.accepts(is_admin, is_reply) {
                    return None;
                }

                match self
                    .parser
                    .parse(&event.raw_message, &registration.matcher, registration.grammar.as_deref())
                {
                    ParsedCommand::NoMatch(_) => None,
                    ParsedCommand::ParseError(text) => Some(self.reply_text(&event, text)),
                    ParsedCommand::Success(invocation) => {
                        Some(registration.invoke(CommandContext::new(event.clone(), invocation)))
                    }
                }
            })
            .await;

        (messages, commands)
    }

    pub async fn handle_notice(&self, event: NoticeEvent) -> DispatchOutcome {
        tracing::debug!("Received notice: {:?}", event);

        let event = Arc::new(event);
        let end_point = event.end_point();
        self.bus
            .dispatch(EventKind::Notice, &end_point, |registration| match registration {
                EventRegistration::Notice(registration) => {
                    Some(registration.invoke(NoticeContext { event: event.clone() }))
                }
                _ => None,
            })
            .await
    }

    pub async fn handle_request(&self, event: RequestEvent) -> DispatchOutcome {
        tracing::debug!("Received request: {:?}", event);

        let event = Arc::new(event);
        let end_point = event.end_point();
        self.bus
            .dispatch(EventKind::Request, &end_point, |registration| match registration {
                EventRegistration::Request(registration) => {
                    Some(registration.invoke(RequestContext { event: event.clone() }))
                }
                _ => None,
            })
            .await
    }

    /// Deliver parse errors and help text back to the sender
    fn reply_text(&self, event: &MessageEvent, text: String) -> BoxFuture<HandlerResult> {
        let transport = self.transport.clone();
        let target = MessageTarget::from(event);
        Box::pin(async move {
            if let Err(e) = send(transport.as_ref(), target, vec![Segment::text(text)], SendOptions::default()).await {
                tracing::warn!("Failed to send command error reply: {}", e);
            }
            Ok(Flow::Continue)
        })
    }

    /// Send a message. In groups the reply quote and mention are prepended
    /// when enabled in `options`.
    pub async fn send_msg(
        &self,
        target: impl Into<MessageTarget>,
        message: Vec<Segment>,
        options: SendOptions,
    ) -> Result<i64, TransportError> {
        send(self.transport.as_ref(), target.into(), message, options).await
    }

    /// Send a bundle of forwarded messages
    pub async fn send_forward_msg(
        &self,
        target: impl Into<MessageTarget>,
        nodes: Vec<ForwardNode>,
    ) -> Result<i64, TransportError> {
        match target.into() {
            MessageTarget::Private { user_id, .. } => self.transport.send_private_forward_msg(user_id, nodes).await,
            MessageTarget::Group { group_id, .. } => self.transport.send_group_forward_msg(group_id, nodes).await,
        }
    }

    /// Look the user up in the bot's friend list
    pub async fn is_friend(&self, user_id: i64) -> Result<Option<FriendInfo>, TransportError> {
        let friends = self.transport.get_friend_list().await?;
        Ok(friends.into_iter().find(|friend| friend.user_id == user_id))
    }

    /// Nickname of a user, as a group member when `group_id` is given
    pub async fn get_username(&self, user_id: i64, group_id: Option<i64>) -> Result<String, TransportError> {
        let profile = match group_id {
            Some(group_id) => self.transport.get_group_member_info(group_id, user_id).await?,
            None => self.transport.get_stranger_info(user_id).await?,
        };
        Ok(profile.nickname)
    }

    /// Help text of the first command registered under `command_name`
    pub fn command_help(&self, command_name: &str) -> Option<String> {
        self.bus.snapshot(EventKind::Command).iter().find_map(|registration| {
            let EventRegistration::Command(registration) = registration.as_ref() else {
                return None;
            };
            if registration.matcher.to_string() != command_name {
                return None;
            }
            let grammar = registration.grammar.as_deref()?;
            Some(self.parser.help_text(&registration.matcher, grammar))
        })
    }

    /// Visible commands with their descriptions
    pub fn command_list(&self) -> Vec<CommandInfo> {
        self.bus
            .snapshot(EventKind::Command)
            .iter()
            .filter_map(|registration| match registration.as_ref() {
                EventRegistration::Command(registration) if !registration.need_hide => Some(registration),
                _ => None,
            })
            .map(|registration| match registration.grammar.as_deref() {
                Some(grammar) => CommandInfo {
                    name: display_name(&registration.matcher, grammar),
                    description: grammar.description().unwrap_or_else(|| "无描述".to_string()),
                },
                None => CommandInfo {
                    name: registration.matcher.to_string(),
                    description: "无描述".to_string(),
                },
            })
            .collect()
    }
}

async fn send(
    transport: &dyn Transport,
    target: MessageTarget,
    message: Vec<Segment>,
    options: SendOptions,
) -> Result<i64, TransportError> {
    match target {
        MessageTarget::Private { user_id, .. } => transport.send_private_msg(user_id, message).await,
        MessageTarget::Group {
            group_id,
            user_id,
            message_id,
        } => {
            let mut segments = Vec::with_capacity(message.len() + 3);
            if let (true, Some(message_id)) = (options.reply, message_id) {
                segments.push(Segment::reply(message_id));
            }
            if let (true, Some(user_id)) = (options.at, user_id) {
                segments.push(Segment::at(user_id));
                segments.push(Segment::text("\n"));
            }
            segments.extend(message);
            transport.send_group_msg(group_id, segments).await
        }
    }
}
