//! Event bus - Priority-ordered handler registries per event kind
//!
//! Every registration lives in the registry of its [`EventKind`], kept in
//! descending priority with ties in insertion order. Dispatch walks a
//! snapshot of one registry, filters by end point, and runs each selected
//! handler in isolation so a failing plugin never takes the bus down.

use regex_lite::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use super::grammar::ArgumentGrammar;
use super::parser::{CommandInvocation, CommandMatcher};
use crate::application::errors::BotError;
use crate::domain::entities::{MessageEvent, NoticeEvent, RequestEvent};

/// Boxed future returned by handlers
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What a handler asks the bus to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep dispatching to lower-priority handlers
    Continue,
    /// Stop dispatching this event on this bus
    Stop,
}

/// Handler result
pub type HandlerResult = Result<Flow, BotError>;

/// Handler function type
pub type Handler<C> = Arc<dyn Fn(C) -> BoxFuture<HandlerResult> + Send + Sync>;

fn boxed<C, F, Fut>(handler: F) -> Handler<C>
where
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(handler(ctx)))
}

/// Default registration priority
pub const DEFAULT_PRIORITY: i32 = 1;

/// The four event kinds, one registry each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Command,
    Notice,
    Request,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Message,
        EventKind::Command,
        EventKind::Notice,
        EventKind::Request,
    ];

    fn index(self) -> usize {
        match self {
            EventKind::Message => 0,
            EventKind::Command => 1,
            EventKind::Notice => 2,
            EventKind::Request => 3,
        }
    }

    /// Filter used when a registration sets no end point; matches every
    /// end point of the kind
    pub fn default_end_point(self) -> &'static str {
        match self {
            EventKind::Message | EventKind::Command => "message",
            EventKind::Notice => "notice",
            EventKind::Request => "request",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Command => "command",
            EventKind::Notice => "notice",
            EventKind::Request => "request",
        }
    }
}

/// Context for message handlers
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub event: Arc<MessageEvent>,
}

/// Context for command handlers
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub event: Arc<MessageEvent>,
    pub prefix: String,
    pub command_name: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub args: Vec<Option<String>>,
}

impl CommandContext {
    pub fn new(event: Arc<MessageEvent>, invocation: CommandInvocation) -> Self {
        Self {
            event,
            prefix: invocation.prefix,
            command_name: invocation.command_name,
            params: invocation.params,
            args: invocation.args,
        }
    }

    /// Positional argument at `index`, if given
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index)?.as_deref()
    }
}

/// Context for notice handlers
#[derive(Debug, Clone)]
pub struct NoticeContext {
    pub event: Arc<NoticeEvent>,
}

/// Context for request handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub event: Arc<RequestEvent>,
}

/// Plain message handler registration
pub struct MessageRegistration {
    pub plugin_name: String,
    pub priority: i32,
    pub end_point: Option<String>,
    pub regexp: Option<Regex>,
    pub need_admin: bool,
    pub need_reply: bool,
    handler: Handler<MessageContext>,
}

impl MessageRegistration {
    pub fn new<F, Fut>(plugin_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            plugin_name: plugin_name.into(),
            priority: DEFAULT_PRIORITY,
            end_point: None,
            regexp: None,
            need_admin: false,
            need_reply: false,
            handler: boxed(handler),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_end_point(mut self, end_point: impl Into<String>) -> Self {
        self.end_point = Some(end_point.into());
        self
    }

    pub fn with_regexp(mut self, regexp: Regex) -> Self {
        self.regexp = Some(regexp);
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.need_admin = true;
        self
    }

    pub fn reply_only(mut self) -> Self {
        self.need_reply = true;
        self
    }

    pub fn accepts(&self, is_admin: bool, is_reply: bool, raw_message: &str) -> bool {
        (!self.need_admin || is_admin)
            && (!self.need_reply || is_reply)
            && self.regexp.as_ref().map_or(true, |r| r.is_match(raw_message))
    }

    pub fn invoke(&self, ctx: MessageContext) -> BoxFuture<HandlerResult> {
        (self.handler)(ctx)
    }
}

/// Command handler registration
pub struct CommandRegistration {
    pub plugin_name: String,
    pub priority: i32,
    pub end_point: Option<String>,
    pub matcher: CommandMatcher,
    pub grammar: Option<Arc<dyn ArgumentGrammar>>,
    pub need_admin: bool,
    pub need_reply: bool,
    pub need_hide: bool,
    handler: Handler<CommandContext>,
}

impl CommandRegistration {
    pub fn new<F, Fut>(plugin_name: impl Into<String>, matcher: impl Into<CommandMatcher>, handler: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            plugin_name: plugin_name.into(),
            priority: DEFAULT_PRIORITY,
            end_point: None,
            matcher: matcher.into(),
            grammar: None,
            need_admin: false,
            need_reply: false,
            need_hide: false,
            handler: boxed(handler),
        }
    }

    pub fn with_grammar<G: ArgumentGrammar + 'static>(mut self, grammar: G) -> Self {
        self.grammar = Some(Arc::new(grammar));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_end_point(mut self, end_point: impl Into<String>) -> Self {
        self.end_point = Some(end_point.into());
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.need_admin = true;
        self
    }

    pub fn reply_only(mut self) -> Self {
        self.need_reply = true;
        self
    }

    /// Leave the command out of help listings
    pub fn hidden(mut self) -> Self {
        self.need_hide = true;
        self
    }

    pub fn accepts(&self, is_admin: bool, is_reply: bool) -> bool {
        (!self.need_admin || is_admin) && (!self.need_reply || is_reply)
    }

    pub fn invoke(&self, ctx: CommandContext) -> BoxFuture<HandlerResult> {
        (self.handler)(ctx)
    }
}

/// Notice handler registration
pub struct NoticeRegistration {
    pub plugin_name: String,
    pub priority: i32,
    pub end_point: Option<String>,
    handler: Handler<NoticeContext>,
}

impl NoticeRegistration {
    pub fn new<F, Fut>(plugin_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(NoticeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            plugin_name: plugin_name.into(),
            priority: DEFAULT_PRIORITY,
            end_point: None,
            handler: boxed(handler),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_end_point(mut self, end_point: impl Into<String>) -> Self {
        self.end_point = Some(end_point.into());
        self
    }

    pub fn invoke(&self, ctx: NoticeContext) -> BoxFuture<HandlerResult> {
        (self.handler)(ctx)
    }
}

/// Request handler registration
pub struct RequestRegistration {
    pub plugin_name: String,
    pub priority: i32,
    pub end_point: Option<String>,
    handler: Handler<RequestContext>,
}

impl RequestRegistration {
    pub fn new<F, Fut>(plugin_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            plugin_name: plugin_name.into(),
            priority: DEFAULT_PRIORITY,
            end_point: None,
            handler: boxed(handler),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_end_point(mut self, end_point: impl Into<String>) -> Self {
        self.end_point = Some(end_point.into());
        self
    }

    pub fn invoke(&self, ctx: RequestContext) -> BoxFuture<HandlerResult> {
        (self.handler)(ctx)
    }
}

/// Any registration, tagged by kind
pub enum EventRegistration {
    Message(MessageRegistration),
    Command(CommandRegistration),
    Notice(NoticeRegistration),
    Request(RequestRegistration),
}

impl EventRegistration {
    pub fn kind(&self) -> EventKind {
        match self {
            EventRegistration::Message(_) => EventKind::Message,
            EventRegistration::Command(_) => EventKind::Command,
            EventRegistration::Notice(_) => EventKind::Notice,
            EventRegistration::Request(_) => EventKind::Request,
        }
    }

    pub fn plugin_name(&self) -> &str {
        match self {
            EventRegistration::Message(r) => &r.plugin_name,
            EventRegistration::Command(r) => &r.plugin_name,
            EventRegistration::Notice(r) => &r.plugin_name,
            EventRegistration::Request(r) => &r.plugin_name,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            EventRegistration::Message(r) => r.priority,
            EventRegistration::Command(r) => r.priority,
            EventRegistration::Notice(r) => r.priority,
            EventRegistration::Request(r) => r.priority,
        }
    }

    /// End-point filter, falling back to the kind default
    pub fn end_point(&self) -> &str {
        let end_point = match self {
            EventRegistration::Message(r) => r.end_point.as_deref(),
            EventRegistration::Command(r) => r.end_point.as_deref(),
            EventRegistration::Notice(r) => r.end_point.as_deref(),
            EventRegistration::Request(r) => r.end_point.as_deref(),
        };
        end_point.unwrap_or(self.kind().default_end_point())
    }
}

impl From<MessageRegistration> for EventRegistration {
    fn from(registration: MessageRegistration) -> Self {
        EventRegistration::Message(registration)
    }
}

impl From<CommandRegistration> for EventRegistration {
    fn from(registration: CommandRegistration) -> Self {
        EventRegistration::Command(registration)
    }
}

impl From<NoticeRegistration> for EventRegistration {
    fn from(registration: NoticeRegistration) -> Self {
        EventRegistration::Notice(registration)
    }
}

impl From<RequestRegistration> for EventRegistration {
    fn from(registration: RequestRegistration) -> Self {
        EventRegistration::Request(registration)
    }
}

/// Counters for one dispatch pass over one registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that were run
    pub invoked: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
    /// A handler returned [`Flow::Stop`]
    pub stopped: bool,
}

type Registry = RwLock<Vec<Arc<EventRegistration>>>;

/// Priority-ordered registries, one per [`EventKind`]
#[derive(Default)]
pub struct EventBus {
    registries: [Registry; 4],
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping descending priority; equal priorities stay in
    /// registration order
    pub fn register(&self, registration: impl Into<EventRegistration>) {
        let registration = registration.into();
        let kind = registration.kind();
        let mut entries = self.registries[kind.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let position = entries.partition_point(|e| e.priority() >= registration.priority());
        tracing::debug!(
            "Registered {} handler for plugin {} (priority {}, end point {})",
            kind.as_str(),
            registration.plugin_name(),
            registration.priority(),
            registration.end_point()
        );
        entries.insert(position, Arc::new(registration));
    }

    /// Current registrations of a kind, in dispatch order
    pub fn snapshot(&self, kind: EventKind) -> Vec<Arc<EventRegistration>> {
        self.registries[kind.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.registries[kind.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        EventKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Run the handlers of `kind` whose end-point filter occurs in
    /// `end_point`.
    ///
    /// `select` decides per registration whether it runs, returning the
    /// invocation to await; registrations of other kinds never reach it.
    pub async fn dispatch<F>(&self, kind: EventKind, end_point: &str, mut select: F) -> DispatchOutcome
    where
        F: FnMut(&EventRegistration) -> Option<BoxFuture<HandlerResult>>,
    {
        let mut outcome = DispatchOutcome::default();

        for registration in self.snapshot(kind) {
            if !end_point.contains(registration.end_point()) {
                continue;
            }
            let Some(invocation) = select(registration.as_ref()) else {
                continue;
            };

            outcome.invoked += 1;
            match run_isolated(invocation).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    tracing::debug!("Plugin {} stopped {} dispatch", registration.plugin_name(), kind.as_str());
                    outcome.stopped = true;
                    break;
                }
                Err(e) => {
                    tracing::error!("Plugin {} {} handler failed: {}", registration.plugin_name(), kind.as_str(), e);
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}

/// Await a handler on its own task so a panic is reported instead of
/// unwinding through the bus.
async fn run_isolated(invocation: BoxFuture<HandlerResult>) -> HandlerResult {
    match tokio::spawn(invocation).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(BotError::Internal("handler panicked".to_string())),
        Err(e) => Err(BotError::Internal(e.to_string())),
    }
}
