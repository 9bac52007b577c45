//! Message handling - Event buses, command parsing and argument grammars

pub mod bus;
pub mod grammar;
pub mod parser;

pub use bus::{
    CommandContext, CommandRegistration, DispatchOutcome, EventBus, EventKind, EventRegistration, Flow,
    HandlerResult, MessageContext, MessageRegistration, NoticeContext, NoticeRegistration, RequestContext,
    RequestRegistration,
};
pub use grammar::{ArgumentGrammar, ClapGrammar, GrammarError, ParsedArgs};
pub use parser::{CommandInvocation, CommandMatcher, CommandParser, ParsedCommand};
