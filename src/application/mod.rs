//! Application layer - Event routing and bot capabilities
//!
//! This layer contains:
//! - Bot: Transport, event buses and command parsing composed together
//! - Errors: Error taxonomy shared by every layer
//! - Messaging: Event bus, command parser, argument grammar

pub mod bot;
pub mod errors;
pub mod messaging;

pub use bot::{Bot, BotConfig, CommandInfo, SendOptions};
