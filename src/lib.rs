//! ATRI - A plugin host for chat bots
//!
//! Plugins register message, command, notice and request handlers on the
//! bot's event buses; the host loads them in dependency order.

pub mod application;
pub mod atri;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use atri::Atri;
