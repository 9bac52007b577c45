//! Domain traits - Abstractions for infrastructure implementations

pub mod plugin;
pub mod transport;

pub use plugin::{Dependencies, Plugin};
pub use transport::{MessageTarget, Transport};
