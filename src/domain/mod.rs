//! Domain layer - Core types shared by the host and its plugins
//!
//! This layer contains:
//! - Entities: Inbound event payloads, message segments, user records
//! - Traits: Abstractions for infrastructure (Transport, Plugin)

pub mod entities;
pub mod traits;
