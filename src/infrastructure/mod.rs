//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Host configuration file
//! - Storage: Per-plugin JSON config documents
//! - Adapters: Transport implementations (console, in-memory)
//! - Plugins: Manifest resolution, loading and dependency gating

pub mod config;
pub mod storage;
pub mod adapters;
pub mod plugins;
