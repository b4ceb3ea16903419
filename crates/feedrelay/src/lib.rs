//! Feedrelay - Polls social-media timelines and relays new posts to Discord.

// ============================================================================
// Core Infrastructure
// ============================================================================

pub mod build_info;
pub mod config;
pub mod store;
pub mod sync;

// ============================================================================
// Domain
// ============================================================================

pub mod cycle;
pub mod engine;
pub mod feed;
pub mod render;
pub mod scheduler;
pub mod subscription;

// ============================================================================
// Integrations
// ============================================================================

pub mod notify;
pub mod source;
