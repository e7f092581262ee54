//! # Task Keeper Bot
//!
//! A Telegram to-do bot with a role-based moderation layer.
//!
//! ## Features
//! - Creator, admin and user roles with strict management rules
//! - Timed and permanent bans with an audit trail and lazy expiry
//! - Warnings that escalate into a temporary ban
//! - Personal task lists with derived, self-healing statistics
//! - Atomic JSON persistence that survives partial corruption

/// Bot command handlers and message processing
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Roles, bans, warnings and the engine that ties them together
pub mod engine;
/// Background services like health checks and the daily stats rollover
pub mod services;
/// Stored documents, task records and the JSON persistence layer
pub mod storage;
/// Utility functions for datetime, validation, and logging
pub mod utils;
