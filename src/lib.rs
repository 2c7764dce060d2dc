//! Engagement AI - Instagram engagement assistant for retail units
//!
//! A Rust library that answers community questions, classifies Instagram
//! comments and suggests actions for units moving through operational phases.
//!
//! # Features
//!
//! - Context assembly from phase, behavior rules, documentation and history
//! - Phase-aware prompt synthesis with a strict JSON output contract
//! - Strict parsing of model output into typed answers and classifications
//! - Interaction history audit trail and export (CSV, JSON)
//! - Comment moderation and Direct conversation bookkeeping
//! - Live (SQLite) or fallback (in-memory) record stores

/// Unit, phase, behavior group and documentation administration
pub mod admin;
/// Configuration management
pub mod config;
/// Context assembly for the AI pipeline
pub mod context;
/// SQLite record store and connection pooling
pub mod db;
/// Direct conversations
pub mod direct;
/// Presentation helpers
pub mod display;
/// Error taxonomy
pub mod error;
/// Interaction history export
pub mod export;
/// Model output parsing
pub mod interpreter;
/// Logging setup and utilities
pub mod logging;
/// In-memory record store
pub mod memory;
/// Metrics collection
pub mod metrics;
/// Language model client
pub mod model;
/// Data models and structures
pub mod models;
/// Comment moderation
pub mod moderation;
/// Phase reference data
pub mod phases;
/// Prompt synthesis
pub mod prompt;
/// Database schema definitions
pub mod schema;
/// AI pipeline operations
pub mod service;
/// Record store interface and data source selection
pub mod store;
/// AI testing tool
pub mod testing;
/// Input validation and sanitization
pub mod validation;
/// Test webhook client
pub mod webhook;

// Re-export key components for easier access
pub use config::AppConfig;
pub use context::ContextAssembler;
pub use error::{EngagementError, ErrorKind, Result};
pub use model::{HttpLanguageModel, LanguageModel};
pub use models::{AiContext, AiResponse, CommentClassification, PhaseName, RestrictionTag};
pub use service::{AiService, ServiceSettings};
pub use store::{DataSource, RecordStore};
