//! Superpilot Engine Library
//!
//! This library provides the task pilots and everything they are built from.
//! It is used by both the `pilot` binary and integration tests.

/// Settings loading and validation
pub mod config;

/// Model provider abstraction layer
pub mod llm;

/// Ability registry and built-in abilities
pub mod ability;

/// Prompt strategies
pub mod strategy;

/// Task pilots and the execution engine
pub mod pilot;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
