//! Superpilot SDK
//!
//! Shared library providing the ability contract and error taxonomy.
//! This crate is used by both the engine and third-party ability crates.

/// Ability trait and invocation types
pub mod ability;

/// Error types and handling
pub mod errors;

// Re-export commonly used types
pub use ability::{
    Ability, AbilityAction, AbilityArguments, AbilityError, AbilityOutput, AbilitySchema,
    ArgumentSpec, Memories,
};
pub use errors::{PilotError, PilotErrorExt};
