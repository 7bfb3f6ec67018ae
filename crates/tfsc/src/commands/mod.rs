//! CLI command handlers.

pub mod config;
pub mod failed_operation;
pub mod parameter_parser;
pub mod render;
pub mod start_operation;
pub mod succeeded_operation;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Verbose output enabled.
    pub verbose: bool,
}

