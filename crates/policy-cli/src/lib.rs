//! Library interface for policy-cli
//!
//! Exposes the command handlers, application state and HTTP router for
//! integration testing.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::absolute_paths,
        clippy::assertions_on_result_states,
        reason = "Test allows"
    )
)]

/// Command-line argument definitions.
pub mod cli;
/// Command handlers.
pub mod handlers;
/// HTTP server.
pub mod server;
/// Shared pipelines.
pub mod state;

pub use cli::{Cli, Command, Variant};
pub use server::router;
pub use state::{AppState, Pipelines};
