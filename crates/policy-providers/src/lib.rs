//! Generation provider adapters.
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

/// Gemini streaming provider implementation.
pub mod gemini;
/// Scripted provider for tests and offline runs.
pub mod mock;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
