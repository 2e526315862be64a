// All analysis lives in finlens-core.
// This CLI is a thin wrapper: terminal rendering plus a progress bar.

pub mod progress;
pub mod render;

// Re-export core types for convenience
pub use finlens_core::*;

pub use progress::BarProgress;
