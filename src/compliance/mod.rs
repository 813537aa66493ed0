//! Compliance domain: violations, reports, classification and scoring.

mod classify;
mod score;
mod types;

pub use classify::*;
pub use score::*;
pub use types::*;
