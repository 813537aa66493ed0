//! GCP asset inventory: data model and sources.

mod error;
mod source;
mod types;

pub use error::*;
pub use source::*;
pub use types::*;
