//! Envelope encryption for stored secrets.
//!
//! A local master key (hex or raw, from a file or environment variable)
//! wraps a random data key per record.

mod envelope;
mod error;
mod keys;

pub use envelope::*;
pub use error::*;
pub use keys::*;
