//! Native HIPAA policy evaluation over GCP asset inventories.

mod engine;
mod error;
mod opa;
mod policy;
pub mod rules;
mod service;

pub use engine::*;
pub use error::*;
pub use opa::*;
pub use policy::*;
pub use service::*;
