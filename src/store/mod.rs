//! Persistence for users, encrypted credentials and scan reports.

mod db;
mod error;
mod schema;
mod types;

pub use db::Store;
pub use error::StoreError;
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use types::{format_timestamp, parse_timestamp, CredentialStatus, ScanPage, StoredCredential};
