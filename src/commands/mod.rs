//! Command implementations behind the CLI.

mod admin;
mod error;
mod local;

pub use admin::{add_user, audit_report, run_retention, verify_audit};
pub use error::CommandError;
pub use local::{import_opa, scan_export, CLI_USER};
