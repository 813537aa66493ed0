//! HTTP API for accounts, credentials, scans, reports and audit data.

mod error;
mod extract;
mod handlers;
mod server;
mod state;
mod types;

pub use error::{ApiError, StartupError};
pub use extract::{AuthUser, ClientInfo};
pub use server::{cors_layer, router, ApiServer};
pub use state::{ApiEvent, AppState, DEFAULT_EVENT_CHANNEL_CAPACITY};
pub use types::*;
