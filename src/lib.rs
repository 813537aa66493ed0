//! CompliantGuard - HIPAA compliance scanning for GCP infrastructure.

pub mod api;
pub mod assets;
pub mod audit;
pub mod auth;
pub mod commands;
pub mod compliance;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod display;
pub mod retention;
pub mod scanner;
pub mod store;
