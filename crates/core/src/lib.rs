//! `txguard-core`: shared failure model for the resilience toolkit.
//!
//! This crate contains the application-level error kinds the rest of the
//! workspace classifies, retries on, and reports about. It carries no
//! infrastructure concerns.

pub mod error;

pub use error::{AppError, AppResult};
