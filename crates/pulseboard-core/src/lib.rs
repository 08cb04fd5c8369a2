//! Pulseboard Core Library
//!
//! Domain models, view adapters, and wire protocol for the live
//! issue-tracker push server.

pub mod error;
pub mod issue;
pub mod notifier;
pub mod protocol;
pub mod views;

pub use error::{CoreError, CoreResult};
