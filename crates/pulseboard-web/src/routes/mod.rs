//! HTTP route handlers.

pub mod health;
pub mod internal;
pub mod workspaces;
