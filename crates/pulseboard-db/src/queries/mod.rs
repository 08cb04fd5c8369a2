//! Read-only query modules.

pub mod issues;
