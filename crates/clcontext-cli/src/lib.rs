//! clcontext CLI library
//!
//! This library exposes the command implementations for testing.

pub mod commands;
pub mod exit;
pub mod output;
