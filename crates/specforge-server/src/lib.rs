//! # specforge-server
//!
//! HTTP server library for specforge.
//!
//! This library provides the API handlers, state wiring and logging setup
//! used by the `specforge-server` binary and by the HTTP tests.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
