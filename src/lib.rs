//! BrewGuard fermentation temperature controller library.
//!
//! Exposes the pure-logic modules and the host adapters for integration
//! testing.  The binary in `main.rs` wires them together.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod notify;
pub mod safety;
pub mod scheduler;
pub mod sensors;
