//! Host process for the plot grid engine.
//!
//! Wires [`plotgrid_engine`] to concrete collaborators: JSON plot storage,
//! an in-memory surface terrain, a ledger economy and limit-based claim
//! policy, and drives the engine's scheduler from a tokio tick loop.

pub mod actions;
pub mod cli;
pub mod config;
pub mod economy;
pub mod event_bus;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod policy;
pub mod terrain;
