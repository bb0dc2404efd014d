//! Plot grid topology engine.
//!
//! The world is a uniform grid of plots. Adjacent plots with one owner can be
//! fused into mega-plots; this crate keeps that topology consistent, derives
//! the rectangle cover of a mega-plot, runs the budgeted auto-merge search and
//! spreads per-chunk work across scheduler turns. Storage, terrain, economy and
//! permissions are reached through the traits in [`backend`].

pub mod backend;
pub mod error;
pub mod manager;
pub mod merge;
pub mod task;
pub mod world;

pub use error::PlotError;
pub use manager::PlotManager;
