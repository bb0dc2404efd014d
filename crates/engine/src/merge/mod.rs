//! Merge topology: components, the rectangle cover, pairwise linking and the
//! budgeted auto-merge search.

pub mod cache;
pub mod data;
pub mod decompose;
pub mod graph;
pub mod link;
pub mod planner;

pub use cache::Component;
pub use data::fuse_settings;
pub use decompose::decompose;
pub use graph::MergeBatch;
pub use planner::{AutoMergeRequest, auto_merge};
