//! Cooperative time-sliced work: a tick-driven scheduler and the chunk task
//! built on top of it.

pub mod chunk;
pub mod scheduler;

pub use chunk::{ChunkSlice, chunk_slices};
pub use scheduler::{DEFAULT_BUDGET, TaskId, TaskScheduler, TaskSpawner, TickReport};
