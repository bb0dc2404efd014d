use std::time::Duration;

use super::scheduler::TaskSpawner;
use crate::world::position::ChunkLoc;
use crate::world::region::Region;

/// The part of one chunk that falls inside a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSlice {
    pub chunk: ChunkLoc,
    /// Selected blocks of this chunk, in absolute coordinates.
    pub region: Region,
    /// The selection only partly covers the chunk; edits must stay inside
    /// `region` instead of touching the whole chunk.
    pub edge: bool,
}

impl ChunkSlice {
    /// Bounds of the whole chunk.
    pub fn chunk_bounds(chunk: ChunkLoc) -> Region {
        let origin = chunk.block_origin();
        Region::new(origin.x, origin.z, origin.x + 15, origin.z + 15)
    }
}

/// Split `region` into per-chunk slices, column by column.
pub fn chunk_slices(region: &Region) -> Vec<ChunkSlice> {
    region
        .chunks()
        .filter_map(|chunk| {
            let bounds = ChunkSlice::chunk_bounds(chunk);
            let clipped = bounds.intersection(region)?;
            Some(ChunkSlice {
                chunk,
                region: clipped,
                edge: clipped != bounds,
            })
        })
        .collect()
}

impl TaskSpawner {
    /// Run `step` over every chunk slice of `regions` as a bounded job.
    pub fn chunk_task<F, C>(&self, regions: &[Region], step: F, on_complete: C, budget: Duration)
    where
        F: FnMut(ChunkSlice) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let slices: Vec<ChunkSlice> = regions.iter().flat_map(chunk_slices).collect();
        tracing::debug!(
            "chunk task over {} regions, {} slices",
            regions.len(),
            slices.len()
        );
        self.run_bounded(slices, step, on_complete, budget);
    }
}
