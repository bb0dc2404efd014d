//! Narrow interfaces to the collaborators the engine drives but never
//! implements: persistence, terrain, permissions and economy.

use std::ops::{Add, AddAssign};

use uuid::Uuid;

use crate::task::chunk::ChunkSlice;
use crate::world::plot::{Plot, PlotField};
use crate::world::position::{ChunkLoc, PlotId};
use crate::world::region::Region;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Durable plot records. Writes are best effort: the engine logs failures and
/// keeps its in-memory state.
pub trait PlotStorage: Send + Sync {
    fn load(&self, world: &str) -> Result<Vec<Plot>, BackendError>;

    fn save(&self, world: &str, plot: &Plot, field: PlotField) -> Result<(), BackendError>;

    /// Exchange the records stored under `a` and `b`. Either side may be absent.
    fn swap(&self, world: &str, a: PlotId, b: PlotId) -> Result<(), BackendError>;
}

pub trait ClaimPolicy: Send + Sync {
    fn can_claim(&self, identity: Uuid, world: &str, id: PlotId) -> bool;

    /// Largest component, in plots, the identity may own.
    fn merge_limit(&self, identity: Uuid) -> usize;
}

/// Block-level effects. Every call covers a single rectangle or chunk slice;
/// the engine decides which ones and in what order.
pub trait TerrainBackend: Send + Sync {
    fn regenerate_chunk(&self, world: &str, slice: &ChunkSlice);

    fn remove_road(&self, world: &str, region: &Region);

    fn create_road(&self, world: &str, region: &Region);

    /// Repaint the border walls of a plot region after a clear.
    fn reset_plot(&self, world: &str, region: &Region, claimed: bool);

    fn set_biome(&self, world: &str, slice: &ChunkSlice, biome: &str);

    /// Removes every non-player entity inside `region`; returns how many.
    fn clear_entities(&self, world: &str, region: &Region) -> usize;

    fn count_entities(&self, world: &str, region: &Region) -> EntityCounts;

    /// Resend the given chunks to viewers.
    fn refresh_chunks(&self, world: &str, chunks: &[ChunkLoc]);

    fn start_merge(&self, _world: &str, _ids: &[PlotId]) {}

    fn finish_merge(&self, _world: &str, _ids: &[PlotId]) {}

    fn start_unlink(&self, _world: &str, _ids: &[PlotId]) {}

    fn finish_unlink(&self, _world: &str, _ids: &[PlotId]) {}
}

pub trait Economy: Send + Sync {
    fn balance(&self, identity: Uuid) -> f64;

    /// Debit `amount`; `false` (and no change) if the balance is short.
    fn withdraw(&self, identity: Uuid, amount: f64) -> bool;

    fn deposit(&self, identity: Uuid, amount: f64);
}

/// Entity population of a plot, by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub entity: usize,
    pub animal: usize,
    pub monster: usize,
    pub mob: usize,
    pub boat: usize,
    pub misc: usize,
}

impl Add for EntityCounts {
    type Output = EntityCounts;

    fn add(self, rhs: EntityCounts) -> EntityCounts {
        EntityCounts {
            entity: self.entity + rhs.entity,
            animal: self.animal + rhs.animal,
            monster: self.monster + rhs.monster,
            mob: self.mob + rhs.mob,
            boat: self.boat + rhs.boat,
            misc: self.misc + rhs.misc,
        }
    }
}

impl AddAssign for EntityCounts {
    fn add_assign(&mut self, rhs: EntityCounts) {
        *self = *self + rhs;
    }
}
