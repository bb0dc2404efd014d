use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rayon::prelude::*;
use uuid::Uuid;

use crate::backend::{BackendError, EntityCounts, PlotStorage, TerrainBackend};
use crate::error::PlotError;
use crate::merge::graph::MergeBatch;
use crate::merge::link;
use crate::merge::planner::{self, AutoMergeRequest};
use crate::task::chunk::ChunkSlice;
use crate::task::scheduler::{DEFAULT_BUDGET, TaskSpawner};
use crate::world::border::WorldBorderTracker;
use crate::world::plot::{Plot, PlotField, PlotSettings};
use crate::world::position::{ChunkLoc, PlotId};
use crate::world::region::Region;
use crate::world::{AreaConfig, PlotArea};

/// Entry point for every plot operation across all loaded worlds.
///
/// Topology changes run synchronously on the caller, which is expected to be
/// the worker driving the [`TaskScheduler`](crate::task::TaskScheduler).
/// Long terrain work (clears, biome repaints) is spread over scheduler turns
/// and reports back through a completion callback.
pub struct PlotManager {
    areas: DashMap<String, Arc<PlotArea>>,
    storage: Arc<dyn PlotStorage>,
    terrain: Arc<dyn TerrainBackend>,
    spawner: TaskSpawner,
    borders: WorldBorderTracker,
    task_budget: Duration,
}

impl PlotManager {
    pub fn new(
        storage: Arc<dyn PlotStorage>,
        terrain: Arc<dyn TerrainBackend>,
        spawner: TaskSpawner,
    ) -> Self {
        Self {
            areas: DashMap::new(),
            storage,
            terrain,
            spawner,
            borders: WorldBorderTracker::new(),
            task_budget: DEFAULT_BUDGET,
        }
    }

    /// Per-turn budget for chunk-by-chunk work.
    pub fn with_task_budget(mut self, budget: Duration) -> Self {
        self.task_budget = budget;
        self
    }

    pub fn terrain(&self) -> &Arc<dyn TerrainBackend> {
        &self.terrain
    }

    pub fn spawner(&self) -> &TaskSpawner {
        &self.spawner
    }

    pub fn borders(&self) -> &WorldBorderTracker {
        &self.borders
    }

    // ── Worlds ──────────────────────────────────────────────────────────

    /// Register an empty world.
    pub fn add_area(&self, name: &str, config: AreaConfig) -> Arc<PlotArea> {
        let area = Arc::new(PlotArea::new(name, config, Arc::clone(&self.storage)));
        if config.world_border {
            self.borders.enable(name);
        }
        self.areas.insert(name.to_string(), Arc::clone(&area));
        tracing::info!(
            "registered plot world {} ({}x{} plots, {} road)",
            name,
            config.layout.plot_width(),
            config.layout.plot_width(),
            config.layout.road_width()
        );
        area
    }

    /// Register a world and fill it from storage. Tracked worlds seed their
    /// border from the furthest stored claim.
    pub fn load_area(&self, name: &str, config: AreaConfig) -> Result<Arc<PlotArea>, BackendError> {
        let plots = self.storage.load(name)?;
        let area = self.add_area(name, config);
        let count = plots.len();
        for plot in plots {
            area.insert(plot);
        }

        if config.world_border {
            let owned = area.owned_plots();
            let extent = owned
                .par_iter()
                .map(|plot| WorldBorderTracker::extent(&area, plot))
                .max()
                .unwrap_or(0);
            self.borders.raise(name, extent);
        }
        tracing::info!("loaded {} plots for world {}", count, name);
        Ok(area)
    }

    pub fn area(&self, name: &str) -> Result<Arc<PlotArea>, PlotError> {
        self.areas
            .get(name)
            .map(|a| Arc::clone(&a))
            .ok_or_else(|| PlotError::UnknownWorld(name.to_string()))
    }

    pub fn areas(&self) -> Vec<Arc<PlotArea>> {
        self.areas.iter().map(|a| Arc::clone(&a)).collect()
    }

    pub fn border(&self, world: &str) -> Option<i64> {
        self.borders.border(world)
    }

    // ── Ownership ───────────────────────────────────────────────────────

    /// Give `id` to `owner` with fresh settings. Worlds with auto-merge
    /// schedule a merge into the owner's adjacent plots for the next turn.
    pub fn claim(&self, world: &str, id: PlotId, owner: Uuid) -> Result<Plot, PlotError> {
        let area = self.area(world)?;
        let current = area.plot(id);
        if current.has_owner() {
            return Err(PlotError::AlreadyClaimed(id));
        }
        if current.running > 0 {
            return Err(PlotError::OperationRunning(id));
        }

        let plot = area.update(id, |p| {
            p.owner = Some(owner);
            p.merged = Default::default();
            p.settings = PlotSettings::default();
        });
        area.persist(&plot, PlotField::Owner);
        area.invalidate();
        self.borders.update(&area, &plot);
        tracing::info!("plot {} in {} claimed by {}", id, world, owner);

        if area.config().auto_merge {
            let terrain = Arc::clone(&self.terrain);
            let area = Arc::clone(&area);
            self.spawner.run_now(move || {
                let request = AutoMergeRequest::new(id, owner)
                    .remove_roads(area.config().merge_removes_roads);
                if let Err(e) = planner::auto_merge(&area, terrain.as_ref(), &request) {
                    tracing::warn!("auto-merge after claiming {} failed: {}", id, e);
                }
            });
        }
        Ok(plot)
    }

    /// Release `id`, unlinking it first if merged. Returns `false` if it was
    /// not claimed.
    pub fn unclaim(&self, world: &str, id: PlotId) -> Result<bool, PlotError> {
        let area = self.area(world)?;
        let plot = area.plot(id);
        if plot.running > 0 {
            return Err(PlotError::OperationRunning(id));
        }
        if !plot.has_owner() {
            return Ok(false);
        }
        let mut batch = MergeBatch::new(&area);
        if plot.is_merged() {
            link::unlink(&mut batch, self.terrain.as_ref(), id, true)?;
        }
        release(&mut batch, id);
        Ok(true)
    }

    // ── Topology ────────────────────────────────────────────────────────

    pub fn auto_merge(&self, world: &str, request: &AutoMergeRequest) -> Result<bool, PlotError> {
        let area = self.area(world)?;
        planner::auto_merge(&area, self.terrain.as_ref(), request)
    }

    /// Merge every plot in the rectangle `pos1..=pos2`.
    pub fn merge_selection(
        &self,
        world: &str,
        pos1: PlotId,
        pos2: PlotId,
        remove_roads: bool,
    ) -> Result<bool, PlotError> {
        let area = self.area(world)?;
        let mut batch = MergeBatch::new(&area);
        link::merge_selection(&mut batch, self.terrain.as_ref(), pos1, pos2, remove_roads)
    }

    /// Split the component around `id` into single plots.
    pub fn unlink(&self, world: &str, id: PlotId, create_road: bool) -> Result<bool, PlotError> {
        let area = self.area(world)?;
        if area.is_running(id) {
            return Err(PlotError::OperationRunning(id));
        }
        let mut batch = MergeBatch::new(&area);
        link::unlink(&mut batch, self.terrain.as_ref(), id, create_road)
    }

    pub fn swap(&self, world: &str, a: PlotId, b: PlotId) -> Result<bool, PlotError> {
        let area = self.area(world)?;
        let swapped = area.swap(a, b)?;
        if swapped {
            self.borders.update(&area, &area.plot(a));
            self.borders.update(&area, &area.plot(b));
        }
        Ok(swapped)
    }

    // ── Terrain work ────────────────────────────────────────────────────

    /// Reset every plot of the component around `id` to fresh terrain.
    ///
    /// The component is unlinked and each plot regenerated chunk by chunk
    /// over scheduler turns. Afterwards plot borders are repainted, entities
    /// inside the old regions removed and `on_done` called. The component is
    /// marked running throughout.
    pub fn clear<F>(&self, world: &str, id: PlotId, on_done: F) -> Result<(), PlotError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reset(world, id, false, on_done)
    }

    /// Like [`clear`](Self::clear), but every member is released first.
    pub fn delete<F>(&self, world: &str, id: PlotId, on_done: F) -> Result<(), PlotError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reset(world, id, true, on_done)
    }

    fn reset<F>(&self, world: &str, id: PlotId, is_delete: bool, on_done: F) -> Result<(), PlotError>
    where
        F: FnOnce() + Send + 'static,
    {
        let area = self.area(world)?;
        let component = area.component(id)?;
        if let Some(busy) = component.members().iter().find(|m| area.is_running(**m)) {
            return Err(PlotError::OperationRunning(*busy));
        }
        let old_regions = area.regions(id)?;
        let members: Vec<PlotId> = component.members().iter().copied().collect();

        for member in &members {
            area.add_running(*member);
        }
        {
            let mut batch = MergeBatch::new(&area);
            if area.plot(id).is_merged() {
                if let Err(e) = link::unlink(&mut batch, self.terrain.as_ref(), id, true) {
                    drop(batch);
                    for member in &members {
                        area.remove_running(*member);
                    }
                    return Err(e);
                }
            }
            if is_delete {
                for member in &members {
                    release(&mut batch, *member);
                }
            }
        }

        let layout = *area.layout();
        let plot_regions: Vec<Region> = members.iter().map(|m| layout.plot_region(*m)).collect();
        tracing::info!(
            "{} {} plots around {} in {}",
            if is_delete { "deleting" } else { "clearing" },
            members.len(),
            id,
            world
        );

        let step = {
            let terrain = Arc::clone(&self.terrain);
            let world = world.to_string();
            move |slice: ChunkSlice| terrain.regenerate_chunk(&world, &slice)
        };
        let finish = {
            let terrain = Arc::clone(&self.terrain);
            let world = world.to_string();
            move || {
                for member in &members {
                    let claimed = area.plot(*member).has_owner();
                    terrain.reset_plot(&world, &layout.plot_region(*member), claimed);
                }
                let removed: usize = old_regions
                    .iter()
                    .map(|r| terrain.clear_entities(&world, r))
                    .sum();
                for member in &members {
                    area.remove_running(*member);
                }
                tracing::info!(
                    "reset {} plots around {} in {}, removed {} entities",
                    members.len(),
                    id,
                    world,
                    removed
                );
                on_done();
            }
        };
        self.spawner
            .chunk_task(&plot_regions, step, finish, self.task_budget);
        Ok(())
    }

    /// Repaint the biome of every region of the component around `id`, then
    /// resend the affected chunks.
    pub fn set_biome<F>(&self, world: &str, id: PlotId, biome: &str, on_done: F) -> Result<(), PlotError>
    where
        F: FnOnce() + Send + 'static,
    {
        let area = self.area(world)?;
        let regions = area.regions(id)?;
        let chunks: Vec<ChunkLoc> = area.chunks(id)?.into_iter().collect();

        let step = {
            let terrain = Arc::clone(&self.terrain);
            let world = world.to_string();
            let biome = biome.to_string();
            move |slice: ChunkSlice| terrain.set_biome(&world, &slice, &biome)
        };
        let finish = {
            let terrain = Arc::clone(&self.terrain);
            let world = world.to_string();
            move || {
                terrain.refresh_chunks(&world, &chunks);
                on_done();
            }
        };
        self.spawner
            .chunk_task(&regions, step, finish, DEFAULT_BUDGET);
        Ok(())
    }

    /// Entity population over every region of the component around `id`.
    pub fn count_entities(&self, world: &str, id: PlotId) -> Result<EntityCounts, PlotError> {
        let area = self.area(world)?;
        let regions = area.regions(id)?;
        Ok(regions
            .iter()
            .map(|r| self.terrain.count_entities(world, r))
            .fold(EntityCounts::default(), |acc, c| acc + c))
    }

    /// Resend every chunk of the component around `id`.
    pub fn refresh(&self, world: &str, id: PlotId) -> Result<(), PlotError> {
        let area = self.area(world)?;
        let chunks: Vec<ChunkLoc> = area.chunks(id)?.into_iter().collect();
        self.terrain.refresh_chunks(world, &chunks);
        Ok(())
    }
}

/// Drop ownership and settings of `id`. The record survives while an
/// operation holds it running. The cache is invalidated when `batch` drops.
fn release(batch: &mut MergeBatch<'_>, id: PlotId) {
    let area = batch.area();
    let plot = batch.edit(id, |p| {
        p.owner = None;
        p.merged = Default::default();
        p.settings = PlotSettings::default();
    });
    area.persist(&plot, PlotField::Owner);
    if plot.running == 0 {
        area.remove(id);
    }
    tracing::info!("plot {} in {} released", id, area.name());
}
