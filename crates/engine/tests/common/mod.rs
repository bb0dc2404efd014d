//! Shared fixtures: collaborators that record every call instead of doing
//! real work, plus helpers for building plot layouts by hand.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use plotgrid_engine::PlotManager;
use plotgrid_engine::backend::{BackendError, EntityCounts, PlotStorage, TerrainBackend};
use plotgrid_engine::task::{ChunkSlice, TaskScheduler};
use plotgrid_engine::world::layout::GridLayout;
use plotgrid_engine::world::plot::{Plot, PlotField};
use plotgrid_engine::world::position::{ChunkLoc, Direction, PlotId};
use plotgrid_engine::world::region::Region;
use plotgrid_engine::world::{AreaConfig, PlotArea};
use uuid::Uuid;

pub const WORLD: &str = "plots";

pub fn alice() -> Uuid {
    Uuid::from_u128(0xA11CE)
}

pub fn bob() -> Uuid {
    Uuid::from_u128(0xB0B)
}

pub fn id(x: i32, y: i32) -> PlotId {
    PlotId::new(x, y)
}

// ---------------------------------------------------------------------------
// Recording storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingStorage {
    pub preload: Mutex<Vec<Plot>>,
    pub saves: Mutex<Vec<(PlotId, PlotField)>>,
    pub swaps: Mutex<Vec<(PlotId, PlotId)>>,
    pub fail_saves: AtomicBool,
}

impl RecordingStorage {
    pub fn saved(&self, id: PlotId, field: PlotField) -> bool {
        self.saves.lock().unwrap().contains(&(id, field))
    }

    pub fn fail(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl PlotStorage for RecordingStorage {
    fn load(&self, _world: &str) -> Result<Vec<Plot>, BackendError> {
        Ok(self.preload.lock().unwrap().clone())
    }

    fn save(&self, _world: &str, plot: &Plot, field: PlotField) -> Result<(), BackendError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err("disk full".into());
        }
        self.saves.lock().unwrap().push((plot.id, field));
        Ok(())
    }

    fn swap(&self, _world: &str, a: PlotId, b: PlotId) -> Result<(), BackendError> {
        self.swaps.lock().unwrap().push((a, b));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording terrain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TerrainCall {
    Regenerate(ChunkSlice),
    RemoveRoad(Region),
    CreateRoad(Region),
    ResetPlot(Region, bool),
    SetBiome(ChunkSlice, String),
    ClearEntities(Region),
    Refresh(Vec<ChunkLoc>),
    StartMerge(Vec<PlotId>),
    FinishMerge(Vec<PlotId>),
    StartUnlink(Vec<PlotId>),
    FinishUnlink(Vec<PlotId>),
}

#[derive(Default)]
pub struct RecordingTerrain {
    pub calls: Mutex<Vec<TerrainCall>>,
    /// Entities reported inside each counted region.
    pub per_region: EntityCounts,
}

impl RecordingTerrain {
    pub fn calls(&self) -> Vec<TerrainCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&TerrainCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn removed_roads(&self) -> Vec<Region> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TerrainCall::RemoveRoad(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: TerrainCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TerrainBackend for RecordingTerrain {
    fn regenerate_chunk(&self, _world: &str, slice: &ChunkSlice) {
        self.push(TerrainCall::Regenerate(*slice));
    }

    fn remove_road(&self, _world: &str, region: &Region) {
        self.push(TerrainCall::RemoveRoad(*region));
    }

    fn create_road(&self, _world: &str, region: &Region) {
        self.push(TerrainCall::CreateRoad(*region));
    }

    fn reset_plot(&self, _world: &str, region: &Region, claimed: bool) {
        self.push(TerrainCall::ResetPlot(*region, claimed));
    }

    fn set_biome(&self, _world: &str, slice: &ChunkSlice, biome: &str) {
        self.push(TerrainCall::SetBiome(*slice, biome.to_string()));
    }

    fn clear_entities(&self, _world: &str, region: &Region) -> usize {
        self.push(TerrainCall::ClearEntities(*region));
        1
    }

    fn count_entities(&self, _world: &str, _region: &Region) -> EntityCounts {
        self.per_region
    }

    fn refresh_chunks(&self, _world: &str, chunks: &[ChunkLoc]) {
        self.push(TerrainCall::Refresh(chunks.to_vec()));
    }

    fn start_merge(&self, _world: &str, ids: &[PlotId]) {
        self.push(TerrainCall::StartMerge(ids.to_vec()));
    }

    fn finish_merge(&self, _world: &str, ids: &[PlotId]) {
        self.push(TerrainCall::FinishMerge(ids.to_vec()));
    }

    fn start_unlink(&self, _world: &str, ids: &[PlotId]) {
        self.push(TerrainCall::StartUnlink(ids.to_vec()));
    }

    fn finish_unlink(&self, _world: &str, ids: &[PlotId]) {
        self.push(TerrainCall::FinishUnlink(ids.to_vec()));
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Small plots keep rasterised coverage checks cheap.
pub fn small_layout() -> GridLayout {
    GridLayout::new(4, 2).unwrap()
}

pub fn area_with(storage: Arc<RecordingStorage>) -> PlotArea {
    PlotArea::new(WORLD, AreaConfig::new(small_layout()), storage)
}

pub fn area() -> PlotArea {
    area_with(Arc::new(RecordingStorage::default()))
}

/// Claim `ids` for `owner` without merging anything.
pub fn claim_all(area: &PlotArea, owner: Uuid, ids: &[PlotId]) {
    for id in ids {
        area.insert(Plot::claimed(*id, owner));
    }
}

/// Set both sides of the edge from `from` towards `dir`.
pub fn link(area: &PlotArea, from: PlotId, dir: Direction) {
    let to = from.relative(dir).unwrap();
    for (id, d) in [(from, dir), (to, dir.opposite())] {
        let mut plot = area.plot(id);
        plot.merged.set(d, true);
        area.insert(plot);
    }
}

/// Set only one side of an edge, leaving the flags asymmetric.
pub fn link_one_sided(area: &PlotArea, from: PlotId, dir: Direction) {
    let mut plot = area.plot(from);
    plot.merged.set(dir, true);
    area.insert(plot);
}

/// Every grid-adjacent pair agrees on its shared edge.
pub fn assert_symmetric(area: &PlotArea, ids: impl IntoIterator<Item = PlotId>) {
    for id in ids {
        let plot = area.plot(id);
        for dir in Direction::ALL {
            let other = area.plot(id.relative(dir).unwrap());
            assert_eq!(
                plot.merged(dir),
                other.merged(dir.opposite()),
                "edge {} {} is asymmetric",
                id,
                dir
            );
        }
    }
}

/// Block columns the component of `seed` should cover: each plot, each merged
/// road strip and each fully merged road intersection.
pub fn expected_cells(area: &PlotArea, seed: PlotId) -> HashSet<(i64, i64)> {
    let layout = area.layout();
    let component = area.component(seed).unwrap();
    let mut regions = Vec::new();
    let members = component.members();
    let member = |id: PlotId, dir: Direction| {
        id.relative(dir).is_some_and(|next| members.contains(&next))
    };
    for m in members {
        let plot = area.plot(*m);
        regions.push(layout.plot_region(*m));
        if plot.merged(Direction::East) && member(*m, Direction::East) {
            regions.push(layout.road_east(*m));
        }
        if plot.merged(Direction::South) && member(*m, Direction::South) {
            regions.push(layout.road_south(*m));
        }
        let diagonal = m.relative(Direction::East).and_then(|e| e.relative(Direction::South));
        if area.merged_south_east(*m)
            && member(*m, Direction::East)
            && member(*m, Direction::South)
            && diagonal.is_some_and(|d| members.contains(&d))
        {
            regions.push(layout.road_south_east(*m));
        }
    }
    rasterize(&regions)
}

pub fn rasterize(regions: &[Region]) -> HashSet<(i64, i64)> {
    let mut cells = HashSet::new();
    for r in regions {
        for x in r.min_x..=r.max_x {
            for z in r.min_z..=r.max_z {
                cells.insert((x, z));
            }
        }
    }
    cells
}

/// The decomposition covers exactly the expected cells without overlap.
pub fn assert_exact_cover(area: &PlotArea, seed: PlotId) {
    let regions = area.regions(seed).unwrap();
    let covered = rasterize(&regions);
    let total: i64 = regions.iter().map(|r| r.area()).sum();
    assert_eq!(total as usize, covered.len(), "regions overlap: {:?}", regions);
    assert_eq!(covered, expected_cells(area, seed), "wrong cover: {:?}", regions);
}

// ---------------------------------------------------------------------------
// Manager harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub scheduler: TaskScheduler,
    pub manager: PlotManager,
    pub storage: Arc<RecordingStorage>,
    pub terrain: Arc<RecordingTerrain>,
}

impl Harness {
    pub fn new(config: AreaConfig) -> Self {
        Self::with_terrain(config, RecordingTerrain::default())
    }

    pub fn with_terrain(config: AreaConfig, terrain: RecordingTerrain) -> Self {
        let scheduler = TaskScheduler::new();
        let storage = Arc::new(RecordingStorage::default());
        let terrain = Arc::new(terrain);
        let manager = PlotManager::new(storage.clone(), terrain.clone(), scheduler.spawner());
        manager.add_area(WORLD, config);
        Self {
            scheduler,
            manager,
            storage,
            terrain,
        }
    }

    pub fn area(&self) -> Arc<PlotArea> {
        self.manager.area(WORLD).unwrap()
    }

    pub fn run_until_idle(&mut self) -> u64 {
        self.scheduler.run_until_idle(10_000)
    }
}
