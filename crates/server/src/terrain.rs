//! In-memory surface model implementing [`TerrainBackend`].
//!
//! Each chunk column remembers what lies on its surface (plot floor, road or
//! border wall) and its biome. Chunks are generated lazily from the world's
//! grid layout the first time they are touched. Entities are kept in a flat
//! per-world list; the host has no simulation, so they only move when spawned
//! or cleared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use indexmap::IndexSet;

use plotgrid_engine::backend::{EntityCounts, TerrainBackend};
use plotgrid_engine::task::ChunkSlice;
use plotgrid_engine::world::layout::{GridLayout, Surface};
use plotgrid_engine::world::position::{BlockLoc, ChunkLoc, PlotId};
use plotgrid_engine::world::region::Region;

pub const DEFAULT_BIOME: &str = "plains";

const CHUNK_COLUMNS: usize = 16 * 16;

/// What occupies the surface of a block column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Plot,
    Road,
    Wall { claimed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Animal,
    Monster,
    /// Ambient creatures: bats, fish and the like.
    Ambient,
    Boat,
    /// Dropped items, armor stands, paintings.
    Misc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub x: i64,
    pub z: i64,
}

struct ChunkSurface {
    columns: [Column; CHUNK_COLUMNS],
    /// Index into the world's biome palette.
    biomes: [u16; CHUNK_COLUMNS],
}

const fn column_index(x: i64, z: i64) -> usize {
    (z.rem_euclid(16) * 16 + x.rem_euclid(16)) as usize
}

fn pristine(layout: &GridLayout, x: i64, z: i64) -> Column {
    match layout.surface_at(x, z) {
        Surface::Plot(_) => Column::Plot,
        Surface::Road => Column::Road,
    }
}

impl ChunkSurface {
    fn generate(layout: &GridLayout, chunk: ChunkLoc) -> Self {
        let origin = chunk.block_origin();
        let mut columns = [Column::Road; CHUNK_COLUMNS];
        for dz in 0..16 {
            for dx in 0..16 {
                let (x, z) = (origin.x + dx, origin.z + dz);
                columns[column_index(x, z)] = pristine(layout, x, z);
            }
        }
        Self {
            columns,
            biomes: [0; CHUNK_COLUMNS],
        }
    }
}

struct WorldSurface {
    layout: GridLayout,
    chunks: DashMap<ChunkLoc, ChunkSurface>,
    biomes: Mutex<IndexSet<String>>,
    entities: Mutex<Vec<Entity>>,
}

impl WorldSurface {
    fn new(layout: GridLayout) -> Self {
        let mut biomes = IndexSet::new();
        biomes.insert(DEFAULT_BIOME.to_string());
        Self {
            layout,
            chunks: DashMap::new(),
            biomes: Mutex::new(biomes),
            entities: Mutex::new(Vec::new()),
        }
    }

    /// Apply `f` to every column of `region`, chunk by chunk.
    fn paint(&self, region: &Region, mut f: impl FnMut(&mut ChunkSurface, i64, i64)) {
        for chunk in region.chunks() {
            let mut surface = self
                .chunks
                .entry(chunk)
                .or_insert_with(|| ChunkSurface::generate(&self.layout, chunk));
            let origin = chunk.block_origin();
            let bounds = Region::new(origin.x, origin.z, origin.x + 15, origin.z + 15);
            let Some(part) = bounds.intersection(region) else {
                continue;
            };
            for z in part.min_z..=part.max_z {
                for x in part.min_x..=part.max_x {
                    f(&mut surface, x, z);
                }
            }
        }
    }

    fn biome_index(&self, biome: &str) -> u16 {
        let mut palette = self.biomes.lock().expect("biome palette poisoned");
        let (index, _) = palette.insert_full(biome.to_string());
        index as u16
    }
}

/// Surface terrain for every registered plot world.
pub struct SurfaceTerrain {
    worlds: DashMap<String, Arc<WorldSurface>>,
    refreshed: AtomicU64,
}

impl SurfaceTerrain {
    pub fn new() -> Self {
        Self {
            worlds: DashMap::new(),
            refreshed: AtomicU64::new(0),
        }
    }

    pub fn add_world(&self, name: &str, layout: GridLayout) {
        self.worlds
            .insert(name.to_string(), Arc::new(WorldSurface::new(layout)));
    }

    fn world(&self, name: &str) -> Option<Arc<WorldSurface>> {
        let world = self.worlds.get(name).map(|w| Arc::clone(&w));
        if world.is_none() {
            tracing::debug!("terrain call for unknown world {}", name);
        }
        world
    }

    /// Surface at `(x, z)`, generating the chunk if needed.
    pub fn column(&self, world: &str, x: i64, z: i64) -> Option<Column> {
        let surface = self.world(world)?;
        let chunk = BlockLoc::new(x, z).chunk();
        let column = match surface.chunks.get(&chunk) {
            Some(c) => c.columns[column_index(x, z)],
            None => pristine(&surface.layout, x, z),
        };
        Some(column)
    }

    pub fn biome(&self, world: &str, x: i64, z: i64) -> Option<String> {
        let surface = self.world(world)?;
        let chunk = BlockLoc::new(x, z).chunk();
        let index = surface
            .chunks
            .get(&chunk)
            .map_or(0, |c| c.biomes[column_index(x, z)]);
        let palette = surface.biomes.lock().expect("biome palette poisoned");
        palette.get_index(index as usize).cloned()
    }

    pub fn spawn_entity(&self, world: &str, kind: EntityKind, x: i64, z: i64) {
        if let Some(surface) = self.world(world) {
            surface
                .entities
                .lock()
                .expect("entity list poisoned")
                .push(Entity { kind, x, z });
        }
    }

    pub fn entities(&self, world: &str) -> Vec<Entity> {
        self.world(world)
            .map(|s| s.entities.lock().expect("entity list poisoned").clone())
            .unwrap_or_default()
    }

    /// Chunks resent to viewers so far.
    pub fn refreshed_chunks(&self) -> u64 {
        self.refreshed.load(Ordering::Relaxed)
    }
}

impl Default for SurfaceTerrain {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainBackend for SurfaceTerrain {
    fn regenerate_chunk(&self, world: &str, slice: &ChunkSlice) {
        let Some(surface) = self.world(world) else {
            return;
        };
        let layout = surface.layout;
        surface.paint(&slice.region, |chunk, x, z| {
            let i = column_index(x, z);
            chunk.columns[i] = pristine(&layout, x, z);
            chunk.biomes[i] = 0;
        });
    }

    fn remove_road(&self, world: &str, region: &Region) {
        if let Some(surface) = self.world(world) {
            surface.paint(region, |chunk, x, z| {
                chunk.columns[column_index(x, z)] = Column::Plot;
            });
        }
    }

    fn create_road(&self, world: &str, region: &Region) {
        if let Some(surface) = self.world(world) {
            surface.paint(region, |chunk, x, z| {
                chunk.columns[column_index(x, z)] = Column::Road;
            });
        }
    }

    /// Rebuild the wall ring one block outside `region`. Only road columns
    /// take a wall; merged floor is left alone.
    fn reset_plot(&self, world: &str, region: &Region, claimed: bool) {
        let Some(surface) = self.world(world) else {
            return;
        };
        let ring = Region::new(
            region.min_x - 1,
            region.min_z - 1,
            region.max_x + 1,
            region.max_z + 1,
        );
        surface.paint(&ring, |chunk, x, z| {
            if region.contains(x, z) {
                return;
            }
            let i = column_index(x, z);
            if matches!(chunk.columns[i], Column::Road | Column::Wall { .. }) {
                chunk.columns[i] = Column::Wall { claimed };
            }
        });
    }

    fn set_biome(&self, world: &str, slice: &ChunkSlice, biome: &str) {
        let Some(surface) = self.world(world) else {
            return;
        };
        let index = surface.biome_index(biome);
        surface.paint(&slice.region, |chunk, x, z| {
            chunk.biomes[column_index(x, z)] = index;
        });
    }

    fn clear_entities(&self, world: &str, region: &Region) -> usize {
        let Some(surface) = self.world(world) else {
            return 0;
        };
        let mut entities = surface.entities.lock().expect("entity list poisoned");
        let before = entities.len();
        entities.retain(|e| e.kind == EntityKind::Player || !region.contains(e.x, e.z));
        before - entities.len()
    }

    fn count_entities(&self, world: &str, region: &Region) -> EntityCounts {
        let mut counts = EntityCounts::default();
        let Some(surface) = self.world(world) else {
            return counts;
        };
        let entities = surface.entities.lock().expect("entity list poisoned");
        for entity in entities.iter().filter(|e| region.contains(e.x, e.z)) {
            if entity.kind == EntityKind::Player {
                continue;
            }
            counts.entity += 1;
            match entity.kind {
                EntityKind::Animal => {
                    counts.animal += 1;
                    counts.mob += 1;
                }
                EntityKind::Monster => {
                    counts.monster += 1;
                    counts.mob += 1;
                }
                EntityKind::Ambient => counts.mob += 1,
                EntityKind::Boat => counts.boat += 1,
                EntityKind::Misc => counts.misc += 1,
                EntityKind::Player => {}
            }
        }
        counts
    }

    fn refresh_chunks(&self, world: &str, chunks: &[ChunkLoc]) {
        self.refreshed
            .fetch_add(chunks.len() as u64, Ordering::Relaxed);
        tracing::debug!("resending {} chunks of {}", chunks.len(), world);
    }

    fn finish_merge(&self, world: &str, ids: &[PlotId]) {
        tracing::debug!("merge of {} plots in {} finished", ids.len(), world);
    }

    fn finish_unlink(&self, world: &str, ids: &[PlotId]) {
        tracing::debug!("unlink of {} plots in {} finished", ids.len(), world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotgrid_engine::task::chunk_slices;

    fn terrain() -> (SurfaceTerrain, GridLayout) {
        let layout = GridLayout::new(10, 4).unwrap();
        let terrain = SurfaceTerrain::new();
        terrain.add_world("w", layout);
        (terrain, layout)
    }

    #[test]
    fn fresh_columns_follow_layout() {
        let (terrain, layout) = terrain();
        let plot = layout.plot_region(PlotId::new(0, 0));
        assert_eq!(terrain.column("w", plot.min_x, plot.min_z), Some(Column::Plot));
        assert_eq!(terrain.column("w", plot.max_x + 1, plot.min_z), Some(Column::Road));
        assert_eq!(terrain.column("nowhere", 0, 0), None);
    }

    #[test]
    fn road_removal_and_regeneration() {
        let (terrain, layout) = terrain();
        let road = layout.road_east(PlotId::new(0, 0));
        terrain.remove_road("w", &road);
        assert_eq!(terrain.column("w", road.min_x, road.min_z), Some(Column::Plot));

        terrain.create_road("w", &road);
        assert_eq!(terrain.column("w", road.max_x, road.max_z), Some(Column::Road));

        terrain.remove_road("w", &road);
        for slice in chunk_slices(&road) {
            terrain.regenerate_chunk("w", &slice);
        }
        assert_eq!(terrain.column("w", road.min_x, road.max_z), Some(Column::Road));
    }

    #[test]
    fn reset_plot_walls_only_the_road_ring() {
        let (terrain, layout) = terrain();
        let plot = layout.plot_region(PlotId::new(0, 0));
        terrain.remove_road("w", &layout.road_east(PlotId::new(0, 0)));
        terrain.reset_plot("w", &plot, true);

        assert_eq!(
            terrain.column("w", plot.min_x - 1, plot.min_z),
            Some(Column::Wall { claimed: true })
        );
        assert_eq!(terrain.column("w", plot.max_x + 1, plot.min_z), Some(Column::Plot));
        assert_eq!(terrain.column("w", plot.min_x, plot.min_z), Some(Column::Plot));
    }

    #[test]
    fn biomes_are_painted_per_slice() {
        let (terrain, layout) = terrain();
        let plot = layout.plot_region(PlotId::new(1, 1));
        for slice in chunk_slices(&plot) {
            terrain.set_biome("w", &slice, "desert");
        }
        assert_eq!(terrain.biome("w", plot.min_x, plot.max_z).as_deref(), Some("desert"));
        assert_eq!(
            terrain.biome("w", plot.min_x - 1, plot.min_z).as_deref(),
            Some(DEFAULT_BIOME)
        );
    }

    #[test]
    fn entity_counts_and_clearing_spare_players() {
        let (terrain, layout) = terrain();
        let plot = layout.plot_region(PlotId::new(0, 0));
        let (x, z) = (plot.min_x, plot.min_z);
        for kind in [
            EntityKind::Player,
            EntityKind::Animal,
            EntityKind::Monster,
            EntityKind::Ambient,
            EntityKind::Boat,
            EntityKind::Misc,
        ] {
            terrain.spawn_entity("w", kind, x, z);
        }
        terrain.spawn_entity("w", EntityKind::Animal, plot.max_x + 2, z);

        let counts = terrain.count_entities("w", &plot);
        assert_eq!(
            counts,
            EntityCounts {
                entity: 5,
                animal: 1,
                monster: 1,
                mob: 3,
                boat: 1,
                misc: 1,
            }
        );

        assert_eq!(terrain.clear_entities("w", &plot), 5);
        assert_eq!(terrain.entities("w").len(), 2);
    }
}
