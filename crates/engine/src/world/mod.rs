pub mod border;
pub mod layout;
pub mod plot;
pub mod position;
pub mod region;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::backend::PlotStorage;
use crate::error::PlotError;
use crate::merge::cache::{Component, ComponentCache};
use crate::merge::{decompose, graph};
use layout::GridLayout;
use plot::{Plot, PlotField};
use position::{BlockLoc, ChunkLoc, Direction, PlotId};
use region::Region;

/// Per-world behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaConfig {
    pub layout: GridLayout,
    /// Merge freshly claimed plots into adjacent plots of the same owner.
    pub auto_merge: bool,
    /// Track the furthest claim and expose it as a world border.
    pub world_border: bool,
    /// Erase road terrain between plots when they merge.
    pub merge_removes_roads: bool,
}

impl AreaConfig {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            auto_merge: false,
            world_border: false,
            merge_removes_roads: true,
        }
    }
}

/// The plot store of one world: plot records, the component cache and the
/// handle used to persist corrections.
///
/// Thread-safe, lock-sharded by plot id. Plots are cloned out on every read
/// so no shard lock is ever held while another plot is touched.
pub struct PlotArea {
    name: String,
    config: AreaConfig,
    plots: DashMap<PlotId, Plot>,
    cache: ComponentCache,
    storage: Arc<dyn PlotStorage>,
    heals: AtomicU64,
}

impl PlotArea {
    pub fn new(name: impl Into<String>, config: AreaConfig, storage: Arc<dyn PlotStorage>) -> Self {
        Self {
            name: name.into(),
            config,
            plots: DashMap::new(),
            cache: ComponentCache::new(),
            storage,
            heals: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AreaConfig {
        &self.config
    }

    pub fn layout(&self) -> &GridLayout {
        &self.config.layout
    }

    pub(crate) fn cache(&self) -> &ComponentCache {
        &self.cache
    }

    // ── Plot records ────────────────────────────────────────────────────

    /// The plot at `id`, or an unowned placeholder if none is stored.
    pub fn plot(&self, id: PlotId) -> Plot {
        match self.plots.get(&id) {
            Some(plot) => plot.clone(),
            None => Plot::new(id),
        }
    }

    /// Insert a record as loaded from storage. Does not persist.
    pub fn insert(&self, plot: Plot) {
        self.plots.insert(plot.id, plot);
        self.invalidate();
    }

    /// Apply `f` to the stored plot (materialising a placeholder first) and
    /// return the updated copy. Callers persist and invalidate themselves.
    pub(crate) fn update(&self, id: PlotId, f: impl FnOnce(&mut Plot)) -> Plot {
        let mut entry = self.plots.entry(id).or_insert_with(|| Plot::new(id));
        f(&mut entry);
        entry.clone()
    }

    pub(crate) fn remove(&self, id: PlotId) -> Option<Plot> {
        self.plots.remove(&id).map(|(_, plot)| plot)
    }

    /// Every stored plot that has an owner.
    pub fn owned_plots(&self) -> Vec<Plot> {
        self.plots
            .iter()
            .filter(|entry| entry.has_owner())
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn plot_count(&self) -> usize {
        self.plots.iter().filter(|entry| entry.has_owner()).count()
    }

    /// Best-effort write through to storage.
    pub(crate) fn persist(&self, plot: &Plot, field: PlotField) {
        if let Err(e) = self.storage.save(&self.name, plot, field) {
            tracing::warn!(
                "failed to persist {:?} of plot {} in {}: {}",
                field,
                plot.id,
                self.name,
                e
            );
        }
    }

    // ── Running operations ──────────────────────────────────────────────

    pub fn is_running(&self, id: PlotId) -> bool {
        self.plots.get(&id).is_some_and(|p| p.running > 0)
    }

    pub fn add_running(&self, id: PlotId) -> u32 {
        self.update(id, |p| p.running += 1).running
    }

    /// Decrement the running counter. A placeholder left with nothing to
    /// remember is dropped from the store.
    pub fn remove_running(&self, id: PlotId) -> u32 {
        let plot = self.update(id, |p| p.running = p.running.saturating_sub(1));
        if plot.running == 0 && !plot.has_owner() && !plot.is_merged() {
            self.plots.remove(&id);
        }
        plot.running
    }

    // ── Components and geometry ─────────────────────────────────────────

    /// Drop every cached component. Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        self.cache.invalidate()
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    /// Number of asymmetric merge flags repaired so far.
    pub fn heal_count(&self) -> u64 {
        self.heals.load(Ordering::Relaxed)
    }

    pub(crate) fn record_heals(&self, n: usize) {
        self.heals.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// The connected component containing `id`.
    pub fn component(&self, id: PlotId) -> Result<Arc<Component>, PlotError> {
        graph::component(self, id)
    }

    /// Rectangle cover of the component containing `id`.
    pub fn regions(&self, id: PlotId) -> Result<Arc<[Region]>, PlotError> {
        let component = self.component(id)?;
        Ok(component.regions(|| decompose::decompose(self, component.members())))
    }

    /// The first region of maximum area.
    pub fn largest_region(&self, id: PlotId) -> Result<Region, PlotError> {
        let regions = self.regions(id)?;
        Ok(decompose::largest(&regions).unwrap_or_else(|| self.layout().plot_region(id)))
    }

    /// Bottom and top block locations enclosing every region of the component.
    pub fn corners(&self, id: PlotId) -> Result<(BlockLoc, BlockLoc), PlotError> {
        let regions = self.regions(id)?;
        let envelope =
            Region::envelope(regions.iter()).unwrap_or_else(|| self.layout().plot_region(id));
        Ok((envelope.bottom(), envelope.top()))
    }

    /// Lowest and highest plot ids of the component, per axis.
    pub fn corner_ids(&self, id: PlotId) -> Result<(PlotId, PlotId), PlotError> {
        let component = self.component(id)?;
        let mut bot = id;
        let mut top = id;
        for m in component.members() {
            bot = PlotId::new(bot.x.min(m.x), bot.y.min(m.y));
            top = PlotId::new(top.x.max(m.x), top.y.max(m.y));
        }
        Ok((bot, top))
    }

    /// Every chunk touched by the component, sorted.
    pub fn chunks(&self, id: PlotId) -> Result<BTreeSet<ChunkLoc>, PlotError> {
        let regions = self.regions(id)?;
        Ok(regions.iter().flat_map(|r| r.chunks()).collect())
    }

    /// Whether the 2x2 square with `id` in its north-west corner is fully
    /// merged, so the road intersection south-east of `id` is part of a plot.
    pub fn merged_south_east(&self, id: PlotId) -> bool {
        let plot = self.plot(id);
        if !plot.merged(Direction::East) || !plot.merged(Direction::South) {
            return false;
        }
        let east = id.relative(Direction::East).map(|e| self.plot(e));
        let south = id.relative(Direction::South).map(|s| self.plot(s));
        match (east, south) {
            (Some(east), Some(south)) => {
                east.merged(Direction::South) && south.merged(Direction::East)
            }
            _ => false,
        }
    }

    // ── Relocation ──────────────────────────────────────────────────────

    /// Exchange the records at `a` and `b`, or move the one owned record onto
    /// the unowned id. Merged plots cannot be relocated. Returns `false` when
    /// neither side is owned.
    pub fn swap(&self, a: PlotId, b: PlotId) -> Result<bool, PlotError> {
        let first = self.plot(a);
        let second = self.plot(b);
        for plot in [&first, &second] {
            if plot.is_merged() {
                return Err(PlotError::Merged(plot.id));
            }
            if plot.running > 0 {
                return Err(PlotError::OperationRunning(plot.id));
            }
        }
        if !first.has_owner() && !second.has_owner() {
            return Ok(false);
        }

        let relocate = |mut plot: Plot, to: PlotId| {
            plot.id = to;
            plot
        };
        self.plots.remove(&a);
        self.plots.remove(&b);
        if second.has_owner() {
            self.plots.insert(a, relocate(second, a));
        }
        if first.has_owner() {
            self.plots.insert(b, relocate(first, b));
        }
        self.invalidate();

        if let Err(e) = self.storage.swap(&self.name, a, b) {
            tracing::warn!("failed to persist swap {} <-> {} in {}: {}", a, b, self.name, e);
        }
        tracing::info!("relocated plots {} <-> {} in {}", a, b, self.name);
        Ok(true)
    }
}
