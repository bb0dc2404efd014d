use dashmap::DashMap;

use super::PlotArea;
use super::plot::Plot;

/// Margin added beyond the furthest claimed block.
pub const BORDER_MARGIN: i64 = 16;

/// Tracks, per world, how far from the origin the furthest claimed plot
/// reaches. Only worlds that were explicitly enabled are tracked; everything
/// else is unbounded.
#[derive(Debug, Default)]
pub struct WorldBorderTracker {
    borders: DashMap<String, i64>,
}

impl WorldBorderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `world`. Keeps the current value if already tracked.
    pub fn enable(&self, world: &str) {
        self.borders.entry(world.to_string()).or_insert(0);
    }

    pub fn is_tracked(&self, world: &str) -> bool {
        self.borders.contains_key(world)
    }

    /// Raise the tracked extent to cover `plot`. No-op for untracked worlds
    /// and unowned plots; the value never shrinks.
    pub fn update(&self, area: &PlotArea, plot: &Plot) {
        if !plot.has_owner() {
            return;
        }
        let Some(mut current) = self.borders.get_mut(area.name()) else {
            return;
        };
        let extent = Self::extent(area, plot);
        if extent > *current {
            tracing::debug!("world border of {} grows to {}", area.name(), extent);
            *current = extent;
        }
    }

    /// Raise the tracked extent to at least `extent`.
    pub fn raise(&self, world: &str, extent: i64) {
        if let Some(mut current) = self.borders.get_mut(world) {
            *current = (*current).max(extent);
        }
    }

    /// Chebyshev distance from the origin to the furthest corner of the plot's
    /// own bounds.
    pub fn extent(area: &PlotArea, plot: &Plot) -> i64 {
        let bot = area.layout().bottom_abs(plot.id);
        let top = area.layout().top_abs(plot.id);
        [bot.x, bot.z, top.x, top.z]
            .into_iter()
            .map(i64::abs)
            .max()
            .unwrap_or(0)
    }

    /// Border radius for `world`, or `None` when the world is unbounded.
    pub fn border(&self, world: &str) -> Option<i64> {
        self.borders.get(world).map(|v| *v + BORDER_MARGIN)
    }

    /// Drop the tracked value back to zero.
    pub fn reset(&self, world: &str) {
        if let Some(mut current) = self.borders.get_mut(world) {
            *current = 0;
        }
    }
}
