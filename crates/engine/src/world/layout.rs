use super::position::{BlockLoc, PlotId};
use super::region::Region;
use crate::error::PlotError;

/// Largest plot + road pitch accepted. Keeps `i32 * pitch` well inside `i64`.
const MAX_PITCH: i64 = 1 << 24;

/// Geometry of a square plot grid: plots of `plot_width` blocks separated by
/// roads of `road_width` blocks. Roads are split around the grid lines, so
/// plot `(0, 0)` starts at `road_width / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    plot_width: i64,
    road_width: i64,
}

/// What occupies a block column of a plot world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Plot(PlotId),
    Road,
}

impl GridLayout {
    pub fn new(plot_width: i64, road_width: i64) -> Result<Self, PlotError> {
        if plot_width < 1 {
            return Err(PlotError::InvalidLayout("plot width must be positive"));
        }
        if road_width < 0 {
            return Err(PlotError::InvalidLayout("road width must not be negative"));
        }
        if plot_width + road_width > MAX_PITCH {
            return Err(PlotError::InvalidLayout("plot pitch too large"));
        }
        Ok(Self {
            plot_width,
            road_width,
        })
    }

    pub const fn plot_width(&self) -> i64 {
        self.plot_width
    }

    pub const fn road_width(&self) -> i64 {
        self.road_width
    }

    pub const fn pitch(&self) -> i64 {
        self.plot_width + self.road_width
    }

    const fn offset(&self) -> i64 {
        self.road_width / 2
    }

    /// Lowest corner of a single plot, ignoring merges.
    pub const fn bottom_abs(&self, id: PlotId) -> BlockLoc {
        BlockLoc::new(
            id.x as i64 * self.pitch() + self.offset(),
            id.y as i64 * self.pitch() + self.offset(),
        )
    }

    /// Highest corner of a single plot, ignoring merges.
    pub const fn top_abs(&self, id: PlotId) -> BlockLoc {
        let bot = self.bottom_abs(id);
        BlockLoc::new(bot.x + self.plot_width - 1, bot.z + self.plot_width - 1)
    }

    pub const fn plot_region(&self, id: PlotId) -> Region {
        Region::from_corners(self.bottom_abs(id), self.top_abs(id))
    }

    /// Road strip between `id` and its east neighbour.
    pub const fn road_east(&self, id: PlotId) -> Region {
        let top = self.top_abs(id);
        let bot = self.bottom_abs(id);
        Region::new(top.x + 1, bot.z, top.x + self.road_width, top.z)
    }

    /// Road strip between `id` and its south neighbour.
    pub const fn road_south(&self, id: PlotId) -> Region {
        let top = self.top_abs(id);
        let bot = self.bottom_abs(id);
        Region::new(bot.x, top.z + 1, top.x, top.z + self.road_width)
    }

    /// Road intersection at the south-east corner of `id`.
    pub const fn road_south_east(&self, id: PlotId) -> Region {
        let top = self.top_abs(id);
        Region::new(
            top.x + 1,
            top.z + 1,
            top.x + self.road_width,
            top.z + self.road_width,
        )
    }

    /// What sits at block column `(x, z)`.
    pub fn surface_at(&self, x: i64, z: i64) -> Surface {
        match self.plot_id_at(x, z) {
            Some(id) => Surface::Plot(id),
            None => Surface::Road,
        }
    }

    /// The plot whose own bounds contain `(x, z)`; `None` on roads or outside
    /// the addressable grid.
    pub fn plot_id_at(&self, x: i64, z: i64) -> Option<PlotId> {
        let axis = |v: i64| -> Option<i32> {
            let shifted = v.checked_sub(self.offset())?;
            if shifted.rem_euclid(self.pitch()) >= self.plot_width {
                return None;
            }
            i32::try_from(shifted.div_euclid(self.pitch())).ok()
        };
        Some(PlotId::new(axis(x)?, axis(z)?))
    }
}
