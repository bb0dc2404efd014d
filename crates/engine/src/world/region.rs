use super::position::{BlockLoc, ChunkLoc};

/// Axis-aligned rectangle of blocks, inclusive on both ends. The vertical
/// range is implicit (always the full world height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub min_x: i64,
    pub min_z: i64,
    pub max_x: i64,
    pub max_z: i64,
}

impl Region {
    pub const fn new(min_x: i64, min_z: i64, max_x: i64, max_z: i64) -> Self {
        Self {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    pub const fn from_corners(bot: BlockLoc, top: BlockLoc) -> Self {
        Self::new(bot.x, bot.z, top.x, top.z)
    }

    pub const fn bottom(&self) -> BlockLoc {
        BlockLoc::new(self.min_x, self.min_z)
    }

    pub const fn top(&self) -> BlockLoc {
        BlockLoc::new(self.max_x, self.max_z)
    }

    pub const fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub const fn depth(&self) -> i64 {
        self.max_z - self.min_z + 1
    }

    /// Number of block columns covered; zero for an inverted rectangle.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width() * self.depth()
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_z < self.min_z
    }

    pub const fn contains(&self, x: i64, z: i64) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let r = Region::new(
            self.min_x.max(other.min_x),
            self.min_z.max(other.min_z),
            self.max_x.min(other.max_x),
            self.max_z.min(other.max_z),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Every chunk the rectangle touches.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkLoc> + use<> {
        let bot = self.bottom().chunk();
        let top = self.top().chunk();
        (bot.x..=top.x).flat_map(move |x| (bot.z..=top.z).map(move |z| ChunkLoc::new(x, z)))
    }

    /// Smallest rectangle enclosing every region, or `None` for no regions.
    pub fn envelope<'a>(regions: impl IntoIterator<Item = &'a Region>) -> Option<Region> {
        regions.into_iter().fold(None, |acc, r| {
            Some(match acc {
                None => *r,
                Some(a) => Region::new(
                    a.min_x.min(r.min_x),
                    a.min_z.min(r.min_z),
                    a.max_x.max(r.max_x),
                    a.max_z.max(r.max_z),
                ),
            })
        })
    }
}
