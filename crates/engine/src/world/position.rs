use std::fmt;
use std::str::FromStr;

/// Grid coordinate of a single plot. `y` grows to the south.
///
/// Ordered lexicographically by `(x, y)`, which is the order components and
/// selections are walked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlotId {
    pub x: i32,
    pub y: i32,
}

impl PlotId {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring id in `dir`, or `None` if the step overflows `i32`.
    pub fn relative(&self, dir: Direction) -> Option<PlotId> {
        let (dx, dy) = dir.offset();
        Some(PlotId {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }

    /// Every id in the inclusive rectangle spanned by `bot` and `top`,
    /// column by column.
    pub fn selection(bot: PlotId, top: PlotId) -> impl Iterator<Item = PlotId> {
        (bot.x..=top.x).flat_map(move |x| (bot.y..=top.y).map(move |y| PlotId::new(x, y)))
    }
}

impl fmt::Display for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError(String);

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected `x;y` plot id, got `{}`", self.0)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for PlotId {
    type Err = ParseIdError;

    /// Accepts `x;y` and `x,y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError(s.to_string());
        let (x, y) = s.split_once([';', ',']).ok_or_else(err)?;
        Ok(PlotId {
            x: x.trim().parse().map_err(|_| err())?,
            y: y.trim().parse().map_err(|_| err())?,
        })
    }
}

/// Cardinal direction on the plot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// Which directions an auto-merge may grow in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDirection {
    One(Direction),
    All,
}

impl MergeDirection {
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL
            .into_iter()
            .filter(move |d| matches!(self, MergeDirection::All) || self == MergeDirection::One(*d))
    }
}

impl FromStr for MergeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(MergeDirection::One(Direction::North)),
            "e" | "east" => Ok(MergeDirection::One(Direction::East)),
            "s" | "south" => Ok(MergeDirection::One(Direction::South)),
            "w" | "west" => Ok(MergeDirection::One(Direction::West)),
            "all" | "auto" => Ok(MergeDirection::All),
            other => Err(format!("unknown merge direction `{other}`")),
        }
    }
}

/// Absolute horizontal block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockLoc {
    pub x: i64,
    pub z: i64,
}

impl BlockLoc {
    pub const fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }

    /// The chunk this block belongs to.
    pub const fn chunk(&self) -> ChunkLoc {
        ChunkLoc {
            x: (self.x >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkLoc {
    pub x: i32,
    pub z: i32,
}

impl ChunkLoc {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self) -> BlockLoc {
        BlockLoc::new((self.x as i64) << 4, (self.z as i64) << 4)
    }
}
