use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use uuid::Uuid;

use super::position::{BlockLoc, Direction, PlotId};

/// Flag name -> raw value. Shared between merged plots, so it sits behind an
/// `Arc` and is replaced wholesale rather than edited in place.
pub type FlagMap = IndexMap<String, String>;

/// Per-direction merge flags, indexed by [`Direction::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MergeFlags([bool; 4]);

impl MergeFlags {
    pub const NONE: MergeFlags = MergeFlags([false; 4]);

    pub const fn from_array(flags: [bool; 4]) -> Self {
        Self(flags)
    }

    pub const fn to_array(self) -> [bool; 4] {
        self.0
    }

    pub const fn get(&self, dir: Direction) -> bool {
        self.0[dir.index()]
    }

    pub fn set(&mut self, dir: Direction, value: bool) {
        self.0[dir.index()] = value;
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|f| *f)
    }

    /// Directions whose flag is set, in N, E, S, W order.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.get(*d))
    }
}

/// Settings owned by the storage layer; the engine only reads and fuses them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotSettings {
    pub alias: String,
    pub flags: Arc<FlagMap>,
    pub trusted: HashSet<Uuid>,
    pub members: HashSet<Uuid>,
    pub denied: HashSet<Uuid>,
    pub ratings: HashMap<Uuid, u8>,
    /// Home position relative to the plot's bottom corner.
    pub home: Option<BlockLoc>,
}

/// A single grid cell. Unclaimed coordinates are represented by placeholder
/// plots with no owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub id: PlotId,
    pub owner: Option<Uuid>,
    pub merged: MergeFlags,
    /// Non-zero while an exclusive long operation (clear, regen) is running.
    pub running: u32,
    pub settings: PlotSettings,
}

impl Plot {
    /// Unowned placeholder.
    pub fn new(id: PlotId) -> Self {
        Self {
            id,
            owner: None,
            merged: MergeFlags::NONE,
            running: 0,
            settings: PlotSettings::default(),
        }
    }

    pub fn claimed(id: PlotId, owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Self::new(id)
        }
    }

    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    pub fn is_owner(&self, identity: Uuid) -> bool {
        self.owner == Some(identity)
    }

    pub fn is_merged(&self) -> bool {
        self.merged.any()
    }

    pub fn merged(&self, dir: Direction) -> bool {
        self.merged.get(dir)
    }
}

/// Which part of a plot a storage write concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotField {
    Owner,
    Merged,
    Members,
    Flags,
    Alias,
    Ratings,
    Home,
}
