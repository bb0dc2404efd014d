use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::world::position::PlotId;
use crate::world::region::Region;

/// A maximal set of plots connected by merge flags. Shared by every member
/// lookup for as long as the generation it was built in is current.
#[derive(Debug)]
pub struct Component {
    generation: u64,
    members: BTreeSet<PlotId>,
    regions: OnceLock<Arc<[Region]>>,
}

impl Component {
    pub(crate) fn new(generation: u64, members: BTreeSet<PlotId>) -> Self {
        Self {
            generation,
            members,
            regions: OnceLock::new(),
        }
    }

    pub(crate) fn single(generation: u64, id: PlotId) -> Self {
        Self::new(generation, BTreeSet::from([id]))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Members in ascending id order.
    pub fn members(&self) -> &BTreeSet<PlotId> {
        &self.members
    }

    pub fn contains(&self, id: PlotId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Lowest member id; the canonical "base" plot of the component.
    pub fn base(&self) -> Option<PlotId> {
        self.members.first().copied()
    }

    /// The region cover, computed by `init` on first use.
    pub(crate) fn regions(&self, init: impl FnOnce() -> Vec<Region>) -> Arc<[Region]> {
        self.regions.get_or_init(|| init().into()).clone()
    }
}

/// Member id -> component, valid for a single generation. Any topology change
/// bumps the generation and drops every entry.
#[derive(Debug, Default)]
pub struct ComponentCache {
    generation: AtomicU64,
    by_member: DashMap<PlotId, Arc<Component>>,
}

impl ComponentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self, id: PlotId) -> Option<Arc<Component>> {
        let hit = self.by_member.get(&id)?;
        (hit.generation == self.generation()).then(|| hit.clone())
    }

    /// Register `component` under each of its members. Components built in
    /// an older generation are dropped.
    pub fn insert(&self, component: &Arc<Component>) {
        if component.generation != self.generation() {
            return;
        }
        for id in &component.members {
            self.by_member.insert(*id, Arc::clone(component));
        }
    }

    pub fn invalidate(&self) -> u64 {
        let next = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.by_member.clear();
        next
    }

    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }
}
