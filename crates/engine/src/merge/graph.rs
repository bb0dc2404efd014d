use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use super::cache::Component;
use crate::error::PlotError;
use crate::world::PlotArea;
use crate::world::plot::{Plot, PlotField};
use crate::world::position::{Direction, PlotId};

/// Cached component lookup. Traverses on a miss, healing any asymmetric flags
/// it walks over; a traversal that healed bumps the generation before the
/// result is cached.
pub(crate) fn component(area: &PlotArea, id: PlotId) -> Result<Arc<Component>, PlotError> {
    if let Some(hit) = area.cache().get(id) {
        return Ok(hit);
    }
    let generation = area.cache().generation();
    let plot = area.plot(id);
    if !plot.has_owner() || !plot.is_merged() {
        let single = Arc::new(Component::single(generation, id));
        area.cache().insert(&single);
        return Ok(single);
    }

    let (members, heals) = traverse(area, id)?;
    let generation = if heals > 0 {
        area.invalidate()
    } else {
        generation
    };
    let component = Arc::new(Component::new(generation, members));
    area.cache().insert(&component);
    Ok(component)
}

/// Breadth-first walk over set merge flags starting at `seed`.
///
/// Every flag whose counterpart on the neighbour is missing is repaired in
/// place: an owned neighbour gets the opposite flag, an unowned one causes
/// the dangling flag to be dropped. Repairs are persisted best effort.
/// Returns the members and the number of repairs made.
pub(crate) fn traverse(area: &PlotArea, seed: PlotId) -> Result<(BTreeSet<PlotId>, usize), PlotError> {
    let mut members = BTreeSet::new();
    let mut seen = HashSet::from([seed]);
    let mut queue = VecDeque::from([seed]);
    let mut heals = 0;

    while let Some(id) = queue.pop_front() {
        let plot = area.plot(id);
        if !plot.has_owner() {
            tracing::debug!(
                "skipping unowned plot {} reached from {} in {}",
                id,
                seed,
                area.name()
            );
            continue;
        }
        members.insert(id);

        for dir in plot.merged.directions() {
            let next = id
                .relative(dir)
                .ok_or(PlotError::CoordinateOverflow(id, dir))?;
            let neighbour = area.plot(next);
            if !neighbour.merged(dir.opposite()) {
                heals += 1;
                if !heal(area, &plot, &neighbour, dir) {
                    continue;
                }
            }
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    if heals > 0 {
        area.record_heals(heals);
    }
    Ok((members, heals))
}

/// Repair a one-sided flag from `plot` towards `neighbour`. Returns whether
/// the edge survives.
fn heal(area: &PlotArea, plot: &Plot, neighbour: &Plot, dir: Direction) -> bool {
    if neighbour.has_owner() {
        tracing::warn!(
            "plot {} is merged {} but {} is not merged back, linking both in {}",
            plot.id,
            dir,
            neighbour.id,
            area.name()
        );
        let healed = area.update(neighbour.id, |p| p.merged.set(dir.opposite(), true));
        area.persist(&healed, PlotField::Merged);
        true
    } else {
        tracing::warn!(
            "plot {} is merged {} into unowned {}, dropping the flag in {}",
            plot.id,
            dir,
            neighbour.id,
            area.name()
        );
        let healed = area.update(plot.id, |p| p.merged.set(dir, false));
        area.persist(&healed, PlotField::Merged);
        false
    }
}

/// Scope for a run of flag mutations against one area.
///
/// Once anything has been written, component reads bypass the cache and
/// traverse the live flags; dropping the batch invalidates the cache exactly
/// once.
pub struct MergeBatch<'a> {
    area: &'a PlotArea,
    dirty: bool,
}

impl<'a> MergeBatch<'a> {
    pub fn new(area: &'a PlotArea) -> Self {
        Self { area, dirty: false }
    }

    pub fn area(&self) -> &'a PlotArea {
        self.area
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn component(&self, id: PlotId) -> Result<Arc<Component>, PlotError> {
        if !self.dirty {
            return self.area.component(id);
        }
        let (members, _) = traverse(self.area, id)?;
        let members = if members.is_empty() {
            BTreeSet::from([id])
        } else {
            members
        };
        Ok(Arc::new(Component::new(self.area.generation(), members)))
    }

    /// Set or clear one side of an edge and persist it.
    pub fn set_merged(&mut self, id: PlotId, dir: Direction, value: bool) -> Plot {
        self.dirty = true;
        let plot = self.area.update(id, |p| p.merged.set(dir, value));
        self.area.persist(&plot, PlotField::Merged);
        plot
    }

    /// Apply an arbitrary edit to a stored plot. The caller persists.
    pub fn edit(&mut self, id: PlotId, f: impl FnOnce(&mut Plot)) -> Plot {
        self.dirty = true;
        self.area.update(id, f)
    }
}

impl Drop for MergeBatch<'_> {
    fn drop(&mut self) {
        if self.dirty {
            self.area.invalidate();
        }
    }
}
