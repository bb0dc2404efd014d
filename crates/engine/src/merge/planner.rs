use std::collections::{BTreeSet, HashSet, VecDeque};

use uuid::Uuid;

use super::graph::MergeBatch;
use super::link::{merge_pair, remove_corner_roads};
use crate::backend::TerrainBackend;
use crate::error::PlotError;
use crate::world::PlotArea;
use crate::world::position::{MergeDirection, PlotId};

/// Parameters of one auto-merge search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoMergeRequest {
    pub seed: PlotId,
    pub direction: MergeDirection,
    /// How many plots outside the seed's component may be absorbed.
    pub max_merges: usize,
    /// Only plots owned by this identity are absorbed.
    pub owner: Uuid,
    pub remove_roads: bool,
}

impl AutoMergeRequest {
    pub fn new(seed: PlotId, owner: Uuid) -> Self {
        Self {
            seed,
            direction: MergeDirection::All,
            max_merges: usize::MAX,
            owner,
            remove_roads: true,
        }
    }

    pub fn direction(mut self, direction: MergeDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn max_merges(mut self, max_merges: usize) -> Self {
        self.max_merges = max_merges;
        self
    }

    pub fn remove_roads(mut self, remove_roads: bool) -> Self {
        self.remove_roads = remove_roads;
        self
    }
}

/// Grow the seed's component into neighbouring plots of the same owner.
///
/// The frontier starts as the seed's component and is walked first in,
/// first out. An unmerged edge towards an owned neighbour is merged when the
/// neighbour already belongs to the same component, at no cost, or when the
/// neighbour's whole component fits in the remaining budget, which is then
/// charged its size. Components are recomputed from live flags after each
/// merge, so plots absorbed earlier in the search are never charged twice.
///
/// Returns whether anything was merged. An unowned seed, or one owned by
/// someone else, is a no-op; a seed with a running operation is refused.
pub fn auto_merge(
    area: &PlotArea,
    terrain: &dyn TerrainBackend,
    request: &AutoMergeRequest,
) -> Result<bool, PlotError> {
    let seed = area.plot(request.seed);
    if seed.running > 0 {
        return Err(PlotError::OperationRunning(seed.id));
    }
    if !seed.is_owner(request.owner) {
        return Ok(false);
    }

    let mut batch = MergeBatch::new(area);
    let start = batch.component(request.seed)?;
    let mut budget = request.max_merges;
    let mut frontier: VecDeque<PlotId> = start.members().iter().copied().collect();
    let mut visited: HashSet<PlotId> = frontier.iter().copied().collect();
    let mut touched: BTreeSet<PlotId> = BTreeSet::new();

    while let Some(current) = frontier.pop_front() {
        for dir in request.direction.directions() {
            if area.plot(current).merged(dir) {
                continue;
            }
            let Some(next) = current.relative(dir) else {
                continue;
            };
            let neighbour = area.plot(next);
            if !neighbour.is_owner(request.owner) || neighbour.running > 0 {
                continue;
            }

            let ours = batch.component(current)?;
            if !ours.contains(next) {
                // Looking up `next` may heal a flag pointing back at `current`,
                // which pulls our own plots into its component.
                let theirs = batch.component(next)?;
                let fresh: Vec<PlotId> = theirs
                    .members()
                    .iter()
                    .copied()
                    .filter(|m| !ours.contains(*m))
                    .collect();
                if fresh.len() > budget {
                    tracing::trace!(
                        "component of {} ({} new plots) exceeds remaining budget {}",
                        next,
                        fresh.len(),
                        budget
                    );
                    continue;
                }
                budget -= fresh.len();
                for member in fresh {
                    if visited.insert(member) {
                        frontier.push_back(member);
                    }
                }
            }

            if merge_pair(&mut batch, terrain, current, next, request.remove_roads) {
                touched.insert(current);
                touched.insert(next);
            } else if area.plot(current).merged(dir) {
                // Joined by a heal during the lookup above.
                if request.remove_roads {
                    remove_edge_road(area, terrain, current, next);
                }
                touched.insert(current);
                touched.insert(next);
            }
        }
    }

    if touched.is_empty() {
        return Ok(false);
    }
    if request.remove_roads {
        remove_corner_roads(&batch, terrain, &touched);
        let ids: Vec<PlotId> = touched.iter().copied().collect();
        terrain.finish_merge(area.name(), &ids);
    }
    tracing::info!(
        "auto-merge from {} in {} joined {} plots, budget left {}",
        request.seed,
        area.name(),
        touched.len(),
        budget
    );
    Ok(true)
}

/// Erase the road strip on the shared edge of two adjacent plots.
fn remove_edge_road(area: &PlotArea, terrain: &dyn TerrainBackend, a: PlotId, b: PlotId) {
    let (lesser, greater) = if a <= b { (a, b) } else { (b, a) };
    let layout = area.layout();
    let road = if lesser.x == greater.x {
        layout.road_south(lesser)
    } else {
        layout.road_east(lesser)
    };
    terrain.remove_road(area.name(), &road);
}
