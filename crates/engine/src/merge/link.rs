use std::collections::{BTreeSet, HashSet};

use uuid::Uuid;

use super::data::fuse_settings;
use super::graph::MergeBatch;
use crate::backend::TerrainBackend;
use crate::error::PlotError;
use crate::world::plot::PlotField;
use crate::world::position::{Direction, PlotId};

/// Merge two adjacent plots. The pair is ordered so `lesser` is the north or
/// west side; a pair that is already merged is left alone.
///
/// If the new edge completes three sides of a 2x2 square of same-owner plots,
/// the fourth edge is merged too so squares never keep an orphan road.
/// Returns whether a new edge was created.
pub(crate) fn merge_pair(
    batch: &mut MergeBatch<'_>,
    terrain: &dyn TerrainBackend,
    a: PlotId,
    b: PlotId,
    remove_roads: bool,
) -> bool {
    let (lesser, greater) = if a <= b { (a, b) } else { (b, a) };
    let dir = if lesser.x == greater.x {
        Direction::South
    } else {
        Direction::East
    };
    if lesser.relative(dir) != Some(greater) {
        tracing::debug!("refusing to merge non-adjacent plots {} and {}", lesser, greater);
        return false;
    }
    let area = batch.area();
    if area.plot(lesser).merged(dir) {
        return false;
    }

    let mut first = area.plot(lesser);
    let mut second = area.plot(greater);
    fuse_settings(&mut first.settings, &mut second.settings);
    for fused in [first, second] {
        let plot = batch.edit(fused.id, |p| p.settings = fused.settings.clone());
        for field in [PlotField::Flags, PlotField::Members, PlotField::Alias, PlotField::Ratings] {
            area.persist(&plot, field);
        }
    }
    batch.set_merged(lesser, dir, true);
    batch.set_merged(greater, dir.opposite(), true);
    tracing::debug!("merged {} {} into {} in {}", lesser, dir, greater, area.name());

    if remove_roads {
        let layout = area.layout();
        let road = match dir {
            Direction::South => layout.road_south(lesser),
            _ => layout.road_east(lesser),
        };
        terrain.remove_road(area.name(), &road);
    }

    close_squares(batch, terrain, lesser, greater, dir, remove_roads);
    true
}

/// For each square on either side of the fresh `lesser`-`greater` edge, merge
/// the one edge still missing when the other three already are.
fn close_squares(
    batch: &mut MergeBatch<'_>,
    terrain: &dyn TerrainBackend,
    lesser: PlotId,
    greater: PlotId,
    dir: Direction,
    remove_roads: bool,
) {
    let sides = match dir {
        Direction::South => [Direction::West, Direction::East],
        _ => [Direction::North, Direction::South],
    };
    for side in sides {
        let (Some(lesser_side), Some(greater_side)) = (lesser.relative(side), greater.relative(side))
        else {
            continue;
        };
        let area = batch.area();
        let owner = area.plot(lesser).owner;
        let l = area.plot(lesser);
        let g = area.plot(greater);
        let ls = area.plot(lesser_side);
        let gs = area.plot(greater_side);
        if [&l, &g, &ls, &gs].iter().any(|p| p.owner.is_none() || p.owner != owner) {
            continue;
        }
        let across = ls.merged(dir);
        let lesser_edge = l.merged(side);
        let greater_edge = g.merged(side);
        if across && lesser_edge && !greater_edge {
            merge_pair(batch, terrain, greater, greater_side, remove_roads);
        } else if across && greater_edge && !lesser_edge {
            merge_pair(batch, terrain, lesser, lesser_side, remove_roads);
        } else if lesser_edge && greater_edge && !across {
            merge_pair(batch, terrain, lesser_side, greater_side, remove_roads);
        }
    }
}

/// Erase the road intersections south-east of every fully merged 2x2 square
/// touching `ids`.
pub(crate) fn remove_corner_roads(
    batch: &MergeBatch<'_>,
    terrain: &dyn TerrainBackend,
    ids: &BTreeSet<PlotId>,
) {
    let area = batch.area();
    let mut corners = BTreeSet::new();
    for id in ids {
        for origin in [
            Some(*id),
            id.relative(Direction::North),
            id.relative(Direction::West),
            id.relative(Direction::North)
                .and_then(|n| n.relative(Direction::West)),
        ]
        .into_iter()
        .flatten()
        {
            if area.merged_south_east(origin) {
                corners.insert(origin);
            }
        }
    }
    for origin in corners {
        terrain.remove_road(area.name(), &area.layout().road_south_east(origin));
    }
}

/// Merge every plot in the rectangle `pos1..=pos2` into one component.
///
/// All plots must share one owner. Trusted, members and denied are unioned
/// over the selection (members lose anyone trusted, denied loses both) and
/// assigned to each plot before the edges are merged. Returns `false` for a
/// selection of fewer than two plots.
pub(crate) fn merge_selection(
    batch: &mut MergeBatch<'_>,
    terrain: &dyn TerrainBackend,
    pos1: PlotId,
    pos2: PlotId,
    remove_roads: bool,
) -> Result<bool, PlotError> {
    let bot = PlotId::new(pos1.x.min(pos2.x), pos1.y.min(pos2.y));
    let top = PlotId::new(pos1.x.max(pos2.x), pos1.y.max(pos2.y));
    let ids: Vec<PlotId> = PlotId::selection(bot, top).collect();
    if ids.len() < 2 {
        return Ok(false);
    }

    let area = batch.area();
    let owner: Option<Uuid> = area.plot(bot).owner;
    let mut trusted = HashSet::new();
    let mut members = HashSet::new();
    let mut denied = HashSet::new();
    for id in &ids {
        let plot = area.plot(*id);
        if plot.owner.is_none() || plot.owner != owner {
            return Err(PlotError::MixedOwnership(bot, top));
        }
        if plot.running > 0 {
            return Err(PlotError::OperationRunning(*id));
        }
        trusted.extend(plot.settings.trusted.iter().copied());
        members.extend(plot.settings.members.iter().copied());
        denied.extend(plot.settings.denied.iter().copied());
    }
    members.retain(|id| !trusted.contains(id));
    denied.retain(|id| !trusted.contains(id) && !members.contains(id));

    terrain.start_merge(area.name(), &ids);
    for id in &ids {
        let plot = batch.edit(*id, |p| {
            p.settings.trusted.clone_from(&trusted);
            p.settings.members.clone_from(&members);
            p.settings.denied.clone_from(&denied);
        });
        area.persist(&plot, PlotField::Members);
    }
    for id in &ids {
        if id.x < top.x {
            merge_pair(batch, terrain, *id, PlotId::new(id.x + 1, id.y), remove_roads);
        }
        if id.y < top.y {
            merge_pair(batch, terrain, *id, PlotId::new(id.x, id.y + 1), remove_roads);
        }
    }
    let touched: BTreeSet<PlotId> = ids.iter().copied().collect();
    if remove_roads {
        remove_corner_roads(batch, terrain, &touched);
    }
    terrain.finish_merge(area.name(), &ids);
    tracing::info!(
        "merged selection {}..{} ({} plots) in {}",
        bot,
        top,
        ids.len(),
        area.name()
    );
    Ok(true)
}

/// Split the component containing `id` back into single plots.
///
/// Homes of every member and ratings of `id` are cleared. With `create_road`
/// the east, south and south-east roads of every formerly merged edge are
/// rebuilt. Returns `false` if `id` is not merged.
pub(crate) fn unlink(
    batch: &mut MergeBatch<'_>,
    terrain: &dyn TerrainBackend,
    id: PlotId,
    create_road: bool,
) -> Result<bool, PlotError> {
    let area = batch.area();
    if !area.plot(id).is_merged() {
        return Ok(false);
    }
    let component = batch.component(id)?;
    let ids: Vec<PlotId> = component.members().iter().copied().collect();

    let base = batch.edit(id, |p| p.settings.ratings.clear());
    area.persist(&base, PlotField::Ratings);
    for member in &ids {
        let plot = batch.edit(*member, |p| p.settings.home = None);
        area.persist(&plot, PlotField::Home);
    }

    if create_road {
        terrain.start_unlink(area.name(), &ids);
        let layout = area.layout();
        for member in &ids {
            let plot = area.plot(*member);
            if plot.merged(Direction::East) {
                terrain.create_road(area.name(), &layout.road_east(*member));
            }
            if plot.merged(Direction::South) {
                terrain.create_road(area.name(), &layout.road_south(*member));
            }
            if area.merged_south_east(*member) {
                terrain.create_road(area.name(), &layout.road_south_east(*member));
            }
        }
    }

    for member in &ids {
        let plot = batch.edit(*member, |p| p.merged = Default::default());
        area.persist(&plot, PlotField::Merged);
    }

    if create_road {
        terrain.finish_unlink(area.name(), &ids);
    }
    tracing::info!("unlinked {} plots around {} in {}", ids.len(), id, area.name());
    Ok(true)
}
