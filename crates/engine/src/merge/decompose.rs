use std::collections::{BTreeSet, HashSet};

use indexmap::IndexSet;

use crate::world::PlotArea;
use crate::world::position::{Direction, PlotId};
use crate::world::region::Region;

/// Cover a component with non-overlapping rectangles.
///
/// Starting from the lowest unvisited member, a rectangle of plot ids is grown
/// north, east, south and west for as long as the whole new edge is made of
/// unvisited members merged into the rectangle and merged with each other.
/// Its block bounds are emitted, followed by the roads it owns on its south
/// and east borders: a south strip under each bottom-row plot merged south,
/// an east strip beside each right-column plot merged east, and the road
/// intersection wherever the 2x2 square south-east of a border plot is fully
/// merged. Repeats until every member is covered.
pub fn decompose(area: &PlotArea, members: &BTreeSet<PlotId>) -> Vec<Region> {
    let layout = area.layout();
    if members.len() == 1 {
        if let Some(id) = members.first() {
            if !area.plot(*id).is_merged() {
                return vec![layout.plot_region(*id)];
            }
        }
    }

    let mut visited: HashSet<PlotId> = HashSet::with_capacity(members.len());
    let mut out: IndexSet<Region> = IndexSet::new();

    for seed in members {
        if visited.contains(seed) {
            continue;
        }
        let (bot, top) = grow(area, members, &visited, *seed);
        for id in PlotId::selection(bot, top) {
            visited.insert(id);
        }
        out.insert(Region::from_corners(
            layout.bottom_abs(bot),
            layout.top_abs(top),
        ));

        for x in bot.x..=top.x {
            let id = PlotId::new(x, top.y);
            if joined(area, members, id, Direction::South) {
                out.insert(layout.road_south(id));
            }
        }
        for y in bot.y..=top.y {
            let id = PlotId::new(top.x, y);
            if joined(area, members, id, Direction::East) {
                out.insert(layout.road_east(id));
            }
        }
        let border = (bot.x..=top.x)
            .map(|x| PlotId::new(x, top.y))
            .chain((bot.y..top.y).map(|y| PlotId::new(top.x, y)));
        for id in border {
            if corner_joined(area, members, id) {
                out.insert(layout.road_south_east(id));
            }
        }
    }

    out.into_iter().collect()
}

/// The first region of maximum area.
pub fn largest(regions: &[Region]) -> Option<Region> {
    let mut best: Option<Region> = None;
    for r in regions {
        if best.is_none_or(|b| r.area() > b.area()) {
            best = Some(*r);
        }
    }
    best
}

/// `id` is merged towards `dir` and the plot on the other side belongs to
/// the component. A flag pointing out of the component owns no road.
fn joined(area: &PlotArea, members: &BTreeSet<PlotId>, id: PlotId, dir: Direction) -> bool {
    area.plot(id).merged(dir) && id.relative(dir).is_some_and(|next| members.contains(&next))
}

/// The 2x2 square south-east of `id` is fully merged and every plot of it
/// belongs to the component.
fn corner_joined(area: &PlotArea, members: &BTreeSet<PlotId>, id: PlotId) -> bool {
    let square = id.relative(Direction::East).zip(id.relative(Direction::South));
    let Some((east, south)) = square else {
        return false;
    };
    let Some(diagonal) = east.relative(Direction::South) else {
        return false;
    };
    [east, south, diagonal].iter().all(|p| members.contains(p)) && area.merged_south_east(id)
}

/// Grow a rectangle of plot ids from `seed` until no edge can advance.
fn grow(
    area: &PlotArea,
    members: &BTreeSet<PlotId>,
    visited: &HashSet<PlotId>,
    seed: PlotId,
) -> (PlotId, PlotId) {
    let mut bot = seed;
    let mut top = seed;
    loop {
        let mut grew = false;
        for dir in Direction::ALL {
            while let Some(edge) = next_edge(bot, top, dir) {
                if !edge_joins(area, members, visited, &edge, dir) {
                    break;
                }
                match dir {
                    Direction::North => bot.y -= 1,
                    Direction::East => top.x += 1,
                    Direction::South => top.y += 1,
                    Direction::West => bot.x -= 1,
                }
                grew = true;
            }
        }
        if !grew {
            return (bot, top);
        }
    }
}

/// Ids of the row or column just outside the rectangle in `dir`, ordered
/// along the edge. `None` when that would leave the addressable grid.
fn next_edge(bot: PlotId, top: PlotId, dir: Direction) -> Option<Vec<PlotId>> {
    let edge = match dir {
        Direction::North => {
            let y = bot.y.checked_sub(1)?;
            (bot.x..=top.x).map(|x| PlotId::new(x, y)).collect()
        }
        Direction::South => {
            let y = top.y.checked_add(1)?;
            (bot.x..=top.x).map(|x| PlotId::new(x, y)).collect()
        }
        Direction::East => {
            let x = top.x.checked_add(1)?;
            (bot.y..=top.y).map(|y| PlotId::new(x, y)).collect()
        }
        Direction::West => {
            let x = bot.x.checked_sub(1)?;
            (bot.y..=top.y).map(|y| PlotId::new(x, y)).collect()
        }
    };
    Some(edge)
}

/// Whether every plot of `edge` can join the rectangle lying in the opposite
/// direction of `dir`.
fn edge_joins(
    area: &PlotArea,
    members: &BTreeSet<PlotId>,
    visited: &HashSet<PlotId>,
    edge: &[PlotId],
    dir: Direction,
) -> bool {
    let along = match dir {
        Direction::North | Direction::South => Direction::East,
        Direction::East | Direction::West => Direction::South,
    };
    edge.iter().enumerate().all(|(i, id)| {
        if !members.contains(id) || visited.contains(id) {
            return false;
        }
        let plot = area.plot(*id);
        if !plot.merged(dir.opposite()) {
            return false;
        }
        i + 1 == edge.len() || plot.merged(along)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_prefers_first_on_ties() {
        let a = Region::new(0, 0, 4, 4);
        let b = Region::new(10, 10, 14, 14);
        let c = Region::new(0, 0, 1, 1);
        assert_eq!(largest(&[c, a, b]), Some(a));
        assert_eq!(largest(&[]), None);
    }
}
