//! End-to-end plot operations through the manager and scheduler.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use plotgrid_engine::PlotError;
use plotgrid_engine::backend::EntityCounts;
use plotgrid_engine::merge::AutoMergeRequest;
use plotgrid_engine::world::AreaConfig;
use plotgrid_engine::world::plot::{Plot, PlotField};
use plotgrid_engine::world::position::{BlockLoc, Direction, PlotId};
use uuid::Uuid;

fn config() -> AreaConfig {
    AreaConfig::new(small_layout())
}

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

fn square(h: &Harness) -> [PlotId; 4] {
    let ids = [id(0, 0), id(1, 0), id(0, 1), id(1, 1)];
    for p in ids {
        h.manager.claim(WORLD, p, alice()).unwrap();
    }
    assert!(h.manager.merge_selection(WORLD, id(0, 0), id(1, 1), true).unwrap());
    ids
}

// ---------------------------------------------------------------------------
// Claiming
// ---------------------------------------------------------------------------

#[test]
fn claim_persists_and_rejects_double_claims() {
    let h = Harness::new(config());
    let plot = h.manager.claim(WORLD, id(2, 3), alice()).unwrap();
    assert!(plot.is_owner(alice()));
    assert!(h.storage.saved(id(2, 3), PlotField::Owner));
    assert_eq!(
        h.manager.claim(WORLD, id(2, 3), bob()).unwrap_err(),
        PlotError::AlreadyClaimed(id(2, 3))
    );
    assert_eq!(
        h.manager.claim("nowhere", id(0, 0), bob()).unwrap_err(),
        PlotError::UnknownWorld("nowhere".into())
    );
}

#[test]
fn auto_merge_worlds_merge_on_the_next_turn() {
    let mut h = Harness::new(AreaConfig {
        auto_merge: true,
        ..config()
    });
    h.manager.claim(WORLD, id(0, 0), alice()).unwrap();
    h.manager.claim(WORLD, id(1, 0), alice()).unwrap();
    h.manager.claim(WORLD, id(2, 0), bob()).unwrap();
    assert!(!h.area().plot(id(0, 0)).is_merged());

    h.run_until_idle();
    let area = h.area();
    assert!(area.plot(id(0, 0)).merged(Direction::East));
    assert!(!area.plot(id(1, 0)).merged(Direction::East));
    assert_eq!(area.component(id(1, 0)).unwrap().len(), 2);
}

#[test]
fn unclaim_unlinks_and_forgets_the_plot() {
    let h = Harness::new(config());
    square(&h);
    assert!(h.manager.unclaim(WORLD, id(1, 1)).unwrap());

    let area = h.area();
    assert!(!area.plot(id(1, 1)).has_owner());
    assert!(!area.plot(id(0, 0)).is_merged());
    assert_symmetric(&area, PlotId::selection(id(0, 0), id(1, 1)));
    assert!(!h.manager.unclaim(WORLD, id(1, 1)).unwrap());
}

// ---------------------------------------------------------------------------
// Selection merge and unlink
// ---------------------------------------------------------------------------

#[test]
fn selection_merge_unions_memberships() {
    let h = Harness::new(config());
    for p in [id(0, 0), id(1, 0)] {
        h.manager.claim(WORLD, p, alice()).unwrap();
    }
    let area = h.area();
    let mut left = area.plot(id(0, 0));
    left.settings.trusted.insert(bob());
    left.settings.denied.insert(Uuid::from_u128(9));
    area.insert(left);
    let mut right = area.plot(id(1, 0));
    right.settings.members.insert(bob());
    right.settings.members.insert(Uuid::from_u128(7));
    area.insert(right);

    assert!(h.manager.merge_selection(WORLD, id(1, 0), id(0, 0), true).unwrap());
    for p in [id(0, 0), id(1, 0)] {
        let s = area.plot(p).settings;
        assert!(s.trusted.contains(&bob()));
        assert!(!s.members.contains(&bob()));
        assert!(s.members.contains(&Uuid::from_u128(7)));
        assert!(s.denied.contains(&Uuid::from_u128(9)));
    }
    assert_eq!(
        h.terrain.count(|c| matches!(c, TerrainCall::StartMerge(_))),
        1
    );
    assert_eq!(
        h.terrain.count(|c| matches!(c, TerrainCall::FinishMerge(_))),
        1
    );
}

#[test]
fn selection_merge_requires_one_owner() {
    let h = Harness::new(config());
    h.manager.claim(WORLD, id(0, 0), alice()).unwrap();
    h.manager.claim(WORLD, id(1, 0), bob()).unwrap();
    assert_eq!(
        h.manager.merge_selection(WORLD, id(0, 0), id(1, 0), true).unwrap_err(),
        PlotError::MixedOwnership(id(0, 0), id(1, 0))
    );
    assert!(!h.area().plot(id(0, 0)).is_merged());
    assert!(!h.manager.merge_selection(WORLD, id(0, 0), id(0, 0), true).unwrap());
}

#[test]
fn square_merge_is_one_rectangle_with_its_corner_removed() {
    let h = Harness::new(config());
    square(&h);
    let area = h.area();
    assert!(area.merged_south_east(id(0, 0)));
    assert_eq!(area.regions(id(0, 0)).unwrap().len(), 1);
    let corner = area.layout().road_south_east(id(0, 0));
    assert_eq!(
        h.terrain.removed_roads().iter().filter(|r| **r == corner).count(),
        1
    );
    assert_symmetric(&area, PlotId::selection(id(0, 0), id(1, 1)));
}

#[test]
fn unlink_rebuilds_roads_and_clears_homes() {
    let h = Harness::new(config());
    square(&h);
    let area = h.area();
    let mut base = area.plot(id(0, 0));
    base.settings.ratings.insert(bob(), 8);
    base.settings.home = Some(BlockLoc::new(1, 1));
    area.insert(base);

    assert!(h.manager.unlink(WORLD, id(1, 1), true).unwrap());
    for p in PlotId::selection(id(0, 0), id(1, 1)) {
        let plot = area.plot(p);
        assert!(!plot.is_merged());
        assert!(plot.settings.home.is_none());
        assert_eq!(area.component(p).unwrap().len(), 1);
    }
    let created = h
        .terrain
        .count(|c| matches!(c, TerrainCall::CreateRoad(_)));
    assert_eq!(created, 5);
    assert_eq!(
        h.terrain.count(|c| matches!(c, TerrainCall::FinishUnlink(_))),
        1
    );
    assert!(!h.manager.unlink(WORLD, id(0, 0), true).unwrap());
}

#[test]
fn unlink_clears_ratings_of_the_base_plot() {
    let h = Harness::new(config());
    square(&h);
    let area = h.area();
    let mut plot = area.plot(id(1, 1));
    plot.settings.ratings.insert(bob(), 3);
    area.insert(plot);

    h.manager.unlink(WORLD, id(1, 1), false).unwrap();
    assert!(area.plot(id(1, 1)).settings.ratings.is_empty());
    assert_eq!(h.terrain.count(|c| matches!(c, TerrainCall::CreateRoad(_))), 0);
}

// ---------------------------------------------------------------------------
// Clear, delete and biome
// ---------------------------------------------------------------------------

#[test]
fn clear_regenerates_members_and_blocks_while_running() {
    let mut h = Harness::new(config());
    let ids = square(&h);
    let area = h.area();
    let pre_unlink = area.regions(id(0, 0)).unwrap().to_vec();

    let (done, on_done) = counter();
    h.manager.clear(WORLD, id(0, 0), on_done).unwrap();
    for p in ids {
        assert!(area.is_running(p));
    }
    let (_, again) = counter();
    assert_eq!(
        h.manager.clear(WORLD, id(1, 1), again).unwrap_err(),
        PlotError::OperationRunning(id(1, 1))
    );
    assert!(matches!(
        h.manager.auto_merge(WORLD, &AutoMergeRequest::new(id(0, 0), alice())),
        Err(PlotError::OperationRunning(_))
    ));

    h.run_until_idle();
    assert_eq!(done.load(Ordering::SeqCst), 1);
    for p in ids {
        assert!(!area.is_running(p));
        assert!(area.plot(p).has_owner());
        assert!(!area.plot(p).is_merged());
    }

    let calls = h.terrain.calls();
    let regenerated: i64 = calls
        .iter()
        .filter_map(|c| match c {
            TerrainCall::Regenerate(s) => Some(s.region.area()),
            _ => None,
        })
        .sum();
    let plot_area = area.layout().plot_region(id(0, 0)).area();
    assert_eq!(regenerated, 4 * plot_area);
    let cleared: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            TerrainCall::ClearEntities(r) => Some(*r),
            _ => None,
        })
        .collect();
    assert_eq!(cleared, pre_unlink);
    assert_eq!(
        h.terrain.count(|c| matches!(c, TerrainCall::ResetPlot(_, true))),
        4
    );
}

#[test]
fn delete_releases_every_member() {
    let mut h = Harness::new(config());
    let ids = square(&h);
    let (done, on_done) = counter();
    h.manager.delete(WORLD, id(1, 0), on_done).unwrap();
    h.run_until_idle();

    assert_eq!(done.load(Ordering::SeqCst), 1);
    let area = h.area();
    assert_eq!(area.plot_count(), 0);
    for p in ids {
        assert_eq!(area.plot(p), Plot::new(p));
    }
    assert_eq!(
        h.terrain.count(|c| matches!(c, TerrainCall::ResetPlot(_, false))),
        4
    );
}

#[test]
fn delete_invalidates_the_cache_once() {
    let mut h = Harness::new(config());
    square(&h);
    let area = h.area();
    area.component(id(0, 0)).unwrap();
    let before = area.generation();

    let (_, on_done) = counter();
    h.manager.delete(WORLD, id(0, 0), on_done).unwrap();
    assert_eq!(area.generation(), before + 1);

    h.run_until_idle();
    assert_eq!(area.generation(), before + 1);
}

#[test]
fn unclaim_of_a_merged_plot_invalidates_once() {
    let h = Harness::new(config());
    square(&h);
    let area = h.area();
    area.component(id(0, 0)).unwrap();
    let before = area.generation();

    assert!(h.manager.unclaim(WORLD, id(1, 1)).unwrap());
    assert_eq!(area.generation(), before + 1);
}

#[test]
fn biome_repaint_refreshes_chunks_afterwards() {
    let mut h = Harness::new(config());
    square(&h);
    let (done, on_done) = counter();
    h.manager.set_biome(WORLD, id(0, 0), "desert", on_done).unwrap();
    h.run_until_idle();

    assert_eq!(done.load(Ordering::SeqCst), 1);
    let calls = h.terrain.calls();
    let last_paint = calls
        .iter()
        .rposition(|c| matches!(c, TerrainCall::SetBiome(_, b) if b == "desert"))
        .unwrap();
    let refresh = calls
        .iter()
        .position(|c| matches!(c, TerrainCall::Refresh(_)))
        .unwrap();
    assert!(refresh > last_paint);
}

#[test]
fn entity_counts_sum_over_regions() {
    let terrain = RecordingTerrain {
        per_region: EntityCounts {
            entity: 3,
            animal: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let h = Harness::with_terrain(config(), terrain);
    for p in [id(0, 0), id(0, 1), id(1, 1)] {
        h.manager.claim(WORLD, p, alice()).unwrap();
    }
    h.manager.merge_selection(WORLD, id(0, 0), id(0, 1), true).unwrap();
    h.manager.merge_selection(WORLD, id(0, 1), id(1, 1), true).unwrap();

    let regions = h.area().regions(id(0, 0)).unwrap().len();
    let counts = h.manager.count_entities(WORLD, id(1, 1)).unwrap();
    assert_eq!(counts.entity, 3 * regions);
    assert_eq!(counts.animal, regions);
    assert_eq!(counts.monster, 0);
}

// ---------------------------------------------------------------------------
// Relocation
// ---------------------------------------------------------------------------

#[test]
fn swap_moves_and_exchanges_records() {
    let h = Harness::new(config());
    h.manager.claim(WORLD, id(0, 0), alice()).unwrap();
    h.manager.claim(WORLD, id(5, 5), bob()).unwrap();
    let area = h.area();

    assert!(h.manager.swap(WORLD, id(0, 0), id(5, 5)).unwrap());
    assert!(area.plot(id(0, 0)).is_owner(bob()));
    assert!(area.plot(id(5, 5)).is_owner(alice()));

    assert!(h.manager.swap(WORLD, id(5, 5), id(9, 9)).unwrap());
    assert!(!area.plot(id(5, 5)).has_owner());
    assert!(area.plot(id(9, 9)).is_owner(alice()));
    assert_eq!(area.plot(id(9, 9)).id, id(9, 9));
    assert_eq!(h.storage.swaps.lock().unwrap().len(), 2);

    assert!(!h.manager.swap(WORLD, id(20, 20), id(21, 21)).unwrap());
}

#[test]
fn merged_plots_cannot_be_swapped() {
    let h = Harness::new(config());
    square(&h);
    assert_eq!(
        h.manager.swap(WORLD, id(0, 0), id(7, 7)).unwrap_err(),
        PlotError::Merged(id(0, 0))
    );
}
