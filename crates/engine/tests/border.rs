//! World-border tracking driven by claims.

mod common;

use std::sync::Arc;

use common::*;
use plotgrid_engine::PlotManager;
use plotgrid_engine::task::TaskScheduler;
use plotgrid_engine::world::AreaConfig;
use plotgrid_engine::world::border::{BORDER_MARGIN, WorldBorderTracker};
use plotgrid_engine::world::plot::Plot;

fn bordered() -> AreaConfig {
    AreaConfig {
        world_border: true,
        ..AreaConfig::new(small_layout())
    }
}

#[test]
fn border_grows_with_distant_claims_only() {
    let h = Harness::new(bordered());
    assert_eq!(h.manager.border(WORLD), Some(BORDER_MARGIN));

    let mut last = 0;
    for p in [id(0, 0), id(1, 1), id(3, 0)] {
        h.manager.claim(WORLD, p, alice()).unwrap();
        let border = h.manager.border(WORLD).unwrap();
        assert!(border > last, "{} did not grow the border", p);
        last = border;
    }
    assert_eq!(last, 22 + BORDER_MARGIN);

    h.manager.claim(WORLD, id(-2, 0), alice()).unwrap();
    assert_eq!(h.manager.border(WORLD), Some(last));
}

#[test]
fn negative_coordinates_count_by_magnitude() {
    let h = Harness::new(bordered());
    h.manager.claim(WORLD, id(0, -5), alice()).unwrap();
    // Plot (0, -5) starts at z = -29.
    assert_eq!(h.manager.border(WORLD), Some(29 + BORDER_MARGIN));
}

#[test]
fn untracked_worlds_are_unbounded() {
    let h = Harness::new(AreaConfig::new(small_layout()));
    h.manager.claim(WORLD, id(9, 9), alice()).unwrap();
    assert_eq!(h.manager.border(WORLD), None);
    assert_eq!(h.manager.border("elsewhere"), None);
}

#[test]
fn unowned_plots_do_not_move_the_border() {
    let h = Harness::new(bordered());
    let area = h.area();
    h.manager.borders().update(&area, &Plot::new(id(50, 50)));
    assert_eq!(h.manager.border(WORLD), Some(BORDER_MARGIN));
}

#[test]
fn reset_drops_back_to_the_margin() {
    let tracker = WorldBorderTracker::new();
    tracker.enable(WORLD);
    tracker.raise(WORLD, 300);
    assert_eq!(tracker.border(WORLD), Some(300 + BORDER_MARGIN));
    tracker.raise(WORLD, 10);
    assert_eq!(tracker.border(WORLD), Some(300 + BORDER_MARGIN));
    tracker.reset(WORLD);
    assert_eq!(tracker.border(WORLD), Some(BORDER_MARGIN));
}

#[test]
fn loading_seeds_the_border_from_stored_claims() {
    let storage = Arc::new(RecordingStorage::default());
    *storage.preload.lock().unwrap() = vec![
        Plot::claimed(id(0, 0), alice()),
        Plot::claimed(id(-4, 2), bob()),
        Plot::new(id(40, 40)),
    ];
    let scheduler = TaskScheduler::new();
    let manager = PlotManager::new(
        storage,
        Arc::new(RecordingTerrain::default()),
        scheduler.spawner(),
    );
    let area = manager.load_area(WORLD, bordered()).unwrap();
    assert_eq!(area.plot_count(), 2);
    // Plot (-4, 2) reaches x = -23.
    assert_eq!(manager.border(WORLD), Some(23 + BORDER_MARGIN));
}
