use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use plotgrid_engine::PlotManager;
use plotgrid_engine::task::TaskScheduler;
use plotgrid_engine::world::position::{MergeDirection, PlotId};
use plotgrid_server::actions::{Actions, Prices};
use plotgrid_server::cli::CliArgs;
use plotgrid_server::config::ServerConfig;
use plotgrid_server::economy::LedgerEconomy;
use plotgrid_server::event_bus;
use plotgrid_server::host;
use plotgrid_server::logging;
use plotgrid_server::metrics::Metrics;
use plotgrid_server::persistence::JsonStore;
use plotgrid_server::policy::LimitPolicy;
use plotgrid_server::terrain::{EntityKind, SurfaceTerrain};

/// Scheduler turns granted to pending work on shutdown.
const SHUTDOWN_TICKS: u64 = 2_000;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config_path = args.config_path();
    let mut config = ServerConfig::load_or_create(&config_path)?;
    config.apply_cli_overrides(&args);
    logging::init(&config.log_level);

    tracing::info!("plotgrid host, config {}", config_path.display());

    // ── Engine and collaborators ─────────────────────────────────────────
    let store = Arc::new(JsonStore::open(&config.data_dir)?);
    let terrain = Arc::new(SurfaceTerrain::new());
    let mut scheduler = TaskScheduler::new();
    let manager = Arc::new(
        PlotManager::new(
            Arc::clone(&store) as _,
            Arc::clone(&terrain) as _,
            scheduler.spawner(),
        )
        .with_task_budget(config.task_budget()),
    );

    let metrics = Arc::new(Metrics::new());
    let events = event_bus::channel();
    tokio::spawn(event_bus::log_events(events.subscribe()));

    let actions = Actions::new(
        Arc::clone(&manager),
        Arc::new(LimitPolicy::new(config.limits.clone(), Arc::downgrade(&manager))),
        Arc::new(LedgerEconomy::new(config.economy.starting_balance)),
        events.clone(),
        Arc::clone(&metrics),
        Prices {
            claim: config.economy.claim_price,
            merge: config.economy.merge_price,
        },
    );

    if args.demo {
        run_demo(&config, &actions, &terrain, &mut scheduler, &metrics)?;
        // Let the event logger catch up before the runtime goes away.
        tokio::time::sleep(Duration::from_millis(50)).await;
        return Ok(());
    }

    for world in &config.worlds {
        let area_config = world
            .area_config()
            .with_context(|| format!("invalid geometry for world {}", world.name))?;
        terrain.add_world(&world.name, area_config.layout);
        let area = manager
            .load_area(&world.name, area_config)
            .map_err(|e| anyhow::anyhow!("loading world {}: {}", world.name, e))?;
        if let Some(border) = manager.border(area.name()) {
            tracing::info!("world border of {} at {}", area.name(), border);
        }
    }

    // ── Periodic autosave ────────────────────────────────────────────────
    let save_store = Arc::clone(&store);
    let autosave = Duration::from_secs(config.autosave_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(autosave);
        interval.tick().await; // first tick is immediate, skip it
        loop {
            interval.tick().await;
            if let Err(e) = save_store.flush() {
                tracing::error!("Autosave failed: {:#}", e);
            }
        }
    });

    // ── Periodic stats ───────────────────────────────────────────────────
    if config.stats_secs > 0 {
        let stats_metrics = Arc::clone(&metrics);
        let stats_manager = Arc::clone(&manager);
        let period = Duration::from_secs(config.stats_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let owned: usize = stats_manager.areas().iter().map(|a| a.plot_count()).sum();
                let snapshot = stats_metrics.snapshot(owned as u64);
                match serde_json::to_string(&snapshot) {
                    Ok(json) => tracing::info!("stats {}", json),
                    Err(e) => tracing::warn!("could not serialize stats: {}", e),
                }
            }
        });
    }

    // ── Tick host with graceful shutdown ─────────────────────────────────
    tracing::info!(
        "Ticking every {:?} with a {:?} task budget",
        config.tick_interval(),
        config.task_budget()
    );
    tokio::select! {
        _ = host::run(&mut scheduler, config.tick_interval(), Arc::clone(&metrics)) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
    }

    // ── Save on shutdown ─────────────────────────────────────────────────
    host::drain(&mut scheduler, SHUTDOWN_TICKS, &metrics);
    match store.flush() {
        Ok(n) => tracing::info!("Shutdown save complete: {} worlds written", n),
        Err(e) => tracing::error!("Shutdown save failed: {:#}", e),
    }
    Ok(())
}

/// Claim a 2x3 block of plots in a scratch world, merge it, count and clear
/// it. Nothing is flushed to disk.
fn run_demo(
    config: &ServerConfig,
    actions: &Actions,
    terrain: &SurfaceTerrain,
    scheduler: &mut TaskScheduler,
    metrics: &Metrics,
) -> Result<()> {
    const DEMO_WORLD: &str = "demo";

    let template = config.worlds.first().cloned().unwrap_or_default();
    let area_config = template
        .area_config()
        .with_context(|| format!("invalid geometry for world {}", template.name))?;
    terrain.add_world(DEMO_WORLD, area_config.layout);
    let area = actions.manager().add_area(DEMO_WORLD, area_config);

    tracing::info!("plotgrid demo ({} blocks per plot)", area_config.layout.plot_width());

    let owner = Uuid::from_u128(0xDE30);
    let seed = PlotId::new(0, 0);
    for id in PlotId::selection(seed, PlotId::new(1, 2)) {
        actions.claim(owner, DEMO_WORLD, id)?;
    }
    host::drain(scheduler, SHUTDOWN_TICKS, metrics);

    let merged = actions.merge(owner, DEMO_WORLD, seed, MergeDirection::All)?;
    let regions = area.regions(seed)?;
    tracing::info!(
        "merge {}: {} plots covered by {} regions",
        if merged { "succeeded" } else { "did nothing" },
        area.component(seed)?.len(),
        regions.len()
    );
    for region in regions.iter() {
        tracing::info!(
            "  region ({}, {}) .. ({}, {}), {} columns",
            region.min_x,
            region.min_z,
            region.max_x,
            region.max_z,
            region.area()
        );
    }

    let (bot, top) = area.corners(seed)?;
    terrain.spawn_entity(DEMO_WORLD, EntityKind::Animal, bot.x + 1, bot.z + 1);
    terrain.spawn_entity(DEMO_WORLD, EntityKind::Monster, top.x - 1, top.z - 1);
    let counts = actions.manager().count_entities(DEMO_WORLD, seed)?;
    tracing::info!("entities before clear: {:?}", counts);

    actions.clear(owner, DEMO_WORLD, seed)?;
    let idle = host::drain(scheduler, SHUTDOWN_TICKS, metrics);
    tracing::info!(
        "clear {}, {} entities left",
        if idle { "finished" } else { "still running" },
        terrain.entities(DEMO_WORLD).len()
    );

    let snapshot = metrics.snapshot(area.plot_count() as u64);
    tracing::info!("stats {}", serde_json::to_string(&snapshot)?);
    Ok(())
}
