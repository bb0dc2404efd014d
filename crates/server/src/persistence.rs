//! Plot record persistence as one JSON document per world.
//!
//! Records live in memory and are written back to `plots/<world>.json` on
//! [`JsonStore::flush`]. Only worlds touched since the last flush are
//! rewritten, each through a temporary file and a rename so a crash never
//! leaves a half-written document behind.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plotgrid_engine::backend::{BackendError, PlotStorage};
use plotgrid_engine::world::plot::{MergeFlags, Plot, PlotField, PlotSettings};
use plotgrid_engine::world::position::{BlockLoc, PlotId};

/// Bumped whenever the record layout changes incompatibly.
const FORMAT_VERSION: u32 = 1;

// ── On-disk records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PlotRecord {
    x: i32,
    y: i32,
    owner: Uuid,
    /// North, east, south, west.
    #[serde(default)]
    merged: [bool; 4],
    #[serde(default, skip_serializing_if = "String::is_empty")]
    alias: String,
    #[serde(default)]
    flags: IndexMap<String, String>,
    #[serde(default)]
    trusted: Vec<Uuid>,
    #[serde(default)]
    members: Vec<Uuid>,
    #[serde(default)]
    denied: Vec<Uuid>,
    #[serde(default)]
    ratings: BTreeMap<Uuid, u8>,
    #[serde(default)]
    home: Option<(i64, i64)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WorldFile {
    version: u32,
    plots: Vec<PlotRecord>,
}

fn sorted(set: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = set.iter().copied().collect();
    ids.sort();
    ids
}

impl PlotRecord {
    /// `None` for unowned plots, which are never stored.
    fn from_plot(plot: &Plot) -> Option<Self> {
        let owner = plot.owner?;
        let settings = &plot.settings;
        Some(Self {
            x: plot.id.x,
            y: plot.id.y,
            owner,
            merged: plot.merged.to_array(),
            alias: settings.alias.clone(),
            flags: (*settings.flags).clone(),
            trusted: sorted(&settings.trusted),
            members: sorted(&settings.members),
            denied: sorted(&settings.denied),
            ratings: settings.ratings.iter().map(|(k, v)| (*k, *v)).collect(),
            home: settings.home.map(|h| (h.x, h.z)),
        })
    }

    fn into_plot(self) -> Plot {
        Plot {
            id: PlotId::new(self.x, self.y),
            owner: Some(self.owner),
            merged: MergeFlags::from_array(self.merged),
            running: 0,
            settings: PlotSettings {
                alias: self.alias,
                flags: Arc::new(self.flags),
                trusted: self.trusted.into_iter().collect(),
                members: self.members.into_iter().collect(),
                denied: self.denied.into_iter().collect(),
                ratings: self.ratings.into_iter().collect(),
                home: self.home.map(|(x, z)| BlockLoc::new(x, z)),
            },
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────────────

type WorldRecords = BTreeMap<PlotId, PlotRecord>;

/// [`PlotStorage`] backed by `<dir>/plots/<world>.json`.
///
/// Uses `std::sync` locks: every operation is brief and nothing awaits while
/// a lock is held.
pub struct JsonStore {
    dir: PathBuf,
    worlds: RwLock<HashMap<String, WorldRecords>>,
    dirty: Mutex<HashSet<String>>,
}

impl JsonStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("plots");
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating plot directory {}", dir.display()))?;
        Ok(Self {
            dir,
            worlds: RwLock::new(HashMap::new()),
            dirty: Mutex::new(HashSet::new()),
        })
    }

    fn world_path(&self, world: &str) -> PathBuf {
        self.dir.join(format!("{}.json", world))
    }

    fn read_world(&self, world: &str) -> Result<WorldRecords> {
        let path = self.world_path(world);
        if !path.exists() {
            return Ok(WorldRecords::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let file: WorldFile =
            serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        if file.version != FORMAT_VERSION {
            anyhow::bail!(
                "{} has format version {}, expected {}",
                path.display(),
                file.version,
                FORMAT_VERSION
            );
        }
        Ok(file
            .plots
            .into_iter()
            .map(|r| (PlotId::new(r.x, r.y), r))
            .collect())
    }

    /// Run `f` on the in-memory records of `world`, reading them from disk
    /// first if this world has not been touched yet, and mark it dirty.
    fn edit<R>(&self, world: &str, f: impl FnOnce(&mut WorldRecords) -> R) -> Result<R> {
        let mut worlds = self.worlds.write().expect("plot store poisoned");
        if !worlds.contains_key(world) {
            let records = self.read_world(world)?;
            worlds.insert(world.to_string(), records);
        }
        let records = worlds.entry(world.to_string()).or_default();
        let result = f(records);
        self.dirty
            .lock()
            .expect("plot store poisoned")
            .insert(world.to_string());
        Ok(result)
    }

    /// Worlds with unsaved changes.
    pub fn dirty_count(&self) -> usize {
        self.dirty.lock().expect("plot store poisoned").len()
    }

    /// Number of stored (owned) plots in `world`, as currently held in memory.
    pub fn record_count(&self, world: &str) -> usize {
        self.worlds
            .read()
            .expect("plot store poisoned")
            .get(world)
            .map_or(0, |r| r.len())
    }

    /// Write every dirty world. Returns how many files were written.
    pub fn flush(&self) -> Result<usize> {
        let dirty: Vec<String> = self
            .dirty
            .lock()
            .expect("plot store poisoned")
            .drain()
            .collect();
        if dirty.is_empty() {
            tracing::debug!("Plot save: nothing to save");
            return Ok(0);
        }

        let start = Instant::now();
        let mut written = 0usize;
        let mut plots = 0usize;
        for world in &dirty {
            let file = {
                let worlds = self.worlds.read().expect("plot store poisoned");
                let Some(records) = worlds.get(world) else {
                    continue;
                };
                WorldFile {
                    version: FORMAT_VERSION,
                    plots: records.values().cloned().collect(),
                }
            };
            plots += file.plots.len();
            if let Err(e) = self.write_world(world, &file) {
                // Keep the world dirty so the next flush retries it.
                self.dirty
                    .lock()
                    .expect("plot store poisoned")
                    .insert(world.clone());
                return Err(e);
            }
            written += 1;
        }

        tracing::info!(
            "Plots saved: {} worlds, {} records ({:.2?})",
            written,
            plots,
            start.elapsed()
        );
        Ok(written)
    }

    fn write_world(&self, world: &str, file: &WorldFile) -> Result<()> {
        let path = self.world_path(world);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(file)
            .with_context(|| format!("serializing plots of {}", world))?;
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("replacing {} with {}", path.display(), tmp.display()))?;
        Ok(())
    }
}

impl PlotStorage for JsonStore {
    fn load(&self, world: &str) -> Result<Vec<Plot>, BackendError> {
        let records = self.read_world(world)?;
        let plots = records.values().cloned().map(PlotRecord::into_plot).collect();
        self.worlds
            .write()
            .expect("plot store poisoned")
            .insert(world.to_string(), records);
        Ok(plots)
    }

    /// Records are stored whole, so every field write replaces the record.
    /// Saving an unowned plot removes it.
    fn save(&self, world: &str, plot: &Plot, field: PlotField) -> Result<(), BackendError> {
        tracing::trace!("saving {:?} of plot {} in {}", field, plot.id, world);
        let record = PlotRecord::from_plot(plot);
        self.edit(world, |records| match record {
            Some(record) => {
                records.insert(plot.id, record);
            }
            None => {
                records.remove(&plot.id);
            }
        })?;
        Ok(())
    }

    fn swap(&self, world: &str, a: PlotId, b: PlotId) -> Result<(), BackendError> {
        self.edit(world, |records| {
            let first = records.remove(&a);
            let second = records.remove(&b);
            if let Some(mut record) = second {
                (record.x, record.y) = (a.x, a.y);
                records.insert(a, record);
            }
            if let Some(mut record) = first {
                (record.x, record.y) = (b.x, b.y);
                records.insert(b, record);
            }
        })?;
        Ok(())
    }
}
