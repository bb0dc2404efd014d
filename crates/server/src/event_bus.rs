//! Plot event bus.
//!
//! Every successful plot action publishes a [`PlotEvent`] to a shared
//! `tokio::sync::broadcast` channel. Listeners (logging, future front ends)
//! subscribe independently; a send with no subscribers is not an error.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use plotgrid_engine::world::position::PlotId;

/// Recommended capacity for the broadcast channel.
pub const BUS_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub enum PlotEvent {
    Claimed {
        world: Arc<str>,
        id: PlotId,
        owner: Uuid,
    },
    /// `plots` is the size of the merged component afterwards.
    Merged {
        world: Arc<str>,
        id: PlotId,
        plots: usize,
    },
    Unlinked {
        world: Arc<str>,
        id: PlotId,
    },
    /// Terrain reset finished.
    Cleared {
        world: Arc<str>,
        id: PlotId,
    },
    Deleted {
        world: Arc<str>,
        id: PlotId,
    },
}

impl PlotEvent {
    pub fn world(&self) -> &str {
        match self {
            PlotEvent::Claimed { world, .. }
            | PlotEvent::Merged { world, .. }
            | PlotEvent::Unlinked { world, .. }
            | PlotEvent::Cleared { world, .. }
            | PlotEvent::Deleted { world, .. } => world,
        }
    }
}

pub fn channel() -> broadcast::Sender<PlotEvent> {
    let (tx, _) = broadcast::channel(BUS_CAPACITY);
    tx
}

/// Log every event until the bus closes.
pub async fn log_events(mut rx: broadcast::Receiver<PlotEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::info!("plot event in {}: {:?}", event.world(), event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("event logger lagged, {} events dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
