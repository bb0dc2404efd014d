//! Identity-facing plot actions: the permission and economy checks around the
//! engine's operations, plus event publication.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use plotgrid_engine::backend::{ClaimPolicy, Economy};
use plotgrid_engine::merge::AutoMergeRequest;
use plotgrid_engine::world::plot::Plot;
use plotgrid_engine::world::position::{MergeDirection, PlotId};
use plotgrid_engine::{PlotError, PlotManager};

use crate::event_bus::PlotEvent;
use crate::metrics::Metrics;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} does not own plot {1}")]
    NotOwner(Uuid, PlotId),
    #[error("{0} may not claim plot {1}")]
    ClaimRefused(Uuid, PlotId),
    #[error("costs {price:.2} but only {balance:.2} is available")]
    InsufficientFunds { price: f64, balance: f64 },
    #[error("component already has {size} plots, limit is {limit}")]
    MergeLimit { size: usize, limit: usize },
    #[error(transparent)]
    Plot(#[from] PlotError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prices {
    pub claim: f64,
    pub merge: f64,
}

pub struct Actions {
    manager: Arc<PlotManager>,
    policy: Arc<dyn ClaimPolicy>,
    economy: Arc<dyn Economy>,
    events: broadcast::Sender<PlotEvent>,
    metrics: Arc<Metrics>,
    prices: Prices,
}

impl Actions {
    pub fn new(
        manager: Arc<PlotManager>,
        policy: Arc<dyn ClaimPolicy>,
        economy: Arc<dyn Economy>,
        events: broadcast::Sender<PlotEvent>,
        metrics: Arc<Metrics>,
        prices: Prices,
    ) -> Self {
        Self {
            manager,
            policy,
            economy,
            events,
            metrics,
            prices,
        }
    }

    pub fn manager(&self) -> &Arc<PlotManager> {
        &self.manager
    }

    fn publish(&self, event: PlotEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn check_funds(&self, actor: Uuid, price: f64) -> Result<(), ActionError> {
        if price <= 0.0 {
            return Ok(());
        }
        let balance = self.economy.balance(actor);
        if balance < price {
            return Err(ActionError::InsufficientFunds { price, balance });
        }
        Ok(())
    }

    fn charge(&self, actor: Uuid, price: f64) {
        if price > 0.0 && !self.economy.withdraw(actor, price) {
            tracing::warn!("{} could not be charged {:.2}", actor, price);
        }
    }

    fn owned_by(&self, actor: Uuid, world: &str, id: PlotId) -> Result<Plot, ActionError> {
        let plot = self.manager.area(world)?.plot(id);
        if !plot.is_owner(actor) {
            return Err(ActionError::NotOwner(actor, id));
        }
        Ok(plot)
    }

    // ── Ownership ───────────────────────────────────────────────────────

    pub fn claim(&self, actor: Uuid, world: &str, id: PlotId) -> Result<Plot, ActionError> {
        if !self.policy.can_claim(actor, world, id) {
            return Err(ActionError::ClaimRefused(actor, id));
        }
        self.check_funds(actor, self.prices.claim)?;
        let plot = self.manager.claim(world, id, actor)?;
        self.charge(actor, self.prices.claim);
        self.metrics.record_claim();
        self.publish(PlotEvent::Claimed {
            world: world.into(),
            id,
            owner: actor,
        });
        Ok(plot)
    }

    // ── Topology ────────────────────────────────────────────────────────

    /// Grow the actor's component around `id` towards `direction`, never past
    /// the policy's merge limit. The merge price is charged only if something
    /// was merged.
    pub fn merge(
        &self,
        actor: Uuid,
        world: &str,
        id: PlotId,
        direction: MergeDirection,
    ) -> Result<bool, ActionError> {
        self.owned_by(actor, world, id)?;
        let area = self.manager.area(world)?;
        let size = area.component(id)?.len();
        let limit = self.policy.merge_limit(actor);
        if size >= limit {
            return Err(ActionError::MergeLimit { size, limit });
        }
        self.check_funds(actor, self.prices.merge)?;

        let request = AutoMergeRequest::new(id, actor)
            .direction(direction)
            .max_merges(limit - size)
            .remove_roads(area.config().merge_removes_roads);
        if !self.manager.auto_merge(world, &request)? {
            return Ok(false);
        }
        self.charge(actor, self.prices.merge);
        self.metrics.record_merge();
        self.publish(PlotEvent::Merged {
            world: world.into(),
            id,
            plots: area.component(id)?.len(),
        });
        Ok(true)
    }

    pub fn unlink(&self, actor: Uuid, world: &str, id: PlotId) -> Result<bool, ActionError> {
        self.owned_by(actor, world, id)?;
        let unlinked = self.manager.unlink(world, id, true)?;
        if unlinked {
            self.publish(PlotEvent::Unlinked {
                world: world.into(),
                id,
            });
        }
        Ok(unlinked)
    }

    // ── Terrain work ────────────────────────────────────────────────────

    /// Start clearing the actor's component. The `Cleared` event fires once
    /// the terrain work has finished on a later scheduler turn.
    pub fn clear(&self, actor: Uuid, world: &str, id: PlotId) -> Result<(), ActionError> {
        self.owned_by(actor, world, id)?;
        let on_done = self.completion(PlotEvent::Cleared {
            world: world.into(),
            id,
        });
        self.manager.clear(world, id, on_done)?;
        Ok(())
    }

    /// Release and clear the actor's component.
    pub fn delete(&self, actor: Uuid, world: &str, id: PlotId) -> Result<(), ActionError> {
        self.owned_by(actor, world, id)?;
        let on_done = self.completion(PlotEvent::Deleted {
            world: world.into(),
            id,
        });
        self.manager.delete(world, id, on_done)?;
        Ok(())
    }

    fn completion(&self, event: PlotEvent) -> impl FnOnce() + Send + 'static {
        let events = self.events.clone();
        let metrics = Arc::clone(&self.metrics);
        move || {
            metrics.record_clear();
            let _ = events.send(event);
        }
    }
}
