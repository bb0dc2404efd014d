use std::sync::Weak;

use uuid::Uuid;

use plotgrid_engine::PlotManager;
use plotgrid_engine::backend::ClaimPolicy;
use plotgrid_engine::world::position::PlotId;

use crate::config::LimitConfig;

/// Flat per-identity limits: a cap on owned plots across every world and a
/// cap on the size of one merged component.
///
/// Holds the manager weakly since the manager's owner also owns the policy.
pub struct LimitPolicy {
    limits: LimitConfig,
    manager: Weak<PlotManager>,
}

impl LimitPolicy {
    pub fn new(limits: LimitConfig, manager: Weak<PlotManager>) -> Self {
        Self { limits, manager }
    }

    /// Plots `identity` owns across all loaded worlds.
    pub fn owned_by(&self, identity: Uuid) -> usize {
        let Some(manager) = self.manager.upgrade() else {
            return 0;
        };
        manager
            .areas()
            .iter()
            .map(|area| {
                area.owned_plots()
                    .iter()
                    .filter(|p| p.is_owner(identity))
                    .count()
            })
            .sum()
    }
}

impl ClaimPolicy for LimitPolicy {
    fn can_claim(&self, identity: Uuid, world: &str, id: PlotId) -> bool {
        let owned = self.owned_by(identity);
        if owned >= self.limits.max_plots {
            tracing::debug!(
                "{} may not claim {} in {}: owns {} of {} plots",
                identity,
                id,
                world,
                owned,
                self.limits.max_plots
            );
            return false;
        }
        true
    }

    fn merge_limit(&self, _identity: Uuid) -> usize {
        self.limits.max_merge_size
    }
}
