use dashmap::DashMap;
use uuid::Uuid;

use plotgrid_engine::backend::Economy;

/// In-memory balances. Identities start with `starting_balance` the first time
/// they are seen.
pub struct LedgerEconomy {
    balances: DashMap<Uuid, f64>,
    starting_balance: f64,
}

impl LedgerEconomy {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balances: DashMap::new(),
            starting_balance,
        }
    }
}

impl Economy for LedgerEconomy {
    fn balance(&self, identity: Uuid) -> f64 {
        self.balances
            .get(&identity)
            .map_or(self.starting_balance, |b| *b)
    }

    fn withdraw(&self, identity: Uuid, amount: f64) -> bool {
        let mut balance = self
            .balances
            .entry(identity)
            .or_insert(self.starting_balance);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        tracing::debug!("withdrew {:.2} from {}, {:.2} left", amount, identity, *balance);
        true
    }

    fn deposit(&self, identity: Uuid, amount: f64) {
        *self
            .balances
            .entry(identity)
            .or_insert(self.starting_balance) += amount;
    }
}
