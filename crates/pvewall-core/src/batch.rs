// ── Batch loader ──
//
// Fans loads out across many scopes at once. A batch never fails: every
// scope gets an entry, and a scope whose fetch failed gets the empty
// stand-in list.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::authority::RuleAuthority;
use crate::model::{GuestFirewall, GuestInfo, RuleSet, ScopeId};
use crate::store::ScopedRuleStore;

/// Guests loaded concurrently per wave.
pub const MAX_GUEST_BATCH: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct BatchLoader {
    guest_batch: usize,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self {
            guest_batch: MAX_GUEST_BATCH,
        }
    }
}

impl BatchLoader {
    pub fn with_guest_batch(guest_batch: usize) -> Self {
        Self {
            guest_batch: guest_batch.max(1),
        }
    }

    /// Load every store concurrently and collect the results by scope.
    pub async fn load_all<A: RuleAuthority>(
        &self,
        stores: &[Arc<ScopedRuleStore<A>>],
    ) -> BTreeMap<ScopeId, Arc<RuleSet>> {
        debug!(count = stores.len(), "batch loading scopes");
        let futs = stores
            .iter()
            .map(|store| async move { (store.scope().clone(), store.load().await) });
        join_all(futs).await.into_iter().collect()
    }

    /// Load rules, options and NIC attachment for each guest.
    ///
    /// The three fetches per guest run concurrently and fall back on their
    /// own: empty rules, no options, firewall not attached. Guests are
    /// processed in waves of at most `guest_batch`.
    pub async fn load_guests<A: RuleAuthority>(
        &self,
        authority: &A,
        guests: &[(GuestInfo, Arc<ScopedRuleStore<A>>)],
    ) -> BTreeMap<ScopeId, GuestFirewall> {
        let mut results = BTreeMap::new();
        for wave in guests.chunks(self.guest_batch) {
            debug!(count = wave.len(), "loading guest wave");
            let futs = wave
                .iter()
                .map(|(guest, store)| load_guest(authority, guest, store));
            for entry in join_all(futs).await {
                results.insert(entry.scope.clone(), entry);
            }
        }
        results
    }
}

async fn load_guest<A: RuleAuthority>(
    authority: &A,
    guest: &GuestInfo,
    store: &ScopedRuleStore<A>,
) -> GuestFirewall {
    let scope = guest.scope();
    let (rules, options_res, nic_res) = tokio::join!(
        store.load(),
        authority.get_options(&scope),
        authority.nic_firewall(&guest.node, guest.guest_type, guest.vmid),
    );

    let options = match options_res {
        Ok(options) => Some(options),
        Err(e) => {
            warn!(%scope, error = %e, "guest options fetch failed");
            None
        }
    };
    let firewall_enabled = nic_res.unwrap_or_else(|e| {
        warn!(%scope, error = %e, "guest NIC config fetch failed");
        false
    });

    GuestFirewall {
        scope,
        rules,
        options,
        firewall_enabled,
    }
}
