// ── Scoped rule store ──
//
// Holds the rule list of one scope. Every mutation goes to the remote and
// is followed by a full reload; the store never reorders or splices rules
// itself. Snapshots are published whole through a `watch` channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::authority::RuleAuthority;
use crate::error::CoreError;
use crate::model::{RuleInput, RuleSet, ScopeId};
use crate::stream::RuleSetStream;
use crate::validate::validate_rule_input;

/// Published state of a store.
#[derive(Debug, Clone, Default)]
pub enum RuleSetState {
    /// Never loaded.
    #[default]
    Idle,
    /// First load in flight; nothing to show yet.
    Loading,
    /// Last completed load (possibly the empty stand-in for a failure).
    Ready(Arc<RuleSet>),
    /// A reload is in flight; the previous list is still shown.
    Stale(Arc<RuleSet>),
}

impl RuleSetState {
    pub fn rule_set(&self) -> Option<&Arc<RuleSet>> {
        match self {
            Self::Ready(set) | Self::Stale(set) => Some(set),
            Self::Idle | Self::Loading => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading | Self::Stale(_))
    }
}

/// The ordered rule list for one scope plus its CRUD and move operations.
///
/// Mutations on one store are serialized; different stores are
/// independent. A store created under an older connection generation
/// never publishes.
pub struct ScopedRuleStore<A: RuleAuthority> {
    scope: ScopeId,
    authority: Arc<A>,
    state: watch::Sender<RuleSetState>,
    mutation: Mutex<()>,
    /// Ticket of the most recently started load; older loads don't publish.
    load_seq: AtomicU64,
    generation: Arc<AtomicU64>,
    born: u64,
}

impl<A: RuleAuthority> ScopedRuleStore<A> {
    pub fn new(scope: ScopeId, authority: Arc<A>, generation: Arc<AtomicU64>) -> Self {
        let born = generation.load(Ordering::Acquire);
        let (state, _) = watch::channel(RuleSetState::Idle);
        Self {
            scope,
            authority,
            state,
            mutation: Mutex::new(()),
            load_seq: AtomicU64::new(0),
            generation,
            born,
        }
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn state(&self) -> RuleSetState {
        self.state.borrow().clone()
    }

    /// Last completed rule list, if any.
    pub fn snapshot(&self) -> Option<Arc<RuleSet>> {
        self.state.borrow().rule_set().cloned()
    }

    pub fn subscribe(&self) -> RuleSetStream {
        RuleSetStream::new(self.state.subscribe())
    }

    /// Whether this store still belongs to the live connection.
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.born
    }

    // ── Load ─────────────────────────────────────────────────────────

    /// Fetch the full list from the remote and publish it.
    ///
    /// Never fails: a remote error publishes an empty list that records the
    /// error in [`RuleSet::load_error`].
    pub async fn load(&self) -> Arc<RuleSet> {
        let ticket = self.load_seq.fetch_add(1, Ordering::AcqRel) + 1;
        self.begin_loading();
        debug!(scope = %self.scope, "loading rules");

        let set = match self.authority.list_rules(&self.scope).await {
            Ok(rules) => RuleSet::from_remote(self.scope.clone(), rules),
            Err(e) => {
                warn!(scope = %self.scope, error = %e, "rule load failed, showing empty list");
                RuleSet::degraded(self.scope.clone(), e.to_string())
            }
        };
        let set = Arc::new(set);

        if self.load_seq.load(Ordering::Acquire) == ticket {
            self.publish(RuleSetState::Ready(Arc::clone(&set)));
        } else {
            debug!(scope = %self.scope, "load superseded by a newer one");
        }
        set
    }

    fn begin_loading(&self) {
        if !self.is_current() {
            return;
        }
        self.state.send_modify(|state| {
            *state = match std::mem::take(state) {
                RuleSetState::Ready(set) | RuleSetState::Stale(set) => RuleSetState::Stale(set),
                RuleSetState::Idle | RuleSetState::Loading => RuleSetState::Loading,
            };
        });
    }

    fn publish(&self, state: RuleSetState) {
        if !self.is_current() {
            debug!(scope = %self.scope, "dropping result from a previous connection");
            return;
        }
        self.state.send_replace(state);
    }

    /// Last list that came from a successful remote listing.
    fn authoritative(&self) -> Option<Arc<RuleSet>> {
        self.snapshot().filter(|set| !set.is_degraded())
    }

    // ── Mutations ────────────────────────────────────────────────────
    //
    // Each one holds the mutation lock through the confirming reload, and
    // reports success once the remote accepted the change even if that
    // reload degrades.

    pub async fn add(&self, input: &RuleInput) -> Result<(), CoreError> {
        validate_rule_input(input)?;
        let _guard = self.mutation.lock().await;
        self.authority.add_rule(&self.scope, input).await?;
        self.load().await;
        Ok(())
    }

    /// Replace the rule at `position` with `input`.
    pub async fn update(&self, position: u32, input: &RuleInput) -> Result<(), CoreError> {
        validate_rule_input(input)?;
        let _guard = self.mutation.lock().await;
        self.authority
            .update_rule(&self.scope, position, input)
            .await?;
        self.load().await;
        Ok(())
    }

    /// Flip `enabled` on the rule at `position`. Returns the new state.
    pub async fn toggle(&self, position: u32) -> Result<bool, CoreError> {
        let _guard = self.mutation.lock().await;
        let last_known = self
            .authoritative()
            .and_then(|set| set.get(position).map(|r| r.enabled));
        let enabled = self
            .authority
            .toggle_rule(&self.scope, position, last_known)
            .await?;
        self.load().await;
        Ok(enabled)
    }

    pub async fn remove(&self, position: u32) -> Result<(), CoreError> {
        let _guard = self.mutation.lock().await;
        self.authority.delete_rule(&self.scope, position).await?;
        self.load().await;
        Ok(())
    }

    /// Send one move intent. `from == to` is a no-op.
    ///
    /// `to` may equal the list length to move a rule to the end. Bounds are
    /// only checked against a list the remote actually returned.
    pub async fn move_rule(&self, from: u32, to: u32) -> Result<(), CoreError> {
        if from == to {
            debug!(scope = %self.scope, from, "move onto itself, nothing to do");
            return Ok(());
        }
        let _guard = self.mutation.lock().await;

        if let Some(set) = self.authoritative() {
            let len = u32::try_from(set.len()).unwrap_or(u32::MAX);
            if from >= len || to > len {
                return Err(CoreError::InvalidMove {
                    from,
                    to,
                    len: set.len(),
                });
            }
        }

        self.authority.move_rule(&self.scope, from, to).await?;
        self.load().await;
        Ok(())
    }
}
