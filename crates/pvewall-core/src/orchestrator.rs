// ── Orchestrator ──
//
// Composition root bound to one connection. Owns one store per scope
// that has been touched, the mode detector, the last guest batch and one
// drag controller per scope kind. Everything a front end does goes
// through here.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pvewall_api::PveClient;

use crate::authority::RuleAuthority;
use crate::batch::BatchLoader;
use crate::config::ConnectionConfig;
use crate::drag::{DragController, DragState};
use crate::error::CoreError;
use crate::mode::ModeDetector;
use crate::model::{
    Direction, FirewallOptions, GuestFirewall, Mode, OptionsPatch, RuleInput, RuleRecord, RuleSet,
    ScopeId, ScopeKind, SecurityGroupInfo, Topology, Verdict,
};
use crate::store::ScopedRuleStore;
use crate::stream::RuleSetStream;
use crate::validate::validate_group_name;

/// What the front end is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// A single rule list.
    Scope(ScopeId),
    /// Every host's rules side by side.
    Hosts,
    /// Every guest's rules, options and NIC attachment.
    Guests,
}

/// Result of loading whatever the active view needs.
#[derive(Debug, Clone)]
pub enum ViewData {
    Scope(Arc<RuleSet>),
    Hosts(BTreeMap<ScopeId, Arc<RuleSet>>),
    Guests(Arc<BTreeMap<ScopeId, GuestFirewall>>),
}

/// The rule-set engine for one connection at a time.
///
/// Cheaply cloneable; clones share all state.
pub struct Orchestrator<A: RuleAuthority> {
    inner: Arc<OrchestratorInner<A>>,
}

impl<A: RuleAuthority> Clone for Orchestrator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct OrchestratorInner<A: RuleAuthority> {
    authority: ArcSwap<A>,
    stores: DashMap<ScopeId, Arc<ScopedRuleStore<A>>>,
    /// Bumped on every connection switch.
    generation: Arc<AtomicU64>,
    detector: ModeDetector,
    view: watch::Sender<View>,
    guests: watch::Sender<Arc<BTreeMap<ScopeId, GuestFirewall>>>,
    drags: Mutex<HashMap<ScopeKind, DragController>>,
    batch: BatchLoader,
}

impl Orchestrator<PveClient> {
    /// Authenticate against the remote and discover its topology.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, CoreError> {
        let client = config.connect().await?;
        info!(url = %config.url, "connected");
        let orchestrator = Self::new(client);
        orchestrator.refresh_topology().await?;
        Ok(orchestrator)
    }
}

impl<A: RuleAuthority> Orchestrator<A> {
    /// Wrap an authority. Does not contact it; call
    /// [`refresh_topology()`](Self::refresh_topology) to detect the mode.
    pub fn new(authority: A) -> Self {
        Self::with_shared(Arc::new(authority))
    }

    pub fn with_shared(authority: Arc<A>) -> Self {
        Self::with_batch_loader(authority, BatchLoader::default())
    }

    /// Like [`with_shared()`](Self::with_shared) with a custom guest wave size.
    pub fn with_batch_loader(authority: Arc<A>, batch: BatchLoader) -> Self {
        let (view, _) = watch::channel(View::Scope(ScopeId::Cluster));
        let (guests, _) = watch::channel(Arc::default());
        Self {
            inner: Arc::new(OrchestratorInner {
                authority: ArcSwap::new(authority),
                stores: DashMap::new(),
                generation: Arc::new(AtomicU64::new(0)),
                detector: ModeDetector::new(),
                view,
                guests,
                drags: Mutex::new(HashMap::new()),
                batch,
            }),
        }
    }

    pub fn authority(&self) -> Arc<A> {
        self.inner.authority.load_full()
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Point the engine at a different remote.
    ///
    /// Discards every store, re-detects the mode and reloads the active
    /// view. Results still in flight from the previous connection are
    /// dropped when they land.
    pub async fn switch_connection(&self, authority: Arc<A>) -> Result<Mode, CoreError> {
        self.inner.authority.store(authority);
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.stores.clear();
        self.inner.detector.reset();
        self.inner.guests.send_replace(Arc::default());
        self.drags().clear();
        info!(generation, "connection switched");

        let mode = self.refresh_topology().await?;
        if let Err(e) = self.load_active_view().await {
            warn!(error = %e, "active view reload failed after connection switch");
        }
        Ok(mode)
    }

    /// Fetch a fresh topology and re-classify the target.
    ///
    /// In standalone mode an active cluster view is redirected to the sole
    /// host and that host's rules are loaded right away. A cluster drag in
    /// progress is abandoned.
    pub async fn refresh_topology(&self) -> Result<Mode, CoreError> {
        let generation = self.generation();
        let topology = self.authority().topology().await?;
        let mode = Mode::from_node_count(topology.nodes.len());
        if self.generation() != generation {
            debug!("topology from a previous connection ignored");
            return Ok(mode);
        }

        let sole = topology.sole_node().map(str::to_owned);
        self.inner.detector.observe(topology);

        if mode == Mode::Standalone {
            self.inner.stores.remove(&ScopeId::Cluster);
            self.drags().remove(&ScopeKind::Cluster);
            match sole {
                Some(node) => {
                    let host = ScopeId::host(node);
                    let redirected = self.inner.view.send_if_modified(|view| {
                        if *view == View::Scope(ScopeId::Cluster) {
                            *view = View::Scope(host.clone());
                            true
                        } else {
                            false
                        }
                    });
                    if redirected {
                        info!(scope = %host, "standalone target, showing host rules");
                    }
                    self.load(&host).await?;
                }
                None => warn!("topology reported no nodes"),
            }
        }
        Ok(mode)
    }

    /// Poll the topology on an interval until `cancel` fires.
    pub fn spawn_topology_refresh(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = orchestrator.refresh_topology().await {
                            warn!(error = %e, "periodic topology refresh failed");
                        }
                    }
                }
            }
        })
    }

    /// `None` until a topology has been observed.
    pub fn mode(&self) -> Option<Mode> {
        self.inner.detector.mode()
    }

    pub fn mode_changes(&self) -> watch::Receiver<Option<Mode>> {
        self.inner.detector.subscribe()
    }

    pub fn topology(&self) -> Option<Topology> {
        self.inner.detector.topology()
    }

    pub fn is_available(&self, kind: ScopeKind) -> bool {
        self.inner.detector.is_available(kind)
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn view(&self) -> View {
        self.inner.view.borrow().clone()
    }

    pub fn view_changes(&self) -> watch::Receiver<View> {
        self.inner.view.subscribe()
    }

    pub fn set_view(&self, view: View) -> Result<(), CoreError> {
        if let View::Scope(scope) = &view {
            self.ensure_available(scope)?;
        }
        self.inner.view.send_replace(view);
        Ok(())
    }

    /// Load whatever the active view shows.
    pub async fn load_active_view(&self) -> Result<ViewData, CoreError> {
        match self.view() {
            View::Scope(scope) => Ok(ViewData::Scope(self.load(&scope).await?)),
            View::Hosts => Ok(ViewData::Hosts(self.load_all_hosts().await?)),
            View::Guests => Ok(ViewData::Guests(self.load_all_guests().await?)),
        }
    }

    // ── Stores ───────────────────────────────────────────────────────

    fn ensure_available(&self, scope: &ScopeId) -> Result<(), CoreError> {
        if self.inner.detector.is_available(scope.kind()) {
            return Ok(());
        }
        let reason = match self.mode() {
            Some(mode) => format!("target is in {mode} mode"),
            None => "topology not discovered yet".into(),
        };
        Err(CoreError::ScopeUnavailable {
            scope: scope.to_string(),
            reason,
        })
    }

    /// The store for `scope`, created on first use.
    pub fn store(&self, scope: &ScopeId) -> Result<Arc<ScopedRuleStore<A>>, CoreError> {
        self.ensure_available(scope)?;
        let store = self
            .inner
            .stores
            .entry(scope.clone())
            .or_insert_with(|| {
                debug!(%scope, "creating rule store");
                Arc::new(ScopedRuleStore::new(
                    scope.clone(),
                    self.authority(),
                    Arc::clone(&self.inner.generation),
                ))
            })
            .clone();
        Ok(store)
    }

    /// Last published list for `scope`, without loading anything.
    pub fn snapshot(&self, scope: &ScopeId) -> Option<Arc<RuleSet>> {
        self.inner.stores.get(scope)?.snapshot()
    }

    /// Every published list, keyed by scope.
    pub fn snapshots(&self) -> BTreeMap<ScopeId, Arc<RuleSet>> {
        self.inner
            .stores
            .iter()
            .filter_map(|entry| entry.value().snapshot().map(|set| (entry.key().clone(), set)))
            .collect()
    }

    pub fn subscribe(&self, scope: &ScopeId) -> Result<RuleSetStream, CoreError> {
        Ok(self.store(scope)?.subscribe())
    }

    /// Last guest batch.
    pub fn guest_firewalls(&self) -> Arc<BTreeMap<ScopeId, GuestFirewall>> {
        Arc::clone(&self.inner.guests.borrow())
    }

    // ── Rule operations ──────────────────────────────────────────────

    /// Load one scope. Remote failures degrade to an empty list; the only
    /// error is a scope the current mode does not offer.
    pub async fn load(&self, scope: &ScopeId) -> Result<Arc<RuleSet>, CoreError> {
        Ok(self.store(scope)?.load().await)
    }

    /// Fetch one rule straight from the remote, bypassing the store.
    pub async fn get_rule(&self, scope: &ScopeId, position: u32) -> Result<RuleRecord, CoreError> {
        self.ensure_available(scope)?;
        self.authority().get_rule(scope, position).await
    }

    pub async fn add(&self, scope: &ScopeId, input: &RuleInput) -> Result<(), CoreError> {
        self.store(scope)?.add(input).await
    }

    pub async fn update(
        &self,
        scope: &ScopeId,
        position: u32,
        input: &RuleInput,
    ) -> Result<(), CoreError> {
        self.store(scope)?.update(position, input).await
    }

    pub async fn toggle(&self, scope: &ScopeId, position: u32) -> Result<bool, CoreError> {
        self.store(scope)?.toggle(position).await
    }

    pub async fn remove(&self, scope: &ScopeId, position: u32) -> Result<(), CoreError> {
        self.store(scope)?.remove(position).await
    }

    pub async fn move_rule(&self, scope: &ScopeId, from: u32, to: u32) -> Result<(), CoreError> {
        self.store(scope)?.move_rule(from, to).await
    }

    // ── Batch loads ──────────────────────────────────────────────────

    /// Load many scopes at once. Fails only if one of them is unavailable,
    /// before anything is fetched.
    pub async fn load_scopes(
        &self,
        scopes: &[ScopeId],
    ) -> Result<BTreeMap<ScopeId, Arc<RuleSet>>, CoreError> {
        let stores = scopes
            .iter()
            .map(|scope| self.store(scope))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.inner.batch.load_all(&stores).await)
    }

    async fn current_topology(&self) -> Result<Topology, CoreError> {
        if let Some(topology) = self.topology() {
            return Ok(topology);
        }
        self.refresh_topology().await?;
        self.topology().ok_or_else(|| CoreError::Internal("topology missing after refresh".into()))
    }

    pub async fn load_all_hosts(&self) -> Result<BTreeMap<ScopeId, Arc<RuleSet>>, CoreError> {
        let topology = self.current_topology().await?;
        self.load_scopes(&topology.host_scopes()).await
    }

    /// Load rules, options and NIC attachment for every guest.
    pub async fn load_all_guests(
        &self,
    ) -> Result<Arc<BTreeMap<ScopeId, GuestFirewall>>, CoreError> {
        let generation = self.generation();
        let topology = self.current_topology().await?;
        let pairs = topology
            .guests
            .into_iter()
            .map(|guest| {
                let store = self.store(&guest.scope())?;
                Ok((guest, store))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let authority = self.authority();
        let results = Arc::new(self.inner.batch.load_guests(authority.as_ref(), &pairs).await);
        if self.generation() == generation {
            self.inner.guests.send_replace(Arc::clone(&results));
        }
        Ok(results)
    }

    // ── Scope options ────────────────────────────────────────────────

    fn options_scope(&self, scope: &ScopeId) -> Result<(), CoreError> {
        self.ensure_available(scope)?;
        if scope.has_options() {
            Ok(())
        } else {
            Err(CoreError::Unsupported {
                operation: format!("firewall options for {scope}"),
            })
        }
    }

    pub async fn get_options(&self, scope: &ScopeId) -> Result<FirewallOptions, CoreError> {
        self.options_scope(scope)?;
        self.authority().get_options(scope).await
    }

    pub async fn set_enabled(&self, scope: &ScopeId, enabled: bool) -> Result<(), CoreError> {
        self.options_scope(scope)?;
        let patch = OptionsPatch {
            enabled: Some(enabled),
            ..OptionsPatch::default()
        };
        info!(%scope, enabled, "setting firewall enable");
        self.authority().set_options(scope, &patch).await
    }

    /// Set the default policy for one direction.
    pub async fn set_policy(
        &self,
        scope: &ScopeId,
        direction: Direction,
        verdict: Verdict,
    ) -> Result<(), CoreError> {
        self.options_scope(scope)?;
        let patch = match direction {
            Direction::In => OptionsPatch {
                policy_in: Some(verdict),
                ..OptionsPatch::default()
            },
            Direction::Out => OptionsPatch {
                policy_out: Some(verdict),
                ..OptionsPatch::default()
            },
            Direction::Group => {
                return Err(CoreError::Validation {
                    message: "default policy applies to in or out only".into(),
                });
            }
        };
        info!(%scope, %direction, %verdict, "setting default policy");
        self.authority().set_options(scope, &patch).await
    }

    // ── Security groups ──────────────────────────────────────────────

    pub async fn list_groups(&self) -> Result<Vec<SecurityGroupInfo>, CoreError> {
        self.authority().list_groups().await
    }

    pub async fn create_group(&self, name: &str, comment: Option<&str>) -> Result<(), CoreError> {
        validate_group_name(name)?;
        self.authority().create_group(name, comment).await?;
        self.inner.stores.remove(&ScopeId::group(name));
        Ok(())
    }

    pub async fn delete_group(&self, name: &str) -> Result<(), CoreError> {
        validate_group_name(name)?;
        self.authority().delete_group(name).await?;
        self.inner.stores.remove(&ScopeId::group(name));
        Ok(())
    }

    // ── Drag and drop ────────────────────────────────────────────────

    fn drags(&self) -> MutexGuard<'_, HashMap<ScopeKind, DragController>> {
        self.inner.drags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn drag_start(&self, scope: &ScopeId, position: u32) {
        let kind = scope.kind();
        self.drags()
            .entry(kind)
            .or_insert_with(|| DragController::new(kind))
            .drag_start(scope.clone(), position);
    }

    /// Returns the hover hint, or `None` for an event outside the dragged
    /// scope.
    pub fn drag_over(&self, scope: &ScopeId, position: u32) -> Option<u32> {
        self.drags()
            .get_mut(&scope.kind())
            .and_then(|drag| drag.drag_over(scope, position))
    }

    /// Finish a drag. Returns whether a move was sent.
    pub async fn drop(&self, scope: &ScopeId, position: u32) -> Result<bool, CoreError> {
        let intent = self
            .drags()
            .get_mut(&scope.kind())
            .and_then(|drag| drag.drop(scope, position));
        match intent {
            Some(intent) => {
                self.move_rule(&intent.scope, intent.from, intent.to).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn drag_end(&self, kind: ScopeKind) {
        if let Some(drag) = self.drags().get_mut(&kind) {
            drag.drag_end();
        }
    }

    pub fn drag_state(&self, kind: ScopeKind) -> DragState {
        self.drags()
            .get(&kind)
            .map(|drag| drag.state().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::GuestType;
    use crate::testing::{Call, Fault, MockAuthority, tagged};

    fn comments(set: &RuleSet) -> Vec<String> {
        set.rules
            .iter()
            .map(|r| r.comment.clone().unwrap_or_default())
            .collect()
    }

    fn engine(mock: MockAuthority) -> (Orchestrator<MockAuthority>, Arc<MockAuthority>) {
        let mock = Arc::new(mock);
        (Orchestrator::with_shared(Arc::clone(&mock)), mock)
    }

    #[tokio::test]
    async fn mode_gates_scope_kinds() {
        let (orch, _) = engine(MockAuthority::with_nodes(&["pve1"]));
        assert_eq!(orch.refresh_topology().await.unwrap(), Mode::Standalone);
        assert!(!orch.is_available(ScopeKind::Cluster));

        let (orch, _) = engine(MockAuthority::with_nodes(&["pve1", "pve2"]));
        assert_eq!(orch.refresh_topology().await.unwrap(), Mode::Cluster);
        for kind in [
            ScopeKind::Cluster,
            ScopeKind::Host,
            ScopeKind::Vm,
            ScopeKind::SecurityGroup,
        ] {
            assert!(orch.is_available(kind), "{kind}");
        }
    }

    #[tokio::test]
    async fn standalone_refresh_redirects_cluster_view() {
        let (orch, mock) = engine(MockAuthority::with_nodes(&["pve1", "pve2"]));
        orch.refresh_topology().await.unwrap();
        assert_eq!(orch.view(), View::Scope(ScopeId::Cluster));

        mock.set_nodes(&["pve1"]);
        mock.clear_calls();
        assert_eq!(orch.refresh_topology().await.unwrap(), Mode::Standalone);

        assert_eq!(orch.view(), View::Scope(ScopeId::host("pve1")));
        assert!(mock.calls().contains(&Call::List(ScopeId::host("pve1"))));
        assert!(orch.snapshot(&ScopeId::host("pve1")).is_some());
    }

    #[tokio::test]
    async fn standalone_refresh_abandons_cluster_drag() {
        let (orch, mock) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"]).with_rules(&ScopeId::Cluster, &["a", "b"]),
        );
        orch.refresh_topology().await.unwrap();
        orch.drag_start(&ScopeId::Cluster, 1);
        orch.drag_start(&ScopeId::host("pve1"), 0);

        mock.set_nodes(&["pve1"]);
        orch.refresh_topology().await.unwrap();
        mock.clear_calls();

        assert_eq!(orch.drag_state(ScopeKind::Cluster), DragState::Idle);
        assert!(!orch.drop(&ScopeId::Cluster, 0).await.unwrap());
        assert!(mock.calls().is_empty());
        assert!(matches!(
            orch.drag_state(ScopeKind::Host),
            DragState::Dragging { from: 0, .. }
        ));
    }

    #[tokio::test]
    async fn standalone_never_requests_cluster_rules() {
        let (orch, mock) = engine(MockAuthority::with_nodes(&["pve1"]));
        orch.refresh_topology().await.unwrap();

        let err = orch.load(&ScopeId::Cluster).await.unwrap_err();
        assert!(matches!(err, CoreError::ScopeUnavailable { .. }));
        assert!(orch.move_rule(&ScopeId::Cluster, 1, 0).await.is_err());
        assert!(!mock.calls().contains(&Call::List(ScopeId::Cluster)));
    }

    #[tokio::test]
    async fn cluster_scope_unavailable_before_discovery() {
        let (orch, mock) = engine(MockAuthority::with_nodes(&["pve1", "pve2"]));
        assert!(orch.load(&ScopeId::Cluster).await.is_err());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn move_shows_remote_order() {
        let (orch, mock) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"])
                .with_rules(&ScopeId::Cluster, &["a", "b", "c"]),
        );
        orch.refresh_topology().await.unwrap();
        orch.load(&ScopeId::Cluster).await.unwrap();

        orch.move_rule(&ScopeId::Cluster, 2, 0).await.unwrap();

        let set = orch.snapshot(&ScopeId::Cluster).unwrap();
        assert_eq!(comments(&set), vec!["c", "a", "b"]);
        assert_eq!(set.rules, mock.remote_rules(&ScopeId::Cluster));
        let positions: Vec<u32> = set.rules.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn update_succeeds_even_if_reload_fails() {
        let host = ScopeId::host("pve1");
        let (orch, mock) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"]).with_rules(&host, &["a", "b", "c", "d"]),
        );
        orch.refresh_topology().await.unwrap();
        let before = orch.load(&host).await.unwrap();

        let mut input = before.get(3).unwrap().to_input();
        input.enabled = false;
        mock.fail(Fault::List(host.clone()));

        orch.update(&host, 3, &input).await.unwrap();

        let after = orch.snapshot(&host).unwrap();
        assert!(after.is_empty());
        assert!(after.is_degraded());
        assert!(!mock.remote_rules(&host)[3].enabled);

        mock.heal(&Fault::List(host.clone()));
        assert_eq!(orch.load(&host).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn host_batch_keeps_one_entry_per_node() {
        let mut mock = MockAuthority::with_nodes(&["pve1", "pve2", "pve3"]);
        for node in ["pve1", "pve2", "pve3"] {
            mock = mock.with_rules(&ScopeId::host(node), &["x"]);
        }
        let (orch, mock) = engine(mock);
        orch.refresh_topology().await.unwrap();
        mock.fail(Fault::List(ScopeId::host("pve2")));

        let hosts = orch.load_all_hosts().await.unwrap();
        assert_eq!(hosts.len(), 3);
        assert!(hosts[&ScopeId::host("pve2")].is_empty());
        assert_eq!(hosts[&ScopeId::host("pve3")].len(), 1);
        assert_eq!(orch.snapshots().len(), 3);
    }

    #[tokio::test]
    async fn guest_view_loads_every_guest() {
        let (orch, mock) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"])
                .with_guest("pve1", GuestType::Qemu, 100, true)
                .with_guest("pve2", GuestType::Qemu, 101, true)
                .with_guest("pve2", GuestType::Lxc, 102, false),
        );
        orch.refresh_topology().await.unwrap();
        mock.fail(Fault::List(ScopeId::vm("pve2", GuestType::Qemu, 101)));
        mock.fail(Fault::Nic(101));
        orch.set_view(View::Guests).unwrap();

        let ViewData::Guests(guests) = orch.load_active_view().await.unwrap() else {
            panic!("expected guest data");
        };
        assert_eq!(guests.len(), 3);
        let failed = &guests[&ScopeId::vm("pve2", GuestType::Qemu, 101)];
        assert!(failed.rules.is_empty());
        assert!(!failed.firewall_enabled);
        assert_eq!(orch.guest_firewalls().len(), 3);
    }

    #[tokio::test]
    async fn guest_view_respects_wave_size() {
        let mut mock = MockAuthority::with_nodes(&["pve1", "pve2"]);
        for vmid in 200..205 {
            mock = mock.with_guest("pve2", GuestType::Lxc, vmid, true);
        }
        let mock = Arc::new(mock.paced());
        let orch = Orchestrator::with_batch_loader(Arc::clone(&mock), BatchLoader::with_guest_batch(2));
        orch.refresh_topology().await.unwrap();

        let guests = orch.load_all_guests().await.unwrap();
        assert_eq!(guests.len(), 5);
        assert_eq!(mock.peak_lists(), 2);
    }

    #[tokio::test]
    async fn cross_scope_drop_sends_nothing() {
        let a = ScopeId::host("pve1");
        let b = ScopeId::host("pve2");
        let (orch, mock) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"])
                .with_rules(&a, &["a0", "a1", "a2"])
                .with_rules(&b, &["b0", "b1", "b2"]),
        );
        orch.refresh_topology().await.unwrap();
        mock.clear_calls();

        orch.drag_start(&a, 2);
        assert_eq!(orch.drag_over(&b, 2), None);
        assert!(!orch.drop(&b, 2).await.unwrap());
        assert!(mock.calls().is_empty());
        assert_eq!(orch.drag_state(ScopeKind::Host), DragState::Idle);
    }

    #[tokio::test]
    async fn same_scope_drop_moves_once() {
        let a = ScopeId::host("pve1");
        let (orch, mock) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"]).with_rules(&a, &["a0", "a1", "a2"]),
        );
        orch.refresh_topology().await.unwrap();
        orch.load(&a).await.unwrap();
        mock.clear_calls();

        orch.drag_start(&a, 0);
        assert_eq!(orch.drag_over(&a, 1), Some(1));
        assert!(orch.drop(&a, 2).await.unwrap());

        let moves: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Move(..)))
            .collect();
        assert_eq!(moves, vec![Call::Move(a.clone(), 0, 2)]);
        assert_eq!(comments(&orch.snapshot(&a).unwrap()), vec!["a1", "a0", "a2"]);
    }

    #[tokio::test]
    async fn drag_kinds_are_independent() {
        let (orch, _) = engine(MockAuthority::with_nodes(&["pve1", "pve2"]));
        orch.refresh_topology().await.unwrap();

        orch.drag_start(&ScopeId::host("pve1"), 1);
        orch.drag_start(&ScopeId::group("web"), 0);
        orch.drag_end(ScopeKind::SecurityGroup);

        assert!(matches!(
            orch.drag_state(ScopeKind::Host),
            DragState::Dragging { from: 1, .. }
        ));
        assert_eq!(orch.drag_state(ScopeKind::SecurityGroup), DragState::Idle);
    }

    #[tokio::test]
    async fn switching_connection_discards_stores() {
        let host = ScopeId::host("pve1");
        let (orch, _) = engine(
            MockAuthority::with_nodes(&["pve1", "pve2"]).with_rules(&host, &["old"]),
        );
        orch.refresh_topology().await.unwrap();
        let old_store = orch.store(&host).unwrap();
        old_store.load().await;

        let next = Arc::new(MockAuthority::with_nodes(&["pve1"]).with_rules(&host, &["new"]));
        let mode = orch.switch_connection(Arc::clone(&next)).await.unwrap();
        assert_eq!(mode, Mode::Standalone);
        assert!(!old_store.is_current());

        // A late result from the old connection is not published.
        let before = old_store.snapshot();
        old_store.load().await;
        assert_eq!(old_store.snapshot(), before);

        let set = orch.snapshot(&host).unwrap();
        assert_eq!(comments(&set), vec!["new"]);
    }

    #[tokio::test]
    async fn options_are_per_scope() {
        let (orch, mock) = engine(MockAuthority::with_nodes(&["pve1", "pve2"]));
        orch.refresh_topology().await.unwrap();

        orch.set_enabled(&ScopeId::Cluster, true).await.unwrap();
        orch.set_policy(&ScopeId::Cluster, Direction::In, Verdict::Drop)
            .await
            .unwrap();
        let options = orch.get_options(&ScopeId::Cluster).await.unwrap();
        assert!(options.enabled);
        assert_eq!(options.policy_in, Some(Verdict::Drop));

        let err = orch
            .set_policy(&ScopeId::Cluster, Direction::Group, Verdict::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        mock.clear_calls();
        let err = orch.get_options(&ScopeId::group("web")).await.unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn group_lifecycle() {
        let (orch, mock) = engine(MockAuthority::with_nodes(&["pve1"]));
        orch.refresh_topology().await.unwrap();

        orch.create_group("web", Some("frontends")).await.unwrap();
        let group = ScopeId::group("web");
        orch.add(&group, &tagged("allow-http")).await.unwrap();
        assert_eq!(orch.snapshot(&group).unwrap().len(), 1);

        let groups = orch.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].comment.as_deref(), Some("frontends"));

        orch.delete_group("web").await.unwrap();
        assert!(orch.snapshot(&group).is_none());
        assert!(orch.list_groups().await.unwrap().is_empty());

        mock.clear_calls();
        assert!(orch.create_group("9bad", None).await.is_err());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn topology_poller_reclassifies_until_cancelled() {
        let (orch, mock) = engine(MockAuthority::with_nodes(&["pve1", "pve2"]));
        orch.refresh_topology().await.unwrap();
        let mut changes = orch.mode_changes();
        changes.borrow_and_update();

        let cancel = CancellationToken::new();
        let handle = orch.spawn_topology_refresh(Duration::from_secs(30), cancel.clone());

        mock.set_nodes(&["pve1"]);
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), Some(Mode::Standalone));

        cancel.cancel();
        handle.await.unwrap();
    }
}
