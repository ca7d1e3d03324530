// In-memory authority used by the engine tests.
//
// Behaves like the remote: it owns the order, inserts new rules at the
// top, shifts positions on delete, and applies move intents with the
// remote's "insert before original index" rule. Every change to a
// scope's list bumps its digest, and a replace carrying an older digest
// is refused.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::authority::RuleAuthority;
use crate::error::CoreError;
use crate::model::{
    Direction, FirewallOptions, GuestInfo, GuestType, NodeInfo, OptionsPatch, RuleAction,
    RuleInput, RuleRecord, ScopeId, SecurityGroupInfo, Topology, Verdict,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List(ScopeId),
    Get(ScopeId, u32),
    Add(ScopeId),
    Update(ScopeId, u32),
    Move(ScopeId, u32, u32),
    Delete(ScopeId, u32),
    GetOptions(ScopeId),
    SetOptions(ScopeId),
    Nic(u32),
    Topology,
    ListGroups,
    CreateGroup(String),
    DeleteGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Fault {
    List(ScopeId),
    Options(ScopeId),
    Nic(u32),
    Topology,
    Mutations,
}

#[derive(Default)]
struct MockState {
    nodes: Vec<String>,
    guests: Vec<GuestInfo>,
    rules: HashMap<ScopeId, Vec<RuleInput>>,
    revisions: HashMap<ScopeId, u64>,
    options: HashMap<ScopeId, FirewallOptions>,
    nic: HashMap<u32, bool>,
    groups: Vec<SecurityGroupInfo>,
    faults: HashSet<Fault>,
    calls: Vec<Call>,
}

impl MockState {
    fn digest(&self, scope: &ScopeId) -> String {
        format!("{:016x}", self.revisions.get(scope).copied().unwrap_or(0))
    }

    fn touch(&mut self, scope: &ScopeId) {
        *self.revisions.entry(scope.clone()).or_default() += 1;
    }

    fn records(&self, scope: &ScopeId) -> Vec<RuleRecord> {
        let digest = self.digest(scope);
        self.rules
            .get(scope)
            .map(|rules| {
                rules
                    .iter()
                    .enumerate()
                    .map(|(i, r)| record(i, r, &digest))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub(crate) struct MockAuthority {
    state: Mutex<MockState>,
    paced: AtomicBool,
    lists_in_flight: AtomicUsize,
    peak_lists: AtomicUsize,
}

pub(crate) fn tagged(comment: &str) -> RuleInput {
    let mut input = RuleInput::new(Direction::In, RuleAction::Verdict(Verdict::Accept));
    input.comment = Some(comment.to_owned());
    input
}

fn record(position: usize, input: &RuleInput, digest: &str) -> RuleRecord {
    RuleRecord {
        position: u32::try_from(position).unwrap_or(u32::MAX),
        direction: input.direction,
        action: input.action.clone(),
        enabled: input.enabled,
        protocol: input.protocol.clone(),
        source_port: input.source_port.clone(),
        dest_port: input.dest_port.clone(),
        source: input.source.clone(),
        destination: input.destination.clone(),
        macro_name: input.macro_name.clone(),
        iface: input.iface.clone(),
        log_level: input.log_level,
        comment: input.comment.clone(),
        digest: Some(digest.to_owned()),
    }
}

/// What the remote keeps: the fields, never the caller's digest.
fn stored(input: &RuleInput) -> RuleInput {
    RuleInput {
        digest: None,
        ..input.clone()
    }
}

fn network(what: &str) -> CoreError {
    CoreError::Network {
        message: format!("injected failure: {what}"),
    }
}

fn missing(scope: &ScopeId, position: u32) -> CoreError {
    CoreError::NotFound {
        what: format!("{scope} rule {position}"),
    }
}

fn index(position: u32) -> usize {
    usize::try_from(position).unwrap_or(usize::MAX)
}

impl MockAuthority {
    pub(crate) fn with_nodes(nodes: &[&str]) -> Self {
        let mock = Self::default();
        mock.lock().nodes = nodes.iter().map(|n| (*n).to_owned()).collect();
        mock
    }

    pub(crate) fn with_rules(self, scope: &ScopeId, comments: &[&str]) -> Self {
        self.lock()
            .rules
            .insert(scope.clone(), comments.iter().map(|c| tagged(c)).collect());
        self
    }

    pub(crate) fn with_guest(self, node: &str, guest_type: GuestType, vmid: u32, nic: bool) -> Self {
        {
            let mut state = self.lock();
            state.guests.push(GuestInfo {
                node: node.to_owned(),
                guest_type,
                vmid,
                name: Some(format!("guest-{vmid}")),
                running: true,
            });
            state.nic.insert(vmid, nic);
            state.options.insert(
                ScopeId::vm(node, guest_type, vmid),
                FirewallOptions {
                    enabled: true,
                    ..FirewallOptions::default()
                },
            );
        }
        self
    }

    /// Make every `list_rules` yield once, so overlapping calls can be counted.
    pub(crate) fn paced(self) -> Self {
        self.paced.store(true, Ordering::Relaxed);
        self
    }

    /// Most `list_rules` calls that were in flight at the same time.
    pub(crate) fn peak_lists(&self) -> usize {
        self.peak_lists.load(Ordering::Relaxed)
    }

    pub(crate) fn set_nodes(&self, nodes: &[&str]) {
        self.lock().nodes = nodes.iter().map(|n| (*n).to_owned()).collect();
    }

    pub(crate) fn fail(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    pub(crate) fn heal(&self, fault: &Fault) {
        self.lock().faults.remove(fault);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// What the next `list` of `scope` would return.
    pub(crate) fn remote_rules(&self, scope: &ScopeId) -> Vec<RuleRecord> {
        self.lock().records(scope)
    }

    /// Change a rule behind the engine's back.
    pub(crate) fn edit_remote(&self, scope: &ScopeId, position: u32, edit: impl FnOnce(&mut RuleInput)) {
        let mut state = self.lock();
        if let Some(rule) = state
            .rules
            .get_mut(scope)
            .and_then(|rules| rules.get_mut(index(position)))
        {
            edit(rule);
            state.touch(scope);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, call: Call, fault: Option<Fault>) -> Result<std::sync::MutexGuard<'_, MockState>, CoreError> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(fault) = fault {
            if state.faults.contains(&fault) {
                return Err(network(&format!("{fault:?}")));
            }
        }
        Ok(state)
    }
}

impl RuleAuthority for MockAuthority {
    async fn list_rules(&self, scope: &ScopeId) -> Result<Vec<RuleRecord>, CoreError> {
        if self.paced.load(Ordering::Relaxed) {
            let now = self.lists_in_flight.fetch_add(1, Ordering::AcqRel) + 1;
            self.peak_lists.fetch_max(now, Ordering::AcqRel);
            tokio::task::yield_now().await;
            self.lists_in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        let state = self.enter(Call::List(scope.clone()), Some(Fault::List(scope.clone())))?;
        Ok(state.records(scope))
    }

    async fn get_rule(&self, scope: &ScopeId, position: u32) -> Result<RuleRecord, CoreError> {
        let state = self.enter(Call::Get(scope.clone(), position), None)?;
        state
            .rules
            .get(scope)
            .and_then(|rules| rules.get(index(position)))
            .map(|r| record(index(position), r, &state.digest(scope)))
            .ok_or_else(|| missing(scope, position))
    }

    async fn add_rule(&self, scope: &ScopeId, input: &RuleInput) -> Result<(), CoreError> {
        let mut state = self.enter(Call::Add(scope.clone()), Some(Fault::Mutations))?;
        state
            .rules
            .entry(scope.clone())
            .or_default()
            .insert(0, stored(input));
        state.touch(scope);
        Ok(())
    }

    async fn update_rule(
        &self,
        scope: &ScopeId,
        position: u32,
        input: &RuleInput,
    ) -> Result<(), CoreError> {
        let mut state = self.enter(Call::Update(scope.clone(), position), Some(Fault::Mutations))?;
        if input
            .digest
            .as_ref()
            .is_some_and(|digest| *digest != state.digest(scope))
        {
            return Err(CoreError::Conflict {
                what: format!("{scope} rule {position}"),
            });
        }
        let slot = state
            .rules
            .get_mut(scope)
            .and_then(|rules| rules.get_mut(index(position)))
            .ok_or_else(|| missing(scope, position))?;
        *slot = stored(input);
        state.touch(scope);
        Ok(())
    }

    async fn move_rule(&self, scope: &ScopeId, from: u32, to: u32) -> Result<(), CoreError> {
        let mut state = self.enter(Call::Move(scope.clone(), from, to), Some(Fault::Mutations))?;
        let rules = state.rules.entry(scope.clone()).or_default();
        let (from, to) = (index(from), index(to));
        let Some(moving) = rules.get(from).cloned() else {
            return Err(missing(scope, u32::try_from(from).unwrap_or(u32::MAX)));
        };
        let mut reordered = Vec::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            if i == from {
                continue;
            }
            if i == to {
                reordered.push(moving.clone());
            }
            reordered.push(rule.clone());
        }
        if to >= rules.len() {
            reordered.push(moving);
        }
        *rules = reordered;
        state.touch(scope);
        Ok(())
    }

    async fn delete_rule(&self, scope: &ScopeId, position: u32) -> Result<(), CoreError> {
        let mut state = self.enter(Call::Delete(scope.clone(), position), Some(Fault::Mutations))?;
        let rules = state.rules.entry(scope.clone()).or_default();
        if index(position) >= rules.len() {
            return Err(missing(scope, position));
        }
        rules.remove(index(position));
        state.touch(scope);
        Ok(())
    }

    async fn get_options(&self, scope: &ScopeId) -> Result<FirewallOptions, CoreError> {
        let state = self.enter(
            Call::GetOptions(scope.clone()),
            Some(Fault::Options(scope.clone())),
        )?;
        Ok(state.options.get(scope).cloned().unwrap_or_default())
    }

    async fn set_options(&self, scope: &ScopeId, patch: &OptionsPatch) -> Result<(), CoreError> {
        let mut state = self.enter(Call::SetOptions(scope.clone()), Some(Fault::Mutations))?;
        let options = state.options.entry(scope.clone()).or_default();
        if let Some(enabled) = patch.enabled {
            options.enabled = enabled;
        }
        if patch.policy_in.is_some() {
            options.policy_in = patch.policy_in;
        }
        if patch.policy_out.is_some() {
            options.policy_out = patch.policy_out;
        }
        Ok(())
    }

    async fn nic_firewall(
        &self,
        _node: &str,
        _guest_type: GuestType,
        vmid: u32,
    ) -> Result<bool, CoreError> {
        let state = self.enter(Call::Nic(vmid), Some(Fault::Nic(vmid)))?;
        Ok(state.nic.get(&vmid).copied().unwrap_or(false))
    }

    async fn topology(&self) -> Result<Topology, CoreError> {
        let state = self.enter(Call::Topology, Some(Fault::Topology))?;
        Ok(Topology {
            nodes: state
                .nodes
                .iter()
                .map(|name| NodeInfo {
                    name: name.clone(),
                    online: true,
                })
                .collect(),
            guests: state.guests.clone(),
        })
    }

    async fn list_groups(&self) -> Result<Vec<SecurityGroupInfo>, CoreError> {
        let state = self.enter(Call::ListGroups, None)?;
        Ok(state.groups.clone())
    }

    async fn create_group(&self, name: &str, comment: Option<&str>) -> Result<(), CoreError> {
        let mut state = self.enter(Call::CreateGroup(name.to_owned()), Some(Fault::Mutations))?;
        state.groups.push(SecurityGroupInfo {
            name: name.to_owned(),
            comment: comment.map(String::from),
        });
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.enter(Call::DeleteGroup(name.to_owned()), Some(Fault::Mutations))?;
        state.groups.retain(|g| g.name != name);
        state.rules.remove(&ScopeId::group(name));
        Ok(())
    }
}
