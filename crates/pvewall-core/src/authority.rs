// ── Remote rule authority ──
//
// The seam between the engine and the remote. Every method is one remote
// operation with no state and no retries; stores, the batch loader and
// the orchestrator only ever talk to the remote through this trait.

use std::future::Future;

use tracing::{debug, warn};

use pvewall_api::PveClient;

use crate::convert::{self, scope_path};
use crate::error::CoreError;
use crate::model::{
    FirewallOptions, GuestType, OptionsPatch, RuleInput, RuleRecord, ScopeId, SecurityGroupInfo,
    Topology,
};

/// Operations the engine needs from the remote firewall.
pub trait RuleAuthority: Send + Sync + 'static {
    fn list_rules(
        &self,
        scope: &ScopeId,
    ) -> impl Future<Output = Result<Vec<RuleRecord>, CoreError>> + Send;

    fn get_rule(
        &self,
        scope: &ScopeId,
        position: u32,
    ) -> impl Future<Output = Result<RuleRecord, CoreError>> + Send;

    fn add_rule(
        &self,
        scope: &ScopeId,
        input: &RuleInput,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Full-record replace at `position`.
    fn update_rule(
        &self,
        scope: &ScopeId,
        position: u32,
        input: &RuleInput,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Single move intent; the remote computes the resulting order.
    fn move_rule(
        &self,
        scope: &ScopeId,
        from: u32,
        to: u32,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete_rule(
        &self,
        scope: &ScopeId,
        position: u32,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn get_options(
        &self,
        scope: &ScopeId,
    ) -> impl Future<Output = Result<FirewallOptions, CoreError>> + Send;

    fn set_options(
        &self,
        scope: &ScopeId,
        patch: &OptionsPatch,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Whether any NIC of the guest has the firewall attached.
    fn nic_firewall(
        &self,
        node: &str,
        guest_type: GuestType,
        vmid: u32,
    ) -> impl Future<Output = Result<bool, CoreError>> + Send;

    fn topology(&self) -> impl Future<Output = Result<Topology, CoreError>> + Send;

    fn list_groups(&self) -> impl Future<Output = Result<Vec<SecurityGroupInfo>, CoreError>> + Send;

    fn create_group(
        &self,
        name: &str,
        comment: Option<&str>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete_group(&self, name: &str) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Flip `enabled` on the rule at `position`.
    ///
    /// Re-reads the rule first and writes that fresh record back with its
    /// digest, so fields edited elsewhere since the caller's last load
    /// survive and an edit landing between the read and the write fails
    /// with [`CoreError::Conflict`]. The new state is the inverse of
    /// `last_known` when given, otherwise of the fresh value. Returns the
    /// state written.
    fn toggle_rule(
        &self,
        scope: &ScopeId,
        position: u32,
        last_known: Option<bool>,
    ) -> impl Future<Output = Result<bool, CoreError>> + Send {
        async move {
            let fresh = self.get_rule(scope, position).await?;
            let enabled = !last_known.unwrap_or(fresh.enabled);
            if last_known.is_some_and(|known| known != fresh.enabled) {
                debug!(%scope, position, "rule changed remotely since last load");
            }
            let mut input = fresh.to_input();
            input.enabled = enabled;
            self.update_rule(scope, position, &input).await?;
            Ok(enabled)
        }
    }
}

// ── PVE implementation ─────────────────────────────────────────────

impl RuleAuthority for PveClient {
    async fn list_rules(&self, scope: &ScopeId) -> Result<Vec<RuleRecord>, CoreError> {
        PveClient::list_rules(self, &scope_path(scope))
            .await?
            .into_iter()
            .map(RuleRecord::try_from)
            .collect()
    }

    async fn get_rule(&self, scope: &ScopeId, position: u32) -> Result<RuleRecord, CoreError> {
        PveClient::get_rule(self, &scope_path(scope), position)
            .await?
            .try_into()
    }

    async fn add_rule(&self, scope: &ScopeId, input: &RuleInput) -> Result<(), CoreError> {
        Ok(self
            .create_rule(&scope_path(scope), &convert::create_params(input))
            .await?)
    }

    async fn update_rule(
        &self,
        scope: &ScopeId,
        position: u32,
        input: &RuleInput,
    ) -> Result<(), CoreError> {
        Ok(PveClient::update_rule(
            self,
            &scope_path(scope),
            position,
            &convert::replace_params(input),
        )
        .await?)
    }

    async fn move_rule(&self, scope: &ScopeId, from: u32, to: u32) -> Result<(), CoreError> {
        Ok(PveClient::move_rule(self, &scope_path(scope), from, to).await?)
    }

    async fn delete_rule(&self, scope: &ScopeId, position: u32) -> Result<(), CoreError> {
        Ok(PveClient::delete_rule(self, &scope_path(scope), position).await?)
    }

    async fn get_options(&self, scope: &ScopeId) -> Result<FirewallOptions, CoreError> {
        Ok(PveClient::get_options(self, &scope_path(scope))
            .await?
            .into())
    }

    async fn set_options(&self, scope: &ScopeId, patch: &OptionsPatch) -> Result<(), CoreError> {
        Ok(PveClient::set_options(self, &scope_path(scope), &convert::options_params(patch)).await?)
    }

    async fn nic_firewall(
        &self,
        node: &str,
        guest_type: GuestType,
        vmid: u32,
    ) -> Result<bool, CoreError> {
        let config = self.guest_config(node, guest_type.into(), vmid).await?;
        Ok(convert::nic_firewall_enabled(&config))
    }

    async fn topology(&self) -> Result<Topology, CoreError> {
        let (nodes_res, guests_res) = tokio::join!(self.list_nodes(), self.list_guests());

        // Nodes decide the mode, so they are required; guests are not.
        let nodes = nodes_res?.into_iter().map(Into::into).collect();
        let guests = match guests_res {
            Ok(guests) => guests.into_iter().map(Into::into).collect(),
            Err(e) => {
                warn!(error = %e, "guest discovery failed, continuing without guests");
                Vec::new()
            }
        };
        Ok(Topology { nodes, guests })
    }

    async fn list_groups(&self) -> Result<Vec<SecurityGroupInfo>, CoreError> {
        Ok(PveClient::list_groups(self)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn create_group(&self, name: &str, comment: Option<&str>) -> Result<(), CoreError> {
        Ok(PveClient::create_group(self, name, comment).await?)
    }

    async fn delete_group(&self, name: &str) -> Result<(), CoreError> {
        Ok(PveClient::delete_group(self, name).await?)
    }
}
