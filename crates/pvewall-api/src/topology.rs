// Topology endpoints
//
// Node and guest discovery, plus the per-guest config read used to tell
// whether any NIC has the firewall attached.

use tracing::debug;

use crate::client::PveClient;
use crate::error::Error;
use crate::models::{ClusterResource, GuestConfig, GuestKind, GuestResource, NodeEntry};

impl PveClient {
    /// `GET /nodes`
    pub async fn list_nodes(&self) -> Result<Vec<NodeEntry>, Error> {
        debug!("listing nodes");
        self.get("nodes").await
    }

    /// `GET /cluster/resources?type=vm`
    ///
    /// Both VMs and containers are returned; anything else is dropped.
    pub async fn list_guests(&self) -> Result<Vec<GuestResource>, Error> {
        debug!("listing guests");
        let raw: Vec<ClusterResource> = self
            .get_with_query("cluster/resources", &[("type", "vm")])
            .await?;
        Ok(raw.into_iter().filter_map(ClusterResource::into_guest).collect())
    }

    /// `GET /nodes/{node}/{type}/{vmid}/config`
    pub async fn guest_config(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u32,
    ) -> Result<GuestConfig, Error> {
        debug!(node, vmid, kind = kind.as_str(), "fetching guest config");
        self.get(&format!("nodes/{node}/{}/{vmid}/config", kind.as_str()))
            .await
    }
}
