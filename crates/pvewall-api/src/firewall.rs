// Firewall endpoints
//
// Rules, options and security groups share one path shape per scope:
// `{scope}/firewall/rules`, `{scope}/firewall/rules/{pos}` and
// `{scope}/firewall/options`. Security groups have rules but no options.

use std::fmt;

use tracing::debug;

use crate::client::PveClient;
use crate::error::Error;
use crate::models::{
    CreateGroupParams, FirewallOptions, FirewallRule, GuestKind, MoveParams, OptionsParams,
    RuleParams, SecurityGroup,
};

/// Which rule list an operation addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FirewallPath {
    Cluster,
    Node {
        node: String,
    },
    Guest {
        node: String,
        kind: GuestKind,
        vmid: u32,
    },
    Group {
        group: String,
    },
}

impl FirewallPath {
    fn base(&self) -> String {
        match self {
            Self::Cluster => "cluster/firewall".into(),
            Self::Node { node } => format!("nodes/{node}/firewall"),
            Self::Guest { node, kind, vmid } => {
                format!("nodes/{node}/{}/{vmid}/firewall", kind.as_str())
            }
            Self::Group { group } => format!("cluster/firewall/groups/{group}"),
        }
    }

    /// Path of the ordered rule list.
    pub fn rules(&self) -> String {
        match self {
            // Group rules hang directly off the group path.
            Self::Group { .. } => self.base(),
            _ => format!("{}/rules", self.base()),
        }
    }

    /// Path of the rule at `pos`.
    pub fn rule(&self, pos: u32) -> String {
        format!("{}/{pos}", self.rules())
    }

    /// Path of the options document. Security groups have none.
    pub fn options(&self) -> Option<String> {
        match self {
            Self::Group { .. } => None,
            _ => Some(format!("{}/options", self.base())),
        }
    }
}

impl fmt::Display for FirewallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rules())
    }
}

impl PveClient {
    // ── Rules ───────────────────────────────────────────────────────

    /// `GET {scope}/firewall/rules`
    pub async fn list_rules(&self, scope: &FirewallPath) -> Result<Vec<FirewallRule>, Error> {
        debug!(%scope, "listing rules");
        self.get(&scope.rules()).await
    }

    /// `GET {scope}/firewall/rules/{pos}`
    pub async fn get_rule(&self, scope: &FirewallPath, pos: u32) -> Result<FirewallRule, Error> {
        debug!(%scope, pos, "fetching rule");
        self.get(&scope.rule(pos)).await
    }

    /// `POST {scope}/firewall/rules`
    ///
    /// The remote inserts new rules at position 0, shifting the rest down.
    pub async fn create_rule(
        &self,
        scope: &FirewallPath,
        params: &RuleParams,
    ) -> Result<(), Error> {
        debug!(%scope, action = %params.action, "creating rule");
        let _: serde_json::Value = self.post(&scope.rules(), params).await?;
        Ok(())
    }

    /// `PUT {scope}/firewall/rules/{pos}`
    pub async fn update_rule(
        &self,
        scope: &FirewallPath,
        pos: u32,
        params: &RuleParams,
    ) -> Result<(), Error> {
        debug!(%scope, pos, "updating rule");
        let _: serde_json::Value = self.put(&scope.rule(pos), params).await?;
        Ok(())
    }

    /// `PUT {scope}/firewall/rules/{pos}` with `{"moveto": to}`
    pub async fn move_rule(&self, scope: &FirewallPath, from: u32, to: u32) -> Result<(), Error> {
        debug!(%scope, from, to, "moving rule");
        let _: serde_json::Value = self.put(&scope.rule(from), &MoveParams { moveto: to }).await?;
        Ok(())
    }

    /// `DELETE {scope}/firewall/rules/{pos}`
    pub async fn delete_rule(&self, scope: &FirewallPath, pos: u32) -> Result<(), Error> {
        debug!(%scope, pos, "deleting rule");
        let _: serde_json::Value = self.delete(&scope.rule(pos)).await?;
        Ok(())
    }

    // ── Options ─────────────────────────────────────────────────────

    /// `GET {scope}/firewall/options`
    pub async fn get_options(&self, scope: &FirewallPath) -> Result<FirewallOptions, Error> {
        let path = scope
            .options()
            .ok_or(Error::UnsupportedOperation("security groups have no options"))?;
        debug!(%scope, "fetching options");
        self.get(&path).await
    }

    /// `PUT {scope}/firewall/options`
    pub async fn set_options(
        &self,
        scope: &FirewallPath,
        params: &OptionsParams,
    ) -> Result<(), Error> {
        let path = scope
            .options()
            .ok_or(Error::UnsupportedOperation("security groups have no options"))?;
        debug!(%scope, "updating options");
        let _: serde_json::Value = self.put(&path, params).await?;
        Ok(())
    }

    // ── Security groups ─────────────────────────────────────────────

    /// `GET /cluster/firewall/groups`
    pub async fn list_groups(&self) -> Result<Vec<SecurityGroup>, Error> {
        debug!("listing security groups");
        self.get("cluster/firewall/groups").await
    }

    /// `POST /cluster/firewall/groups`
    pub async fn create_group(&self, group: &str, comment: Option<&str>) -> Result<(), Error> {
        debug!(group, "creating security group");
        let params = CreateGroupParams {
            group: group.to_owned(),
            comment: comment.map(String::from),
        };
        let _: serde_json::Value = self.post("cluster/firewall/groups", &params).await?;
        Ok(())
    }

    /// `DELETE /cluster/firewall/groups/{group}`
    ///
    /// The remote refuses while the group still has rules or is referenced.
    pub async fn delete_group(&self, group: &str) -> Result<(), Error> {
        debug!(group, "deleting security group");
        let path = format!("cluster/firewall/groups/{group}");
        let _: serde_json::Value = self.delete(&path).await?;
        Ok(())
    }
}
