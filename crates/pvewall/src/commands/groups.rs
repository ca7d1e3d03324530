//! Security group command handlers.

use tabled::Tabled;

use pvewall_api::PveClient;
use pvewall_core::{Orchestrator, SecurityGroupInfo};

use crate::cli::{GlobalOpts, GroupsArgs, GroupsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

impl From<&SecurityGroupInfo> for GroupRow {
    fn from(g: &SecurityGroupInfo) -> Self {
        Self {
            name: g.name.clone(),
            comment: util::or_dash(g.comment.as_deref()),
        }
    }
}

pub async fn handle(
    orchestrator: &Orchestrator<PveClient>,
    args: GroupsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        GroupsCommand::List => {
            let groups = orchestrator.list_groups().await?;
            let out = output::render_list(&global.output, &groups, |g| GroupRow::from(g), |g| {
                g.name.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
        GroupsCommand::Create { name, comment } => {
            orchestrator.create_group(&name, comment.as_deref()).await?;
            if !global.quiet {
                eprintln!("created security group {name}");
            }
            Ok(())
        }
        GroupsCommand::Delete { name } => {
            if !util::confirm(
                &format!("Delete security group {name}?"),
                global.yes,
                "groups delete",
            )? {
                return Ok(());
            }
            orchestrator.delete_group(&name).await?;
            if !global.quiet {
                eprintln!("deleted security group {name}");
            }
            Ok(())
        }
    }
}
