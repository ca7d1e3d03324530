//! Command dispatch: bridges CLI args -> orchestrator calls -> output formatting.

pub mod config_cmd;
pub mod groups;
pub mod mode;
pub mod options;
pub mod rules;
pub mod util;

use pvewall_api::PveClient;
use pvewall_core::Orchestrator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a connection-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    orchestrator: &Orchestrator<PveClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Rules(args) => rules::handle(orchestrator, args, global).await,
        Command::Groups(args) => groups::handle(orchestrator, args, global).await,
        Command::Options(args) => options::handle(orchestrator, args, global).await,
        Command::Mode => mode::handle(orchestrator, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
