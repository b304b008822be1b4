//! Command dispatch: bridges CLI args -> dashboard operations -> output formatting.

pub mod config_cmd;
pub mod rooms;
pub mod util;
pub mod watch;
pub mod write;

use homedash_core::Dashboard;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler, then tear
/// the dashboard down.
pub async fn dispatch(
    cmd: Command,
    dashboard: &Dashboard,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = match cmd {
        Command::Watch => watch::handle(dashboard, global).await,
        Command::Rooms => rooms::handle(dashboard, global).await,
        Command::Light(args) => write::light(dashboard, args, global).await,
        Command::Room(args) => write::room(dashboard, args, global).await,
        Command::Zone(args) => write::zone(dashboard, args, global).await,
        Command::Scene(args) => write::scene(dashboard, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to the server dispatcher".into(),
        )),
    };
    dashboard.shutdown();
    result
}
