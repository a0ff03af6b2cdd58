use clap::Args;
use serde::Serialize;

use shipwright::watch;

use super::CmdResult;

#[derive(Args)]
pub struct DevArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevOutput {
    pub command: String,
}

/// Runs the initial build, then blocks polling for changes until the
/// process is interrupted. Only reachable errors are returned; the happy
/// path never completes.
pub fn run(_args: DevArgs) -> CmdResult<DevOutput> {
    let ctx = super::load_context()?;
    watch::run(&ctx)?;

    Ok((
        DevOutput {
            command: "dev".to_string(),
        },
        0,
    ))
}
