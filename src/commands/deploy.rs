use clap::Args;
use serde::Serialize;

use shipwright::pipeline;

use super::CmdResult;

#[derive(Args)]
pub struct DeployArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub command: String,
    pub timestamp: i64,
    pub host: String,
    pub remote_dir: String,
    pub tasks: Vec<String>,
}

pub fn run(_args: DeployArgs) -> CmdResult<DeployOutput> {
    let ctx = super::load_context()?;
    let tasks = pipeline::run_deploy(&ctx)?;

    Ok((
        DeployOutput {
            command: "deploy".to_string(),
            timestamp: ctx.timestamp,
            host: ctx.config.ssh.host.clone(),
            remote_dir: format!("{}{}", ctx.config.root_dir, ctx.timestamp),
            tasks,
        },
        0,
    ))
}
