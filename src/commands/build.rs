use clap::Args;
use serde::Serialize;

use shipwright::pipeline;

use super::CmdResult;

#[derive(Args)]
pub struct BuildArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub command: String,
    pub timestamp: i64,
    pub tasks: Vec<String>,
}

pub fn run(_args: BuildArgs) -> CmdResult<BuildOutput> {
    let ctx = super::load_context()?;
    let tasks = pipeline::run_tasks(&ctx, &["build"])?;

    Ok((
        BuildOutput {
            command: "build".to_string(),
            timestamp: ctx.timestamp,
            tasks,
        },
        0,
    ))
}
