use clap::Args;
use serde::Serialize;

use shipwright::pipeline;

use super::CmdResult;

#[derive(Args)]
pub struct StageArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutput {
    pub command: String,
    pub timestamp: i64,
    pub archive: String,
    pub tasks: Vec<String>,
}

pub fn run(_args: StageArgs) -> CmdResult<StageOutput> {
    let ctx = super::load_context()?;
    let tasks = pipeline::run_stage(&ctx)?;

    Ok((
        StageOutput {
            command: "stage".to_string(),
            timestamp: ctx.timestamp,
            archive: pipeline::archive_path(&ctx),
            tasks,
        },
        0,
    ))
}
