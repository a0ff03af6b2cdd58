use clap::Args;
use serde::Serialize;

use shipwright::packager;

use super::CmdResult;

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOutput {
    pub command: String,
    pub removed: Vec<String>,
}

pub fn run(_args: CleanArgs) -> CmdResult<CleanOutput> {
    let ctx = super::load_context()?;
    packager::clean(&ctx)?;

    Ok((
        CleanOutput {
            command: "clean".to_string(),
            removed: vec![
                ctx.layout.build().display().to_string(),
                ctx.layout.release().display().to_string(),
                ctx.layout.dist().display().to_string(),
            ],
        },
        0,
    ))
}
