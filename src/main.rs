use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{build, clean, deploy, dev, stage};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(version = VERSION)]
#[command(about = "CLI tool for building, staging, and deploying a single-page application")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile sources and assemble the build tree
    Build(build::BuildArgs),
    /// Build and package a timestamped release archive
    Stage(stage::StageArgs),
    /// Stage, transfer to the remote host, and swap the current release
    Deploy(deploy::DeployArgs),
    /// Remove local build, release, and dist output
    Clean(clean::CleanArgs),
    /// Build, then watch sources and rebuild on change
    Dev(dev::DevArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Build(args) => output::print_result(build::run(args)),
        Commands::Stage(args) => output::print_result(stage::run(args)),
        Commands::Deploy(args) => output::print_result(deploy::run(args)),
        Commands::Clean(args) => output::print_result(clean::run(args)),
        Commands::Dev(args) => output::print_result(dev::run(args)),
    };

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
