//! One module per CLI entry point. Runners return `CmdResult<T>`: the
//! serializable payload plus the process exit code; `main` wraps it in the
//! JSON envelope.

use std::path::PathBuf;

use shipwright::pipeline::PipelineContext;

pub mod build;
pub mod clean;
pub mod deploy;
pub mod dev;
pub mod stage;

pub type CmdResult<T> = shipwright::Result<(T, i32)>;

/// Resolve the working directory and load the pipeline context from the
/// fixed configuration file.
pub fn load_context() -> shipwright::Result<PipelineContext> {
    let cwd: PathBuf = std::env::current_dir().map_err(|e| {
        shipwright::Error::internal_io(e.to_string(), Some("resolve working directory".to_string()))
    })?;
    PipelineContext::load(&cwd)
}
