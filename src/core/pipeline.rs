//! Pipeline wiring: the shared run context, the full task graph, and the
//! `stage`/`deploy` runbooks.

use std::collections::HashSet;
use std::path::Path;

use crate::config::{AppConfig, Layout};
use crate::deployer;
use crate::error::Result;
use crate::graph::TaskGraph;
use crate::packager;
use crate::stamp;
use crate::transform;
use crate::assemble;

/// Everything a task action needs: the loaded configuration, the local
/// filesystem layout, and the run's single build timestamp.
pub struct PipelineContext {
    pub config: AppConfig,
    pub layout: Layout,
    /// Milliseconds since epoch, captured once per invocation and shared by
    /// every stamped asset and rewritten reference.
    pub timestamp: i64,
}

impl PipelineContext {
    /// Load configuration from the fixed file under `root` and capture the
    /// run timestamp.
    pub fn load(root: &Path) -> Result<Self> {
        Ok(Self {
            config: AppConfig::load(root)?,
            layout: Layout::new(root),
            timestamp: stamp::timestamp_now(),
        })
    }
}

/// The names `stage` runs, in order. `deploy` appends `ship` and `clean`.
pub const STAGE_STEPS: &[&str] = &[
    "build",
    "copy-release",
    "copy-htaccess",
    "minify-html",
    "minify-css",
    "inline-templates",
    "bundle",
    "concat-helpers",
    "compress-bundle",
    "strip-helpers",
    "strip-dev",
    "stamp",
    "compress",
];

pub const DEPLOY_STEPS: &[&str] = &["ship", "clean"];

/// Build the full task graph. The graph is an explicit object; callers pass
/// it to `run_tasks`/`run_runbook` rather than consulting a global registry.
pub fn build_graph() -> Result<TaskGraph<PipelineContext>> {
    let mut graph = TaskGraph::new();

    // --- build phase ---
    graph.task("compile-scripts", &[], |ctx: &PipelineContext| {
        transform::run_tool(ctx, "scripts", &[])
    })?;
    graph.task("styles", &[], |ctx: &PipelineContext| {
        transform::run_tool(ctx, "styles", &[])
    })?;
    graph.task("copy-html", &[], assemble::copy_html)?;
    graph.task("copy-vendor", &[], assemble::copy_vendor)?;
    graph.task("copy-config", &[], assemble::copy_config)?;
    graph.task("copy-api", &[], assemble::copy_api)?;
    graph.task("copy-static", &[], assemble::copy_static)?;
    graph.task(
        "copy",
        &["copy-html", "copy-vendor", "copy-config", "copy-api", "copy-static"],
        |_| Ok(()),
    )?;
    graph.task("build", &["compile-scripts", "copy", "styles"], |_| Ok(()))?;

    // --- stage phase ---
    graph.task("copy-release", &[], packager::copy_build_to_release)?;
    graph.task("copy-htaccess", &[], packager::copy_htaccess)?;
    graph.task("minify-html", &[], packager::minify_html)?;
    graph.task("minify-css", &[], packager::minify_css)?;
    graph.task("inline-templates", &[], |ctx: &PipelineContext| {
        transform::run_tool(ctx, "inline", &[])
    })?;
    graph.task("bundle", &[], |ctx: &PipelineContext| {
        let entry = ctx.layout.release().join("app/main.js");
        let path = entry.to_string_lossy();
        transform::run_tool(ctx, "bundle", &[("input", &path), ("output", &path)])
    })?;
    graph.task("concat-helpers", &[], packager::concat_helpers)?;
    graph.task("compress-bundle", &["concat-helpers"], |ctx: &PipelineContext| {
        for target in ["app/main.js", "lib/helpers.min.js"] {
            let path = ctx.layout.release().join(target);
            let path = path.to_string_lossy();
            transform::run_tool(ctx, "compressBundle", &[("input", &path), ("output", &path)])?;
        }
        Ok(())
    })?;
    graph.task("strip-helpers", &[], packager::strip_helpers)?;
    graph.task("strip-dev", &[], packager::strip_dev)?;
    graph.task("stamp", &[], |ctx: &PipelineContext| {
        stamp::stamp_assets(ctx)?;
        stamp::rewrite_entry(ctx)
    })?;
    graph.task("compress", &[], packager::compress_release)?;

    // --- deploy phase ---
    graph.task("ship", &[], |ctx: &PipelineContext| {
        deployer::ship(ctx).map(|_| ())
    })?;
    graph.task("clean", &[], packager::clean)?;

    Ok(graph)
}

/// Run a set of task names (plus dependencies) against a fresh completed
/// set. Returns the executed names in completion order.
pub fn run_tasks(ctx: &PipelineContext, names: &[&str]) -> Result<Vec<String>> {
    let graph = build_graph()?;
    let mut completed = HashSet::new();
    graph.run(names, ctx, &mut completed)
}

/// Execute a runbook: each entry in order, one shared completed set, so a
/// later entry never re-runs what an earlier entry already executed.
pub fn run_runbook(ctx: &PipelineContext, steps: &[&str]) -> Result<Vec<String>> {
    let graph = build_graph()?;
    let mut completed = HashSet::new();
    let mut executed = Vec::new();

    for step in steps {
        log_status!("pipeline", "==> {}", step);
        executed.extend(graph.run(&[step], ctx, &mut completed)?);
    }

    Ok(executed)
}

/// The `stage` runbook: build and package, no transfer.
pub fn run_stage(ctx: &PipelineContext) -> Result<Vec<String>> {
    run_runbook(ctx, STAGE_STEPS)
}

/// The `deploy` runbook: stage, then transfer + swap + local cleanup.
pub fn run_deploy(ctx: &PipelineContext) -> Result<Vec<String>> {
    let steps: Vec<&str> = STAGE_STEPS.iter().chain(DEPLOY_STEPS).copied().collect();
    run_runbook(ctx, &steps)
}

/// Archive path produced by this run, as a display string.
pub fn archive_path(ctx: &PipelineContext) -> String {
    ctx.layout.archive(ctx.timestamp).display().to_string()
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::config::{FilterConfig, SshConfig};
    use std::collections::HashMap;

    pub fn context_with_timestamp(root: &Path, timestamp: i64) -> PipelineContext {
        PipelineContext {
            config: AppConfig {
                ssh: SshConfig {
                    host: "localhost".to_string(),
                    user: "tester".to_string(),
                    port: 22,
                    identity_file: None,
                },
                root_dir: "/var/www/app/".to_string(),
                google_key: None,
                filter: FilterConfig::default(),
                vendor_scripts: vec![
                    "node_modules/a/shim.js".to_string(),
                    "node_modules/b/loader.js".to_string(),
                ],
                loader_config: "config/systemjs.config.js".to_string(),
                strip_dirs: vec![
                    "app/components".to_string(),
                    "app/models".to_string(),
                    "app/services".to_string(),
                    "config".to_string(),
                ],
                strip_files: vec!["app/config.js".to_string()],
                tools: HashMap::new(),
            },
            layout: Layout::new(root),
            timestamp,
        }
    }

    pub fn context_in(root: &Path) -> PipelineContext {
        context_with_timestamp(root, 1700000000000)
    }
}
