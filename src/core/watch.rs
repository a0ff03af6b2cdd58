//! Watch mode: poll the source tree and re-run the matching build tasks
//! when files change.
//!
//! A failing rebuild is logged and watching continues; the next save gets
//! another chance.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::error::Result;
use crate::pipeline::{self, PipelineContext};
use crate::utils::fsx;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Source kinds and the tasks a change to each re-runs.
const WATCHES: &[(&str, &[&str], &[&str])] = &[
    ("scripts", &["ts"], &["compile-scripts"]),
    ("styles", &["scss"], &["styles"]),
    ("markup", &["html"], &["copy-html"]),
];

type Snapshot = HashMap<PathBuf, SystemTime>;

/// Mtimes of everything under `app/` plus the entry document.
fn snapshot(ctx: &PipelineContext) -> Result<Snapshot> {
    let mut snap = Snapshot::new();

    let app = ctx.layout.app();
    if app.exists() {
        for file in fsx::walk_files(&app)? {
            if let Ok(modified) = file.metadata().and_then(|m| m.modified()) {
                snap.insert(file, modified);
            }
        }
    }

    let index = ctx.layout.index_html();
    if let Ok(modified) = index.metadata().and_then(|m| m.modified()) {
        snap.insert(index, modified);
    }

    Ok(snap)
}

/// Watch kinds touched by the difference between two snapshots (changed,
/// added, or removed files).
fn changed_kinds(previous: &Snapshot, next: &Snapshot) -> Vec<&'static str> {
    let mut kinds = Vec::new();

    let mut touched: Vec<&PathBuf> = Vec::new();
    for (path, modified) in next {
        if previous.get(path) != Some(modified) {
            touched.push(path);
        }
    }
    for path in previous.keys() {
        if !next.contains_key(path) {
            touched.push(path);
        }
    }

    for (name, extensions, _) in WATCHES {
        let hit = touched.iter().any(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.contains(&ext))
                .unwrap_or(false)
        });
        if hit && !kinds.contains(name) {
            kinds.push(*name);
        }
    }

    kinds
}

fn tasks_for(kind: &str) -> &'static [&'static str] {
    WATCHES
        .iter()
        .find(|(name, _, _)| *name == kind)
        .map(|(_, _, tasks)| *tasks)
        .unwrap_or(&[])
}

/// Initial build, then poll until the process is interrupted.
pub fn run(ctx: &PipelineContext) -> Result<()> {
    pipeline::run_tasks(ctx, &["build"])?;
    log_status!("dev", "Watching {} for changes", ctx.layout.app().display());

    let mut previous = snapshot(ctx)?;
    loop {
        std::thread::sleep(POLL_INTERVAL);
        let next = snapshot(ctx)?;
        for kind in changed_kinds(&previous, &next) {
            log_status!("dev", "{} changed, rebuilding", kind);
            if let Err(err) = pipeline::run_tasks(ctx, tasks_for(kind)) {
                log_status!("dev", "Rebuild failed: {}", err);
            }
        }
        previous = next;
    }
}
