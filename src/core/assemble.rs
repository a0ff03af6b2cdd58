//! Build-tree assembly: copy steps that gather sources, vendor runtimes,
//! and static files into `build/` alongside the compiled output.

use std::path::Path;

use crate::error::{Error, Result};
use crate::pipeline::PipelineContext;
use crate::utils::fsx;

/// Copy HTML sources into the build tree: everything under the project
/// except build output, dependencies, and the server-side tree, plus the
/// auth file and the site-verification document named by `googleKey`.
pub fn copy_html(ctx: &PipelineContext) -> Result<()> {
    let root = &ctx.layout.root;
    let build = ctx.layout.build();
    fsx::ensure_dir(&build, "copy html")?;

    let skip_dirs = ["build", "release", "dist", "node_modules", "api"];
    let mut copied = 0usize;

    for path in html_sources(root, &skip_dirs)? {
        let relative = fsx::relative_unix_path(root, &path)?;
        fsx::copy_file(&path, &build.join(&relative), "copy html")?;
        copied += 1;
    }

    let htaccess = root.join(".htaccess");
    if htaccess.exists() {
        fsx::copy_file(&htaccess, &build.join(".htaccess"), "copy html")?;
        copied += 1;
    }

    if let Some(key) = &ctx.config.google_key {
        let verification = root.join(format!("{}.html", key));
        if !verification.exists() {
            return Err(Error::asset_missing(
                format!("{}.html", key),
                "copy-html",
            ));
        }
        fsx::copy_file(
            &verification,
            &build.join(format!("{}.html", key)),
            "copy html",
        )?;
        copied += 1;
    }

    log_status!("build", "Copied {} HTML files", copied);
    Ok(())
}

fn html_sources(root: &Path, skip_dirs: &[&str]) -> Result<Vec<std::path::PathBuf>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(root)
        .map_err(|e| Error::internal_io(e.to_string(), Some("copy html".to_string())))?
    {
        let entry =
            entry.map_err(|e| Error::internal_io(e.to_string(), Some("copy html".to_string())))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if path.is_dir() {
            if skip_dirs.contains(&name.as_str()) {
                continue;
            }
            for file in fsx::walk_files(&path)? {
                if file.extension().and_then(|e| e.to_str()) == Some("html") {
                    sources.push(file);
                }
            }
        } else if name.ends_with(".html") {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Copy the configured vendor runtime scripts into `build/lib`.
pub fn copy_vendor(ctx: &PipelineContext) -> Result<()> {
    let lib = ctx.layout.build().join("lib");
    fsx::ensure_dir(&lib, "copy vendor")?;

    for script in &ctx.config.vendor_scripts {
        let source = ctx.layout.root.join(script);
        if !source.exists() {
            return Err(Error::asset_missing(script.clone(), "copy-vendor"));
        }
        let name = source
            .file_name()
            .ok_or_else(|| Error::internal_unexpected(format!("Unnamed vendor script: {}", script)))?;
        fsx::copy_file(&source, &lib.join(name), "copy vendor")?;
    }

    log_status!("build", "Copied {} vendor scripts", ctx.config.vendor_scripts.len());
    Ok(())
}

/// Copy the module-loader config into `build/config`.
pub fn copy_config(ctx: &PipelineContext) -> Result<()> {
    let source = ctx.layout.root.join(&ctx.config.loader_config);
    if !source.exists() {
        return Err(Error::asset_missing(ctx.config.loader_config.clone(), "copy-config"));
    }
    let name = source
        .file_name()
        .ok_or_else(|| Error::internal_unexpected("Unnamed loader config".to_string()))?;
    fsx::copy_file(
        &source,
        &ctx.layout.build().join("config").join(name),
        "copy config",
    )
}

/// Copy the server-side `api/` tree into `build/api`, minus container and
/// web-server plumbing that never ships.
pub fn copy_api(ctx: &PipelineContext) -> Result<()> {
    let api = ctx.layout.api();
    if !api.exists() {
        return Ok(());
    }

    let skip = ["Dockerfile", "start", "apache-config.conf"];
    let target = ctx.layout.build().join("api");

    for file in fsx::walk_files(&api)? {
        let relative = fsx::relative_unix_path(&api, &file)?;
        if skip.contains(&relative.as_str()) {
            continue;
        }
        fsx::copy_file(&file, &target.join(&relative), "copy api")?;
    }

    Ok(())
}

/// Copy app icons, favicon, and web manifest files into the build tree.
pub fn copy_static(ctx: &PipelineContext) -> Result<()> {
    let root = &ctx.layout.root;
    let build = ctx.layout.build();

    let icons = root.join("app-icons");
    if icons.exists() {
        for file in fsx::walk_files(&icons)? {
            let relative = fsx::relative_unix_path(&icons, &file)?;
            fsx::copy_file(&file, &build.join("app-icons").join(&relative), "copy static")?;
        }
    }

    for name in ["favicon.ico", "browserconfig.xml", "manifest.json"] {
        let source = root.join(name);
        if source.exists() {
            fsx::copy_file(&source, &build.join(name), "copy static")?;
        }
    }

    Ok(())
}
