//! Release packaging: filtered copy of the build tree, delegated
//! minification, helper concatenation, stripping, and archive creation.

use std::path::Path;

use glob_match::glob_match;

use crate::config::archive_name;
use crate::error::{Error, Result};
use crate::pipeline::PipelineContext;
use crate::ssh::execute_local_command_in_dir;
use crate::transform;
use crate::utils::fsx;
use crate::utils::shell;

/// Copy the build tree into the release tree, applying the configured
/// include/exclude glob filter. Dotfiles are included.
pub fn copy_build_to_release(ctx: &PipelineContext) -> Result<()> {
    let build = ctx.layout.build();
    if !build.exists() {
        return Err(Error::validation_invalid_argument(
            "build",
            "Build directory does not exist; run 'build' first",
            Some(build.display().to_string()),
            None,
        ));
    }

    let release = ctx.layout.release();
    fsx::ensure_dir(&release, "copy release")?;

    let mut copied = 0usize;
    for file in fsx::walk_files(&build)? {
        let relative = fsx::relative_unix_path(&build, &file)?;
        if !matches_filter(&relative, &ctx.config.filter.include, &ctx.config.filter.exclude) {
            continue;
        }
        fsx::copy_file(&file, &release.join(&relative), "copy release")?;
        copied += 1;
    }

    log_status!("stage", "Copied {} files into release", copied);
    Ok(())
}

fn matches_filter(relative: &str, include: &[String], exclude: &[String]) -> bool {
    let included = include.iter().any(|pattern| glob_match(pattern, relative));
    let excluded = exclude.iter().any(|pattern| glob_match(pattern, relative));
    included && !excluded
}

/// Copy the static auth file into both served segments of the release.
pub fn copy_htaccess(ctx: &PipelineContext) -> Result<()> {
    let source = ctx.layout.app().join(".htaccess");
    if !source.exists() {
        return Err(Error::asset_missing("app/.htaccess", "copy-htaccess"));
    }
    let release = ctx.layout.release();
    fsx::copy_file(&source, &release.join("app/.htaccess"), "copy htaccess")?;
    fsx::copy_file(&source, &release.join("lib/.htaccess"), "copy htaccess")?;
    Ok(())
}

/// Minify every HTML file in the release except the entry document and the
/// lib/api segments (the entry document is rewritten later; lib and api
/// ship as-is).
pub fn minify_html(ctx: &PipelineContext) -> Result<()> {
    minify_matching(ctx, "minifyHtml", "html", &["index.html"])
}

/// Minify every CSS file in the release except the lib/api segments.
pub fn minify_css(ctx: &PipelineContext) -> Result<()> {
    minify_matching(ctx, "minifyCss", "css", &[])
}

fn minify_matching(
    ctx: &PipelineContext,
    tool: &str,
    extension: &str,
    skip_files: &[&str],
) -> Result<()> {
    let release = ctx.layout.release();
    let mut minified = 0usize;

    for file in fsx::walk_files(&release)? {
        if file.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let relative = fsx::relative_unix_path(&release, &file)?;
        if relative.starts_with("lib/") || relative.starts_with("api/") {
            continue;
        }
        if skip_files.contains(&relative.as_str()) {
            continue;
        }
        let path = file.to_string_lossy();
        transform::run_tool(ctx, tool, &[("input", &path), ("output", &path)])?;
        minified += 1;
    }

    log_status!("stage", "Minified {} {} files", minified, extension);
    Ok(())
}

/// Concatenate the vendor runtime files and the module-loader config into
/// `release/lib/helpers.min.js`. Every source must be present: a missing
/// runtime would surface as a broken page, not a build error, if skipped.
pub fn concat_helpers(ctx: &PipelineContext) -> Result<()> {
    let release = ctx.layout.release();
    let mut sources = Vec::new();

    for script in &ctx.config.vendor_scripts {
        let name = Path::new(script)
            .file_name()
            .ok_or_else(|| Error::internal_unexpected(format!("Unnamed vendor script: {}", script)))?;
        sources.push(release.join("lib").join(name));
    }

    let loader = Path::new(&ctx.config.loader_config)
        .file_name()
        .ok_or_else(|| Error::internal_unexpected("Unnamed loader config".to_string()))?;
    sources.push(release.join("config").join(loader));

    let mut bundle = String::new();
    for source in &sources {
        if !source.exists() {
            let relative = fsx::relative_unix_path(&release, source)?;
            return Err(Error::asset_missing(relative, "concat-helpers"));
        }
        bundle.push_str(&fsx::read_file(source, "concat helpers")?);
        bundle.push('\n');
    }

    fsx::write_file(
        &release.join("lib/helpers.min.js"),
        &bundle,
        "concat helpers",
    )?;
    Ok(())
}

/// Delete the pre-bundling runtime files: everything in `lib/` except the
/// concatenated helpers bundle and the auth file, plus the module-loader
/// config directory.
pub fn strip_helpers(ctx: &PipelineContext) -> Result<()> {
    let lib = ctx.layout.release().join("lib");
    if lib.exists() {
        for file in fsx::walk_files(&lib)? {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if name == "helpers.min.js" || name == ".htaccess" {
                continue;
            }
            fsx::remove_file_if_exists(&file, "strip helpers")?;
        }
    }

    fsx::remove_dir_if_exists(&ctx.layout.release().join("config"), "strip helpers")
}

/// Delete dev-only source directories and files from the release tree.
pub fn strip_dev(ctx: &PipelineContext) -> Result<()> {
    let release = ctx.layout.release();

    for dir in &ctx.config.strip_dirs {
        fsx::remove_dir_if_exists(&release.join(dir), "strip dev")?;
    }
    for file in &ctx.config.strip_files {
        fsx::remove_file_if_exists(&release.join(file), "strip dev")?;
    }

    Ok(())
}

/// Pack the release tree into `dist/release-<T>.tar.gz`.
///
/// The archive is named by the run's timestamp, so a re-staged build never
/// overwrites an earlier archive; colliding with one is an error.
pub fn compress_release(ctx: &PipelineContext) -> Result<()> {
    let release = ctx.layout.release();
    if !release.exists() {
        return Err(Error::validation_invalid_argument(
            "release",
            "Release directory does not exist; run 'stage' first",
            Some(release.display().to_string()),
            None,
        ));
    }

    let archive = ctx.layout.archive(ctx.timestamp);
    if archive.exists() {
        return Err(Error::validation_invalid_argument(
            "archive",
            format!("Archive already exists: {}", archive.display()),
            Some(archive.display().to_string()),
            None,
        ));
    }
    fsx::ensure_dir(&ctx.layout.dist(), "compress release")?;

    let command = format!(
        "tar -czf {} -C {} .",
        shell::quote_path(&archive.to_string_lossy()),
        shell::quote_path(&release.to_string_lossy()),
    );
    let root = ctx.layout.root.to_string_lossy().to_string();
    let output = execute_local_command_in_dir(&command, Some(&root));
    if !output.success {
        return Err(Error::tool_failed(
            "tar",
            command,
            output.exit_code,
            output.stderr,
        ));
    }

    log_status!("stage", "Created {}", archive_name(ctx.timestamp));
    Ok(())
}

/// Remove all local pipeline output: build, release, and dist trees.
pub fn clean(ctx: &PipelineContext) -> Result<()> {
    fsx::remove_dir_if_exists(&ctx.layout.build(), "clean")?;
    fsx::remove_dir_if_exists(&ctx.layout.release(), "clean")?;
    fsx::remove_dir_if_exists(&ctx.layout.dist(), "clean")?;
    log_status!("clean", "Removed build, release, and dist directories");
    Ok(())
}
