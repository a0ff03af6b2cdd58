//! Cache-bust stamping: timestamped asset names and entry-document rewriting.
//!
//! One timestamp is captured per pipeline invocation and shared by every
//! renamed asset and every rewritten URL, so a release is internally
//! consistent and client caches are invalidated wholesale.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::pipeline::PipelineContext;
use crate::transform;
use crate::utils::fsx;

/// Milliseconds since epoch, captured once per run.
pub fn timestamp_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Assets the rewritten entry document will reference. If either is absent
/// before renaming, the stamp step must fail rather than leave the HTML
/// pointing at nothing.
const REQUIRED_ASSETS: &[&str] = &["app/main.css", "lib/helpers.min.js"];

/// Helper bundles live under `lib/`; everything else under `app/`.
const LIB_BASENAMES: &[&str] = &["helpers.min"];

#[derive(Debug, Clone, Serialize)]
pub struct StampedAsset {
    pub from: String,
    pub to: String,
}

/// Rename built CSS/JS assets in the release tree to `<name>.<T>.<ext>`.
pub fn stamp_assets(ctx: &PipelineContext) -> Result<Vec<StampedAsset>> {
    let release = ctx.layout.release();

    for required in REQUIRED_ASSETS {
        if !release.join(required).exists() {
            return Err(Error::asset_missing(*required, "stamp"));
        }
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    for pattern in ["app/*.css", "app/*.js", "lib/*.js"] {
        let full = release.join(pattern);
        let matches = glob::glob(&full.to_string_lossy()).map_err(|e| {
            Error::internal_unexpected(format!("Invalid stamp glob '{}': {}", pattern, e))
        })?;
        for entry in matches.flatten() {
            if entry.is_file() {
                candidates.push(entry);
            }
        }
    }
    candidates.sort();

    let mut stamped = Vec::with_capacity(candidates.len());
    for path in candidates {
        let target = stamped_path(&release, &path, ctx.timestamp)?;
        fsx::rename_file(&path, &target, "stamp assets")?;
        stamped.push(StampedAsset {
            from: fsx::relative_unix_path(&release, &path)?,
            to: fsx::relative_unix_path(&release, &target)?,
        });
    }

    log_status!("stamp", "Stamped {} assets with {}", stamped.len(), ctx.timestamp);
    Ok(stamped)
}

/// `release/app/main.css` + T -> `release/app/main.<T>.css`; helper bundles
/// are routed to the `lib/` segment, all other assets to `app/`.
fn stamped_path(release: &Path, path: &Path, timestamp: i64) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::internal_unexpected(format!("Unnamed asset: {}", path.display())))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            Error::internal_unexpected(format!("Asset without extension: {}", path.display()))
        })?;

    let segment = if LIB_BASENAMES.contains(&stem) { "lib" } else { "app" };
    Ok(release
        .join(segment)
        .join(format!("{}.{}.{}", stem, timestamp, ext)))
}

/// Replacement content for each named placeholder block in the entry
/// document. Pure over its inputs so the mapping is testable without
/// invoking any delegated tool.
pub fn placeholder_map(
    timestamp: i64,
    root_dir: &str,
    critical_css: &str,
    critical_html: &str,
) -> Vec<(String, String)> {
    vec![
        (
            "js".to_string(),
            format!(
                "<script>var currentDateTimeStamp = {};</script><script src=\"lib/helpers.min.{}.js\" async></script>",
                timestamp, timestamp
            ),
        ),
        (
            "css".to_string(),
            format!(
                "<link rel=\"stylesheet\" type=\"text/css\" href=\"/app/main.{}.css\"/>",
                timestamp
            ),
        ),
        (
            "analytics".to_string(),
            format!(
                "<script src=\"/api/www/services/content/public/analytics.{}.js\" async defer></script>",
                timestamp
            ),
        ),
        (
            "criticalCss".to_string(),
            format!("<style>{}</style>", critical_css),
        ),
        (
            "criticalHtml".to_string(),
            format!("<?php $rootDir = \"{}\"; ?>{}", root_dir, critical_html),
        ),
    ]
}

/// Replace `<!-- build:NAME --> ... <!-- endbuild -->` blocks. A block
/// naming a placeholder with no registered replacement is a fatal error.
pub fn replace_placeholders(html: &str, replacements: &[(String, String)]) -> Result<String> {
    let pattern = Regex::new(r"(?s)<!--\s*build:(\w+)\s*-->.*?<!--\s*endbuild\s*-->")
        .map_err(|e| Error::internal_unexpected(format!("Invalid placeholder regex: {}", e)))?;

    let mut unknown: Option<String> = None;
    let rewritten = pattern.replace_all(html, |caps: &regex::Captures| {
        let name = &caps[1];
        match replacements.iter().find(|(key, _)| key == name) {
            Some((_, replacement)) => replacement.clone(),
            None => {
                if unknown.is_none() {
                    unknown = Some(name.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    if let Some(name) = unknown {
        return Err(Error::validation_invalid_argument(
            "placeholder",
            format!("Entry document names unknown placeholder '{}'", name),
            Some(name.clone()),
            None,
        ));
    }

    Ok(rewritten.into_owned())
}

/// Rewrite the release entry document: compile and inline the critical
/// fragments, then substitute every placeholder block with its
/// timestamped replacement.
pub fn rewrite_entry(ctx: &PipelineContext) -> Result<()> {
    let index = ctx.layout.release_index();
    if !index.exists() {
        return Err(Error::asset_missing("index.html", "stamp"));
    }

    let critical_css = compile_critical_css(ctx)?;
    let critical_html = minify_critical_html(ctx)?;

    let html = fsx::read_file(&index, "rewrite entry document")?;
    let replacements = placeholder_map(
        ctx.timestamp,
        &ctx.config.root_dir,
        &critical_css,
        &critical_html,
    );
    let rewritten = replace_placeholders(&html, &replacements)?;
    fsx::write_file(&index, &rewritten, "rewrite entry document")?;

    log_status!("stamp", "Rewrote entry document references");
    Ok(())
}

/// Compile `config/critical.scss` through the styles tool and return the
/// resulting CSS for inlining.
fn compile_critical_css(ctx: &PipelineContext) -> Result<String> {
    let source = ctx.layout.config_dir().join("critical.scss");
    if !source.exists() {
        return Err(Error::asset_missing("config/critical.scss", "stamp"));
    }

    let output = ctx.layout.build().join("critical.css");
    fsx::ensure_dir(&ctx.layout.build(), "compile critical css")?;
    transform::run_tool(
        ctx,
        "stylesFile",
        &[
            ("input", &source.to_string_lossy()),
            ("output", &output.to_string_lossy()),
        ],
    )?;
    fsx::read_file(&output, "compile critical css")
}

/// Minify `config/critical.html` through the HTML minifier and return the
/// resulting markup for inlining.
fn minify_critical_html(ctx: &PipelineContext) -> Result<String> {
    let source = ctx.layout.config_dir().join("critical.html");
    if !source.exists() {
        return Err(Error::asset_missing("config/critical.html", "stamp"));
    }

    let output = ctx.layout.build().join("critical.min.html");
    fsx::ensure_dir(&ctx.layout.build(), "minify critical html")?;
    transform::run_tool(
        ctx,
        "minifyHtml",
        &[
            ("input", &source.to_string_lossy()),
            ("output", &output.to_string_lossy()),
        ],
    )?;
    fsx::read_file(&output, "minify critical html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::context_in;
    use std::fs;
    use tempfile::TempDir;

    const T: i64 = 1700000000000;

    fn seed_release(root: &Path) {
        fs::create_dir_all(root.join("release/app")).unwrap();
        fs::create_dir_all(root.join("release/lib")).unwrap();
        fs::write(root.join("release/app/main.js"), "js").unwrap();
        fs::write(root.join("release/app/main.css"), "css").unwrap();
        fs::write(root.join("release/lib/helpers.min.js"), "helpers").unwrap();
    }

    #[test]
    fn stamps_assets_with_shared_timestamp() {
        let dir = TempDir::new().unwrap();
        seed_release(dir.path());
        let ctx = context_in(dir.path());

        let stamped = stamp_assets(&ctx).unwrap();

        let release = dir.path().join("release");
        assert!(release.join("app/main.1700000000000.js").exists());
        assert!(release.join("app/main.1700000000000.css").exists());
        assert!(release.join("lib/helpers.min.1700000000000.js").exists());
        assert!(!release.join("app/main.js").exists());
        assert_eq!(stamped.len(), 3);
    }

    #[test]
    fn missing_expected_asset_fails_loudly() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("release/app")).unwrap();
        fs::create_dir_all(dir.path().join("release/lib")).unwrap();
        fs::write(dir.path().join("release/app/main.css"), "css").unwrap();
        // helpers.min.js intentionally absent
        let ctx = context_in(dir.path());

        let err = stamp_assets(&ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "asset.missing");
        assert!(err.message.contains("helpers.min.js"));
    }

    #[test]
    fn placeholder_map_embeds_timestamp_literal() {
        let map = placeholder_map(T, "/var/www/app/", ".critical{}", "<div></div>");
        let js = &map.iter().find(|(k, _)| k == "js").unwrap().1;
        assert!(js.contains("<script>var currentDateTimeStamp = 1700000000000;</script>"));
        assert!(js.contains("lib/helpers.min.1700000000000.js"));

        let css = &map.iter().find(|(k, _)| k == "css").unwrap().1;
        assert_eq!(
            css,
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"/app/main.1700000000000.css\"/>"
        );
    }

    #[test]
    fn replaces_all_known_placeholders() {
        let html = "<html><head>\n<!-- build:css -->\n<link href=\"dev.css\">\n<!-- endbuild -->\n</head><body>\n<!-- build:js --><script src=\"dev.js\"></script><!-- endbuild -->\n</body></html>";
        let map = placeholder_map(T, "/srv/app/", "", "");
        let out = replace_placeholders(html, &map).unwrap();

        assert!(out.contains("<script>var currentDateTimeStamp = 1700000000000;</script>"));
        assert!(out.contains("/app/main.1700000000000.css"));
        assert!(!out.contains("dev.css"));
        assert!(!out.contains("build:"));
    }

    #[test]
    fn unknown_placeholder_is_fatal() {
        let html = "<!-- build:mystery -->x<!-- endbuild -->";
        let map = placeholder_map(T, "/srv/app/", "", "");
        let err = replace_placeholders(html, &map).unwrap_err();
        assert!(err.message.contains("mystery"));
    }

    #[test]
    fn critical_fragments_are_inlined_verbatim() {
        let map = placeholder_map(T, "/var/www/app/", "body{margin:0}", "<header>Hi</header>");
        let css = &map.iter().find(|(k, _)| k == "criticalCss").unwrap().1;
        assert_eq!(css, "<style>body{margin:0}</style>");

        let html = &map.iter().find(|(k, _)| k == "criticalHtml").unwrap().1;
        assert_eq!(
            html,
            "<?php $rootDir = \"/var/www/app/\"; ?><header>Hi</header>"
        );
    }
}
