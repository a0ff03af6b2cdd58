//! Delegated external transforms.
//!
//! Every compiler, minifier, and bundler is an opaque command with a
//! (files-in, files-out) contract: render its template, run it through the
//! shell, and treat a non-zero exit as a fatal pipeline error carrying the
//! tail of the tool's output. Shell execution is required here by design —
//! tool commands chain with `&&` and rely on PATH lookups via `npx`.

use crate::error::{Error, Result};
use crate::pipeline::PipelineContext;
use crate::ssh::execute_local_command_in_dir;
use crate::utils::template;

/// Built-in command templates, overridable per tool id through the
/// `tools` map in `shipwright.json`.
const DEFAULT_TOOLS: &[(&str, &str)] = &[
    ("scripts", "npx tsc -p tsconfig.json --outDir {{buildDir}}"),
    ("styles", "npx sass --no-source-map {{appDir}}:{{buildDir}}/app"),
    ("stylesFile", "npx sass --no-source-map {{input}} {{output}}"),
    (
        "minifyHtml",
        "npx html-minifier --collapse-whitespace --remove-comments --case-sensitive -o {{output}} {{input}}",
    ),
    (
        "minifyCss",
        "npx cleancss --compatibility ie8 -o {{output}} {{input}}",
    ),
    (
        "inline",
        "npx ng2-inline-template --base {{releaseDir}} {{releaseDir}}/app",
    ),
    (
        "bundle",
        "npx rollup {{input}} --format iife --name App --file {{output}} -p node-resolve -p commonjs",
    ),
    (
        "compressBundle",
        "npx babel {{input}} --presets es2015 -o {{input}} && npx terser {{input}} -o {{input}} --compress --mangle",
    ),
];

/// Resolve the command template for a tool id.
pub fn tool_template(ctx: &PipelineContext, id: &str) -> Result<String> {
    if let Some(custom) = ctx.config.tools.get(id) {
        return Ok(custom.clone());
    }
    DEFAULT_TOOLS
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, template)| template.to_string())
        .ok_or_else(|| {
            Error::validation_invalid_argument(
                "tool",
                format!("No command template registered for tool '{}'", id),
                Some(id.to_string()),
                None,
            )
        })
}

/// Run a tool with the layout variables plus per-invocation extras.
pub fn run_tool(ctx: &PipelineContext, id: &str, extra: &[(&str, &str)]) -> Result<()> {
    let template_str = tool_template(ctx, id)?;

    let app_dir = ctx.layout.app().to_string_lossy().to_string();
    let build_dir = ctx.layout.build().to_string_lossy().to_string();
    let release_dir = ctx.layout.release().to_string_lossy().to_string();
    let dist_dir = ctx.layout.dist().to_string_lossy().to_string();
    let config_dir = ctx.layout.config_dir().to_string_lossy().to_string();

    let mut vars: Vec<(&str, &str)> = vec![
        (template::TemplateVars::APP_DIR, app_dir.as_str()),
        (template::TemplateVars::BUILD_DIR, build_dir.as_str()),
        (template::TemplateVars::RELEASE_DIR, release_dir.as_str()),
        (template::TemplateVars::DIST_DIR, dist_dir.as_str()),
        (template::TemplateVars::CONFIG_DIR, config_dir.as_str()),
    ];
    vars.extend_from_slice(extra);

    let command = template::render(&template_str, &vars);
    log_status!("tool", "{}> {}", id, command);

    let root = ctx.layout.root.to_string_lossy().to_string();
    let output = execute_local_command_in_dir(&command, Some(&root));

    if output.success {
        Ok(())
    } else {
        Err(Error::tool_failed(
            id,
            command,
            output.exit_code,
            output_tail(&output.stdout, &output.stderr),
        ))
    }
}

/// Last lines of tool output for error context (prefers stderr).
fn output_tail(stdout: &str, stderr: &str) -> String {
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let tail: Vec<&str> = text.lines().rev().take(15).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::context_in;
    use tempfile::TempDir;

    #[test]
    fn custom_template_overrides_default() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context_in(dir.path());
        ctx.config
            .tools
            .insert("scripts".to_string(), "true".to_string());
        assert_eq!(tool_template(&ctx, "scripts").unwrap(), "true");
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = context_in(dir.path());
        let err = tool_template(&ctx, "nope").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn run_tool_succeeds_on_zero_exit() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context_in(dir.path());
        ctx.config
            .tools
            .insert("scripts".to_string(), "true".to_string());
        run_tool(&ctx, "scripts", &[]).unwrap();
    }

    #[test]
    fn run_tool_surfaces_failure_with_output_tail() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context_in(dir.path());
        ctx.config.tools.insert(
            "scripts".to_string(),
            "echo compile blew up >&2; exit 2".to_string(),
        );
        let err = run_tool(&ctx, "scripts", &[]).unwrap_err();
        assert_eq!(err.code.as_str(), "tool.failed");
        assert!(err.message.contains("compile blew up"));
        assert_eq!(err.details["exitCode"], 2);
    }

    #[test]
    fn output_tail_prefers_stderr() {
        assert_eq!(output_tail("out", "err"), "err");
        assert_eq!(output_tail("out", "  "), "out");
    }
}
