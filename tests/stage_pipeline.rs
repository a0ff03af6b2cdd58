//! End-to-end run of the `stage` runbook against a fixture project.
//!
//! External tools are replaced with shell stubs that honor the same
//! (files-in, files-out) contract, so the pipeline's own sequencing,
//! filtering, stamping, and archiving are exercised for real.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use shipwright::config::{AppConfig, FilterConfig, Layout, SshConfig};
use shipwright::pipeline::{self, PipelineContext};

const T1: i64 = 1700000000000;
const T2: i64 = 1700000000001;

/// Copy through a temp file so the same command works in-place
/// (input == output) and across files.
const COPY_TOOL: &str = "cp {{input}} {{input}}.stagetmp && mv {{input}}.stagetmp {{output}}";

fn stub_tools() -> HashMap<String, String> {
    let mut tools = HashMap::new();
    tools.insert(
        "scripts".to_string(),
        "mkdir -p build/app && printf 'var app;' > build/app/main.js".to_string(),
    );
    tools.insert(
        "styles".to_string(),
        "mkdir -p build/app && printf 'body{color:red}' > build/app/main.css".to_string(),
    );
    tools.insert("stylesFile".to_string(), COPY_TOOL.to_string());
    tools.insert("minifyHtml".to_string(), COPY_TOOL.to_string());
    tools.insert("minifyCss".to_string(), COPY_TOOL.to_string());
    tools.insert("inline".to_string(), "true".to_string());
    tools.insert("bundle".to_string(), "true".to_string());
    tools.insert("compressBundle".to_string(), "true".to_string());
    tools
}

fn context(root: &Path, timestamp: i64) -> PipelineContext {
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
                "node_modules/runtime/shim.min.js".to_string(),
                "node_modules/loader/system.src.js".to_string(),
            ],
            loader_config: "config/systemjs.config.js".to_string(),
            strip_dirs: vec![
                "app/components".to_string(),
                "app/models".to_string(),
                "app/services".to_string(),
                "config".to_string(),
            ],
            strip_files: vec!["app/config.js".to_string()],
            tools: stub_tools(),
        },
        layout: Layout::new(root),
        timestamp,
    }
}

fn seed_project(root: &Path) {
    fs::create_dir_all(root.join("app/components")).unwrap();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("node_modules/runtime")).unwrap();
    fs::create_dir_all(root.join("node_modules/loader")).unwrap();
    fs::create_dir_all(root.join("api/www")).unwrap();

    fs::write(
        root.join("index.html"),
        concat!(
            "<html><head>\n",
            "<!-- build:criticalCss --><!-- endbuild -->\n",
            "<!-- build:css --><link href=\"app/main.css\"><!-- endbuild -->\n",
            "</head><body>\n",
            "<!-- build:criticalHtml --><!-- endbuild -->\n",
            "<!-- build:js --><script src=\"app/main.js\"></script><!-- endbuild -->\n",
            "<!-- build:analytics --><!-- endbuild -->\n",
            "</body></html>\n",
        ),
    )
    .unwrap();
    fs::write(root.join("app/components/menu.html"), "<nav></nav>").unwrap();
    fs::write(root.join("app/.htaccess"), "RewriteEngine On").unwrap();
    fs::write(root.join("config/critical.scss"), "header{display:block}").unwrap();
    fs::write(root.join("config/critical.html"), "<header></header>").unwrap();
    fs::write(root.join("config/systemjs.config.js"), "System.config({});").unwrap();
    fs::write(root.join("node_modules/runtime/shim.min.js"), "shim;").unwrap();
    fs::write(root.join("node_modules/loader/system.src.js"), "loader;").unwrap();
    fs::write(root.join("api/www/index.php"), "<?php").unwrap();
}

#[test]
fn stage_produces_a_stamped_release_archive() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_project(dir.path());

    let ctx = context(dir.path(), T1);
    pipeline::run_stage(&ctx).unwrap();

    let release = dir.path().join("release");

    // stamped assets, helper bundle under lib/
    assert!(release.join("app/main.1700000000000.js").exists());
    assert!(release.join("app/main.1700000000000.css").exists());
    assert!(release.join("lib/helpers.min.1700000000000.js").exists());
    assert!(!release.join("app/main.js").exists());

    // helpers bundle concatenated vendor runtimes plus the loader config
    let helpers =
        fs::read_to_string(release.join("lib/helpers.min.1700000000000.js")).unwrap();
    assert_eq!(helpers, "shim;\nloader;\nSystem.config({});\n");

    // entry document rewritten with the shared timestamp
    let index = fs::read_to_string(release.join("index.html")).unwrap();
    assert!(index.contains("<script>var currentDateTimeStamp = 1700000000000;</script>"));
    assert!(index.contains("lib/helpers.min.1700000000000.js"));
    assert!(index.contains("/app/main.1700000000000.css"));
    assert!(index.contains("<style>header{display:block}</style>"));
    assert!(index.contains("<?php $rootDir = \"/var/www/app/\"; ?><header></header>"));
    assert!(!index.contains("build:"));

    // dev-only sources and pre-bundling runtimes are stripped
    assert!(!release.join("app/components").exists());
    assert!(!release.join("config").exists());
    assert!(!release.join("lib/shim.min.js").exists());
    assert!(release.join("lib/.htaccess").exists());
    assert!(release.join("app/.htaccess").exists());

    // server-side tree ships untouched
    assert!(release.join("api/www/index.php").exists());

    // archive named by the run's timestamp
    assert!(dir.path().join("dist/release-1700000000000.tar.gz").exists());
}

#[test]
fn staging_twice_keeps_both_archives() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_project(dir.path());

    pipeline::run_stage(&context(dir.path(), T1)).unwrap();
    pipeline::run_stage(&context(dir.path(), T2)).unwrap();

    let dist = dir.path().join("dist");
    assert!(dist.join("release-1700000000000.tar.gz").exists());
    assert!(dist.join("release-1700000000001.tar.gz").exists());
}

#[test]
fn stage_fails_loudly_when_a_transform_breaks() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_project(dir.path());

    let mut ctx = context(dir.path(), T1);
    ctx.config.tools.insert(
        "scripts".to_string(),
        "echo 'TS1005: unexpected token' >&2; exit 1".to_string(),
    );

    let err = pipeline::run_stage(&ctx).unwrap_err();
    assert_eq!(err.code.as_str(), "pipeline.task_failed");
    assert!(err.message.contains("compile-scripts"));
    assert!(err.message.contains("TS1005"));

    // nothing was packaged
    assert!(!dir.path().join("dist").exists());
}
