//! Project configuration and filesystem layout contract.
//!
//! Configuration lives in a single fixed file, `shipwright.json`, at the
//! project root. Fields use camelCase on disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::fsx;

pub const CONFIG_FILE: &str = "shipwright.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

/// Include/exclude globs applied when copying the build tree into the
/// release tree. Paths are matched relative to the build root, with
/// forward slashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub ssh: SshConfig,
    /// Remote release root. Normalized to always end with '/'.
    pub root_dir: String,
    /// Basename of the site-verification HTML file copied into the build.
    #[serde(default)]
    pub google_key: Option<String>,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Vendor runtime scripts copied into build/lib and later concatenated
    /// into the helpers bundle.
    #[serde(default = "default_vendor_scripts")]
    pub vendor_scripts: Vec<String>,
    /// Module-loader config concatenated into the helpers bundle and
    /// stripped from the release afterwards.
    #[serde(default = "default_loader_config")]
    pub loader_config: String,
    /// Release-relative directories removed by the strip-dev step.
    #[serde(default = "default_strip_dirs")]
    pub strip_dirs: Vec<String>,
    /// Release-relative files removed by the strip-dev step.
    #[serde(default = "default_strip_files")]
    pub strip_files: Vec<String>,
    /// Command template overrides per tool id (see `transform`).
    #[serde(default)]
    pub tools: HashMap<String, String>,
}

fn default_vendor_scripts() -> Vec<String> {
    vec![
        "node_modules/core-js/client/shim.min.js".to_string(),
        "node_modules/zone.js/dist/zone.js".to_string(),
        "node_modules/reflect-metadata/Reflect.js".to_string(),
        "node_modules/systemjs/dist/system.src.js".to_string(),
    ]
}

fn default_loader_config() -> String {
    "config/systemjs.config.js".to_string()
}

fn default_strip_dirs() -> Vec<String> {
    vec![
        "app/components".to_string(),
        "app/models".to_string(),
        "app/services".to_string(),
        "config".to_string(),
    ]
}

fn default_strip_files() -> Vec<String> {
    vec!["app/config.js".to_string()]
}

impl AppConfig {
    /// Load and validate the fixed config file under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Err(Error::config_missing_file(path.display().to_string()));
        }

        let content = fsx::read_file(&path, "load config")?;
        let mut config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

        config.validate()?;

        if !config.root_dir.ends_with('/') {
            config.root_dir.push('/');
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ssh.host.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "ssh.host",
                None,
                "Host must not be empty",
            ));
        }
        if self.ssh.user.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "ssh.user",
                None,
                "User must not be empty",
            ));
        }
        if self.root_dir.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "rootDir",
                None,
                "Remote root directory must not be empty",
            ));
        }
        Ok(())
    }
}

/// Local filesystem layout: sources under `app/`, build output under
/// `build/`, packaged output under `release/`, archives under `dist/`,
/// critical fragments under `config/`.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn app(&self) -> PathBuf {
        self.root.join("app")
    }

    pub fn build(&self) -> PathBuf {
        self.root.join("build")
    }

    pub fn release(&self) -> PathBuf {
        self.root.join("release")
    }

    pub fn dist(&self) -> PathBuf {
        self.root.join("dist")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn api(&self) -> PathBuf {
        self.root.join("api")
    }

    pub fn index_html(&self) -> PathBuf {
        self.root.join("index.html")
    }

    pub fn release_index(&self) -> PathBuf {
        self.release().join("index.html")
    }

    pub fn archive(&self, timestamp: i64) -> PathBuf {
        self.dist().join(archive_name(timestamp))
    }
}

/// Archive filename for one pipeline run.
pub fn archive_name(timestamp: i64) -> String {
    format!("release-{}.tar.gz", timestamp)
}
