//! Remote deployment: upload the release archive, extract it into a
//! timestamped slot, and atomically repoint the `current` symlink.
//!
//! The step sequence is strictly linear. Any failure aborts the remaining
//! steps and leaves the previous `current` target untouched — the symlink is
//! only touched by the swap step, and only after extraction has fully
//! succeeded. A remote lock directory makes the one-deploy-in-flight
//! invariant explicit instead of assumed.

use serde::Serialize;

use crate::config::archive_name;
use crate::error::{Error, Result};
use crate::pipeline::PipelineContext;
use crate::ssh::SshClient;
use crate::utils::shell;

const LOCK_NAME: &str = ".shipwright-deploy.lock";
const VIEW_PATH: &str = "api/www/services/content/resources/views";

/// One remote command, built from typed parts. Rendering quotes every
/// argument, so configured paths and timestamps cannot inject shell
/// operators.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    program: &'static str,
    args: Vec<String>,
}

impl RemoteCommand {
    pub fn new(program: &'static str) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn render(&self) -> String {
        let mut parts = vec![self.program.to_string()];
        parts.extend(self.args.iter().map(|a| shell::quote_arg(a)));
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub archive: String,
    pub remote_dir: String,
    pub current: String,
    pub view_path: String,
}

/// Transfer the archive for this run and swap the remote `current` symlink.
pub fn ship(ctx: &PipelineContext) -> Result<DeployReport> {
    let archive = ctx.layout.archive(ctx.timestamp);
    if !archive.exists() {
        return Err(Error::validation_invalid_argument(
            "archive",
            format!(
                "Archive not found: {}; run 'stage' first",
                archive.display()
            ),
            Some(archive.display().to_string()),
            None,
        ));
    }

    let client = SshClient::from_config(&ctx.config.ssh)?;
    let root = &ctx.config.root_dir;

    let lock = format!("{}{}", root, LOCK_NAME);
    let remote_archive = format!("{}{}", root, archive_name(ctx.timestamp));
    let remote_dir = format!("{}{}", root, ctx.timestamp);
    let current = format!("{}current", root);
    let current_next = format!("{}current.next", root);
    let view_dir = format!("{}/{}", remote_dir, VIEW_PATH);
    let view_file = format!("{}/index.php", view_dir);

    // The lock directory is created atomically; a second deploy in flight
    // sees EEXIST and stops here, before anything was transferred.
    let lock_output = client.execute(&RemoteCommand::new("mkdir").arg(lock.as_str()).render());
    if !lock_output.success {
        return Err(Error::remote_locked(lock));
    }

    let result = run_deploy_steps(
        ctx,
        &client,
        &archive.to_string_lossy(),
        &remote_archive,
        &remote_dir,
        &current,
        &current_next,
        &view_dir,
        &view_file,
    );

    // Release the lock on success and on failure alike; a stale lock would
    // block every later deploy.
    let unlock_output = client.execute(&RemoteCommand::new("rmdir").arg(lock.as_str()).render());
    if result.is_ok() && !unlock_output.success {
        return Err(Error::remote_command_failed(
            "unlock",
            format!("rmdir {}", lock),
            unlock_output.exit_code,
            unlock_output.stderr,
        ));
    }

    result?;

    log_status!("deploy", "current -> {}", remote_dir);
    Ok(DeployReport {
        archive: archive.display().to_string(),
        remote_dir,
        current,
        view_path: view_file,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_deploy_steps(
    ctx: &PipelineContext,
    client: &SshClient,
    local_archive: &str,
    remote_archive: &str,
    remote_dir: &str,
    current: &str,
    current_next: &str,
    view_dir: &str,
    view_file: &str,
) -> Result<()> {
    // 1. Transfer the archive into the remote root.
    log_status!("deploy", "Uploading {} to {}", archive_name(ctx.timestamp), client.host);
    let upload = client.upload_file(local_archive, remote_archive);
    if !upload.success {
        return Err(Error::remote_command_failed(
            "upload",
            format!("upload {}", remote_archive),
            upload.exit_code,
            upload.stderr,
        ));
    }

    // 2. Create the timestamped release slot.
    exec_step(client, "mkdir", RemoteCommand::new("mkdir").arg(remote_dir))?;

    // 3. Extract; only a fully-extracted tree may become `current`.
    exec_step(
        client,
        "extract",
        RemoteCommand::new("tar")
            .arg("-xzf")
            .arg(remote_archive)
            .arg("-C")
            .arg(remote_dir),
    )?;

    // 4. The remote archive is consumed exactly once.
    exec_step(
        client,
        "remove-archive",
        RemoteCommand::new("rm").arg("-f").arg(remote_archive),
    )?;

    // 5. Swap `current` atomically: point a staging symlink at the new
    // slot, then rename it over the old one. `current` never transiently
    // disappears and never points at a partial tree.
    exec_step(
        client,
        "swap-prepare",
        RemoteCommand::new("ln")
            .arg("-sfn")
            .arg(remote_dir)
            .arg(current_next),
    )?;
    exec_step(
        client,
        "swap",
        RemoteCommand::new("mv")
            .arg("-fT")
            .arg(current_next)
            .arg(current),
    )?;

    // 6. The entry document becomes a server-executed view; a symlink keeps
    // the static path serving the same content.
    exec_step(
        client,
        "view-dir",
        RemoteCommand::new("mkdir").arg("-p").arg(view_dir),
    )?;
    exec_step(
        client,
        "rename-entry",
        RemoteCommand::new("mv")
            .arg(format!("{}/index.html", remote_dir))
            .arg(view_file),
    )?;
    exec_step(
        client,
        "link-entry",
        RemoteCommand::new("ln")
            .arg("-s")
            .arg(view_file)
            .arg(format!("{}/index.php", remote_dir)),
    )?;

    Ok(())
}

fn exec_step(client: &SshClient, step: &str, command: RemoteCommand) -> Result<()> {
    let rendered = command.render();
    log_status!("deploy", "{}> {}", step, rendered);
    let output = client.execute(&rendered);
    if output.success {
        Ok(())
    } else {
        Err(Error::remote_command_failed(
            step,
            rendered,
            output.exit_code,
            output.stderr,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager;
    use crate::pipeline::test_support::context_with_timestamp;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const T: i64 = 1700000000000;

    /// Local layout with a staged release plus a "remote" root, wired
    /// together through the localhost SSH short-circuit.
    fn deploy_fixture(dir: &Path) -> crate::pipeline::PipelineContext {
        fs::create_dir_all(dir.join("release/app")).unwrap();
        fs::write(dir.join("release/index.html"), "<html>entry</html>").unwrap();
        fs::write(dir.join("release/app/main.1700000000000.js"), "js").unwrap();

        let remote = dir.join("remote");
        fs::create_dir_all(&remote).unwrap();

        let mut ctx = context_with_timestamp(dir, T);
        ctx.config.root_dir = format!("{}/", remote.display());
        ctx
    }

    #[test]
    fn successful_deploy_swaps_current_and_renames_entry() {
        let dir = TempDir::new().unwrap();
        let ctx = deploy_fixture(dir.path());
        packager::compress_release(&ctx).unwrap();

        let report = ship(&ctx).unwrap();

        let remote = dir.path().join("remote");
        let slot = remote.join(T.to_string());
        assert!(slot.join("app/main.1700000000000.js").exists());

        // current points at the fully-extracted slot
        let target = fs::read_link(remote.join("current")).unwrap();
        assert_eq!(target, slot);

        // entry document became the server-side view, with the static path
        // resolving to the same content
        let view = slot.join("api/www/services/content/resources/views/index.php");
        assert_eq!(fs::read_to_string(&view).unwrap(), "<html>entry</html>");
        assert_eq!(
            fs::read_to_string(slot.join("index.php")).unwrap(),
            "<html>entry</html>"
        );
        assert!(!slot.join("index.html").exists());

        // archive consumed, lock released
        assert!(!remote.join(archive_name(T)).exists());
        assert!(!remote.join(LOCK_NAME).exists());
        assert_eq!(report.remote_dir, slot.display().to_string());
    }

    #[test]
    fn extraction_failure_leaves_current_untouched() {
        let dir = TempDir::new().unwrap();
        let ctx = deploy_fixture(dir.path());

        // A corrupt archive: upload succeeds, extraction fails.
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(ctx.layout.archive(T), b"not a tarball").unwrap();

        let remote = dir.path().join("remote");
        let old_slot = remote.join("1600000000000");
        fs::create_dir_all(&old_slot).unwrap();
        std::os::unix::fs::symlink(&old_slot, remote.join("current")).unwrap();

        let err = ship(&ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "remote.command_failed");
        assert_eq!(err.details["step"], "extract");

        // the previous release is still live
        let target = fs::read_link(remote.join("current")).unwrap();
        assert_eq!(target, old_slot);

        // the lock was released so the next deploy can proceed
        assert!(!remote.join(LOCK_NAME).exists());
    }

    #[test]
    fn concurrent_deploy_is_rejected_by_lock() {
        let dir = TempDir::new().unwrap();
        let ctx = deploy_fixture(dir.path());
        packager::compress_release(&ctx).unwrap();

        let remote = dir.path().join("remote");
        fs::create_dir_all(remote.join(LOCK_NAME)).unwrap();

        let err = ship(&ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "remote.locked");
        assert!(!remote.join(T.to_string()).exists());
    }

    #[test]
    fn missing_archive_is_rejected_before_any_remote_step() {
        let dir = TempDir::new().unwrap();
        let ctx = deploy_fixture(dir.path());

        let err = ship(&ctx).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
        assert!(!dir.path().join("remote").join(LOCK_NAME).exists());
    }

    #[test]
    fn remote_command_rendering_quotes_arguments() {
        let cmd = RemoteCommand::new("tar")
            .arg("-xzf")
            .arg("/srv/app root/release-1.tar.gz")
            .arg("-C")
            .arg("/srv/app root/1");
        assert_eq!(
            cmd.render(),
            "tar -xzf '/srv/app root/release-1.tar.gz' -C '/srv/app root/1'"
        );
    }
}
