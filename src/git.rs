//! Scoped Git checkouts.
//!
//! A [`Checkout`] clones a repository into a fresh temporary directory and
//! removes it when dropped, so the clone disappears on every exit path of
//! the command that created it, including early returns and panics.
//!
//! Git is driven through the `git` binary. SSH authentication uses the
//! repository's private key (inline material is written to a 0600 temp
//! file owned by the checkout) with host-key checking disabled.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::config::Repository;
use crate::error::Error;

/// Commit message used when `--message` is not given.
pub const DEFAULT_COMMIT_MESSAGE: &str = "automated export";

pub struct Checkout {
    dir: TempDir,
    repo: Repository,
    // Held so the key file lives as long as the checkout.
    key: Option<NamedTempFile>,
}

impl Checkout {
    /// Clones `repo.url` at `repo.reference` into a temporary directory.
    pub fn clone(repo: &Repository) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("ipctl-git-")
            .tempdir()
            .context("Failed to create temporary directory for clone")?;

        let key = match &repo.private_key {
            Some(material) => Some(write_key(material)?),
            None => None,
        };

        let checkout = Self {
            dir,
            repo: repo.clone(),
            key,
        };

        debug!(url = %repo.url, reference = %repo.reference, dir = %checkout.path().display(), "git clone");
        let target = checkout.path().to_path_buf();
        checkout.git(
            "clone",
            [
                OsStr::new("clone"),
                OsStr::new("--branch"),
                OsStr::new(&repo.reference),
                OsStr::new("--single-branch"),
                OsStr::new(&repo.url),
                target.as_os_str(),
            ],
            None,
        )?;
        Ok(checkout)
    }

    /// Root of the working tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stages everything, commits and pushes to the configured reference.
    ///
    /// Returns `false` without committing when staging leaves the working
    /// tree clean.
    pub fn commit_and_push(&self, message: &str, author: (&str, &str)) -> Result<bool> {
        self.git("add", ["add", "--all", "--", "*"], Some(self.path()))?;

        if self.is_clean()? {
            info!(url = %self.repo.url, "working tree clean, nothing to push");
            return Ok(false);
        }

        let (name, email) = author;
        let mut commit = self.command(["commit", "--quiet", "-m", message]);
        commit
            .current_dir(self.path())
            .env("GIT_AUTHOR_NAME", name)
            .env("GIT_AUTHOR_EMAIL", email)
            .env("GIT_COMMITTER_NAME", name)
            .env("GIT_COMMITTER_EMAIL", email);
        run("commit", commit)?;

        let refspec = format!("HEAD:{}", self.repo.reference);
        self.git("push", ["push", "origin", refspec.as_str()], Some(self.path()))?;
        info!(url = %self.repo.url, reference = %self.repo.reference, "pushed");
        Ok(true)
    }

    /// Returns `true` when `git status --porcelain` reports nothing.
    pub fn is_clean(&self) -> Result<bool> {
        let out = self.git("status", ["status", "--porcelain"], Some(self.path()))?;
        Ok(out.trim().is_empty())
    }

    /// Joins `relative` onto the checkout root, refusing paths that climb
    /// out of it.
    pub fn join(&self, relative: &Path) -> Result<PathBuf> {
        let relative = relative.strip_prefix("/").unwrap_or(relative);
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Validation(format!(
                "path '{}' escapes the repository",
                relative.display()
            ))
            .into());
        }
        Ok(self.path().join(relative))
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        if let Some(key) = self.key_path() {
            cmd.env(
                "GIT_SSH_COMMAND",
                format!(
                    "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
                    key.display()
                ),
            );
        }
        cmd
    }

    fn git<I, S>(&self, op: &str, args: I, cwd: Option<&Path>) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(args);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        run(op, cmd)
    }

    fn key_path(&self) -> Option<&Path> {
        match &self.key {
            Some(file) => Some(file.path()),
            None => self.repo.private_key_file.as_deref(),
        }
    }
}

fn run(op: &str, mut cmd: Command) -> Result<String> {
    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", op))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::git(op, stderr.trim()).into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn write_key(material: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("ipctl-key-")
        .tempfile()
        .context("Failed to create private key file")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(material.trim_end().as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(file)
}
