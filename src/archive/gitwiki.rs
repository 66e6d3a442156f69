//! Archive backed by a git wiki repository.
//!
//! Every upload first resets the local working copy to the remote branch.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::ArchiveStore;
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};

const FILE_EXTENSION: &str = "md";
const HELP_DIR: &str = "help";

pub struct GitWikiArchive {
    remote_url: String,
    web_url_base: String,
    branch: String,
    checkout_dir: PathBuf,
    author_name: String,
    author_email: String,
    /// Held for the whole upload.
    lock: Mutex<()>,
}

impl GitWikiArchive {
    pub fn new(
        remote_url: impl Into<String>,
        web_url_base: impl Into<String>,
        branch: impl Into<String>,
        checkout_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remote_url: remote_url.into(),
            web_url_base: web_url_base.into().trim_end_matches('/').to_string(),
            branch: branch.into(),
            checkout_dir: checkout_dir.into(),
            author_name: "bridgebot".to_string(),
            author_email: "bridgebot@localhost".to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// Build from settings; the checkout defaults to `<data dir>/wiki`.
    pub fn from_config(config: &ArchiveConfig, author_name: &str) -> Result<Self> {
        let checkout_dir = match &config.checkout_dir {
            Some(dir) => dir.clone(),
            None => directories::ProjectDirs::from("org", "bridgebot", "bridgebot")
                .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?
                .data_dir()
                .join("wiki"),
        };
        let email = config
            .author_email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost", author_name));

        Ok(Self::new(
            config.remote_url.clone(),
            config.web_url_base.clone(),
            config.branch.clone(),
            checkout_dir,
        )
        .with_author(author_name, email))
    }

    pub fn checkout_dir(&self) -> &Path {
        &self.checkout_dir
    }

    /// Clone the wiki if there is no working copy yet.
    async fn ensure_checkout(&self) -> Result<()> {
        if self.checkout_dir.join(".git").is_dir() {
            return Ok(());
        }
        if let Some(parent) = self.checkout_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::info!("cloning {} into {}", self.remote_url, self.checkout_dir.display());
        let target = self.checkout_dir.to_string_lossy().to_string();
        run_git(None, &["clone", &self.remote_url, &target]).await?;
        Ok(())
    }

    /// Throw away local state and match the remote branch exactly.
    async fn reset(&self) -> Result<()> {
        let dir = Some(self.checkout_dir.as_path());
        let remote_branch = format!("origin/{}", self.branch);

        self.git(&["fetch", "origin"]).await?;
        run_git(dir, &["checkout", "-f", "-B", &self.branch, &remote_branch]).await?;
        run_git(dir, &["reset", "--hard", &remote_branch]).await?;
        run_git(dir, &["clean", "-xdf"]).await?;
        Ok(())
    }

    /// Stage `relative`; commit and push only when the index changed.
    async fn commit_and_push(&self, relative: &Path, message: &str) -> Result<bool> {
        let rel = relative.to_string_lossy().to_string();
        self.git(&["add", "--", &rel]).await?;

        let dir = Some(self.checkout_dir.as_path());
        let unchanged = git_status(dir, &["diff", "--cached", "--quiet"]).await?;
        if unchanged {
            tracing::debug!("{} unchanged, nothing to push", rel);
            return Ok(false);
        }

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.git(&[
            "-c",
            &name,
            "-c",
            &email,
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-m",
            message,
        ])
        .await?;

        let refspec = format!("HEAD:{}", self.branch);
        self.git(&["push", "origin", &refspec]).await?;
        Ok(true)
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git(Some(&self.checkout_dir), args).await
    }
}

#[async_trait]
impl ArchiveStore for GitWikiArchive {
    async fn upload(&self, path: &str, content: &str, is_help: bool) -> Result<String> {
        let relative = document_path(path, is_help)?;
        let _guard = self.lock.lock().await;

        self.ensure_checkout().await?;
        self.reset().await?;

        let full = self.checkout_dir.join(&relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, format!("{}\n", content)).await?;

        let pushed = self
            .commit_and_push(&relative, &format!("added {}", path))
            .await?;
        if pushed {
            tracing::info!("archived {}", relative.display());
        }

        Ok(document_url(&self.web_url_base, &relative))
    }
}

/// Relative file path for a document name, rejecting anything that could
/// escape the working copy.
pub fn document_path(name: &str, is_help: bool) -> Result<PathBuf> {
    let name = Path::new(name);
    let clean = !name.as_os_str().is_empty()
        && name.components().all(|c| matches!(c, Component::Normal(_)));
    if !clean {
        return Err(Error::Archive(format!(
            "invalid document name '{}'",
            name.display()
        )));
    }

    let mut path = PathBuf::new();
    if is_help {
        path.push(HELP_DIR);
    }
    path.push(format!("{}.{}", name.to_string_lossy(), FILE_EXTENSION));
    Ok(path)
}

/// Public URL of a document: the web base plus the path joined with `/`.
pub fn document_url(web_url_base: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    format!("{}/{}", web_url_base.trim_end_matches('/'), parts.join("/"))
}

async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd.args(args).output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Archive(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a git command whose exit status is the answer (0 => true, 1 => false).
async fn git_status(dir: Option<&Path>, args: &[&str]) -> Result<bool> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd.args(args).output().await?;

    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(Error::Archive(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}
