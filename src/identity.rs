//! Sender identity resolution.
//!
//! Bridge messages only carry a display name and an account label
//! (e.g. `discord.main`). The identity store maps those onto a stable
//! username so commands can tell people apart across gateways.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A resolved user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub account: String,
}

/// Identity lookup collaborator.
///
/// Lookups never fail loudly; anything that goes wrong resolves to `None`.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn identify(&self, display_name: &str, account: &str) -> Option<Identity>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityFile {
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account: String,
    pub nickname: String,
}

impl IdentityFile {
    pub fn find(&self, display_name: &str, account: &str) -> Option<Identity> {
        self.users.iter().find_map(|user| {
            user.accounts
                .iter()
                .any(|a| a.account == account && a.nickname == display_name)
                .then(|| Identity {
                    username: user.username.clone(),
                    account: account.to_string(),
                })
        })
    }
}

/// JSON-file backed identity store, re-read on every lookup so edits apply
/// without a restart.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<IdentityFile> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl IdentityLookup for FileIdentityStore {
    async fn identify(&self, display_name: &str, account: &str) -> Option<Identity> {
        match self.load().await {
            Ok(file) => {
                let found = file.find(display_name, account);
                if found.is_none() {
                    tracing::debug!("no identity for {} on {}", display_name, account);
                }
                found
            }
            Err(e) => {
                tracing::warn!("could not read identities from {:?}: {}", self.path, e);
                None
            }
        }
    }
}
