//! Archive store for outputs too long to post inline.

use async_trait::async_trait;

use crate::error::Result;

pub mod gitwiki;

pub use gitwiki::GitWikiArchive;

/// Persists a document and hands back a public link to it.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store `content` under `path` (no extension), or under the help tree
    /// when `is_help` is set. Returns the URL of the stored document.
    async fn upload(&self, path: &str, content: &str, is_help: bool) -> Result<String>;
}
