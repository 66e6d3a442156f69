//! Transport to the chat bridge.

use async_trait::async_trait;

use crate::core::Message;
use crate::error::Result;

pub mod http;

pub use http::HttpTransport;

/// Where messages come from and where replies go.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch whatever arrived since the last poll; may be empty.
    async fn poll(&self) -> Result<Vec<Message>>;

    async fn send(&self, message: Message) -> Result<()>;
}
