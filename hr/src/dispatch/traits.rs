//! Handler trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::context::HostContext;
use super::error::HandlerError;

/// A capability answering one message kind
#[async_trait]
pub trait Handler: Send + Sync {
    /// Message kind (matches the wire `messageType`)
    fn kind(&self) -> &'static str;

    /// Handlers touching editor state run on the host's dedicated thread
    fn may_block_host_thread(&self) -> bool {
        false
    }

    /// Handle one request payload
    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError>;
}
