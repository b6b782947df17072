//! Clipboard, notices and URLs

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{str_field, str_or_field};
use crate::dispatch::{Handler, HandlerError, HostContext, NoticeLevel};

pub struct CopyTextHandler;

#[async_trait]
impl Handler for CopyTextHandler {
    fn kind(&self) -> &'static str {
        "copyText"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let text = str_field(&payload, "text")?;
        debug!(bytes = text.len(), "CopyTextHandler::handle: called");
        ctx.host().write_clipboard(text).await?;
        Ok(Value::Null)
    }
}

/// Transient informational notice; payload is the message text
pub struct ShowMessageHandler;

#[async_trait]
impl Handler for ShowMessageHandler {
    fn kind(&self) -> &'static str {
        "showMessage"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let message = str_or_field(&payload, "message")?;
        ctx.host().show_notice(NoticeLevel::Info, message).await?;
        Ok(Value::Null)
    }
}

pub struct ErrorPopupHandler;

#[async_trait]
impl Handler for ErrorPopupHandler {
    fn kind(&self) -> &'static str {
        "errorPopup"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let message = str_or_field(&payload, "message")?;
        ctx.host().show_notice(NoticeLevel::Error, message).await?;
        Ok(Value::Null)
    }
}

pub struct OpenUrlHandler;

#[async_trait]
impl Handler for OpenUrlHandler {
    fn kind(&self) -> &'static str {
        "openUrl"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let url = str_or_field(&payload, "url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(HandlerError::InvalidArgument(format!("Refusing to open non-web URL: {}", url)));
        }
        ctx.host().open_url(url).await?;
        Ok(Value::Null)
    }
}

/// `{contents}` of the active terminal
pub struct GetTerminalContentsHandler;

#[async_trait]
impl Handler for GetTerminalContentsHandler {
    fn kind(&self) -> &'static str {
        "getTerminalContents"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!({ "contents": ctx.host().terminal_contents().await? }))
    }
}

/// Run an editor command; payload is the command name
pub struct RunCommandHandler;

#[async_trait]
impl Handler for RunCommandHandler {
    fn kind(&self) -> &'static str {
        "runCommand"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let command = str_or_field(&payload, "command")?;
        debug!(%command, "RunCommandHandler::handle: called");
        ctx.host().run_command(command).await?;
        Ok(Value::Null)
    }
}
