//! Editor state capabilities
//!
//! Thin adapters over `EditorHost`. Handlers that mutate editor state run on
//! the host's dedicated execution thread.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{str_field, str_or_field};
use crate::dispatch::{Handler, HandlerError, HostContext, Position, Range, RangeInFile};

pub struct GetCurrentFileHandler;

#[async_trait]
impl Handler for GetCurrentFileHandler {
    fn kind(&self) -> &'static str {
        "getCurrentFile"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(ctx.host().current_file().await?))
    }
}

pub struct GetOpenFilesHandler;

#[async_trait]
impl Handler for GetOpenFilesHandler {
    fn kind(&self) -> &'static str {
        "getOpenFiles"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(ctx.host().open_files().await?))
    }
}

pub struct GetPinnedFilesHandler;

#[async_trait]
impl Handler for GetPinnedFilesHandler {
    fn kind(&self) -> &'static str {
        "getPinnedFiles"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(ctx.host().pinned_files().await?))
    }
}

/// Current selection as a one-element list, empty when nothing is selected
pub struct GetHighlightedCodeHandler;

#[async_trait]
impl Handler for GetHighlightedCodeHandler {
    fn kind(&self) -> &'static str {
        "getHighlightedCode"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let selection = ctx.host().selection().await?;
        Ok(json!(selection.into_iter().collect::<Vec<_>>()))
    }
}

pub struct OpenFileHandler;

#[async_trait]
impl Handler for OpenFileHandler {
    fn kind(&self) -> &'static str {
        "openFile"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = str_field(&payload, "path")?;
        debug!(%path, "OpenFileHandler::handle: called");
        ctx.host().set_file_open(path, true).await?;
        Ok(Value::Null)
    }
}

/// Open or close a file; `open` defaults to true
pub struct SetFileOpenHandler;

#[async_trait]
impl Handler for SetFileOpenHandler {
    fn kind(&self) -> &'static str {
        "setFileOpen"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = str_field(&payload, "filepath")?;
        let open = payload.get("open").and_then(Value::as_bool).unwrap_or(true);
        debug!(%path, open, "SetFileOpenHandler::handle: called");
        ctx.host().set_file_open(path, open).await?;
        Ok(Value::Null)
    }
}

pub struct SaveFileHandler;

#[async_trait]
impl Handler for SaveFileHandler {
    fn kind(&self) -> &'static str {
        "saveFile"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = str_field(&payload, "filepath")?;
        ctx.host().save_file(path).await?;
        Ok(Value::Null)
    }
}

pub struct ShowVirtualFileHandler;

#[async_trait]
impl Handler for ShowVirtualFileHandler {
    fn kind(&self) -> &'static str {
        "showVirtualFile"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let name = str_field(&payload, "name")?;
        let contents = str_field(&payload, "content")?;
        ctx.host().show_virtual_file(name, contents).await?;
        Ok(Value::Null)
    }
}

pub struct InsertAtCursorHandler;

#[async_trait]
impl Handler for InsertAtCursorHandler {
    fn kind(&self) -> &'static str {
        "insertAtCursor"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let text = str_field(&payload, "text")?;
        ctx.host().insert_at_cursor(text).await?;
        Ok(Value::Null)
    }
}

/// Problems for `filepath`, or for the current file when absent
pub struct GetProblemsHandler;

#[async_trait]
impl Handler for GetProblemsHandler {
    fn kind(&self) -> &'static str {
        "getProblems"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = payload.get("filepath").and_then(Value::as_str);
        let problems = ctx.host().problems(path).await?;
        debug!(count = problems.len(), "GetProblemsHandler::handle: finished");
        Ok(json!(problems))
    }
}

pub struct HighlightCodeHandler;

#[async_trait]
impl Handler for HighlightCodeHandler {
    fn kind(&self) -> &'static str {
        "highlightCode"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let range: RangeInFile = payload
            .get("rangeInFile")
            .cloned()
            .ok_or_else(|| HandlerError::missing("rangeInFile"))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| HandlerError::InvalidArgument(format!("rangeInFile: {}", e)))
            })?;
        let color = payload.get("color").and_then(Value::as_str);
        ctx.host().highlight(&range, color).await?;
        Ok(Value::Null)
    }
}

/// Highlight whole lines `startLine..=endLine`
pub struct ShowLinesHandler;

#[async_trait]
impl Handler for ShowLinesHandler {
    fn kind(&self) -> &'static str {
        "showLines"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let filepath = str_field(&payload, "filepath")?.to_string();
        let line = |field: &str| {
            payload
                .get(field)
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .ok_or_else(|| HandlerError::missing(field))
        };
        let (start, end) = (line("startLine")?, line("endLine")?);
        if end < start {
            return Err(HandlerError::InvalidArgument(format!(
                "endLine {} is before startLine {}",
                end, start
            )));
        }

        let range = RangeInFile {
            filepath,
            range: Range {
                start: Position {
                    line: start,
                    character: 0,
                },
                end: Position {
                    line: end,
                    character: u32::MAX,
                },
            },
        };
        let color = payload.get("color").and_then(Value::as_str);
        ctx.host().highlight(&range, color).await?;
        Ok(Value::Null)
    }
}

pub struct ShowDiffHandler;

#[async_trait]
impl Handler for ShowDiffHandler {
    fn kind(&self) -> &'static str {
        "showDiff"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = str_field(&payload, "filepath")?;
        let new_contents = str_field(&payload, "newContents")?;
        let step_index = payload.get("stepIndex").and_then(Value::as_u64).unwrap_or(0);
        ctx.host().show_diff(path, new_contents, step_index).await?;
        Ok(Value::Null)
    }
}

/// `{visibleFiles}` form of the files shown in editor panes
pub struct VisibleFilesHandler;

#[async_trait]
impl Handler for VisibleFilesHandler {
    fn kind(&self) -> &'static str {
        "visibleFiles"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!({ "visibleFiles": ctx.host().visible_files().await? }))
    }
}

pub struct ApplyToFileHandler;

#[async_trait]
impl Handler for ApplyToFileHandler {
    fn kind(&self) -> &'static str {
        "applyToFile"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let text = str_field(&payload, "text")?;
        debug!(bytes = text.len(), "ApplyToFileHandler::handle: called");
        ctx.host().apply_to_file(text).await?;
        Ok(Value::Null)
    }
}

/// Lock or unlock inline suggestions; `locked` defaults to true
pub struct SetSuggestionsLockedHandler;

#[async_trait]
impl Handler for SetSuggestionsLockedHandler {
    fn kind(&self) -> &'static str {
        "setSuggestionsLocked"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = str_field(&payload, "filepath")?;
        let locked = payload.get("locked").and_then(Value::as_bool).unwrap_or(true);
        ctx.host().set_suggestions_locked(path, locked).await?;
        Ok(Value::Null)
    }
}

pub struct GetSearchResultsHandler;

#[async_trait]
impl Handler for GetSearchResultsHandler {
    fn kind(&self) -> &'static str {
        "getSearchResults"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let query = str_or_field(&payload, "query")?;
        Ok(json!(ctx.host().search(query).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HeadlessHost, RangeInFileWithContents};
    use std::sync::Arc;

    fn ctx_with(host: Arc<HeadlessHost>) -> HostContext {
        HostContext::new(vec!["/work".into()], host)
    }

    #[tokio::test]
    async fn test_open_then_list_files() {
        let host = Arc::new(HeadlessHost::new());
        let ctx = ctx_with(host.clone());

        OpenFileHandler.handle(json!({"path": "/work/a.rs"}), &ctx).await.unwrap();
        SetFileOpenHandler
            .handle(json!({"filepath": "/work/b.rs"}), &ctx)
            .await
            .unwrap();

        let open = GetOpenFilesHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(open, json!(["/work/a.rs", "/work/b.rs"]));

        let current = GetCurrentFileHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(current, json!("/work/b.rs"));

        SetFileOpenHandler
            .handle(json!({"filepath": "/work/b.rs", "open": false}), &ctx)
            .await
            .unwrap();
        let open = GetOpenFilesHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(open, json!(["/work/a.rs"]));
    }

    #[tokio::test]
    async fn test_highlighted_code() {
        let host = Arc::new(HeadlessHost::new());
        let ctx = ctx_with(host.clone());

        let empty = GetHighlightedCodeHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(empty, json!([]));

        host.set_selection(Some(RangeInFileWithContents {
            filepath: "/work/a.rs".to_string(),
            range: Range::default(),
            contents: "fn main() {}".to_string(),
        }));
        let selected = GetHighlightedCodeHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(selected[0]["contents"], "fn main() {}");
    }

    #[tokio::test]
    async fn test_unsupported_editor_capabilities() {
        let ctx = ctx_with(Arc::new(HeadlessHost::new()));

        let err = InsertAtCursorHandler
            .handle(json!({"text": "x"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotSupported { .. }));

        let err = ShowDiffHandler
            .handle(json!({"filepath": "/a", "newContents": "b", "stepIndex": 0}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotSupported { .. }));
    }

    #[tokio::test]
    async fn test_show_lines_validates_order() {
        let ctx = ctx_with(Arc::new(HeadlessHost::new()));
        let err = ShowLinesHandler
            .handle(json!({"filepath": "/a", "startLine": 5, "endLine": 2}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidArgument(_)));
    }

    #[test]
    fn test_mutating_handlers_run_on_host_thread() {
        assert!(OpenFileHandler.may_block_host_thread());
        assert!(InsertAtCursorHandler.may_block_host_thread());
        assert!(!GetOpenFilesHandler.may_block_host_thread());
    }

    #[tokio::test]
    async fn test_visible_files_wraps_open_files() {
        let host = Arc::new(HeadlessHost::new());
        let ctx = ctx_with(host.clone());

        OpenFileHandler.handle(json!({"path": "/work/a.rs"}), &ctx).await.unwrap();
        let visible = VisibleFilesHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(visible, json!({"visibleFiles": ["/work/a.rs"]}));
    }

    #[tokio::test]
    async fn test_stubbed_editor_capabilities() {
        let ctx = ctx_with(Arc::new(HeadlessHost::new()));

        let locked = SetSuggestionsLockedHandler
            .handle(json!({"filepath": "/work/a.rs", "locked": true}), &ctx)
            .await
            .unwrap();
        assert_eq!(locked, Value::Null);

        let results = GetSearchResultsHandler
            .handle(json!({"query": "TODO"}), &ctx)
            .await
            .unwrap();
        assert_eq!(results, json!(""));

        let err = ApplyToFileHandler
            .handle(json!({"text": "fn main() {}"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotSupported { .. }));
    }
}
