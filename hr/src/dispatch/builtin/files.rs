//! File content capabilities

use std::collections::BTreeMap;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::str_field;
use crate::dispatch::{Handler, HandlerError, HostContext, Range};

/// Upper bound on bytes returned by a single read
pub const MAX_READ_BYTES: u64 = 100_000;

/// Best-effort read: unsaved editor contents first, then disk; "" on any failure
pub struct ReadFileHandler;

#[async_trait]
impl Handler for ReadFileHandler {
    fn kind(&self) -> &'static str {
        "readFile"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = ctx.resolve_path(str_field(&payload, "filepath")?);
        debug!(?path, "ReadFileHandler::handle: called");

        if let Some(contents) = ctx.host().unsaved_contents(&path).await {
            debug!("ReadFileHandler::handle: using unsaved editor contents");
            return Ok(json!(contents));
        }

        Ok(json!(read_capped(&path).await))
    }
}

async fn read_capped(path: &std::path::Path) -> String {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            debug!(?path, error = %e, "read_capped: open failed, returning empty");
            return String::new();
        }
    };

    let mut buf = Vec::new();
    if let Err(e) = file.take(MAX_READ_BYTES).read_to_end(&mut buf).await {
        debug!(?path, error = %e, "read_capped: read failed, returning empty");
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

pub struct WriteFileHandler;

#[async_trait]
impl Handler for WriteFileHandler {
    fn kind(&self) -> &'static str {
        "writeFile"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = ctx.resolve_path(str_field(&payload, "path")?);
        let contents = str_field(&payload, "contents")?;
        debug!(?path, bytes = contents.len(), "WriteFileHandler::handle: called");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(Value::Null)
    }
}

pub struct FileExistsHandler;

#[async_trait]
impl Handler for FileExistsHandler {
    fn kind(&self) -> &'static str {
        "fileExists"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = ctx.resolve_path(str_field(&payload, "filepath")?);
        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        debug!(?path, exists, "FileExistsHandler::handle: called");
        Ok(json!(exists))
    }
}

/// Read the text covered by a range; lines past the end are ignored
pub struct ReadRangeInFileHandler;

#[async_trait]
impl Handler for ReadRangeInFileHandler {
    fn kind(&self) -> &'static str {
        "readRangeInFile"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let path = ctx.resolve_path(str_field(&payload, "filepath")?);
        let range: Range = payload
            .get("range")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| HandlerError::InvalidArgument(format!("range: {}", e)))?
            .ok_or_else(|| HandlerError::missing("range"))?;
        debug!(?path, ?range, "ReadRangeInFileHandler::handle: called");

        let contents = match ctx.host().unsaved_contents(&path).await {
            Some(c) => c,
            None => read_capped(&path).await,
        };
        Ok(json!(slice_range(&contents, &range)))
    }
}

/// Extract the text between two positions (end exclusive)
pub fn slice_range(contents: &str, range: &Range) -> String {
    let lines: Vec<&str> = contents.split('\n').collect();
    let start_line = range.start.line as usize;
    if start_line >= lines.len() || range.end.line < range.start.line {
        return String::new();
    }
    let end_line = (range.end.line as usize).min(lines.len() - 1);

    let mut out = Vec::with_capacity(end_line - start_line + 1);
    for (idx, line) in lines[start_line..=end_line].iter().enumerate() {
        let line_no = start_line + idx;
        let chars: Vec<char> = line.chars().collect();
        let from = if line_no == start_line {
            (range.start.character as usize).min(chars.len())
        } else {
            0
        };
        let to = if line_no == range.end.line as usize {
            (range.end.character as usize).min(chars.len()).max(from)
        } else {
            chars.len()
        };
        out.push(chars[from..to].iter().collect::<String>());
    }
    out.join("\n")
}

/// Modification times in epoch milliseconds; unreadable files are omitted
pub struct GetLastModifiedHandler;

#[async_trait]
impl Handler for GetLastModifiedHandler {
    fn kind(&self) -> &'static str {
        "getLastModified"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let files = payload
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| HandlerError::missing("files"))?;
        debug!(count = files.len(), "GetLastModifiedHandler::handle: called");

        let mut result = BTreeMap::new();
        for file in files.iter().filter_map(Value::as_str) {
            let modified = tokio::fs::metadata(ctx.resolve_path(file))
                .await
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok());
            if let Some(modified) = modified {
                result.insert(file.to_string(), json!(modified.as_millis() as u64));
            }
        }
        Ok(json!(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HeadlessHost, Position};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_file_returns_contents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let ctx = HostContext::headless(temp.path());
        let result = ReadFileHandler
            .handle(json!({"filepath": path.to_str().unwrap()}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!("hello"));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_empty_string() {
        let temp = tempdir().unwrap();
        let ctx = HostContext::headless(temp.path());
        let result = ReadFileHandler
            .handle(json!({"filepath": "/definitely/not/here.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!(""));
    }

    #[tokio::test]
    async fn test_read_file_prefers_unsaved_contents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, "on disk").unwrap();

        let host = Arc::new(HeadlessHost::new());
        host.set_unsaved(&path, "in editor");
        let ctx = HostContext::new(vec![temp.path().to_path_buf()], host);

        let result = ReadFileHandler.handle(json!({"filepath": "a.txt"}), &ctx).await.unwrap();
        assert_eq!(result, json!("in editor"));
    }

    #[tokio::test]
    async fn test_read_file_is_capped() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("big.txt");
        std::fs::write(&path, "x".repeat(MAX_READ_BYTES as usize + 500)).unwrap();

        let ctx = HostContext::headless(temp.path());
        let result = ReadFileHandler.handle(json!({"filepath": "big.txt"}), &ctx).await.unwrap();
        assert_eq!(result.as_str().unwrap().len(), MAX_READ_BYTES as usize);
    }

    #[tokio::test]
    async fn test_read_file_requires_filepath() {
        let ctx = HostContext::headless("/tmp");
        let err = ReadFileHandler.handle(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_write_then_exists() {
        let temp = tempdir().unwrap();
        let ctx = HostContext::headless(temp.path());

        WriteFileHandler
            .handle(json!({"path": "nested/dir/out.txt", "contents": "data"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(temp.path().join("nested/dir/out.txt")).unwrap(),
            "data"
        );

        let exists = FileExistsHandler
            .handle(json!({"filepath": "nested/dir/out.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(exists, json!(true));

        let missing = FileExistsHandler.handle(json!({"filepath": "nope.txt"}), &ctx).await.unwrap();
        assert_eq!(missing, json!(false));
    }

    #[test]
    fn test_slice_range_single_line() {
        let range = Range {
            start: Position { line: 1, character: 2 },
            end: Position { line: 1, character: 5 },
        };
        assert_eq!(slice_range("first\nsecond\nthird", &range), "con");
    }

    #[test]
    fn test_slice_range_multi_line() {
        let range = Range {
            start: Position { line: 0, character: 3 },
            end: Position { line: 2, character: 2 },
        };
        assert_eq!(slice_range("first\nsecond\nthird", &range), "st\nsecond\nth");
    }

    #[test]
    fn test_slice_range_out_of_bounds() {
        let range = Range {
            start: Position { line: 9, character: 0 },
            end: Position { line: 10, character: 0 },
        };
        assert_eq!(slice_range("one line", &range), "");

        let clamped = Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 10, character: 99 },
        };
        assert_eq!(slice_range("a\nb", &clamped), "a\nb");
    }

    #[tokio::test]
    async fn test_read_range_in_file() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("r.txt"), "alpha\nbeta\ngamma").unwrap();
        let ctx = HostContext::headless(temp.path());

        let result = ReadRangeInFileHandler
            .handle(
                json!({
                    "filepath": "r.txt",
                    "range": {"start": {"line": 1, "character": 0}, "end": {"line": 2, "character": 3}}
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result, json!("beta\ngam"));
    }

    #[tokio::test]
    async fn test_get_last_modified_skips_missing() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("x.txt"), "x").unwrap();
        let ctx = HostContext::headless(temp.path());

        let result = GetLastModifiedHandler
            .handle(json!({"files": ["x.txt", "missing.txt"]}), &ctx)
            .await
            .unwrap();
        let map = result.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map["x.txt"].as_u64().unwrap() > 0);
    }
}
