//! Version-control metadata capabilities

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::debug;

use crate::dispatch::{Handler, HandlerError, HostContext};

/// Reported when a value cannot be determined
const NONE: &str = "NONE";

/// Run git in `dir`; `Ok(None)` when git ran but failed
async fn git(dir: &Path, args: &[&str]) -> Result<Option<String>, HandlerError> {
    debug!(?dir, ?args, "git: called");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| HandlerError::Command {
            command: format!("git {}", args.join(" ")),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim(), "git: non-zero exit");
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Directory named by the payload's `dir`, else the primary workspace
fn target_dir(payload: &Value, ctx: &HostContext) -> Option<PathBuf> {
    match payload.get("dir").and_then(Value::as_str) {
        Some(dir) => Some(ctx.resolve_path(dir)),
        None => ctx.primary_workspace().map(Path::to_path_buf),
    }
}

/// First line of git output, or "NONE"
async fn git_line_or_none(payload: &Value, ctx: &HostContext, args: &[&str]) -> Value {
    let Some(dir) = target_dir(payload, ctx) else {
        return json!(NONE);
    };
    match git(&dir, args).await {
        Ok(Some(out)) => match out.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => json!(line),
            _ => json!(NONE),
        },
        Ok(None) => json!(NONE),
        Err(e) => {
            debug!(error = %e, "git_line_or_none: git unavailable");
            json!(NONE)
        }
    }
}

pub struct GetBranchHandler;

#[async_trait]
impl Handler for GetBranchHandler {
    fn kind(&self) -> &'static str {
        "getBranch"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(git_line_or_none(&payload, ctx, &["rev-parse", "--abbrev-ref", "HEAD"]).await)
    }
}

/// Remote URL of `origin`
pub struct GetRepoNameHandler;

#[async_trait]
impl Handler for GetRepoNameHandler {
    fn kind(&self) -> &'static str {
        "getRepoName"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(git_line_or_none(&payload, ctx, &["config", "--get", "remote.origin.url"]).await)
    }
}

/// Staged diff of every workspace root, plus unstaged changes on request
pub struct GetDiffHandler;

#[async_trait]
impl Handler for GetDiffHandler {
    fn kind(&self) -> &'static str {
        "getDiff"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let include_unstaged = payload.get("includeUnstaged").and_then(Value::as_bool).unwrap_or(true);
        debug!(include_unstaged, "GetDiffHandler::handle: called");

        let mut diffs = Vec::new();
        for root in ctx.workspace_dirs() {
            let mut diff = git(root, &["diff", "--cached"]).await?.unwrap_or_default();
            if include_unstaged {
                diff.push_str(&git(root, &["diff"]).await?.unwrap_or_default());
            }
            diffs.push(diff);
        }
        Ok(json!(diffs))
    }
}

/// Top-level directory of the repository containing `dir`, or null
pub struct GetGitRootPathHandler;

#[async_trait]
impl Handler for GetGitRootPathHandler {
    fn kind(&self) -> &'static str {
        "getGitRootPath"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let Some(dir) = target_dir(&payload, ctx) else {
            return Ok(Value::Null);
        };
        let root = git(&dir, &["rev-parse", "--show-toplevel"])
            .await?
            .map(|out| out.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(json!(root))
    }
}
