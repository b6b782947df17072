//! Workspace listing capabilities

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::str_field;
use crate::dispatch::{Handler, HandlerError, HostContext, ListingConfig};

/// Type tags used by `listDir`
const TAG_FILE: u8 = 1;
const TAG_DIRECTORY: u8 = 2;

/// Which entries a workspace walk collects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkTarget {
    Files,
    Folders,
}

/// Walk a workspace root, pruning ignored directories
///
/// Collects at most `limit` entries and stops traversal as soon as the
/// limit is reached.
pub fn walk_workspace(root: &Path, policy: &ListingConfig, target: WalkTarget, limit: usize) -> Vec<PathBuf> {
    debug!(?root, ?target, limit, "walk_workspace: called");
    let mut found = Vec::new();
    if limit == 0 {
        return found;
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry.file_name().to_str().is_some_and(|name| policy.is_ignored_dir(name))
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "walk_workspace: skipping unreadable entry");
                continue;
            }
        };

        let keep = match target {
            WalkTarget::Files => {
                entry.file_type().is_file()
                    && !entry.file_name().to_str().is_some_and(|name| policy.is_ignored_file(name))
            }
            WalkTarget::Folders => entry.depth() > 0 && entry.file_type().is_dir(),
        };
        if !keep {
            continue;
        }

        found.push(entry.into_path());
        if found.len() >= limit {
            warn!(?root, limit, "walk_workspace: entry cap reached, stopping");
            break;
        }
    }

    debug!(count = found.len(), "walk_workspace: finished");
    found
}

/// Walk every requested root on a blocking thread, sharing one cap
async fn walk_roots(roots: Vec<PathBuf>, policy: ListingConfig, target: WalkTarget) -> Result<Value, HandlerError> {
    let paths = tokio::task::spawn_blocking(move || {
        let mut all = Vec::new();
        for root in &roots {
            let remaining = policy.max_files.saturating_sub(all.len());
            if remaining == 0 {
                break;
            }
            all.extend(walk_workspace(root, &policy, target, remaining));
        }
        all
    })
    .await
    .map_err(|e| HandlerError::Failed(format!("Listing task failed: {}", e)))?;

    Ok(json!(
        paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
    ))
}

fn requested_roots(payload: &Value, ctx: &HostContext) -> Vec<PathBuf> {
    match payload.get("directory").and_then(Value::as_str) {
        Some(dir) => vec![ctx.resolve_path(dir)],
        None => ctx.workspace_dirs().to_vec(),
    }
}

/// Immediate children of a directory as `[name, 1|2]` pairs
pub struct ListDirHandler;

#[async_trait]
impl Handler for ListDirHandler {
    fn kind(&self) -> &'static str {
        "listDir"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let dir = ctx.resolve_path(str_field(&payload, "dir")?);
        debug!(?dir, "ListDirHandler::handle: called");

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HandlerError::NotFound {
                    path: dir.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            // Symlinks are tagged by what they point at
            let is_dir = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta.is_dir(),
                Err(_) => false,
            };
            let tag = if is_dir { TAG_DIRECTORY } else { TAG_FILE };
            entries.push((entry.file_name().to_string_lossy().into_owned(), tag));
        }
        entries.sort();

        Ok(json!(
            entries
                .into_iter()
                .map(|(name, tag)| json!([name, tag]))
                .collect::<Vec<_>>()
        ))
    }
}

/// Recursive file listing under the ignore policy
pub struct ListWorkspaceContentsHandler;

#[async_trait]
impl Handler for ListWorkspaceContentsHandler {
    fn kind(&self) -> &'static str {
        "listWorkspaceContents"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let roots = requested_roots(&payload, ctx);
        debug!(?roots, "ListWorkspaceContentsHandler::handle: called");
        walk_roots(roots, ctx.listing().clone(), WalkTarget::Files).await
    }
}

pub struct ListFoldersHandler;

#[async_trait]
impl Handler for ListFoldersHandler {
    fn kind(&self) -> &'static str {
        "listFolders"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let roots = requested_roots(&payload, ctx);
        debug!(?roots, "ListFoldersHandler::handle: called");
        walk_roots(roots, ctx.listing().clone(), WalkTarget::Folders).await
    }
}

pub struct GetWorkspaceDirsHandler;

#[async_trait]
impl Handler for GetWorkspaceDirsHandler {
    fn kind(&self) -> &'static str {
        "getWorkspaceDirs"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(
            ctx.workspace_dirs()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        ))
    }
}

/// Parsed contents of the root-level rc files of every workspace
pub struct GetWorkspaceConfigsHandler;

#[async_trait]
impl Handler for GetWorkspaceConfigsHandler {
    fn kind(&self) -> &'static str {
        "getWorkspaceConfigs"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let mut configs = Vec::new();
        for root in ctx.workspace_dirs() {
            for name in ctx.rc_files() {
                let path = root.join(name);
                let Ok(text) = tokio::fs::read_to_string(&path).await else {
                    continue;
                };
                match serde_json::from_str::<Value>(&text) {
                    Ok(value) => configs.push(value),
                    Err(e) => warn!(?path, error = %e, "Ignoring unparseable workspace config"),
                }
            }
        }
        debug!(count = configs.len(), "GetWorkspaceConfigsHandler::handle: finished");
        Ok(json!(configs))
    }
}
