//! Editor host capabilities
//!
//! `EditorHost` is the narrow interface to editor-owned state (open
//! documents, selection, decorations, clipboard, notices). Capabilities a
//! host cannot provide fall back to `HandlerError::NotSupported`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::HandlerError;

/// Zero-based line/character position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeInFile {
    pub filepath: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeInFileWithContents {
    pub filepath: String,
    pub range: Range,
    pub contents: String,
}

/// Diagnostic marker for a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub filepath: String,
    pub range: Range,
    pub message: String,
}

/// IDE identity and version metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeInfo {
    pub ide_type: String,
    pub name: String,
    pub version: String,
    pub remote_name: String,
    pub extension_version: String,
}

impl IdeInfo {
    /// Identity of this binary running without an editor attached
    pub fn headless() -> Self {
        Self {
            ide_type: "headless".to_string(),
            name: "hostrouter".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            remote_name: remote_name(),
            extension_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// "ssh" when running inside an SSH session, "local" otherwise
pub(crate) fn remote_name() -> String {
    if std::env::var_os("SSH_CLIENT").is_some() || std::env::var_os("SSH_TTY").is_some() {
        "ssh".to_string()
    } else {
        "local".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Editor-owned capabilities used by the built-in handlers
#[async_trait]
pub trait EditorHost: Send + Sync {
    fn ide_info(&self) -> IdeInfo {
        IdeInfo::headless()
    }

    /// Contents of an open document with unsaved edits, if any
    async fn unsaved_contents(&self, _path: &Path) -> Option<String> {
        None
    }

    async fn current_file(&self) -> Result<Option<String>, HandlerError> {
        Ok(None)
    }

    async fn open_files(&self) -> Result<Vec<String>, HandlerError> {
        Ok(Vec::new())
    }

    async fn pinned_files(&self) -> Result<Vec<String>, HandlerError> {
        Ok(Vec::new())
    }

    /// Files shown in an editor pane; all open files unless the host knows better
    async fn visible_files(&self) -> Result<Vec<String>, HandlerError> {
        self.open_files().await
    }

    async fn selection(&self) -> Result<Option<RangeInFileWithContents>, HandlerError> {
        Ok(None)
    }

    async fn set_file_open(&self, _path: &str, _open: bool) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("setFileOpen"))
    }

    async fn save_file(&self, _path: &str) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("saveFile"))
    }

    async fn show_virtual_file(&self, _name: &str, _contents: &str) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("showVirtualFile"))
    }

    async fn insert_at_cursor(&self, _text: &str) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("insertAtCursor"))
    }

    async fn problems(&self, _path: Option<&str>) -> Result<Vec<Problem>, HandlerError> {
        Ok(Vec::new())
    }

    async fn highlight(&self, _range: &RangeInFile, _color: Option<&str>) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("highlightCode"))
    }

    async fn show_diff(&self, _path: &str, _new_contents: &str, _step_index: u64) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("showDiff"))
    }

    /// Replace the current selection (or the whole document) with `text`
    async fn apply_to_file(&self, _text: &str) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("applyToFile"))
    }

    /// Pause or resume inline suggestions for one document
    async fn set_suggestions_locked(&self, path: &str, locked: bool) -> Result<(), HandlerError> {
        debug!(%path, locked, "EditorHost::set_suggestions_locked: ignored");
        Ok(())
    }

    async fn terminal_contents(&self) -> Result<String, HandlerError> {
        Ok(String::new())
    }

    /// Run an editor command by name
    async fn run_command(&self, command: &str) -> Result<(), HandlerError> {
        debug!(%command, "EditorHost::run_command: ignored");
        Ok(())
    }

    /// Editor search results rendered as text
    async fn search(&self, _query: &str) -> Result<String, HandlerError> {
        Ok(String::new())
    }

    async fn write_clipboard(&self, _text: &str) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("copyText"))
    }

    /// Transient notice shown to the user
    async fn show_notice(&self, level: NoticeLevel, message: &str) -> Result<(), HandlerError> {
        info!(?level, %message, "EditorHost::show_notice");
        Ok(())
    }

    async fn open_url(&self, _url: &str) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("openUrl"))
    }

    /// Current control-plane session, starting a sign-in unless `silent`
    async fn session_info(&self, _silent: bool) -> Result<Option<Value>, HandlerError> {
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn github_token(&self) -> Result<Option<String>, HandlerError> {
        Ok(None)
    }

    async fn set_github_token(&self, _token: Option<&str>) -> Result<(), HandlerError> {
        Err(HandlerError::not_supported("setGitHubAuthToken"))
    }

    /// Identifier of the editor session, if the host has one
    async fn session_id(&self) -> Result<Option<String>, HandlerError> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct HeadlessState {
    open_files: Vec<String>,
    current_file: Option<String>,
    pinned_files: Vec<String>,
    selection: Option<RangeInFileWithContents>,
    unsaved: HashMap<PathBuf, String>,
    problems: Vec<Problem>,
    clipboard: Option<String>,
    notices: Vec<(NoticeLevel, String)>,
    opened_urls: Vec<String>,
    github_token: Option<String>,
}

/// In-memory host used when no editor is attached
#[derive(Debug, Default)]
pub struct HeadlessHost {
    state: Mutex<HeadlessState>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_selection(&self, selection: Option<RangeInFileWithContents>) {
        self.state().selection = selection;
    }

    pub fn set_unsaved(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.state().unsaved.insert(path.into(), contents.into());
    }

    pub fn pin(&self, path: impl Into<String>) {
        self.state().pinned_files.push(path.into());
    }

    pub fn add_problem(&self, problem: Problem) {
        self.state().problems.push(problem);
    }

    pub fn clipboard(&self) -> Option<String> {
        self.state().clipboard.clone()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.state().notices.clone()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state().opened_urls.clone()
    }
}

#[async_trait]
impl EditorHost for HeadlessHost {
    async fn unsaved_contents(&self, path: &Path) -> Option<String> {
        self.state().unsaved.get(path).cloned()
    }

    async fn current_file(&self) -> Result<Option<String>, HandlerError> {
        Ok(self.state().current_file.clone())
    }

    async fn open_files(&self) -> Result<Vec<String>, HandlerError> {
        Ok(self.state().open_files.clone())
    }

    async fn pinned_files(&self) -> Result<Vec<String>, HandlerError> {
        Ok(self.state().pinned_files.clone())
    }

    async fn selection(&self) -> Result<Option<RangeInFileWithContents>, HandlerError> {
        Ok(self.state().selection.clone())
    }

    async fn set_file_open(&self, path: &str, open: bool) -> Result<(), HandlerError> {
        debug!(%path, open, "HeadlessHost::set_file_open: called");
        let mut state = self.state();
        if open {
            if !state.open_files.iter().any(|p| p == path) {
                state.open_files.push(path.to_string());
            }
            state.current_file = Some(path.to_string());
        } else {
            state.open_files.retain(|p| p != path);
            if state.current_file.as_deref() == Some(path) {
                state.current_file = state.open_files.last().cloned();
            }
        }
        Ok(())
    }

    async fn save_file(&self, path: &str) -> Result<(), HandlerError> {
        let contents = self.state().unsaved.remove(Path::new(path));
        if let Some(contents) = contents {
            debug!(%path, "HeadlessHost::save_file: writing unsaved contents");
            tokio::fs::write(path, contents).await?;
        }
        Ok(())
    }

    async fn problems(&self, path: Option<&str>) -> Result<Vec<Problem>, HandlerError> {
        let state = self.state();
        let wanted = path.map(str::to_string).or_else(|| state.current_file.clone());
        Ok(state
            .problems
            .iter()
            .filter(|p| wanted.as_ref().is_none_or(|w| &p.filepath == w))
            .cloned()
            .collect())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), HandlerError> {
        self.state().clipboard = Some(text.to_string());
        Ok(())
    }

    async fn show_notice(&self, level: NoticeLevel, message: &str) -> Result<(), HandlerError> {
        match level {
            NoticeLevel::Error => warn!(%message, "notice"),
            _ => info!(%message, "notice"),
        }
        self.state().notices.push((level, message.to_string()));
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<(), HandlerError> {
        info!(%url, "HeadlessHost::open_url");
        self.state().opened_urls.push(url.to_string());
        Ok(())
    }

    async fn github_token(&self) -> Result<Option<String>, HandlerError> {
        Ok(self.state().github_token.clone())
    }

    async fn set_github_token(&self, token: Option<&str>) -> Result<(), HandlerError> {
        debug!(set = token.is_some(), "HeadlessHost::set_github_token: called");
        self.state().github_token = token.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headless_open_close_tracks_current_file() {
        let host = HeadlessHost::new();
        host.set_file_open("/a.rs", true).await.unwrap();
        host.set_file_open("/b.rs", true).await.unwrap();
        assert_eq!(host.current_file().await.unwrap().as_deref(), Some("/b.rs"));

        host.set_file_open("/b.rs", false).await.unwrap();
        assert_eq!(host.open_files().await.unwrap(), vec!["/a.rs".to_string()]);
        assert_eq!(host.current_file().await.unwrap().as_deref(), Some("/a.rs"));
    }

    #[tokio::test]
    async fn test_headless_problems_filter_by_file() {
        let host = HeadlessHost::new();
        host.add_problem(Problem {
            filepath: "/a.rs".to_string(),
            range: Range::default(),
            message: "unused variable".to_string(),
        });
        host.add_problem(Problem {
            filepath: "/b.rs".to_string(),
            range: Range::default(),
            message: "type mismatch".to_string(),
        });

        let problems = host.problems(Some("/b.rs")).await.unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].message, "type mismatch");

        // No current file, no filter
        assert_eq!(host.problems(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_default_capabilities_not_supported() {
        struct Bare;
        impl EditorHost for Bare {}

        let err = Bare.insert_at_cursor("x").await.unwrap_err();
        assert!(matches!(err, HandlerError::NotSupported { .. }));
        assert!(Bare.selection().await.unwrap().is_none());
        assert!(matches!(
            Bare.apply_to_file("x").await.unwrap_err(),
            HandlerError::NotSupported { .. }
        ));
        assert!(Bare.set_github_token(Some("t")).await.is_err());
        Bare.run_command("workbench.action.reload").await.unwrap();
        assert_eq!(Bare.search("fn main").await.unwrap(), "");
        assert!(Bare.session_id().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_headless_visible_files_follow_open_files() {
        let host = HeadlessHost::new();
        host.set_file_open("/a.rs", true).await.unwrap();
        assert_eq!(host.visible_files().await.unwrap(), vec!["/a.rs".to_string()]);

        assert!(host.github_token().await.unwrap().is_none());
        host.set_github_token(Some("ghp_123")).await.unwrap();
        assert_eq!(host.github_token().await.unwrap().as_deref(), Some("ghp_123"));
    }

    #[test]
    fn test_ide_info_wire_names() {
        let value = serde_json::to_value(IdeInfo::headless()).unwrap();
        assert_eq!(value["ideType"], "headless");
        assert_eq!(value["name"], "hostrouter");
        assert!(value["remoteName"] == "local" || value["remoteName"] == "ssh");
    }
}
