//! Built-in host capabilities

mod editor;
mod files;
mod git;
mod identity;
mod listing;
mod window;

use serde_json::Value;

use super::error::HandlerError;
use super::table::DispatchTable;

pub use editor::{
    ApplyToFileHandler, GetCurrentFileHandler, GetHighlightedCodeHandler, GetOpenFilesHandler, GetPinnedFilesHandler,
    GetProblemsHandler, GetSearchResultsHandler, HighlightCodeHandler, InsertAtCursorHandler, OpenFileHandler,
    SaveFileHandler, SetFileOpenHandler, SetSuggestionsLockedHandler, ShowDiffHandler, ShowLinesHandler,
    ShowVirtualFileHandler, VisibleFilesHandler,
};
pub use files::{
    FileExistsHandler, GetLastModifiedHandler, MAX_READ_BYTES, ReadFileHandler, ReadRangeInFileHandler,
    WriteFileHandler, slice_range,
};
pub use git::{GetBranchHandler, GetDiffHandler, GetGitRootPathHandler, GetRepoNameHandler};
pub use identity::{
    GetContinueDirHandler, GetControlPlaneSessionInfoHandler, GetGitHubAuthTokenHandler, GetIdeInfoHandler,
    GetIdeSettingsHandler, GetSessionIdHandler, GetUniqueIdHandler, IsTelemetryEnabledHandler,
    LogoutOfControlPlaneHandler, PathSepHandler, SetGitHubAuthTokenHandler, UniqueIdHandler, machine_id,
};
pub use listing::{
    GetWorkspaceConfigsHandler, GetWorkspaceDirsHandler, ListDirHandler, ListFoldersHandler,
    ListWorkspaceContentsHandler, WalkTarget, walk_workspace,
};
pub use window::{
    CopyTextHandler, ErrorPopupHandler, GetTerminalContentsHandler, OpenUrlHandler, RunCommandHandler,
    ShowMessageHandler,
};

/// Register every built-in handler
pub fn register_all(table: &mut DispatchTable) {
    // Files
    table.add(ReadFileHandler);
    table.add(WriteFileHandler);
    table.add(FileExistsHandler);
    table.add(ReadRangeInFileHandler);
    table.add(GetLastModifiedHandler);

    // Workspace
    table.add(ListDirHandler);
    table.add(ListWorkspaceContentsHandler);
    table.add(ListFoldersHandler);
    table.add(GetWorkspaceDirsHandler);
    table.add(GetWorkspaceConfigsHandler);

    // Version control
    table.add(GetBranchHandler);
    table.add(GetRepoNameHandler);
    table.add(GetDiffHandler);
    table.add(GetGitRootPathHandler);

    // Editor state
    table.add(GetCurrentFileHandler);
    table.add(GetOpenFilesHandler);
    table.add(VisibleFilesHandler);
    table.add(GetPinnedFilesHandler);
    table.add(GetHighlightedCodeHandler);
    table.add(OpenFileHandler);
    table.add(SetFileOpenHandler);
    table.add(SaveFileHandler);
    table.add(ShowVirtualFileHandler);
    table.add(InsertAtCursorHandler);
    table.add(GetProblemsHandler);
    table.add(HighlightCodeHandler);
    table.add(ShowLinesHandler);
    table.add(ShowDiffHandler);
    table.add(ApplyToFileHandler);
    table.add(SetSuggestionsLockedHandler);
    table.add(GetSearchResultsHandler);

    // Window
    table.add(CopyTextHandler);
    table.add(ShowMessageHandler);
    table.add(ErrorPopupHandler);
    table.add(OpenUrlHandler);
    table.add(GetTerminalContentsHandler);
    table.add(RunCommandHandler);

    // Identity and settings
    table.add(GetIdeInfoHandler);
    table.add(UniqueIdHandler);
    table.add(GetUniqueIdHandler);
    table.add(PathSepHandler);
    table.add(GetIdeSettingsHandler);
    table.add(IsTelemetryEnabledHandler);
    table.add(GetControlPlaneSessionInfoHandler);
    table.add(LogoutOfControlPlaneHandler);
    table.add(GetContinueDirHandler);
    table.add(GetGitHubAuthTokenHandler);
    table.add(SetGitHubAuthTokenHandler);
    table.add(GetSessionIdHandler);
}

/// Required string field of an object payload
pub(crate) fn str_field<'a>(payload: &'a Value, field: &str) -> Result<&'a str, HandlerError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::missing(field))
}

/// Payload that is either a bare string or an object carrying `field`
pub(crate) fn str_or_field<'a>(payload: &'a Value, field: &str) -> Result<&'a str, HandlerError> {
    match payload {
        Value::String(s) => Ok(s),
        _ => str_field(payload, field),
    }
}
