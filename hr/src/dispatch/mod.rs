//! Command dispatch table
//!
//! Handlers are the capabilities the editor host exposes to presentation
//! panels and to the core engine. Each handler is looked up by message kind
//! and receives its payload plus an explicit `HostContext`; nothing reads
//! ambient host state.

mod config;
mod context;
mod error;
mod host;
mod table;
mod traits;

pub mod builtin;

pub use config::{DEFAULT_IGNORE_DIRS, DEFAULT_IGNORE_FILETYPES, IdeSettings, ListingConfig, TelemetryConfig};
pub use context::{DEFAULT_RC_FILES, HostContext};
pub use error::HandlerError;
pub use host::{
    EditorHost, HeadlessHost, IdeInfo, NoticeLevel, Position, Problem, Range, RangeInFile, RangeInFileWithContents,
};
pub use table::DispatchTable;
pub use traits::Handler;
