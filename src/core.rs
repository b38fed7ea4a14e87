//! Core runtime logic for tern.
//!
//! This module contains the non-UI "engine" pieces used by the application:
//! - [fm]: directory traversal and file metadata (see [browse_dir], [FileEntry]).
//! - [sort]: sort criteria for directory listings.
//! - [dir]: directory snapshots ([Dir]) and file previews ([Reg]).
//! - [formatter]: formatting helpers for sizes, times and previews.
//! - [worker]: background threads and the messages they send back.
//! - [shell]: building, starting and reaping shell commands.
//! - [command]: the command-language expression tree and parser.
//! - [terminal]: terminal setup/teardown, the [terminal::Screen] seam and input reading.
//! - [signals]: the signal supervisor thread.
//! - [remote]: the shared-server client.

pub mod command;
pub mod dir;
pub mod fm;
pub mod formatter;
pub mod remote;
pub mod shell;
pub mod signals;
pub mod sort;
pub mod terminal;
pub mod worker;

pub use dir::{Dir, Reg};
pub use fm::{FileEntry, browse_dir};
pub use formatter::{
    format_file_size, format_file_time, safe_read_preview, sanitize_to_exact_width,
};
pub use sort::{SortMethod, SortType};
