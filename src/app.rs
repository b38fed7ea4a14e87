//! Application state and the event loop of tern.
//!
//! - [state]: the [AppState] owned by the reactor thread.
//! - [reactor]: the event loop, its message sources and the resync handlers.
//! - [handlers]: evaluation of command-language expressions and the builtins.
//! - [shell]: running shell commands in the four modes.
//! - [nav]: directory stack, caches, cursors and marked files.
//! - [cmdline], [keymap]: the command line and the key bindings feeding it.
//! - [history], [selection]: the history file and the file-selection file.
//! - [progress], [invalidate]: file operation counters and pending resync flags.

pub mod cmdline;
pub mod handlers;
pub mod history;
pub mod invalidate;
pub mod keymap;
pub mod nav;
pub mod progress;
pub mod reactor;
pub mod selection;
pub mod shell;
pub mod state;

pub(crate) use state::AppState;
