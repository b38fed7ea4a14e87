//! Terminal UI for tern.
//!
//! - [render]: the frame layout and the status line.
//! - [panes]: the directory and preview columns.

pub mod panes;
pub mod render;

pub(crate) use render::render;
