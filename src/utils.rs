//! Miscellaneous utility functions for tern.
//!
//! - [cli]: command-line argument parsing and help text.
//! - [helpers]: home directory handling, unused path generation and recursive copies.

pub mod cli;
pub mod helpers;

pub use helpers::{
    copy_recursive, expand_home_path, get_home, get_unused_path, shorten_home_path,
};
