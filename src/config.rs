//! Configuration for tern.
//!
//! - [load]: the [Config] struct, its `tern.toml` location and the `--init` template.
//! - [general]: the runtime options ([General]) changed by the `set` builtin.

pub mod general;
pub mod load;

pub(crate) use general::General;
pub(crate) use load::Config;
