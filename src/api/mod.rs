//! Outer surfaces: the `passcompass` command line and the HTTP endpoint.

pub mod cli;
pub mod http;

pub use cli::{Cli, Command};
