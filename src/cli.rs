//! CLI argument parsing and command dispatch

pub mod args;
pub mod common;
pub mod extract;
pub mod generate;
pub mod init;
pub mod lint;
pub mod list;

pub use args::{Cli, ColorChoice, Command, OutputFormat};
