//! Command-line tooling for inspecting protocol data

pub mod commands;

pub use commands::{cmd_bloom, cmd_decode, cmd_filter, cmd_init, cmd_ping, CliResult};
