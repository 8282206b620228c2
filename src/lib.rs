//! # toolmesh
//!
//! Runs external linting and analysis tools across a codebase, driven by a
//! `toolmesh.toml` configuration.
//!
//! - `core`: contexts, command builders, filters, the commands map, the runners and
//!   the evaluation history.
//! - `system`: spawning the tools.
//! - `cli`: the `toolmesh` command line.

pub mod cli;
/// Fixed names and defaults.
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
