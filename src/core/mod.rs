// src/core/mod.rs

//! # Engine
//!
//! Everything between `toolmesh.toml` and a finished evaluation.
//!
//! - **`context`**, **`specification`**, **`command_builder`**: how a command line is
//!   derived from the contexts a source is evaluated under.
//! - **`filter`**, **`commands_map`**: which builders apply to which sources.
//! - **`configuration`**, **`config_loader`**, **`paths`**: loading and editing the
//!   configuration.
//! - **`runner`**, **`cache`**: running the plan and keeping its history.

pub mod cache;
pub mod command_builder;
/// The execution plan and how it is resolved.
pub mod commands_map;
pub mod config_loader;
pub mod configuration;
pub mod context;
pub mod errors;
pub mod filter;
/// Well-known locations and path expansion.
pub mod paths;
pub mod runner;
/// Per-context argument rules.
pub mod specification;
