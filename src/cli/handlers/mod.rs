// src/cli/handlers/mod.rs

//! One module per `toolmesh` subcommand.

pub mod commons;
/// `toolmesh history`.
pub mod history;
/// `toolmesh plan`.
pub mod plan;
/// `toolmesh rerun`.
pub mod rerun;
/// `toolmesh run`.
pub mod run;
