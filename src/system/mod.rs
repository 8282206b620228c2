//! # System Interaction Layer
//!
//! The boundary between the engine and the operating system.
//!
//! - **`executor`**: locating tools on `PATH`, spawning them against a source
//!   (blocking or async) and capturing their output.

pub mod executor;
