//! Landgraph command-line interface library.
//!
//! Exposes the clap command tree and the logging bootstrap so integration
//! tests can drive the CLI without spawning a process.

pub mod cli;
pub mod logging;
