//! Shared plumbing for tsdbctl: configuration, logging, object store
//! construction and the command line arguments every subcommand accepts.

pub mod cli;
pub mod config;
pub mod logging;
pub mod storage;
