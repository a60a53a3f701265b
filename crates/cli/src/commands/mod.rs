//! Subcommand implementations, one module per API area

pub mod cluster;
pub mod containers;
pub mod monitoring;
