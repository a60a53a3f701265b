//! Management gateway HTTP boundary and configuration

pub mod api;
pub mod config;
