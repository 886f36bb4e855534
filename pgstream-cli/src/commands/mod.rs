//! Command implementations for the pgstream CLI

pub mod serve;

pub use serve::run_serve;
