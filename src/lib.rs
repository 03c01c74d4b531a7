//! Build orchestration for versioned documentation sites.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
