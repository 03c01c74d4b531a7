//! Application services: the build orchestration pipeline.

pub mod error;
pub mod ledger;
pub mod locks;
pub mod materialize;
pub mod pipeline;
pub mod render;
pub mod repos;
pub mod scheduler;
pub mod structure;
pub mod toolchain;
pub mod versions;
