//! Domain layer types and invariants.

pub mod blocks;
pub mod entities;
pub mod error;
pub mod ordering;
pub mod slug;
pub mod tree;
pub mod types;
