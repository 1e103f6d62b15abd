//! Repominer - incremental git history mining
//!
//! Ingests commits into an embedded store once, then derives per-developer
//! contribution totals, current line ownership, per-file blame roll-ups and
//! commit size views from what is stored.

pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod git;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::{MineError, MineResult};
