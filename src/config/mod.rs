//! Configuration module for repominer
//!
//! This module handles:
//! - Repository-level configuration (repominer.toml)
//! - Environment overrides for the diff and file-count limits
//! - Collection toggles and filter settings

mod miner_config;

pub use miner_config::{
    load_miner_config, CollectConfig, FilterConfig, MinerConfig, CONFIG_FILE_NAME,
    DEFAULT_MAX_DIFF_BYTES, DEFAULT_MAX_FILES, ENV_MAX_DIFF, ENV_MAX_FILES,
};
