pub mod classify;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod headers;
pub mod identity;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod result;
pub mod shard;
pub mod sources;
pub mod store;
pub mod utils;
pub mod writer;

pub mod cmd {
    pub use crate::commands::Cli;
}
