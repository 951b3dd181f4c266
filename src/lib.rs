//! `chainpipe`: OpenAI chat, document question answering and API chains from the command line.

/// CLI subcommands.
pub mod commands;
/// Profile configuration file.
pub mod config;
/// stderr diagnostics.
pub mod logging;
/// Chat model client, loaders and chains.
pub mod rchain;

/// Version string with build metadata, as printed by `--version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("CP_GIT_SHA"),
    ", built: ",
    env!("CP_BUILD_TS"),
    ")"
);
