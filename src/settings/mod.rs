//! TOML settings for the session client, plus the `--settings` CLI flag
//! used by the demo binaries.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
