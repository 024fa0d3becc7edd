//! CLI command implementations

pub mod error;
pub mod generate;
pub mod markets;

pub use error::CliError;
pub use generate::{Cli, Commands, GenerateArgs};
pub use markets::MarketsCommand;
