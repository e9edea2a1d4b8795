//! CLI commands.

pub mod catalog;
pub mod shell;

use thiserror::Error;

use emporium_storefront::ApiError;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storefront API error.
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),

    /// Terminal I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command-line input.
    #[error("{0}")]
    Usage(String),
}

/// Write a block of output to stdout.
#[allow(clippy::print_stdout)]
pub fn say(text: impl std::fmt::Display) {
    println!("{text}");
}
