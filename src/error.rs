//! Error kinds surfaced by the command core and the API adapter.
//!
//! Everything here propagates to `main` untouched; handlers wrap these in
//! `anyhow` with extra context where it helps the reader of `error: ...`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid command: {0}")]
    UnknownCommand(String),

    #[error("duplicate command '{name}' (defined in both '{first}' and '{second}')")]
    DuplicateCommand {
        name: String,
        first: String,
        second: String,
    },

    #[error("{0}")]
    Decode(String),

    #[error("missing argument: {0} (supply it with -a {0}=VALUE or GHIZMO_{upper})", upper = .0.to_ascii_uppercase())]
    MissingArgument(String),

    #[error("invalid argument {key}: {reason}")]
    InvalidArgument { key: String, reason: String },

    #[error("unsupported format: {0} (expected json or yaml)")]
    UnsupportedFormat(String),

    #[error("login failure: {0}")]
    LoginFailure(String),

    #[error("{0}")]
    RepositoryResolution(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("API request failed: {status} {path}: {message}")]
    Api {
        status: u16,
        path: String,
        message: String,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
