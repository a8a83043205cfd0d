use std::ffi::NulError;
use thiserror::Error;

/// Failures that abort the current line.
///
/// Problems inside a forked child (program not found, unopenable
/// redirection target) never show up here; the child reports them itself.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("too many arguments (at most {limit})")]
    TooManyArguments { limit: usize },

    #[error("{target}: redirection target expands to nothing")]
    EmptyRedirectTarget { target: String },

    #[error("bad file descriptor `{0}`")]
    BadFileDescriptor(String),

    #[error("argument contains a NUL byte")]
    NulByte(#[from] NulError),

    #[error("pipe creation failed: {0}")]
    Pipe(#[source] nix::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] nix::Error),
}
