use thiserror::Error;

use super::lexer::TokenKind;

/// Scanning failures. All of them abort the current line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("command element at position {position} is longer than {limit} characters")]
    ElementTooLong { position: usize, limit: usize },

    #[error("missing `}}` for the variable reference at position {position}")]
    UnterminatedBrace { position: usize },

    #[error("bad substitution at position {position}")]
    BadSubstitution { position: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("syntax error near {found} at position {position}: expected {expected}")]
    UnexpectedToken {
        found: TokenKind,
        expected: &'static str,
        position: usize,
    },

    #[error("bad file descriptor `{text}` at position {position}")]
    BadFileDescriptor { text: String, position: usize },

    #[error("`>&` at position {position} needs a file descriptor number, found `{target}`")]
    BadDuplicationTarget { target: String, position: usize },
}
