//! Token categories the parser uses to pick a production.

use super::lexer::{Token, TokenKind};

/// A piece that can make up (part of) a word.
pub fn is_word_piece(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Digit
            | TokenKind::Letter
            | TokenKind::Alphanum
            | TokenKind::Word
            | TokenKind::Env
            | TokenKind::Home
    )
}

pub fn is_word_start(kind: TokenKind) -> bool {
    is_word_piece(kind)
}

/// Tokens after which an adjacent word piece continues the same word.
pub fn is_joinable(kind: TokenKind) -> bool {
    is_word_piece(kind) || is_assignment(kind)
}

pub fn is_assignment(kind: TokenKind) -> bool {
    kind == TokenKind::EnvAssignment
}

pub fn is_redirection(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RedirectIn
            | TokenKind::RedirectInOut
            | TokenKind::RedirectOut
            | TokenKind::RedirectOutAppend
            | TokenKind::RedirectOutComposition
    )
}

pub fn is_command_element_start(kind: TokenKind) -> bool {
    is_word_start(kind) || is_assignment(kind) || is_redirection(kind)
}

pub fn is_pipe(kind: TokenKind) -> bool {
    kind == TokenKind::Pipe
}

pub fn is_terminator(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::EndOfLine | TokenKind::EndOfFile)
}

/// Whether `token` continues the word the previous token belongs to.
pub fn continues_word(token: &Token) -> bool {
    token.joined && is_word_piece(token.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_disjoint() {
        let all = [
            TokenKind::Digit,
            TokenKind::Letter,
            TokenKind::Alphanum,
            TokenKind::Word,
            TokenKind::Env,
            TokenKind::Home,
            TokenKind::EnvAssignment,
            TokenKind::RedirectIn,
            TokenKind::RedirectInOut,
            TokenKind::RedirectOut,
            TokenKind::RedirectOutAppend,
            TokenKind::RedirectOutComposition,
            TokenKind::Pipe,
            TokenKind::EndOfLine,
            TokenKind::EndOfFile,
            TokenKind::Error,
        ];
        for kind in all {
            let hits = [
                is_word_piece(kind),
                is_assignment(kind),
                is_redirection(kind),
                is_pipe(kind),
                is_terminator(kind),
            ]
            .iter()
            .filter(|hit| **hit)
            .count();
            let expected = usize::from(kind != TokenKind::Error);
            assert_eq!(hits, expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_command_element_start() {
        assert!(is_command_element_start(TokenKind::Env));
        assert!(is_command_element_start(TokenKind::EnvAssignment));
        assert!(is_command_element_start(TokenKind::RedirectOutAppend));
        assert!(!is_command_element_start(TokenKind::Pipe));
        assert!(!is_command_element_start(TokenKind::EndOfLine));
    }

    #[test]
    fn test_continues_word() {
        let mut token = Token {
            kind: TokenKind::Letter,
            text: "x".to_string(),
            position: 3,
            joined: true,
        };
        assert!(continues_word(&token));
        token.joined = false;
        assert!(!continues_word(&token));
        token.joined = true;
        token.kind = TokenKind::Pipe;
        assert!(!continues_word(&token));
    }
}
