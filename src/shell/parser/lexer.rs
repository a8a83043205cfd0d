use log::debug;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::error::LexError;
use super::grammar;

/// Longest text a single token may carry.
pub const MAX_ELEMENT_LEN: usize = 1024;

/// Punctuation that may appear inside a word without quoting.
const WORD_PUNCTUATION: &[char] = &[
    '!', '"', '#', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', ':', ';', '?', '@',
    '[', '\\', ']', '^', '_', '`', '{', '}',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Digit,
    Letter,
    Alphanum,
    Word,
    Env,
    Home,
    EnvAssignment,
    RedirectIn,
    RedirectInOut,
    RedirectOut,
    RedirectOutAppend,
    RedirectOutComposition,
    Pipe,
    EndOfLine,
    EndOfFile,
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Digit => "number",
            TokenKind::Letter | TokenKind::Alphanum | TokenKind::Word => "word",
            TokenKind::Env => "variable reference",
            TokenKind::Home => "`~`",
            TokenKind::EnvAssignment => "assignment",
            TokenKind::RedirectIn => "`<`",
            TokenKind::RedirectInOut => "`<>`",
            TokenKind::RedirectOut => "`>`",
            TokenKind::RedirectOutAppend => "`>>`",
            TokenKind::RedirectOutComposition => "`>&`",
            TokenKind::Pipe => "`|`",
            TokenKind::EndOfLine => "end of line",
            TokenKind::EndOfFile => "end of input",
            TokenKind::Error => "invalid token",
        };
        f.write_str(name)
    }
}

/// The token most recently produced by a [`Tokenizer`].
///
/// `text` depends on the kind: the literal run for word pieces, the variable
/// name for `Env`, the user name (possibly empty) for `Home`, the key for
/// `EnvAssignment` and the explicit fd number (possibly empty) for
/// redirections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
    /// No whitespace separates this token from the word piece before it.
    pub joined: bool,
}

impl Token {
    fn empty() -> Self {
        Self {
            kind: TokenKind::Error,
            text: String::new(),
            position: 0,
            joined: false,
        }
    }

    fn reset(&mut self, position: usize, joined: bool) {
        self.kind = TokenKind::Error;
        self.text.clear();
        self.position = position;
        self.joined = joined;
    }
}

pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || WORD_PUNCTUATION.contains(&c)
        || (!c.is_ascii() && !c.is_whitespace() && !c.is_control())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_name_char),
        _ => false,
    }
}

fn classify_run(text: &str) -> TokenKind {
    if text.chars().all(|c| c.is_ascii_digit()) {
        TokenKind::Digit
    } else if text.chars().all(|c| c.is_ascii_alphabetic()) {
        TokenKind::Letter
    } else if text.chars().all(|c| c.is_ascii_alphanumeric()) {
        TokenKind::Alphanum
    } else {
        TokenKind::Word
    }
}

/// Lazy scanner over one input line.
///
/// Only the current token is materialized; [`Tokenizer::next_token`]
/// overwrites it in place.
pub struct Tokenizer<'a> {
    input: Peekable<Chars<'a>>,
    position: usize,
    length: usize,
    token: Token,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            position: 0,
            length: 0,
            token: Token::empty(),
        }
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }

    pub fn next_token(&mut self) -> Result<&Token, LexError> {
        let previous = self.token.kind;
        let follows_piece = grammar::is_joinable(previous);
        let separated = self.skip_blanks();
        self.token.reset(self.position, follows_piece && !separated);
        self.length = 0;

        match self.peek_char() {
            None => self.token.kind = TokenKind::EndOfFile,
            // Left unconsumed so that the end of line stays the current token.
            Some('\n') => self.token.kind = TokenKind::EndOfLine,
            Some('$') => {
                self.read_char();
                self.scan_env()?;
            }
            // `~` expands only at the start of a word or of an assignment value
            Some('~') if self.token.joined && !grammar::is_assignment(previous) => {
                self.read_char();
                self.append('~')?;
                self.token.kind = TokenKind::Word;
            }
            Some('~') => {
                self.read_char();
                self.scan_home()?;
            }
            Some('<') => {
                self.read_char();
                self.scan_redirect_in();
            }
            Some('>') => {
                self.read_char();
                self.scan_redirect_out();
            }
            Some('|') => {
                self.read_char();
                self.token.kind = TokenKind::Pipe;
            }
            Some(_) => self.scan_run()?,
        }

        Ok(&self.token)
    }

    fn read_char(&mut self) -> Option<char> {
        let c = self.input.next()?;
        self.position += 1;
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    /// Skips whitespace other than newlines, and drops characters no token
    /// can start with. Returns whether any whitespace was skipped.
    fn skip_blanks(&mut self) -> bool {
        let mut separated = false;
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            if c.is_whitespace() {
                separated = true;
            } else if is_word_char(c) || "$~<>|=".contains(c) {
                break;
            } else {
                debug!("忽略无法识别的字符 {:?} (位置 {})", c, self.position);
            }
            self.read_char();
        }
        separated
    }

    fn append(&mut self, c: char) -> Result<(), LexError> {
        if self.length >= MAX_ELEMENT_LEN {
            return Err(LexError::ElementTooLong {
                position: self.token.position,
                limit: MAX_ELEMENT_LEN,
            });
        }
        self.token.text.push(c);
        self.length += 1;
        Ok(())
    }

    /// Scans a run of word characters, which may turn out to be an
    /// assignment head or the fd prefix of a redirection.
    fn scan_run(&mut self) -> Result<(), LexError> {
        let at_boundary = !self.token.joined;

        while let Some(c) = self.peek_char() {
            match c {
                '=' if at_boundary && is_identifier(&self.token.text) => {
                    self.read_char();
                    self.token.kind = TokenKind::EnvAssignment;
                    return Ok(());
                }
                '<' | '>'
                    if at_boundary
                        && !self.token.text.is_empty()
                        && self.token.text.chars().all(|c| c.is_ascii_digit()) =>
                {
                    self.read_char();
                    if c == '<' {
                        self.scan_redirect_in();
                    } else {
                        self.scan_redirect_out();
                    }
                    return Ok(());
                }
                c if is_word_char(c) || c == '=' => {
                    self.read_char();
                    self.append(c)?;
                }
                _ => break,
            }
        }

        self.token.kind = classify_run(&self.token.text);
        Ok(())
    }

    /// Scans the name after `$`, either bare or braced.
    fn scan_env(&mut self) -> Result<(), LexError> {
        let start = self.token.position;
        match self.peek_char() {
            Some('{') => {
                self.read_char();
                loop {
                    match self.peek_char() {
                        Some('}') => {
                            self.read_char();
                            break;
                        }
                        Some(c) if is_name_char(c) => {
                            self.read_char();
                            self.append(c)?;
                        }
                        None | Some('\n') => {
                            return Err(LexError::UnterminatedBrace { position: start })
                        }
                        Some(_) => return Err(LexError::BadSubstitution { position: start }),
                    }
                }
                if self.token.text.is_empty() {
                    return Err(LexError::BadSubstitution { position: start });
                }
                self.token.kind = TokenKind::Env;
            }
            Some(c) if is_name_char(c) => {
                while let Some(c) = self.peek_char().filter(|c| is_name_char(*c)) {
                    self.read_char();
                    self.append(c)?;
                }
                self.token.kind = TokenKind::Env;
            }
            _ => {
                self.append('$')?;
                self.token.kind = TokenKind::Word;
            }
        }
        Ok(())
    }

    /// Scans the optional user name after `~`.
    fn scan_home(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek_char().filter(|c| is_name_char(*c)) {
            self.read_char();
            self.append(c)?;
        }
        self.token.kind = TokenKind::Home;
        Ok(())
    }

    fn scan_redirect_in(&mut self) {
        self.token.kind = TokenKind::RedirectIn;
        if self.peek_char() == Some('>') {
            self.read_char();
            self.token.kind = TokenKind::RedirectInOut;
        }
    }

    fn scan_redirect_out(&mut self) {
        self.token.kind = match self.peek_char() {
            Some('>') => TokenKind::RedirectOutAppend,
            Some('&') => TokenKind::RedirectOutComposition,
            _ => TokenKind::RedirectOut,
        };
        if self.token.kind != TokenKind::RedirectOut {
            self.read_char();
        }
    }
}
