use super::ast::{
    Assignment, Command, CommandElement, Pipeline, RedirectOp, Redirection, Word, WordPart,
};
use super::error::ParseError;
use super::grammar;
use super::lexer::{Token, TokenKind, Tokenizer};

/// Recursive-descent parser, one method per production:
///
/// ```text
/// piped_command         := command_element_chain ( PIPE command_element_chain )*
/// command_element_chain := command_element ( command_element )*
/// command_element       := word | env_assignment | redirection_list
/// redirection_list      := redirection ( redirection )*
/// redirection           := REDIRECT word
/// word                  := piece word?
/// env_assignment        := NAME '=' word?
/// ```
///
/// Every production leaves the tokenizer on the first token after it.
pub struct Parser<'a> {
    lexer: Tokenizer<'a>,
}

/// Tokenizes and parses one input line.
pub fn parse_line(line: &str) -> Result<Pipeline, ParseError> {
    Parser::new(Tokenizer::new(line))?.parse()
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Tokenizer<'a>) -> Result<Self, ParseError> {
        lexer.next_token()?;
        Ok(Parser { lexer })
    }

    fn current(&self) -> &Token {
        self.lexer.current_token()
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn next_token(&mut self) -> Result<(), ParseError> {
        self.lexer.next_token()?;
        Ok(())
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.kind(),
            expected,
            position: self.current().position,
        }
    }

    pub fn parse(&mut self) -> Result<Pipeline, ParseError> {
        let pipeline = self.parse_piped_command()?;
        if !grammar::is_terminator(self.kind()) {
            return Err(self.unexpected("end of line"));
        }
        Ok(pipeline)
    }

    fn parse_piped_command(&mut self) -> Result<Pipeline, ParseError> {
        let mut commands = Vec::new();
        if grammar::is_terminator(self.kind()) {
            return Ok(Pipeline { commands });
        }

        commands.push(self.parse_command()?);
        while grammar::is_pipe(self.kind()) {
            self.next_token()?;
            commands.push(self.parse_command()?);
        }

        Ok(Pipeline { commands })
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        if !grammar::is_command_element_start(self.kind()) {
            return Err(self.unexpected("a command"));
        }

        let mut elements = Vec::new();
        let mut has_name = false;
        while grammar::is_command_element_start(self.kind()) {
            let element = self.parse_command_element(has_name)?;
            has_name |= matches!(element, CommandElement::Word(_));
            elements.push(element);
        }

        Ok(Command { elements })
    }

    fn parse_command_element(&mut self, has_name: bool) -> Result<CommandElement, ParseError> {
        let kind = self.kind();
        if grammar::is_redirection(kind) {
            Ok(CommandElement::Redirections(self.parse_redirection_list()?))
        } else if grammar::is_assignment(kind) {
            let assignment = self.parse_env_assignment()?;
            // 命令名之后的 NAME=value 只是普通参数
            if has_name {
                Ok(CommandElement::Word(assignment.into_word()))
            } else {
                Ok(CommandElement::Assignment(assignment))
            }
        } else if grammar::is_word_start(kind) {
            Ok(CommandElement::Word(self.parse_word()?))
        } else {
            Err(self.unexpected("a word, assignment or redirection"))
        }
    }

    fn parse_redirection_list(&mut self) -> Result<Vec<Redirection>, ParseError> {
        let mut list = vec![self.parse_redirection()?];
        while grammar::is_redirection(self.kind()) {
            list.push(self.parse_redirection()?);
        }
        Ok(list)
    }

    fn parse_redirection(&mut self) -> Result<Redirection, ParseError> {
        let op = match self.kind() {
            TokenKind::RedirectIn => RedirectOp::In,
            TokenKind::RedirectInOut => RedirectOp::InOut,
            TokenKind::RedirectOut => RedirectOp::Out,
            TokenKind::RedirectOutAppend => RedirectOp::Append,
            TokenKind::RedirectOutComposition => RedirectOp::Duplicate,
            _ => return Err(self.unexpected("a redirection")),
        };
        let position = self.current().position;
        let fd = match self.current().text.as_str() {
            "" => None,
            text => Some(text.parse::<i32>().map_err(|_| ParseError::BadFileDescriptor {
                text: text.to_string(),
                position,
            })?),
        };
        self.next_token()?;

        if !grammar::is_word_start(self.kind()) {
            return Err(self.unexpected("a redirection target"));
        }
        let target = self.parse_word()?;
        if op == RedirectOp::Duplicate && !target.is_fd_number() {
            return Err(ParseError::BadDuplicationTarget {
                target: target.to_string(),
                position,
            });
        }

        Ok(Redirection { fd, op, target })
    }

    fn parse_env_assignment(&mut self) -> Result<Assignment, ParseError> {
        if !grammar::is_assignment(self.kind()) {
            return Err(self.unexpected("an assignment"));
        }
        let name = self.current().text.clone();
        self.next_token()?;

        let value = if grammar::continues_word(self.current()) {
            self.parse_word()?
        } else {
            Word::default()
        };
        Ok(Assignment { name, value })
    }

    fn parse_word(&mut self) -> Result<Word, ParseError> {
        let mut parts = vec![self.parse_word_piece()?];
        while grammar::continues_word(self.current()) {
            parts.push(self.parse_word_piece()?);
        }
        Ok(Word { parts })
    }

    fn parse_word_piece(&mut self) -> Result<WordPart, ParseError> {
        let text = self.current().text.clone();
        let part = match self.kind() {
            TokenKind::Digit => WordPart::Digit(text),
            TokenKind::Letter => WordPart::Letter(text),
            TokenKind::Alphanum => WordPart::Alphanum(text),
            TokenKind::Word => WordPart::Literal(text),
            TokenKind::Env => WordPart::Env(text),
            TokenKind::Home => WordPart::Home(text),
            _ => return Err(self.unexpected("a word")),
        };
        self.next_token()?;
        Ok(part)
    }
}
