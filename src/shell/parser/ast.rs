use std::fmt;

/// One input line: the stages of a pipeline, left to right.
///
/// An empty line parses to a pipeline without commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub elements: Vec<CommandElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandElement {
    Word(Word),
    Assignment(Assignment),
    Redirections(Vec<Redirection>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    Digit(String),
    Letter(String),
    Alphanum(String),
    Literal(String),
    /// `$NAME` or `${NAME}`, holding the name.
    Env(String),
    /// `~` or `~user`, holding the user name.
    Home(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    /// Explicit descriptor, `None` for the operator's default stream.
    pub fd: Option<i32>,
    pub op: RedirectOp,
    pub target: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    In,
    InOut,
    Out,
    Append,
    Duplicate,
}

impl Pipeline {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Word {
    pub fn is_fd_number(&self) -> bool {
        matches!(self.parts.as_slice(), [WordPart::Digit(_)])
    }

    pub fn has_expansion(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, WordPart::Env(_) | WordPart::Home(_)))
    }
}

impl Assignment {
    /// The assignment read back as a plain `NAME=value` word.
    pub fn into_word(self) -> Word {
        let mut parts = vec![WordPart::Literal(format!("{}=", self.name))];
        parts.extend(self.value.parts);
        Word { parts }
    }
}

impl RedirectOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RedirectOp::In => "<",
            RedirectOp::InOut => "<>",
            RedirectOp::Out => ">",
            RedirectOp::Append => ">>",
            RedirectOp::Duplicate => ">&",
        }
    }

    /// The descriptor used when the redirection has no explicit fd.
    pub fn default_fd(self) -> i32 {
        match self {
            RedirectOp::In | RedirectOp::InOut => 0,
            RedirectOp::Out | RedirectOp::Append | RedirectOp::Duplicate => 1,
        }
    }
}

impl fmt::Display for WordPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordPart::Digit(s) | WordPart::Letter(s) | WordPart::Alphanum(s) | WordPart::Literal(s) => {
                f.write_str(s)
            }
            WordPart::Env(name) => write!(f, "${{{}}}", name),
            WordPart::Home(user) => write!(f, "~{}", user),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.parts.iter().try_for_each(|part| write!(f, "{}", part))
    }
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fd) = self.fd {
            write!(f, "{}", fd)?;
        }
        write!(f, "{}{}", self.op.symbol(), self.target)
    }
}

impl fmt::Display for CommandElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandElement::Word(word) => write!(f, "{}", word),
            CommandElement::Assignment(assignment) => {
                write!(f, "{}={}", assignment.name, assignment.value)
            }
            CommandElement::Redirections(list) => {
                let list: Vec<String> = list.iter().map(ToString::to_string).collect();
                f.write_str(&list.join(" "))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements: Vec<String> = self.elements.iter().map(ToString::to_string).collect();
        f.write_str(&elements.join(" "))
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commands: Vec<String> = self.commands.iter().map(ToString::to_string).collect();
        f.write_str(&commands.join(" | "))
    }
}
