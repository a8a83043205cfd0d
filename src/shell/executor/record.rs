use nix::fcntl::OFlag;
use std::os::fd::RawFd;
use std::str::FromStr;

/// One pipeline stage after expansion: what to run and how to wire it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRecord {
    /// `None` for stages made only of assignments and redirections.
    pub program: Option<String>,
    pub argv: Vec<String>,
    /// Assignments exported to this stage's child only.
    pub assignments: Vec<(String, String)>,
    pub redirections: Vec<RedirectPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPlan {
    pub fd: RawFd,
    pub action: RedirectAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    Open { path: String, mode: OpenMode },
    /// `fd` becomes a copy of this descriptor.
    Duplicate(RawFd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadWrite,
    Truncate,
    Append,
}

impl OpenMode {
    pub fn flags(self) -> OFlag {
        match self {
            OpenMode::Read => OFlag::O_RDONLY,
            OpenMode::ReadWrite => OFlag::O_RDWR | OFlag::O_CREAT,
            OpenMode::Truncate => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            OpenMode::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
        }
    }
}

/// Where `NAME=value cmd` assignments end up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentScope {
    /// Only the child of the stage the assignment precedes sees it.
    #[default]
    Stage,
    /// The shell environment itself is updated, so later words and stages
    /// of the same line, and every later line, see the value.
    Shared,
}

impl FromStr for AssignmentScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stage" => Ok(AssignmentScope::Stage),
            "shared" => Ok(AssignmentScope::Shared),
            other => Err(format!("unknown assignment scope: {}", other)),
        }
    }
}

/// What the read loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Continue(i32),
    Exit(i32),
}
