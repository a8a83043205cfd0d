//! Process wiring for one pipeline.
//!
//! All stages are prepared first (paths resolved, C strings built), then
//! every pipe is opened and every stage forked. No child is waited on
//! before the last stage has been forked.

use log::{debug, error};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
#[cfg(not(any(target_os = "linux", target_os = "android")))]
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execve, fork, ForkResult, Pid};
use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStringExt;

use super::environment::Environment;
use super::error::ExecError;
use super::record::{CommandRecord, RedirectAction, RedirectPlan};
use crate::shell::signals::restore_default_signals;
use crate::utils::path::resolve_program;

const STATUS_REDIRECT_FAILED: i32 = 1;
const STATUS_NOT_EXECUTABLE: i32 = 126;
const STATUS_NOT_FOUND: i32 = 127;

struct PreparedProgram {
    name: String,
    display: String,
    /// `None` when the program was not found in `PATH`.
    path: Option<CString>,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

enum PreparedTarget {
    Open {
        path: CString,
        display: String,
        flags: OFlag,
    },
    Duplicate(RawFd),
}

struct PreparedRedirect {
    fd: RawFd,
    target: PreparedTarget,
}

struct PreparedStage {
    program: Option<PreparedProgram>,
    redirections: Vec<PreparedRedirect>,
}

#[derive(Clone, Copy)]
struct StageIo {
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
}

enum Spawned {
    Running(Pid),
    Finished(i32),
}

impl PreparedRedirect {
    fn new(plan: &RedirectPlan) -> Result<Self, ExecError> {
        let target = match &plan.action {
            RedirectAction::Open { path, mode } => PreparedTarget::Open {
                path: CString::new(path.as_str())?,
                display: path.clone(),
                flags: mode.flags(),
            },
            RedirectAction::Duplicate(source) => PreparedTarget::Duplicate(*source),
        };
        Ok(Self {
            fd: plan.fd,
            target,
        })
    }

    /// Runs in the child, after the pipe wiring.
    fn apply(&self) -> Result<(), String> {
        match &self.target {
            PreparedTarget::Open {
                path,
                display,
                flags,
            } => {
                let fd = open(path.as_c_str(), *flags, Mode::from_bits_truncate(0o644))
                    .map_err(|err| format!("treesh: {}: {}\n", display, err.desc()))?;
                if fd != self.fd {
                    dup2(fd, self.fd)
                        .map_err(|err| format!("treesh: {}: {}\n", self.fd, err.desc()))?;
                    let _ = close(fd);
                }
            }
            PreparedTarget::Duplicate(source) => {
                dup2(*source, self.fd)
                    .map_err(|err| format!("treesh: {}: {}\n", source, err.desc()))?;
            }
        }
        Ok(())
    }
}

impl PreparedStage {
    fn new(record: &CommandRecord, env: &Environment) -> Result<Self, ExecError> {
        let redirections = record
            .redirections
            .iter()
            .map(PreparedRedirect::new)
            .collect::<Result<Vec<_>, _>>()?;

        let program = match &record.program {
            None => None,
            Some(name) => {
                let path = resolve_program(name, env.lookup(&record.assignments, "PATH"))
                    .map(|path| CString::new(path.into_os_string().into_vec()))
                    .transpose()?;
                let argv = record
                    .argv
                    .iter()
                    .map(|arg| CString::new(arg.as_str()))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(PreparedProgram {
                    name: name.clone(),
                    display: shell_words::join(&record.argv),
                    path,
                    argv,
                    envp: env.to_envp(&record.assignments)?,
                })
            }
        };

        Ok(Self {
            program,
            redirections,
        })
    }

    /// A stage without a program still creates its output files.
    fn touch_targets(&self) -> i32 {
        for redirect in &self.redirections {
            if let PreparedTarget::Open {
                path,
                display,
                flags,
            } = &redirect.target
            {
                match open(path.as_c_str(), *flags, Mode::from_bits_truncate(0o644)) {
                    Ok(fd) => {
                        let _ = close(fd);
                    }
                    Err(err) => {
                        eprintln!("treesh: {}: {}", display, err.desc());
                        return STATUS_REDIRECT_FAILED;
                    }
                }
            }
        }
        0
    }
}

/// Opens the file targets of a stage that runs inside the shell, creating
/// or truncating them. Returns 1 when a target cannot be opened.
pub fn touch_redirect_targets(record: &CommandRecord) -> Result<i32, ExecError> {
    let stage = PreparedStage {
        program: None,
        redirections: record
            .redirections
            .iter()
            .map(PreparedRedirect::new)
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(stage.touch_targets())
}

/// Runs the resolved stages as one pipeline and returns the exit status of
/// the last stage.
pub fn run_pipeline(records: &[CommandRecord], env: &Environment) -> Result<i32, ExecError> {
    let stages = records
        .iter()
        .map(|record| PreparedStage::new(record, env))
        .collect::<Result<Vec<_>, _>>()?;

    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(stages.len());
    for _ in 1..stages.len() {
        pipes.push(cloexec_pipe().map_err(ExecError::Pipe)?);
    }
    let pipe_fds: Vec<RawFd> = pipes
        .iter()
        .flat_map(|(read, write)| [read.as_raw_fd(), write.as_raw_fd()])
        .collect();

    let mut spawned = Vec::with_capacity(stages.len());
    let mut failure = None;
    for (index, stage) in stages.iter().enumerate() {
        let io = StageIo {
            stdin: index.checked_sub(1).map(|prev| pipes[prev].0.as_raw_fd()),
            stdout: pipes.get(index).map(|(_, write)| write.as_raw_fd()),
        };

        let Some(program) = &stage.program else {
            spawned.push(Spawned::Finished(stage.touch_targets()));
            continue;
        };

        // SAFETY: the child only rewires descriptors and then either execs
        // or leaves through `_exit`; it never returns into shell code.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!("启动第 {} 段: {} (pid {})", index + 1, program.display, child);
                spawned.push(Spawned::Running(child));
            }
            Ok(ForkResult::Child) => exec_child(program, &stage.redirections, io, &pipe_fds),
            Err(err) => {
                failure = Some(ExecError::Fork(err));
                break;
            }
        }
    }

    // 父进程不再需要任何管道端
    drop(pipes);

    let status = reap(spawned, &mut failure);

    match failure {
        Some(err) => Err(err),
        None => Ok(status),
    }
}

/// Waits on every running stage and returns the status of the last one.
/// A wait error does not stop the loop; the first one is kept in `failure`.
fn reap(spawned: Vec<Spawned>, failure: &mut Option<ExecError>) -> i32 {
    let mut status = 0;
    for stage in spawned {
        match stage {
            Spawned::Running(pid) => match wait_child(pid) {
                Ok(code) => status = code,
                Err(err) => {
                    error!("等待进程 {} 失败: {}", pid, err);
                    failure.get_or_insert(err);
                }
            },
            Spawned::Finished(code) => status = code,
        }
    }
    status
}

/// Pipe ends are close-on-exec so that children of concurrently running
/// pipelines never inherit them.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

fn wait_child(pid: Pid) -> Result<i32, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                debug!("进程 {} 退出, 状态 {}", pid, code);
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                debug!("进程 {} 被信号 {} 终止", pid, signal);
                return Ok(128 + signal as i32);
            }
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(err) => return Err(ExecError::Wait(err)),
        }
    }
}

fn report(message: &str) {
    let _ = nix::unistd::write(std::io::stderr(), message.as_bytes());
}

/// Child side of `fork`: wire descriptors, then exec. Never returns.
fn exec_child(
    program: &PreparedProgram,
    redirections: &[PreparedRedirect],
    io: StageIo,
    pipe_fds: &[RawFd],
) -> ! {
    restore_default_signals();
    let code = match wire_descriptors(redirections, io, pipe_fds) {
        Err(message) => {
            report(&message);
            STATUS_REDIRECT_FAILED
        }
        Ok(()) => match &program.path {
            None => {
                report(&format!("treesh: {}: command not found\n", program.name));
                STATUS_NOT_FOUND
            }
            Some(path) => match execve(path, &program.argv, &program.envp) {
                Ok(never) => match never {},
                Err(err) => {
                    report(&format!("treesh: {}: {}\n", program.name, err.desc()));
                    if err == Errno::ENOENT {
                        STATUS_NOT_FOUND
                    } else {
                        STATUS_NOT_EXECUTABLE
                    }
                }
            },
        },
    };
    // SAFETY: `_exit` skips the parent's atexit handlers and stdio buffers,
    // which belong to the shell process, not to this child.
    unsafe { libc::_exit(code) }
}

fn wire_descriptors(
    redirections: &[PreparedRedirect],
    io: StageIo,
    pipe_fds: &[RawFd],
) -> Result<(), String> {
    if let Some(fd) = io.stdin {
        dup2(fd, libc::STDIN_FILENO).map_err(|err| format!("treesh: stdin: {}\n", err.desc()))?;
    }
    if let Some(fd) = io.stdout {
        dup2(fd, libc::STDOUT_FILENO)
            .map_err(|err| format!("treesh: stdout: {}\n", err.desc()))?;
    }
    for fd in pipe_fds {
        let _ = close(*fd);
    }
    // 显式重定向优先于管道连接
    for redirect in redirections {
        redirect.apply()?;
    }
    Ok(())
}
