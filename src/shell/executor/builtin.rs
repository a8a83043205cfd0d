use log::debug;
use std::env;

use super::environment::Environment;
use super::record::{CommandRecord, LineStatus};

/// Consulted before a single-stage pipeline is forked.
///
/// Returning `None` means the command is not a builtin and must be run as
/// an external program.
pub trait BuiltinDispatch {
    /// Whether `name` runs inside the shell process.
    fn is_builtin(&self, name: &str) -> bool;

    fn dispatch(&mut self, command: &CommandRecord, env: &mut Environment) -> Option<LineStatus>;
}

#[derive(Debug, Default)]
pub struct Builtins;

impl BuiltinDispatch for Builtins {
    fn is_builtin(&self, name: &str) -> bool {
        matches!(name, "cd" | "exit" | "unset")
    }

    fn dispatch(&mut self, command: &CommandRecord, env: &mut Environment) -> Option<LineStatus> {
        let status = match command.program.as_deref()? {
            "cd" => self.builtin_cd(command, env),
            "exit" => self.builtin_exit(command),
            "unset" => self.builtin_unset(command, env),
            _ => return None,
        };
        debug!("执行内建命令: {:?}", command.argv);
        Some(status)
    }
}

impl Builtins {
    fn builtin_cd(&mut self, command: &CommandRecord, env: &mut Environment) -> LineStatus {
        let target = match command.argv.get(1).map(String::as_str) {
            None => match env.home_dir() {
                Some(home) => home,
                None => {
                    eprintln!("cd: HOME not set");
                    return LineStatus::Continue(1);
                }
            },
            Some("-") => match env.get("OLDPWD") {
                Some(old) => {
                    println!("{}", old);
                    old.to_string()
                }
                None => {
                    eprintln!("cd: OLDPWD not set");
                    return LineStatus::Continue(1);
                }
            },
            Some(path) => path.to_string(),
        };

        let previous = env
            .get("PWD")
            .map(str::to_string)
            .or_else(|| env::current_dir().ok().map(|p| p.to_string_lossy().into_owned()));

        if let Err(err) = env::set_current_dir(&target) {
            eprintln!("cd: {}: {}", target, err);
            return LineStatus::Continue(1);
        }

        if let Some(previous) = previous {
            env.set("OLDPWD", previous);
        }
        match env::current_dir() {
            Ok(dir) => env.set("PWD", dir.to_string_lossy()),
            Err(_) => env.set("PWD", target),
        }
        LineStatus::Continue(0)
    }

    fn builtin_unset(&self, command: &CommandRecord, env: &mut Environment) -> LineStatus {
        let mut status = 0;
        for name in command.argv.iter().skip(1) {
            if name.is_empty() || name.contains('=') {
                eprintln!("unset: {}: not a valid identifier", name);
                status = 1;
                continue;
            }
            if env.unset(name).is_some() {
                debug!("删除变量: {}", name);
            }
        }
        LineStatus::Continue(status)
    }

    fn builtin_exit(&self, command: &CommandRecord) -> LineStatus {
        match command.argv.get(1) {
            None => LineStatus::Exit(0),
            Some(code) => match code.parse::<i32>() {
                Ok(code) => LineStatus::Exit(code),
                Err(_) => {
                    eprintln!("exit: {}: numeric argument required", code);
                    LineStatus::Exit(2)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(argv: &[&str]) -> CommandRecord {
        CommandRecord {
            program: argv.first().map(|s| s.to_string()),
            argv: argv.iter().map(|s| s.to_string()).collect(),
            ..CommandRecord::default()
        }
    }

    #[test]
    fn test_not_a_builtin() {
        let mut env = Environment::default();
        assert_eq!(Builtins.dispatch(&record(&["ls", "-l"]), &mut env), None);
        assert_eq!(Builtins.dispatch(&CommandRecord::default(), &mut env), None);
    }

    #[test]
    fn test_exit() {
        let mut env = Environment::default();
        assert_eq!(
            Builtins.dispatch(&record(&["exit"]), &mut env),
            Some(LineStatus::Exit(0))
        );
        assert_eq!(
            Builtins.dispatch(&record(&["exit", "3"]), &mut env),
            Some(LineStatus::Exit(3))
        );
        assert_eq!(
            Builtins.dispatch(&record(&["exit", "x"]), &mut env),
            Some(LineStatus::Exit(2))
        );
    }

    #[test]
    fn test_cd_missing_directory() {
        let mut env = Environment::default();
        env.set("PWD", "/somewhere");
        assert_eq!(
            Builtins.dispatch(&record(&["cd", "/no/such/dir/treesh"]), &mut env),
            Some(LineStatus::Continue(1))
        );
        assert_eq!(env.get("PWD"), Some("/somewhere"));
        assert_eq!(env.get("OLDPWD"), None);
    }

    #[test]
    fn test_unset() {
        let mut env = Environment::default();
        env.set("A", "1");
        env.set("B", "2");
        assert_eq!(
            Builtins.dispatch(&record(&["unset", "A", "MISSING"]), &mut env),
            Some(LineStatus::Continue(0))
        );
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some("2"));
        assert_eq!(
            Builtins.dispatch(&record(&["unset", "B=2"]), &mut env),
            Some(LineStatus::Continue(1))
        );
    }

    #[test]
    fn test_is_builtin() {
        assert!(Builtins.is_builtin("cd"));
        assert!(Builtins.is_builtin("unset"));
        assert!(!Builtins.is_builtin("ls"));
    }

    #[test]
    fn test_cd_dash_without_oldpwd() {
        let mut env = Environment::default();
        assert_eq!(
            Builtins.dispatch(&record(&["cd", "-"]), &mut env),
            Some(LineStatus::Continue(1))
        );
    }
}
