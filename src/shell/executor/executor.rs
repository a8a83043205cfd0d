use log::debug;
use std::os::fd::RawFd;

use crate::shell::parser::ast::{
    Assignment, Command, CommandElement, Pipeline, RedirectOp, Redirection, Word,
};

use super::builtin::{BuiltinDispatch, Builtins};
use super::environment::Environment;
use super::error::ExecError;
use super::pipeline::{run_pipeline, touch_redirect_targets};
use super::record::{
    AssignmentScope, CommandRecord, LineStatus, OpenMode, RedirectAction, RedirectPlan,
};

/// Upper bound on argv entries for one stage.
pub const MAX_ARGS: usize = 4096;

pub struct Executor {
    env: Environment,
    scope: AssignmentScope,
    builtins: Box<dyn BuiltinDispatch>,
}

impl Executor {
    pub fn new(env: Environment, scope: AssignmentScope) -> Self {
        Self::with_builtins(env, scope, Box::new(Builtins))
    }

    pub fn with_builtins(
        env: Environment,
        scope: AssignmentScope,
        builtins: Box<dyn BuiltinDispatch>,
    ) -> Self {
        Self {
            env,
            scope,
            builtins,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Runs one parsed line. Assignments reach the shell environment only
    /// when the line did not abort.
    pub fn execute(&mut self, pipeline: &Pipeline) -> Result<LineStatus, ExecError> {
        if pipeline.is_empty() {
            return Ok(LineStatus::Continue(0));
        }
        debug!("执行管道: {}", pipeline);

        // 先解析全部阶段, 出错时不启动任何进程
        let mut line_env = self.env.clone();
        let records = pipeline
            .commands
            .iter()
            .map(|command| self.resolve(command, &mut line_env))
            .collect::<Result<Vec<_>, _>>()?;

        if let [record] = records.as_slice() {
            match record.program.as_deref() {
                None => {
                    for (name, value) in &record.assignments {
                        debug!("设置变量: {}={}", name, value);
                        line_env.set(name.as_str(), value.as_str());
                    }
                    if record.redirections.is_empty() {
                        self.env = line_env;
                        return Ok(LineStatus::Continue(0));
                    }
                }
                Some(name) if self.builtins.is_builtin(name) => {
                    // 内建命令只创建重定向目标, 不改变自身的输入输出
                    let status = touch_redirect_targets(record)?;
                    self.env = line_env.clone();
                    if status != 0 {
                        return Ok(LineStatus::Continue(status));
                    }
                    if let Some(status) = self.builtins.dispatch(record, &mut self.env) {
                        return Ok(status);
                    }
                }
                Some(_) => {}
            }
        }

        let status = run_pipeline(&records, &line_env)?;
        self.env = line_env;
        debug!("管道结束, 状态 {}", status);
        Ok(LineStatus::Continue(status))
    }

    fn resolve(&self, command: &Command, env: &mut Environment) -> Result<CommandRecord, ExecError> {
        let mut record = CommandRecord::default();
        for element in &command.elements {
            match element {
                CommandElement::Word(word) => resolve_word(word, env, &mut record)?,
                CommandElement::Assignment(assignment) => {
                    self.resolve_assignment(assignment, env, &mut record)
                }
                CommandElement::Redirections(list) => {
                    for redirection in list {
                        record.redirections.push(resolve_redirection(redirection, env)?);
                    }
                }
            }
        }
        Ok(record)
    }

    fn resolve_assignment(
        &self,
        assignment: &Assignment,
        env: &mut Environment,
        record: &mut CommandRecord,
    ) {
        // 同一命令中先前的赋值对后续赋值可见
        let value = env.expand_with(&assignment.value, &record.assignments);
        match self.scope {
            AssignmentScope::Stage => record.assignments.push((assignment.name.clone(), value)),
            AssignmentScope::Shared => {
                debug!("设置共享变量: {}={}", assignment.name, value);
                env.set(assignment.name.as_str(), value);
            }
        }
    }
}

fn resolve_word(
    word: &Word,
    env: &Environment,
    record: &mut CommandRecord,
) -> Result<(), ExecError> {
    let text = env.expand_word(word);
    // 展开为空的变量不产生参数
    if text.is_empty() && word.has_expansion() {
        return Ok(());
    }
    if record.argv.len() >= MAX_ARGS {
        return Err(ExecError::TooManyArguments { limit: MAX_ARGS });
    }
    if record.program.is_none() {
        record.program = Some(text.clone());
    }
    record.argv.push(text);
    Ok(())
}

fn resolve_redirection(
    redirection: &Redirection,
    env: &Environment,
) -> Result<RedirectPlan, ExecError> {
    let fd: RawFd = redirection.fd.unwrap_or_else(|| redirection.op.default_fd());
    let target = env.expand_word(&redirection.target);
    if target.is_empty() {
        return Err(ExecError::EmptyRedirectTarget {
            target: redirection.target.to_string(),
        });
    }

    let action = match redirection.op {
        RedirectOp::In => RedirectAction::Open {
            path: target,
            mode: OpenMode::Read,
        },
        RedirectOp::InOut => RedirectAction::Open {
            path: target,
            mode: OpenMode::ReadWrite,
        },
        RedirectOp::Out => RedirectAction::Open {
            path: target,
            mode: OpenMode::Truncate,
        },
        RedirectOp::Append => RedirectAction::Open {
            path: target,
            mode: OpenMode::Append,
        },
        RedirectOp::Duplicate => match target.parse::<RawFd>() {
            Ok(source) => RedirectAction::Duplicate(source),
            Err(_) => return Err(ExecError::BadFileDescriptor(target)),
        },
    };
    Ok(RedirectPlan { fd, action })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::parse_line;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn executor(scope: AssignmentScope) -> Executor {
        Executor::new(Environment::from_process(), scope)
    }

    fn run(executor: &mut Executor, line: &str) -> Result<LineStatus, ExecError> {
        let pipeline = parse_line(line).unwrap();
        executor.execute(&pipeline)
    }

    fn resolve_first(executor: &Executor, line: &str) -> CommandRecord {
        let pipeline = parse_line(line).unwrap();
        let mut env = executor.env.clone();
        executor.resolve(&pipeline.commands[0], &mut env).unwrap()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_empty_line_is_noop() {
        let mut executor = executor(AssignmentScope::Stage);
        assert_eq!(run(&mut executor, "").unwrap(), LineStatus::Continue(0));
        assert_eq!(run(&mut executor, "   ").unwrap(), LineStatus::Continue(0));
    }

    #[test]
    fn test_resolve_simple_command() {
        let mut executor = executor(AssignmentScope::Stage);
        executor.env.set("VAR", "hello");
        let record = resolve_first(&executor, "echo $VAR world");
        assert_eq!(record.program.as_deref(), Some("echo"));
        assert_eq!(record.argv, vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_resolve_drops_empty_expansion() {
        let executor = executor(AssignmentScope::Stage);
        let record = resolve_first(&executor, "echo $TREESH_UNSET_VAR x");
        assert_eq!(record.argv, vec!["echo", "x"]);
    }

    #[test]
    fn test_resolve_redirections() {
        let executor = executor(AssignmentScope::Stage);
        let record = resolve_first(&executor, "cmd <in >>log 2>&1");
        assert_eq!(
            record.redirections,
            vec![
                RedirectPlan {
                    fd: 0,
                    action: RedirectAction::Open {
                        path: "in".to_string(),
                        mode: OpenMode::Read
                    }
                },
                RedirectPlan {
                    fd: 1,
                    action: RedirectAction::Open {
                        path: "log".to_string(),
                        mode: OpenMode::Append
                    }
                },
                RedirectPlan {
                    fd: 2,
                    action: RedirectAction::Duplicate(1)
                },
            ]
        );
    }

    #[test]
    fn test_empty_redirect_target() {
        let mut executor = executor(AssignmentScope::Stage);
        let err = run(&mut executor, "echo hi > $TREESH_UNSET_VAR").unwrap_err();
        assert!(matches!(err, ExecError::EmptyRedirectTarget { .. }));
    }

    #[test]
    fn test_output_redirection() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        fs::write(&out, "old content that should vanish\n").unwrap();

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("echo hello world > {}", out.display());
        assert_eq!(run(&mut executor, &line).unwrap(), LineStatus::Continue(0));
        assert_eq!(read(&out), "hello world\n");

        let line = format!("echo again >> {}", out.display());
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&out), "hello world\nagain\n");
    }

    #[test]
    fn test_input_redirection() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        fs::write(&input, "one\ntwo\n").unwrap();

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("cat < {} > {}", input.display(), out.display());
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&out), "one\ntwo\n");
    }

    #[test]
    fn test_pipeline_wiring() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("echo hello | tr a-z A-Z | cat > {}", out.display());
        assert_eq!(run(&mut executor, &line).unwrap(), LineStatus::Continue(0));
        assert_eq!(read(&out), "HELLO\n");
    }

    #[test]
    fn test_explicit_redirection_wins_over_pipe() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!(
            "echo direct > {} | cat > {}",
            first.display(),
            second.display()
        );
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&first), "direct\n");
        assert_eq!(read(&second), "");
    }

    #[test]
    fn test_duplicate_stderr_onto_stdout() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!(
            "ls /no/such/path/treesh > {} 2>&1",
            out.display()
        );
        let status = run(&mut executor, &line).unwrap();
        assert_ne!(status, LineStatus::Continue(0));
        assert!(read(&out).contains("/no/such/path/treesh"));
    }

    #[test]
    fn test_large_output_through_pipe() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("seq 1 100000 | tail -n 1 > {}", out.display());
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&out), "100000\n");
    }

    #[test]
    fn test_command_not_found() {
        let mut executor = executor(AssignmentScope::Stage);
        assert_eq!(
            run(&mut executor, "no_such_program_treesh").unwrap(),
            LineStatus::Continue(127)
        );
    }

    #[test]
    fn test_last_stage_status() {
        let mut executor = executor(AssignmentScope::Stage);
        assert_eq!(
            run(&mut executor, "false | true").unwrap(),
            LineStatus::Continue(0)
        );
        assert_eq!(
            run(&mut executor, "true | false").unwrap(),
            LineStatus::Continue(1)
        );
    }

    #[test]
    fn test_stage_scoped_assignment() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!(
            "TREESH_TEST_VAR=bar printenv TREESH_TEST_VAR > {} | printenv TREESH_TEST_VAR > {}",
            first.display(),
            second.display()
        );
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&first), "bar\n");
        assert_eq!(read(&second), "");
        assert_eq!(executor.environment().get("TREESH_TEST_VAR"), None);
    }

    #[test]
    fn test_shared_assignment_leaks() {
        let dir = TempDir::new().unwrap();
        let second = dir.path().join("second.txt");

        let mut executor = executor(AssignmentScope::Shared);
        let line = format!(
            "TREESH_TEST_VAR=bar true | printenv TREESH_TEST_VAR > {}",
            second.display()
        );
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&second), "bar\n");
        assert_eq!(executor.environment().get("TREESH_TEST_VAR"), Some("bar"));
    }

    #[test]
    fn test_shared_assignment_dropped_when_line_aborts() {
        let mut executor = executor(AssignmentScope::Shared);
        let err = run(
            &mut executor,
            "TREESH_TEST_ABORTED=leaked echo hi > $TREESH_UNSET_VAR",
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::EmptyRedirectTarget { .. }));
        assert_eq!(executor.environment().get("TREESH_TEST_ABORTED"), None);

        let args = vec!["x"; MAX_ARGS].join(" ");
        let line = format!("TREESH_TEST_ABORTED=leaked true | echo {}", args);
        assert!(run(&mut executor, &line).is_err());
        assert_eq!(executor.environment().get("TREESH_TEST_ABORTED"), None);
    }

    #[test]
    fn test_shared_assignment_visible_to_later_words() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");

        let mut executor = executor(AssignmentScope::Shared);
        let line = format!("TREESH_TEST_WORD=seen echo $TREESH_TEST_WORD > {}", out.display());
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&out), "seen\n");
    }

    #[test]
    fn test_builtin_creates_redirect_targets() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("exit.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("exit 4 > {}", out.display());
        assert_eq!(run(&mut executor, &line).unwrap(), LineStatus::Exit(4));
        assert!(out.exists());

        let line = format!("exit 4 > {}/missing/dir.txt", dir.path().display());
        assert_eq!(run(&mut executor, &line).unwrap(), LineStatus::Continue(1));
    }

    #[test]
    fn test_read_write_redirection() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("rw.txt");
        let out = dir.path().join("out.txt");
        fs::write(&file, "abcdef\n").unwrap();

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("cat <> {} > {}", file.display(), out.display());
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&out), "abcdef\n");

        // 读写方式打开不截断文件
        let line = format!("echo xy 1<> {}", file.display());
        run(&mut executor, &line).unwrap();
        assert_eq!(read(&file), "xy\ndef\n");

        let created = dir.path().join("created.txt");
        let line = format!("true <> {}", created.display());
        run(&mut executor, &line).unwrap();
        assert!(created.exists());
    }

    #[test]
    fn test_numbered_input_descriptor() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        fs::write(&input, "from fd three\n").unwrap();

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!(
            "cat 3< {} 0>&3 > {}",
            input.display(),
            out.display()
        );
        assert_eq!(run(&mut executor, &line).unwrap(), LineStatus::Continue(0));
        assert_eq!(read(&out), "from fd three\n");
    }

    #[test]
    fn test_assignment_only_line_persists() {
        let mut executor = executor(AssignmentScope::Stage);
        assert_eq!(
            run(&mut executor, "TREESH_A=1 TREESH_B=$TREESH_A").unwrap(),
            LineStatus::Continue(0)
        );
        assert_eq!(executor.environment().get("TREESH_A"), Some("1"));
        assert_eq!(executor.environment().get("TREESH_B"), Some("1"));
    }

    #[test]
    fn test_programless_stage_creates_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("created.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let line = format!("> {}", out.display());
        assert_eq!(run(&mut executor, &line).unwrap(), LineStatus::Continue(0));
        assert!(out.exists());
    }

    #[test]
    fn test_too_many_arguments_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("never.txt");

        let mut executor = executor(AssignmentScope::Stage);
        let args = vec!["x"; MAX_ARGS].join(" ");
        let line = format!("touch {} | echo {}", out.display(), args);
        let err = run(&mut executor, &line).unwrap_err();
        assert!(matches!(err, ExecError::TooManyArguments { limit: MAX_ARGS }));
        assert!(!out.exists());
    }

    struct Recorder {
        seen: std::rc::Rc<std::cell::RefCell<Vec<Vec<String>>>>,
    }

    impl BuiltinDispatch for Recorder {
        fn is_builtin(&self, name: &str) -> bool {
            name == "fake"
        }

        fn dispatch(&mut self, command: &CommandRecord, _: &mut Environment) -> Option<LineStatus> {
            self.seen.borrow_mut().push(command.argv.clone());
            match command.program.as_deref() {
                Some("fake") => Some(LineStatus::Continue(42)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_builtins_only_for_single_stage() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut executor = Executor::with_builtins(
            Environment::from_process(),
            AssignmentScope::Stage,
            Box::new(Recorder { seen: seen.clone() }),
        );

        assert_eq!(
            run(&mut executor, "fake arg").unwrap(),
            LineStatus::Continue(42)
        );
        run(&mut executor, "true | true").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![vec!["fake".to_string(), "arg".to_string()]]
        );
    }
}
