use log::{debug, error};
use std::error::Error;
use std::io::{self, BufRead, IsTerminal, Write};
use thiserror::Error;

use crate::shell::executor::{Environment, ExecError, Executor, LineStatus};
use crate::shell::parser::{parse_line, ParseError};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::{load_theme, Theme};

/// Status reported for a line that failed to parse.
const STATUS_SYNTAX_ERROR: i32 = 2;
const STATUS_LINE_ABORTED: i32 = 1;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Exec(#[from] ExecError),
}

impl LineError {
    fn status(&self) -> i32 {
        match self {
            LineError::Parse(_) => STATUS_SYNTAX_ERROR,
            LineError::Exec(_) => STATUS_LINE_ABORTED,
        }
    }
}

pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    executor: Executor,
    last_status: i32,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            theme: load_theme(&config.theme),
            executor: Executor::new(Environment::from_process(), config.assignment_scope),
            last_status: 0,
        }
    }

    /// Reads lines until `exit` or end of input and returns the shell's exit
    /// status.
    pub fn run(&mut self) -> Result<i32, Box<dyn Error>> {
        debug!(
            "初始化 treesh, 赋值作用域 {:?}, 环境变量 {} 个",
            self.config.assignment_scope,
            self.executor.environment().get_all().len()
        );
        let stdin = io::stdin();
        if stdin.is_terminal() {
            signals::ignore_interactive_signals()?;
            Ok(self.run_interactive()?)
        } else {
            debug!("标准输入不是终端, 逐行读取");
            Ok(self.run_script(stdin.lock())?)
        }
    }

    fn run_interactive(&mut self) -> Result<i32, ReadlineError> {
        let mut readline = ReadlineManager::new(self.config)?;
        readline.load_history();

        if !self.theme.welcome_message.is_empty() {
            println!("{}", self.theme.welcome_message);
        }
        debug!("treesh 准备就绪...");

        let code = loop {
            let _ = io::stdout().flush();
            let prompt = self.theme.prompt(self.last_status);

            match readline.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        readline.add_history(&line)?;
                    }
                    if let Some(code) = self.handle_line(&line) {
                        break code;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("接收到中断信号, 丢弃当前行");
                    self.last_status = 130;
                }
                Err(ReadlineError::Eof) => {
                    debug!("接收到 EOF, 退出 treesh...");
                    break self.last_status;
                }
                Err(err) => {
                    error!("读取输入失败: {}", err);
                    readline.save_history();
                    return Err(err);
                }
            }
        };

        readline.save_history();
        if !self.theme.exit_message.is_empty() {
            println!("{}", self.theme.exit_message);
        }
        debug!("退出 treesh, 状态 {}", code);
        Ok(code)
    }

    fn run_script<R: BufRead>(&mut self, reader: R) -> io::Result<i32> {
        for line in reader.lines() {
            if let Some(code) = self.handle_line(&line?) {
                return Ok(code);
            }
        }
        Ok(self.last_status)
    }

    /// Returns the exit code when the line asked the shell to leave.
    fn handle_line(&mut self, line: &str) -> Option<i32> {
        match self.execute_line(line) {
            Ok(LineStatus::Continue(status)) => {
                self.last_status = status;
                None
            }
            Ok(LineStatus::Exit(code)) => Some(code),
            Err(err) => {
                debug!("放弃当前行: {}", err);
                eprintln!("{}", self.theme.error(format!("treesh: {}", err)));
                self.last_status = err.status();
                None
            }
        }
    }

    /// Tokenizes, parses and runs one line. Nothing runs when the line does
    /// not parse.
    pub fn execute_line(&mut self, line: &str) -> Result<LineStatus, LineError> {
        let pipeline = parse_line(line)?;
        debug!("解析结果: {:?}", pipeline);
        Ok(self.executor.execute(&pipeline)?)
    }
}
