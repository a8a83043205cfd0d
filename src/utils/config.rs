use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::shell::AssignmentScope;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub assignment_scope: AssignmentScope,
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = Config::get_config_dir();
        Config {
            name: String::from(env!("CARGO_PKG_NAME")),
            theme: String::from("default"),
            history_file: config_dir.join(".treesh_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            assignment_scope: AssignmentScope::default(),
            config_dir,
        }
    }
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/treesh")
        } else {
            env::temp_dir().join("treesh")
        }
    }

    pub fn new() -> io::Result<Self> {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("TREESH_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("TREESH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("TREESH_HISTORY") {
            config.history_file = expand_path(&history);
        }

        if let Ok(level) = env::var("TREESH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("TREESH_LOG_DIR") {
            config.logger_dir = expand_path(&dir);
        }

        if let Ok(scope) = env::var("TREESH_ASSIGNMENT_SCOPE") {
            match scope.parse() {
                Ok(scope) => config.assignment_scope = scope,
                // 日志尚未初始化
                Err(err) => eprintln!("treesh: TREESH_ASSIGNMENT_SCOPE: {}", err),
            }
        }

        // 确保历史文件目录存在
        if let Some(parent) = config.history_file.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(config)
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
