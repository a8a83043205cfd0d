use colored::Colorize;

use crate::utils::path::{basename, current_dir};

pub struct Theme {
    pub prompt_symbol: String,
    pub error_symbol: String,
    pub welcome_message: String,
    pub exit_message: String,
    pub dir_style: Box<dyn Fn(String) -> String>,
    pub error_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt_symbol: "$".bright_cyan().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "treesh: type `exit` or press Ctrl-D to leave"
                .bright_green()
                .to_string(),
            exit_message: "bye".bright_blue().to_string(),
            dir_style: Box::new(|s| s.bright_blue().bold().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
        }
    }
}

impl Theme {
    /// `<cwd basename> <symbol> `, with the symbol turning into the error
    /// symbol after a failed line.
    pub fn prompt(&self, last_status: i32) -> String {
        let dir = current_dir();
        let symbol = if last_status == 0 {
            &self.prompt_symbol
        } else {
            &self.error_symbol
        };
        format!("{} {} ", (self.dir_style)(basename(&dir).into_owned()), symbol)
    }

    pub fn error(&self, message: impl std::fmt::Display) -> String {
        format!("{} {}", self.error_symbol, (self.error_style)(message.to_string()))
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "default" => Theme::default(),
        "dark" => Theme {
            prompt_symbol: "➤".bright_purple().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "treesh: type `exit` or press Ctrl-D to leave"
                .bright_magenta()
                .to_string(),
            exit_message: "bye".bright_purple().to_string(),
            dir_style: Box::new(|s| s.magenta().bold().to_string()),
            error_style: Box::new(|s| s.red().to_string()),
        },
        "plain" => Theme {
            prompt_symbol: "$".to_string(),
            error_symbol: "!".to_string(),
            welcome_message: String::new(),
            exit_message: String::new(),
            dir_style: Box::new(|s| s),
            error_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}
