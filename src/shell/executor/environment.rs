use log::warn;
use nix::unistd::{Uid, User};
use std::collections::{BTreeMap, HashMap};
use std::ffi::{CString, NulError};

use crate::shell::parser::ast::{Word, WordPart};

/// Variables visible to `$NAME` expansion and handed to child processes.
///
/// Seeded from the process environment once; the shell never reads the
/// process environment again after that.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    warn!("跳过非 UTF-8 环境变量: {:?}", key);
                    None
                }
            })
            .collect();
        Self { vars }
    }

    pub fn get_all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// Home directory of the invoking user: `HOME`, else the password
    /// database entry of the effective UID.
    pub fn home_dir(&self) -> Option<String> {
        if let Some(home) = self.get("HOME").filter(|home| !home.is_empty()) {
            return Some(home.to_string());
        }
        match User::from_uid(Uid::effective()) {
            Ok(Some(user)) => Some(user.dir.to_string_lossy().into_owned()),
            Ok(None) => None,
            Err(err) => {
                warn!("无法查询当前用户: {}", err);
                None
            }
        }
    }

    pub fn user_home(name: &str) -> Option<String> {
        match User::from_name(name) {
            Ok(user) => user.map(|user| user.dir.to_string_lossy().into_owned()),
            Err(err) => {
                warn!("无法查询用户 {}: {}", name, err);
                None
            }
        }
    }

    /// Resolves `$NAME` and `~` pieces and concatenates the word.
    pub fn expand_word(&self, word: &Word) -> String {
        self.expand_with(word, &[])
    }

    /// Like [`expand_word`](Self::expand_word), with `overlay` consulted
    /// before the environment.
    pub fn expand_with(&self, word: &Word, overlay: &[(String, String)]) -> String {
        let mut text = String::new();
        for part in &word.parts {
            match part {
                WordPart::Digit(s)
                | WordPart::Letter(s)
                | WordPart::Alphanum(s)
                | WordPart::Literal(s) => text.push_str(s),
                WordPart::Env(name) => {
                    text.push_str(self.lookup(overlay, name).unwrap_or_default())
                }
                WordPart::Home(user) => {
                    let home = if user.is_empty() {
                        self.home_dir()
                    } else {
                        Self::user_home(user)
                    };
                    match home {
                        Some(dir) => text.push_str(&dir),
                        None => {
                            text.push('~');
                            text.push_str(user);
                        }
                    }
                }
            }
        }
        text
    }

    /// Looks a variable up with `overlay` taking precedence.
    pub fn lookup<'a>(&'a self, overlay: &'a [(String, String)], name: &str) -> Option<&'a str> {
        overlay
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .or_else(|| self.get(name))
    }

    /// `KEY=value` strings for `execve`, with `overlay` applied on top.
    pub fn to_envp(&self, overlay: &[(String, String)]) -> Result<Vec<CString>, NulError> {
        let mut merged: BTreeMap<&str, &str> = self
            .vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        for (key, value) in overlay {
            merged.insert(key.as_str(), value.as_str());
        }
        merged
            .into_iter()
            .map(|(key, value)| CString::new(format!("{}={}", key, value)))
            .collect()
    }
}
