use std::borrow::Cow;
use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, error};

pub fn basename(path: &str) -> Cow<'_, str> {
    let mut pieces = path.trim_end_matches('/').rsplit('/');
    match pieces.next() {
        Some(p) if !p.is_empty() => p.into(),
        _ => path.into(),
    }
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Searches the colon-separated `path_var` for an executable `filename`.
pub fn find_file_in_path(filename: &str, path_var: &str) -> Option<PathBuf> {
    for dir in path_var.split(':') {
        // 空路径表示当前目录
        let dir = if dir.is_empty() { "." } else { dir };
        let candidate = Path::new(dir).join(filename);
        if is_executable(&candidate) {
            debug!("在 PATH 中找到命令: {}", candidate.display());
            return Some(candidate);
        }
    }
    None
}

/// Resolves a program name the way `execvp` would: names containing `/`
/// are used as they are, anything else is searched in `path_var`.
pub fn resolve_program(program: &str, path_var: Option<&str>) -> Option<PathBuf> {
    if program.contains('/') {
        return Some(PathBuf::from(program));
    }
    find_file_in_path(program, path_var.unwrap_or("/usr/local/bin:/usr/bin:/bin"))
}

pub fn current_dir() -> String {
    match env::current_dir() {
        Ok(dir) => dir.to_string_lossy().into_owned(),
        Err(e) => {
            error!("treesh: PROMPT: env current_dir error: {}", e);
            String::new()
        }
    }
}
