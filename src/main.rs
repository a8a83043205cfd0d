#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use log::{debug, error};
use std::process;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn main() {
    let config = match Config::new() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("treesh: 无法加载配置: {}", err);
            process::exit(1);
        }
    };
    if let Err(err) = init_logger(&config) {
        eprintln!("treesh: 无法初始化日志: {}", err);
    }
    debug!("配置加载成功 {}", config.config_dir.display());

    let mut shell = Shell::new(&config);
    let code = match shell.run() {
        Ok(code) => code,
        Err(err) => {
            error!("treesh 异常退出: {}", err);
            eprintln!("treesh: {}", err);
            1
        }
    };
    process::exit(code);
}
