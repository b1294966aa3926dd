use colored::*;

use crate::{
    fs::{config::FsConfig, FileSystem},
    shell::start_shell,
};

mod disk;
mod fs;
mod shell;
mod utils;

fn main() {
    env_logger::init();

    let config = FsConfig::resolve(std::env::args().nth(1));
    log::info!("using disk image {}", config.disk_path.display());

    let fs = match FileSystem::open_disk(&config) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("{} {}", "❌ Failed to open file system:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = start_shell(fs) {
        eprintln!("{} {}", "❌ Shell error:".red().bold(), e);
        std::process::exit(1);
    }
}
