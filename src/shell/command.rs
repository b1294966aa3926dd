use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::{error::Error, io::SeekFrom};

use crate::{
    fs::{
        file::{FileOperations, OpenFlags},
        FileSystem,
    },
    utils::format_timestamp,
};

#[derive(Debug)]
pub enum Command {
    Help,
    Ls,
    Create(String),
    Read {
        name: String,
        offset: u64,
        len: Option<usize>,
    },
    Write {
        name: String,
        offset: u64,
        text: String,
    },
    Stat(String),
    Df,
    Sync,
    Format,
    Exit,
}

pub fn execute_command(cmd: &Command, fs: &mut FileSystem) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls => {
            let files = fs.list()?;
            if files.is_empty() {
                println!("{}", "(empty)".bright_black());
            }
            for (name, size) in files {
                println!("📄  {:<24} {:>8} B", name, size);
            }
        }
        Command::Create(name) => {
            let index = fs.create(name)?;
            println!("📝 Created file: {} (inode {})", name.green(), index);
        }
        Command::Read { name, offset, len } => {
            let mut file = fs.open(name, OpenFlags::READ)?;
            fs.seek(&mut file, SeekFrom::Start(*offset))?;
            // 先按文件剩余长度截断，再分配缓冲区
            let available = file.size().saturating_sub(*offset);
            let len = len.map_or(available, |len| available.min(len as u64)) as usize;

            let mut buf = vec![0u8; len];
            let n = fs.read(&mut file, &mut buf, len)?;
            buf.truncate(n);
            println!(
                "📖 {} bytes from {} @ {}",
                n,
                name.cyan(),
                offset
            );
            println!("{}", String::from_utf8_lossy(&buf));
        }
        Command::Write { name, offset, text } => {
            let mut file = fs.open(name, OpenFlags::WRITE)?;
            fs.seek(&mut file, SeekFrom::Start(*offset))?;
            let data = text.as_bytes();
            let n = fs.write(&mut file, &data, data.len())?;
            if n < data.len() {
                println!(
                    "{} wrote {} of {} bytes (file or disk full)",
                    "⚠️  Short write:".yellow(),
                    n,
                    data.len()
                );
            } else {
                println!("✏️  Wrote {} bytes to {}", n, name.cyan());
            }
        }
        Command::Stat(name) => {
            let st = fs.stat(name)?;
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {}\n{}: {} bytes\n{}: {} {:?}\n{}: {}\n{}: {}\n{}: {}",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                st.name,
                "Inode".blue(),
                st.inode_index,
                "Id".blue(),
                st.id,
                "Size".blue(),
                st.size,
                "Blocks".blue(),
                st.block_count,
                st.extents,
                "Access".blue(),
                format_timestamp(st.atime),
                "Modify".blue(),
                format_timestamp(st.mtime),
                "Change".blue(),
                format_timestamp(st.ctime),
            );
        }
        Command::Df => {
            let usage = fs.usage();
            let sb = fs.super_block();
            println!(
                "💽 data blocks: {}/{} free, inodes: {}/{} free, max file size: {} B",
                usage.free_data_blocks,
                usage.data_blocks,
                usage.free_inodes,
                usage.inodes,
                sb.max_file_size()
            );
        }
        Command::Sync => {
            let report = fs.sync()?;
            println!(
                "💾 Synced {} inodes and {} data blocks",
                report.inodes, report.data_blocks
            );
        }
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt("Format the disk? All files will be lost")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled".bright_black());
                return Ok(());
            }

            println!("💾 Formatting virtual disk...");
            let pb = ProgressBar::new(fs.super_block().data_blocks);
            pb.set_style(
                ProgressStyle::with_template("[{bar:40.green/black}] {pos:>5}/{len} {msg}")?
                    .progress_chars("#>-"),
            );
            fs.reformat(&mut |done, _| pb.set_position(done))?;
            pb.finish_with_message("✅ Disk formatted successfully!");
        }
        Command::Exit => println!("{}", "👋 Exiting ExtentFS shell...".yellow().bold()),
    }

    Ok(())
}

fn print_help() {
    println!("{}", "📘 ExtentFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls                          List files
  create <file>               Create an empty file
  write <file> <offset> <str> Write string at byte offset
  read <file> [offset] [len]  Read file content
  stat <file>                 Show file info and block map
  df                          Show free blocks and inodes
  sync                        Flush everything to disk
  format                      Format virtual disk
  help                        Show this help message
  exit                        Sync and quit the shell
"
        .bright_black()
    );
}
