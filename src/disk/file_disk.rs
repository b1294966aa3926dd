use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// 以宿主机上的一个普通文件作为虚拟磁盘
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    total_blocks: u64,
}

impl FileDisk {
    /// 打开（必要时创建）磁盘镜像，返回 (磁盘, 是否为新建的空盘)
    pub fn open<P: AsRef<Path>>(path: P, total_blocks: u64) -> Result<(Self, bool)> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let disk_size = total_blocks * BLOCK_SIZE as u64;
        let fresh = file.metadata()?.len() < disk_size;
        if fresh {
            log::info!("allocating {} bytes for {}", disk_size, path.display());
            file.set_len(disk_size)?;
        }

        Ok((
            Self {
                file: Mutex::new(file),
                total_blocks,
            },
            fresh,
        ))
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, block_id: u64) -> Result<()> {
        if block_id >= self.total_blocks {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "block {} out of range (disk has {} blocks)",
                    block_id, self.total_blocks
                ),
            ));
        }
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn block_count(&self) -> u64 {
        self.total_blocks
    }

    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        self.check(block_id)?;
        let mut file = self.lock();
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        self.check(block_id)?;
        let mut file = self.lock();
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.lock().sync_all()
    }
}
