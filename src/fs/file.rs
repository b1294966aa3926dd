use std::io::SeekFrom;

use bitflags::bitflags;

use crate::fs::{
    error::{FileSystemError, Result},
    inode_table::{lock_inode, InodeRef},
    user_buffer::{ByteSink, ByteSource},
};

bitflags! {
    /// 打开模式
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const RDWR = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// 一个打开的文件：inode 句柄 + 当前读写位置
#[derive(Debug)]
pub struct OpenFile {
    pub inode: InodeRef,
    pub position: u64,
    pub flags: OpenFlags,
}

impl OpenFile {
    pub fn new(inode: InodeRef, flags: OpenFlags) -> Self {
        Self {
            inode,
            position: 0,
            flags,
        }
    }

    pub fn size(&self) -> u64 {
        lock_inode(&self.inode).size
    }

    fn require(&self, flag: OpenFlags) -> Result<()> {
        if self.flags.contains(flag) {
            Ok(())
        } else {
            Err(FileSystemError::BadDescriptor)
        }
    }
}

/// 普通的线性 seek：Start/Current/End，结果不能为负
pub fn default_seek(file: &mut OpenFile, to: SeekFrom) -> Result<u64> {
    let (base, delta) = match to {
        SeekFrom::Start(pos) => {
            file.position = pos;
            return Ok(pos);
        }
        SeekFrom::Current(delta) => (file.position, delta),
        SeekFrom::End(delta) => (file.size(), delta),
    };

    let target = i128::from(base) + i128::from(delta);
    let position = u64::try_from(target)
        .map_err(|_| FileSystemError::InvalidSeek(target.clamp(i64::MIN.into(), i64::MAX.into()) as i64))?;
    file.position = position;
    Ok(position)
}

/// 文件操作表
///
/// `read`/`write` 从 `file.position` 开始，成功后按传输的字节数推进位置；
/// 出错时位置不变。
pub trait FileOperations {
    fn open(&self, _file: &mut OpenFile) -> Result<()> {
        Ok(())
    }

    fn read(&self, file: &mut OpenFile, buf: &mut dyn ByteSink, len: usize) -> Result<usize>;

    fn write(&self, file: &mut OpenFile, buf: &dyn ByteSource, len: usize) -> Result<usize>;

    fn seek(&self, file: &mut OpenFile, to: SeekFrom) -> Result<u64> {
        default_seek(file, to)
    }
}

/// 打开模式检查，供实现者在 read/write 开头调用
pub fn check_readable(file: &OpenFile) -> Result<()> {
    file.require(OpenFlags::READ)
}

pub fn check_writable(file: &OpenFile) -> Result<()> {
    file.require(OpenFlags::WRITE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::inode_table::Inode;
    use std::sync::{Arc, Mutex};

    fn open_with_size(size: u64, flags: OpenFlags) -> OpenFile {
        let mut inode = Inode::new();
        inode.size = size;
        OpenFile::new(Arc::new(Mutex::new(inode)), flags)
    }

    #[test]
    fn seek_is_linear() {
        let mut file = open_with_size(100, OpenFlags::READ);
        assert_eq!(default_seek(&mut file, SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(default_seek(&mut file, SeekFrom::Current(5)).unwrap(), 15);
        assert_eq!(default_seek(&mut file, SeekFrom::Current(-15)).unwrap(), 0);
        assert_eq!(default_seek(&mut file, SeekFrom::End(-1)).unwrap(), 99);
        // 越过末尾是允许的
        assert_eq!(default_seek(&mut file, SeekFrom::End(50)).unwrap(), 150);
    }

    #[test]
    fn negative_seek_is_rejected_and_keeps_position() {
        let mut file = open_with_size(10, OpenFlags::READ);
        default_seek(&mut file, SeekFrom::Start(4)).unwrap();
        assert!(matches!(
            default_seek(&mut file, SeekFrom::Current(-5)),
            Err(FileSystemError::InvalidSeek(-1))
        ));
        assert_eq!(file.position, 4);
    }

    #[test]
    fn access_mode_checks() {
        let ro = open_with_size(0, OpenFlags::READ);
        assert!(check_readable(&ro).is_ok());
        assert!(matches!(check_writable(&ro), Err(FileSystemError::BadDescriptor)));

        let rw = open_with_size(0, OpenFlags::RDWR);
        assert!(check_readable(&rw).is_ok());
        assert!(check_writable(&rw).is_ok());
    }
}
