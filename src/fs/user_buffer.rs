//! 调用方缓冲区与数据区之间的拷贝边界
//!
//! 请求长度和缓冲区长度相互独立：请求越过缓冲区末尾的那一段拷贝
//! 会返回 `Fault`，相当于用户态地址无效。

use crate::fs::error::{FileSystemError, Result};

/// 写操作的数据来源
pub trait ByteSource {
    /// 从缓冲区 `offset` 处取 `dst.len()` 字节放进 `dst`
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()>;
}

/// 读操作的数据去向
pub trait ByteSink {
    /// 把 `src` 放到缓冲区 `offset` 处
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> Result<()>;
}

impl ByteSource for [u8] {
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(dst.len()).ok_or(FileSystemError::Fault)?;
        let src = self.get(offset..end).ok_or(FileSystemError::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl ByteSink for [u8] {
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let end = offset.checked_add(src.len()).ok_or(FileSystemError::Fault)?;
        let dst = self.get_mut(offset..end).ok_or(FileSystemError::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl ByteSource for &[u8] {
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        (**self).copy_out(offset, dst)
    }
}

impl<const N: usize> ByteSource for [u8; N] {
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.as_slice().copy_out(offset, dst)
    }
}

impl<const N: usize> ByteSink for [u8; N] {
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.as_mut_slice().copy_in(offset, src)
    }
}

impl ByteSource for Vec<u8> {
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.as_slice().copy_out(offset, dst)
    }
}

impl ByteSink for Vec<u8> {
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.as_mut_slice().copy_in(offset, src)
    }
}
