use std::ops::Range;

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::error::{FileSystemError, Result},
};

/// 数据区：所有数据块内容，扁平化存放在内存里
///
/// 物理块号是数据区内的下标，第 n 块对应设备上的 `start_block + n`。
/// 所有访问都先按 (块号, 块内偏移, 长度) 校验边界再切片。
#[derive(Debug, Clone)]
pub struct DataArea {
    blocks: Vec<u8>,
    total_blocks: u64,
    start_block: u64,
    dirty: Vec<bool>, // 每个块是否被修改
}

impl DataArea {
    pub fn new(start_block: u64, total_blocks: u64) -> Self {
        Self {
            blocks: vec![0u8; (total_blocks as usize) * BLOCK_SIZE],
            total_blocks,
            start_block,
            dirty: vec![false; total_blocks as usize],
        }
    }

    fn range(&self, block_no: u32, offset: usize, len: usize) -> Result<Range<usize>> {
        let out_of_range = FileSystemError::OutOfRange {
            block: block_no,
            offset,
            len,
        };
        if u64::from(block_no) >= self.total_blocks {
            return Err(out_of_range);
        }
        match offset.checked_add(len) {
            Some(end) if end <= BLOCK_SIZE => {
                let base = block_no as usize * BLOCK_SIZE;
                Ok(base + offset..base + end)
            }
            _ => Err(out_of_range),
        }
    }

    /// 块内一段只读切片
    pub fn block_slice(&self, block_no: u32, offset: usize, len: usize) -> Result<&[u8]> {
        let range = self.range(block_no, offset, len)?;
        Ok(&self.blocks[range])
    }

    /// 块内一段可写切片，同时把该块标记为脏
    pub fn block_slice_mut(
        &mut self,
        block_no: u32,
        offset: usize,
        len: usize,
    ) -> Result<&mut [u8]> {
        let range = self.range(block_no, offset, len)?;
        self.dirty[block_no as usize] = true;
        Ok(&mut self.blocks[range])
    }

    #[cfg(test)]
    pub fn dirty_blocks(&self) -> usize {
        self.dirty.iter().filter(|&&d| d).count()
    }

    /// 把脏块写回磁盘，返回写回的块数
    pub fn sync(&mut self, disk: &dyn BlockDevice) -> Result<usize> {
        let mut written = 0;
        let mut buf: Block = [0u8; BLOCK_SIZE];
        for i in 0..self.total_blocks as usize {
            if !self.dirty[i] {
                continue;
            }
            let start = i * BLOCK_SIZE;
            buf.copy_from_slice(&self.blocks[start..start + BLOCK_SIZE]);
            disk.write_block(self.start_block + i as u64, &buf)?;
            self.dirty[i] = false;
            written += 1;
        }
        Ok(written)
    }

    pub fn load(&mut self, disk: &dyn BlockDevice) -> Result<()> {
        let mut buf: Block = [0u8; BLOCK_SIZE];
        for i in 0..self.total_blocks as usize {
            disk.read_block(self.start_block + i as u64, &mut buf)?;
            let start = i * BLOCK_SIZE;
            self.blocks[start..start + BLOCK_SIZE].copy_from_slice(&buf);
            self.dirty[i] = false;
        }
        Ok(())
    }
}
