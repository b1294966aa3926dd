use std::sync::{Mutex, PoisonError};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::error::{FileSystemError, Result},
};

/// 块分配器接口：一次分配一个空闲数据块
///
/// 实现必须允许多个文件并发调用。
pub trait BlockAllocator {
    fn allocate(&self) -> Result<u32>;
}

#[derive(Debug)]
pub struct DataBlockBitmap {
    bits: Vec<u8>,     // 位图数据，每个 bit 表示一个数据块是否被使用
    total_blocks: u64, // 数据块总数
    free_blocks: u64,  // 当前空闲块数
    start_block: u64,  // 位图在磁盘中的块号
}

impl DataBlockBitmap {
    pub fn new(total_blocks: u64, start_block: u64) -> Self {
        let byte_len = total_blocks.div_ceil(8) as usize;

        Self {
            bits: vec![0; byte_len],
            total_blocks,
            free_blocks: total_blocks,
            start_block,
        }
    }

    pub fn free_blocks(&self) -> u64 {
        self.free_blocks
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    // 分配一个空闲的数据块，返回编号
    pub fn alloc(&mut self) -> Option<u32> {
        for (byte_index, byte) in self.bits.iter_mut().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            for bit in 0..8 {
                let index = (byte_index * 8 + bit) as u64;
                if index >= self.total_blocks {
                    return None;
                }
                if *byte & (1 << bit) == 0 {
                    *byte |= 1 << bit;
                    self.free_blocks -= 1;
                    return Some(index as u32);
                }
            }
        }
        None
    }

    pub fn is_used(&self, block_index: u32) -> bool {
        if u64::from(block_index) >= self.total_blocks {
            return false;
        }
        let byte_index = (block_index / 8) as usize;
        let bit_index = block_index % 8;
        self.bits[byte_index] & (1 << bit_index) != 0
    }

    // 从磁盘加载数据块位图（只占一个块）
    pub fn load(disk: &dyn BlockDevice, start_block: u64, total_blocks: u64) -> Result<Self> {
        let byte_len = total_blocks.div_ceil(8) as usize;
        if byte_len > BLOCK_SIZE {
            return Err(FileSystemError::Corrupted(format!(
                "bitmap for {} blocks does not fit in one block",
                total_blocks
            )));
        }

        let mut block_buf: Block = [0; BLOCK_SIZE];
        disk.read_block(start_block, &mut block_buf)?;
        let bits = block_buf[..byte_len].to_vec();

        let used = bits.iter().map(|b| b.count_ones() as u64).sum::<u64>();
        let free_blocks = total_blocks.checked_sub(used).ok_or_else(|| {
            FileSystemError::Corrupted("bitmap marks more blocks than exist".to_string())
        })?;

        Ok(Self {
            bits,
            total_blocks,
            free_blocks,
            start_block,
        })
    }

    // 将数据块位图写回磁盘，不够一块用 0 填充
    pub fn sync(&self, disk: &dyn BlockDevice) -> Result<()> {
        let mut block_buf: Block = [0; BLOCK_SIZE];
        block_buf[..self.bits.len()].copy_from_slice(&self.bits);
        disk.write_block(self.start_block, &block_buf)?;
        Ok(())
    }
}

impl BlockAllocator for Mutex<DataBlockBitmap> {
    fn allocate(&self) -> Result<u32> {
        let mut bitmap = self.lock().unwrap_or_else(PoisonError::into_inner);
        match bitmap.alloc() {
            Some(block_no) => Ok(block_no),
            None => {
                log::debug!("data bitmap exhausted ({} blocks)", bitmap.total_blocks);
                Err(FileSystemError::DiskFull)
            }
        }
    }
}
