use serde::{Deserialize, Serialize};

use crate::fs::{
    config::MAX_EXTENTS,
    data_block_bitmap::BlockAllocator,
    error::{FileSystemError, Result},
};

/// 文件的块索引表：逻辑块号 -> 物理块号
///
/// 只有直接索引，表项按逻辑块号从 0 开始连续追加，不支持空洞。
/// `block_count` 之前的每一项都是已分配、且在本表内唯一的物理块号。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentTable {
    blocks: [u32; MAX_EXTENTS],
    block_count: u32,
}

impl ExtentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn is_full(&self) -> bool {
        self.block_count as usize >= MAX_EXTENTS
    }

    /// 已映射的物理块号
    pub fn mapped(&self) -> &[u32] {
        &self.blocks[..self.block_count as usize]
    }

    /// 查表；未映射返回 None
    pub fn resolve(&self, logical_index: u32) -> Option<u32> {
        self.mapped().get(logical_index as usize).copied()
    }

    /// 为 `logical_index` 分配一个新块并追加到表尾
    ///
    /// 只接受 `logical_index == block_count`。分配失败时表保持不变，
    /// 错误原样返回（通常是 `DiskFull`）。
    pub fn grow(&mut self, logical_index: u32, allocator: &dyn BlockAllocator) -> Result<u32> {
        if self.is_full() {
            return Err(FileSystemError::NoSpace);
        }
        if logical_index != self.block_count {
            return Err(FileSystemError::Hole {
                index: logical_index,
                mapped: self.block_count,
            });
        }

        let physical = allocator.allocate()?;
        self.blocks[self.block_count as usize] = physical;
        self.block_count += 1;
        log::debug!("extent {} -> block {}", logical_index, physical);
        Ok(physical)
    }

    /// 加载后校验：计数不越界
    pub fn validate(&self) -> Result<()> {
        if self.block_count as usize > MAX_EXTENTS {
            return Err(FileSystemError::Corrupted(format!(
                "extent table claims {} blocks (max {})",
                self.block_count, MAX_EXTENTS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::data_block_bitmap::DataBlockBitmap;
    use std::sync::Mutex;

    #[test]
    fn empty_table_resolves_nothing() {
        let table = ExtentTable::new();
        assert_eq!(table.block_count(), 0);
        assert_eq!(table.resolve(0), None);
    }

    #[test]
    fn grow_appends_in_order() {
        let alloc = Mutex::new(DataBlockBitmap::new(64, 1));
        // 先占掉几个块，让物理块号和逻辑块号错开
        for _ in 0..5 {
            alloc.allocate().unwrap();
        }

        let mut table = ExtentTable::new();
        assert_eq!(table.grow(0, &alloc).unwrap(), 5);
        assert_eq!(table.grow(1, &alloc).unwrap(), 6);
        assert_eq!(table.block_count(), 2);
        assert_eq!(table.resolve(1), Some(6));
        assert_eq!(table.resolve(2), None);
        assert_eq!(table.mapped(), &[5, 6]);
    }

    #[test]
    fn grow_rejects_gaps_and_full_table() {
        let alloc = Mutex::new(DataBlockBitmap::new(64, 1));
        let mut table = ExtentTable::new();
        assert!(matches!(
            table.grow(1, &alloc),
            Err(FileSystemError::Hole { index: 1, mapped: 0 })
        ));

        for i in 0..MAX_EXTENTS as u32 {
            table.grow(i, &alloc).unwrap();
        }
        assert!(table.is_full());
        assert!(matches!(
            table.grow(MAX_EXTENTS as u32, &alloc),
            Err(FileSystemError::NoSpace)
        ));
    }

    #[test]
    fn failed_allocation_leaves_table_unchanged() {
        let alloc = Mutex::new(DataBlockBitmap::new(1, 1));
        let mut table = ExtentTable::new();
        table.grow(0, &alloc).unwrap();
        let before = table.clone();

        assert!(matches!(
            table.grow(1, &alloc),
            Err(FileSystemError::DiskFull)
        ));
        assert_eq!(table, before);
    }
}
