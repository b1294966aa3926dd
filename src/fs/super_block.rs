use serde::{Deserialize, Serialize};

use crate::{
    disk::BLOCK_SIZE,
    fs::{
        config::{
            DATA_AREA_START_BLOCK_ID, DATA_BLOCKS, DATA_BLOCK_BITMAP_BLOCK_ID, DIRECTORY_BLOCKS,
            DIRECTORY_START_BLOCK_ID, INODE_TABLE_BLOCKS, INODE_TABLE_START_BLOCK_ID, MAGIC,
            MAX_EXTENTS, TOTAL_BLOCKS, TOTAL_INODES,
        },
        error::{FileSystemError, Result},
    },
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u64,      // 魔数，用于识别文件系统
    pub fs_type: String, // 文件系统标识
    /** 数据块信息 */
    pub block_size: u64, // 每块大小（字节）
    pub total_blocks: u64, // 设备总块数
    pub data_block_start: u64, // 数据区起始块号
    pub data_blocks: u64, // 数据区块数
    pub block_bitmap_start: u64, // 数据块位图所在块
    /** inode 信息 */
    pub total_inodes: u64, // 总 inode 数
    pub inode_table_start: u64, // inode 表起始块号
    pub inode_table_blocks: u64,
    /** 根目录 */
    pub directory_start: u64,
    pub directory_blocks: u64,
    /** 单文件上限 */
    pub max_extents: u64,
}

impl SuperBlock {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            fs_type: "ExtentFS".to_string(),
            block_size: BLOCK_SIZE as u64,
            total_blocks: TOTAL_BLOCKS,
            data_block_start: DATA_AREA_START_BLOCK_ID,
            data_blocks: DATA_BLOCKS,
            block_bitmap_start: DATA_BLOCK_BITMAP_BLOCK_ID,
            total_inodes: TOTAL_INODES,
            inode_table_start: INODE_TABLE_START_BLOCK_ID,
            inode_table_blocks: INODE_TABLE_BLOCKS,
            directory_start: DIRECTORY_START_BLOCK_ID,
            directory_blocks: DIRECTORY_BLOCKS,
            max_extents: MAX_EXTENTS as u64,
        }
    }

    /// 挂载时检查：磁盘上的布局必须和当前编译的常量一致
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(FileSystemError::Corrupted(format!(
                "bad magic {:#x}",
                self.magic
            )));
        }
        if *self != Self::new() {
            return Err(FileSystemError::Corrupted(format!(
                "layout mismatch: {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_extents * self.block_size
    }
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self::new()
    }
}
