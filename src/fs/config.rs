use std::path::PathBuf;

/// 每个文件最多映射的数据块数（直接索引，无间接块）
/// 单个文件最大 MAX_EXTENTS * BLOCK_SIZE = 32KB
pub const MAX_EXTENTS: usize = 8;

// 磁盘布局（单位：块）
// 超级块 | 数据块位图 | inode 表 | 根目录 | 数据区
pub const SUPER_BLOCK_BLOCK_ID: u64 = 0;
pub const DATA_BLOCK_BITMAP_BLOCK_ID: u64 = 1;
pub const INODE_TABLE_START_BLOCK_ID: u64 = 2;

// 总共 64 个 inode
pub const TOTAL_INODES: u64 = 64;

// Inode 表占用的块数（bincode 序列化后按长度前缀存放）
pub const INODE_TABLE_BLOCKS: u64 = 8;

pub const DIRECTORY_START_BLOCK_ID: u64 = INODE_TABLE_START_BLOCK_ID + INODE_TABLE_BLOCKS;
pub const DIRECTORY_BLOCKS: u64 = 4;

// 数据区的起始块号
pub const DATA_AREA_START_BLOCK_ID: u64 = DIRECTORY_START_BLOCK_ID + DIRECTORY_BLOCKS;

// 数据区块数，一个位图块足够覆盖
pub const DATA_BLOCKS: u64 = 1024;

pub const TOTAL_BLOCKS: u64 = DATA_AREA_START_BLOCK_ID + DATA_BLOCKS;

pub const MAX_NAME_LEN: usize = 64;

pub const MAGIC: u64 = 0x0E57_F5DA;

const DISK_ENV: &str = "EXTENTFS_DISK";
const DEFAULT_DISK_PATH: &str = "disk.img";

/// 运行时配置
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub disk_path: PathBuf,
}

impl FsConfig {
    /// 磁盘路径优先级：命令行参数 > 环境变量 EXTENTFS_DISK > disk.img
    pub fn resolve(arg: Option<String>) -> Self {
        let disk_path = arg
            .or_else(|| std::env::var(DISK_ENV).ok())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_DISK_PATH.to_string());
        Self {
            disk_path: PathBuf::from(disk_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::BLOCK_SIZE;

    #[test]
    fn layout_regions_do_not_overlap() {
        assert!(DATA_BLOCK_BITMAP_BLOCK_ID > SUPER_BLOCK_BLOCK_ID);
        assert!(INODE_TABLE_START_BLOCK_ID > DATA_BLOCK_BITMAP_BLOCK_ID);
        assert_eq!(DATA_AREA_START_BLOCK_ID, 14);
        // 位图只占一个块
        assert!(DATA_BLOCKS <= (BLOCK_SIZE * 8) as u64);
    }

    #[test]
    fn explicit_argument_wins() {
        let cfg = FsConfig::resolve(Some("other.img".to_string()));
        assert_eq!(cfg.disk_path, PathBuf::from("other.img"));
    }
}
