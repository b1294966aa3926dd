/// 每个块（Block）的大小：4KB
/// 数据区、位图、inode 表都以块为最小读写单位。
pub const BLOCK_SIZE: usize = 4096;

/// 一个块的字节数组，设备读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];
