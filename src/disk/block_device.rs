use std::io::Result;

use crate::disk::types::Block;

/// 块设备抽象：按块号读写整块数据
pub trait BlockDevice: Send + Sync {
    /// 设备包含的块总数
    fn block_count(&self) -> u64;
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()>;
    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()>;
    /// 把缓冲的写入刷到底层介质
    fn flush(&self) -> Result<()>;
}
