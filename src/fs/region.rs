use serde::{de::DeserializeOwned, Serialize};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::error::{FileSystemError, Result},
};

const LEN_PREFIX: usize = 8;

/// 把一个结构序列化后写进 [start, start + blocks) 这段连续块
///
/// 第一个块的前 8 字节是序列化长度（小端），后面紧跟数据。
pub fn write_region<T: Serialize>(
    disk: &dyn BlockDevice,
    start: u64,
    blocks: u64,
    value: &T,
) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    let needed = (bytes.len() + LEN_PREFIX).div_ceil(BLOCK_SIZE) as u64;
    if needed > blocks {
        return Err(FileSystemError::Corrupted(format!(
            "region at block {} needs {} blocks, only {} reserved",
            start, needed, blocks
        )));
    }

    let mut block_buf: Block = [0u8; BLOCK_SIZE];
    block_buf[..LEN_PREFIX].copy_from_slice(&(bytes.len() as u64).to_le_bytes());
    let first_chunk = std::cmp::min(BLOCK_SIZE - LEN_PREFIX, bytes.len());
    block_buf[LEN_PREFIX..LEN_PREFIX + first_chunk].copy_from_slice(&bytes[..first_chunk]);
    disk.write_block(start, &block_buf)?;

    // 写剩余块
    let mut offset = first_chunk;
    for i in 1..needed {
        let mut block_buf: Block = [0u8; BLOCK_SIZE];
        let chunk = std::cmp::min(BLOCK_SIZE, bytes.len() - offset);
        block_buf[..chunk].copy_from_slice(&bytes[offset..offset + chunk]);
        disk.write_block(start + i, &block_buf)?;
        offset += chunk;
    }
    Ok(())
}

/// `write_region` 的逆过程
pub fn read_region<T: DeserializeOwned>(disk: &dyn BlockDevice, start: u64, blocks: u64) -> Result<T> {
    let mut block_buf: Block = [0u8; BLOCK_SIZE];
    disk.read_block(start, &mut block_buf)?;
    let mut len_bytes = [0u8; LEN_PREFIX];
    len_bytes.copy_from_slice(&block_buf[..LEN_PREFIX]);
    let serialized_len = u64::from_le_bytes(len_bytes) as usize;

    let needed = (serialized_len as u64 + LEN_PREFIX as u64).div_ceil(BLOCK_SIZE as u64);
    if needed > blocks {
        return Err(FileSystemError::Corrupted(format!(
            "region at block {} claims {} bytes",
            start, serialized_len
        )));
    }

    let mut bytes = Vec::with_capacity(serialized_len);
    let first_chunk = std::cmp::min(BLOCK_SIZE - LEN_PREFIX, serialized_len);
    bytes.extend_from_slice(&block_buf[LEN_PREFIX..LEN_PREFIX + first_chunk]);
    let mut read = first_chunk;

    for i in 1..needed {
        disk.read_block(start + i, &mut block_buf)?;
        let chunk = std::cmp::min(BLOCK_SIZE, serialized_len - read);
        bytes.extend_from_slice(&block_buf[..chunk]);
        read += chunk;
    }

    Ok(bincode::deserialize(&bytes)?)
}
