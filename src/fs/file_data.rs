//! 文件数据读写：把 (位置, 长度) 请求拆成一个个块内片段，
//! 通过块索引表找到物理块，再和调用方缓冲区之间逐段拷贝。
//!
//! 写入按需向分配器申请新块（只能在表尾顺序追加）。超过单文件上限
//! 或分配失败时，如果本次已经写入了一部分，就返回短写计数而不是错误；
//! 缓冲区拷贝失败（`Fault`）则总是直接报错。

use crate::{
    disk::BLOCK_SIZE,
    fs::{
        config::MAX_EXTENTS,
        data_area::DataArea,
        data_block_bitmap::BlockAllocator,
        error::{FileSystemError, Result},
        inode_table::Inode,
        user_buffer::{ByteSink, ByteSource},
    },
};

/// 文件位置 -> (逻辑块号, 块内偏移)
fn locate(position: u64) -> (u64, usize) {
    (
        position / BLOCK_SIZE as u64,
        (position % BLOCK_SIZE as u64) as usize,
    )
}

/// 从 `position` 开始最多读 `len` 字节到 `out`，返回实际读到的字节数
///
/// 位置在文件末尾或之后时返回 0。不修改 inode。
pub fn read<S>(
    inode: &Inode,
    store: &DataArea,
    position: u64,
    len: usize,
    out: &mut S,
) -> Result<usize>
where
    S: ByteSink + ?Sized,
{
    if position >= inode.size {
        return Ok(0);
    }

    // 截断到文件末尾
    let mut remaining = (len as u64).min(inode.size - position) as usize;
    let mut position = position;
    let mut bytes_read = 0usize;

    while remaining > 0 {
        let (logical, offset) = locate(position);
        let chunk = (BLOCK_SIZE - offset).min(remaining);

        let physical = match u32::try_from(logical)
            .ok()
            .and_then(|index| inode.extents.resolve(index))
        {
            Some(physical) => physical,
            None => {
                // size 和 block_count 不一致，按已读到的返回
                log::warn!(
                    "read stopped at unmapped block {} (size {}, {} blocks mapped)",
                    logical,
                    inode.size,
                    inode.block_count()
                );
                break;
            }
        };

        let src = store.block_slice(physical, offset, chunk)?;
        out.copy_in(bytes_read, src)?;
        log::trace!("read {} bytes from block {}+{}", chunk, physical, offset);

        position += chunk as u64;
        bytes_read += chunk;
        remaining -= chunk;
    }

    Ok(bytes_read)
}

/// 把 `src` 的前 `len` 字节写到 `position` 处，返回实际写入的字节数
///
/// 写完后 size 只会变大，mtime/ctime 更新一次并标记 inode 为脏。
pub fn write<S>(
    inode: &mut Inode,
    store: &mut DataArea,
    allocator: &dyn BlockAllocator,
    position: u64,
    src: &S,
    len: usize,
) -> Result<usize>
where
    S: ByteSource + ?Sized,
{
    let mut remaining = len;
    let mut position = position;
    let mut bytes_written = 0usize;
    let blocks_before = inode.block_count();

    while remaining > 0 {
        let (logical, offset) = locate(position);

        if logical >= MAX_EXTENTS as u64 {
            if bytes_written > 0 {
                log::warn!(
                    "short write: {} of {} bytes, file reached {} blocks",
                    bytes_written,
                    len,
                    MAX_EXTENTS
                );
                break;
            }
            return Err(FileSystemError::NoSpace);
        }
        let logical = logical as u32;

        let physical = match inode.extents.resolve(logical) {
            Some(physical) => physical,
            None => match inode.extents.grow(logical, allocator) {
                Ok(physical) => physical,
                Err(e) if bytes_written > 0 => {
                    log::warn!(
                        "short write: {} of {} bytes, growth failed: {}",
                        bytes_written,
                        len,
                        e
                    );
                    break;
                }
                Err(e) => {
                    mark_if_grown(inode, blocks_before);
                    return Err(e);
                }
            },
        };

        let chunk = (BLOCK_SIZE - offset).min(remaining);
        let copied = store
            .block_slice_mut(physical, offset, chunk)
            .and_then(|dst| src.copy_out(bytes_written, dst));
        if let Err(e) = copied {
            mark_if_grown(inode, blocks_before);
            return Err(e);
        }
        log::trace!("wrote {} bytes to block {}+{}", chunk, physical, offset);

        position += chunk as u64;
        bytes_written += chunk;
        remaining -= chunk;
    }

    if position > inode.size {
        inode.size = position;
    }
    inode.touch_modified();

    Ok(bytes_written)
}

// 出错返回时 size 和时间戳不动，但已经分配的块要随 inode 写回，否则会泄漏
fn mark_if_grown(inode: &mut Inode, blocks_before: u32) {
    if inode.block_count() != blocks_before {
        inode.mark_dirty();
    }
}
