use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{
    disk::BlockDevice,
    fs::{
        error::{FileSystemError, Result},
        extent::ExtentTable,
        region::{read_region, write_region},
    },
    utils::{current_timestamp, generate_uuid},
};

/// 每个文件一把锁，read/write 整个调用期间持有
pub type InodeRef = Arc<Mutex<Inode>>;

pub fn lock_inode(inode: &InodeRef) -> MutexGuard<'_, Inode> {
    inode.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Inode {
    pub id: String,           // inode 唯一标识
    pub size: u64,            // 文件大小（字节），只增不减
    pub extents: ExtentTable, // 块索引表
    pub atime: u64,           // 最后访问时间（Access Time）
    pub mtime: u64,           // 最后修改时间（Modify Time）
    pub ctime: u64,           // 状态改变时间（Change Time）
    #[serde(skip)]
    dirty: bool, // 是否需要写回
}

impl Inode {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            id: generate_uuid(),
            size: 0,
            extents: ExtentTable::new(),
            atime: now,
            mtime: now,
            ctime: now,
            dirty: true,
        }
    }

    pub fn block_count(&self) -> u32 {
        self.extents.block_count()
    }

    /// 写入之后更新 mtime/ctime 并标记为脏
    pub fn touch_modified(&mut self) {
        let now = current_timestamp();
        self.mtime = now;
        self.ctime = now;
        self.mark_dirty();
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Default for Inode {
    fn default() -> Self {
        Self::new()
    }
}

/// 所有 inode，下标即 inode 编号；None 表示空闲
#[derive(Debug)]
pub struct InodeTable {
    slots: Vec<Option<InodeRef>>,
    start_block: u64,
    blocks: u64,
}

impl InodeTable {
    pub fn new(start_block: u64, blocks: u64, total_inodes: u64) -> Self {
        Self {
            slots: vec![None; total_inodes as usize],
            start_block,
            blocks,
        }
    }

    pub fn alloc_inode(&mut self) -> Result<u64> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FileSystemError::InodeFull)?;
        self.slots[index] = Some(Arc::new(Mutex::new(Inode::new())));
        Ok(index as u64)
    }

    pub fn get_inode(&self, index: u64) -> Result<InodeRef> {
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.clone())
            .ok_or(FileSystemError::InvalidInode(index))
    }

    pub fn used(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 有脏 inode（或 force）时把整张表写回，返回写回前脏 inode 的数量
    pub fn sync(&self, disk: &dyn BlockDevice, force: bool) -> Result<usize> {
        let mut guards: Vec<Option<MutexGuard<'_, Inode>>> =
            self.slots.iter().map(|s| s.as_ref().map(lock_inode)).collect();
        let dirty = guards.iter().flatten().filter(|g| g.is_dirty()).count();
        if dirty == 0 && !force {
            return Ok(0);
        }

        let snapshot: Vec<Option<&Inode>> = guards.iter().map(|g| g.as_deref()).collect();
        write_region(disk, self.start_block, self.blocks, &snapshot)?;

        for guard in guards.iter_mut().flatten() {
            guard.clear_dirty();
        }
        Ok(dirty)
    }

    pub fn load(disk: &dyn BlockDevice, start_block: u64, blocks: u64, total_inodes: u64) -> Result<Self> {
        let inodes: Vec<Option<Inode>> = read_region(disk, start_block, blocks)?;
        if inodes.len() as u64 != total_inodes {
            return Err(FileSystemError::Corrupted(format!(
                "inode table holds {} entries, expected {}",
                inodes.len(),
                total_inodes
            )));
        }

        let mut slots = Vec::with_capacity(inodes.len());
        for inode in inodes {
            if let Some(inode) = &inode {
                inode.extents.validate()?;
            }
            slots.push(inode.map(|i| Arc::new(Mutex::new(i))));
        }
        Ok(Self {
            slots,
            start_block,
            blocks,
        })
    }
}
