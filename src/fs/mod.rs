use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    disk::{BlockDevice, FileDisk, BLOCK_SIZE},
    fs::{
        config::{FsConfig, TOTAL_BLOCKS},
        data_area::DataArea,
        data_block_bitmap::DataBlockBitmap,
        directory::Directory,
        error::{FileSystemError, Result},
        file::{check_readable, check_writable, FileOperations, OpenFile, OpenFlags},
        inode_table::{lock_inode, InodeTable},
        region::{read_region, write_region},
        super_block::SuperBlock,
        user_buffer::{ByteSink, ByteSource},
    },
};

pub mod config;
pub mod data_area;
pub mod data_block_bitmap;
pub mod directory;
pub mod error;
pub mod extent;
pub mod file;
pub mod file_data;
pub mod inode_table;
pub mod region;
pub mod super_block;
pub mod user_buffer;

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// `stat` 的结果
#[derive(Debug, Clone)]
pub struct FileStat {
    pub name: String,
    pub inode_index: u64,
    pub id: String,
    pub size: u64,
    pub block_count: u32,
    pub extents: Vec<u32>,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// 空间使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub data_blocks: u64,
    pub free_data_blocks: u64,
    pub inodes: usize,
    pub free_inodes: usize,
}

/// 一次 sync 写回了多少东西
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inodes: usize,
    pub data_blocks: usize,
}

/// 锁的获取顺序：inode -> data_area -> data_bitmap
pub struct FileSystem {
    disk: Arc<dyn BlockDevice>,          // 底层磁盘抽象层
    super_block: SuperBlock,             // 文件系统总体信息
    data_bitmap: Mutex<DataBlockBitmap>, // 数据块分配信息
    inode_table: RwLock<InodeTable>,     // 所有 inode 管理
    root: RwLock<Directory>,             // 平铺的根目录
    data_area: RwLock<DataArea>,         // 所有数据块内容管理
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("super_block", &self.super_block)
            .field("usage", &self.usage())
            .finish()
    }
}

impl FileSystem {
    /// 打开配置里的磁盘镜像：新建的镜像先格式化，否则直接挂载
    pub fn open_disk(config: &FsConfig) -> Result<Self> {
        let (disk, fresh) = FileDisk::open(&config.disk_path, TOTAL_BLOCKS)?;
        if fresh {
            log::info!("no file system on {}, formatting", config.disk_path.display());
            Self::format(Arc::new(disk), &mut |_, _| {})
        } else {
            Self::mount(Arc::new(disk))
        }
    }

    /// 在设备上建立一个空文件系统，数据区清零
    ///
    /// `progress(done, total)` 每清零一个数据块调用一次。
    pub fn format(
        disk: Arc<dyn BlockDevice>,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<Self> {
        let fs = Self::empty(disk)?;
        fs.initialize(progress)?;
        Ok(fs)
    }

    fn empty(disk: Arc<dyn BlockDevice>) -> Result<Self> {
        let super_block = SuperBlock::new();
        if disk.block_count() < super_block.total_blocks {
            return Err(FileSystemError::Corrupted(format!(
                "device has {} blocks, need {}",
                disk.block_count(),
                super_block.total_blocks
            )));
        }

        Ok(Self {
            data_bitmap: Mutex::new(DataBlockBitmap::new(
                super_block.data_blocks,
                super_block.block_bitmap_start,
            )),
            inode_table: RwLock::new(InodeTable::new(
                super_block.inode_table_start,
                super_block.inode_table_blocks,
                super_block.total_inodes,
            )),
            root: RwLock::new(Directory::new()),
            data_area: RwLock::new(DataArea::new(
                super_block.data_block_start,
                super_block.data_blocks,
            )),
            super_block,
            disk,
        })
    }

    fn initialize(&self, progress: &mut dyn FnMut(u64, u64)) -> Result<()> {
        let zero = [0u8; BLOCK_SIZE];
        let sb = &self.super_block;
        for i in 0..sb.data_blocks {
            self.disk.write_block(sb.data_block_start + i, &zero)?;
            progress(i + 1, sb.data_blocks);
        }

        self.write_metadata(true)?;
        self.disk.flush()?;
        log::info!("formatted: {:?}", sb);
        Ok(())
    }

    /// 从设备加载文件系统
    pub fn mount(disk: Arc<dyn BlockDevice>) -> Result<Self> {
        let super_block: SuperBlock = read_region(disk.as_ref(), config::SUPER_BLOCK_BLOCK_ID, 1)?;
        super_block.validate()?;

        let bitmap = DataBlockBitmap::load(
            disk.as_ref(),
            super_block.block_bitmap_start,
            super_block.data_blocks,
        )?;
        let inode_table = InodeTable::load(
            disk.as_ref(),
            super_block.inode_table_start,
            super_block.inode_table_blocks,
            super_block.total_inodes,
        )?;
        let root = Directory::load(
            disk.as_ref(),
            super_block.directory_start,
            super_block.directory_blocks,
        )?;
        let mut data_area = DataArea::new(super_block.data_block_start, super_block.data_blocks);
        data_area.load(disk.as_ref())?;

        check_extents(&inode_table, &bitmap)?;
        for entry in root.list_sorted() {
            inode_table.get_inode(entry.inode_index)?;
        }

        log::info!(
            "mounted: {} files, {} of {} data blocks free",
            root.len(),
            bitmap.free_blocks(),
            bitmap.total_blocks()
        );
        Ok(Self {
            disk,
            super_block,
            data_bitmap: Mutex::new(bitmap),
            inode_table: RwLock::new(inode_table),
            root: RwLock::new(root),
            data_area: RwLock::new(data_area),
        })
    }

    /// 在同一块设备上重新格式化；失败时内存中的旧状态保持不变
    pub fn reformat(&mut self, progress: &mut dyn FnMut(u64, u64)) -> Result<()> {
        let fresh = Self::empty(Arc::clone(&self.disk))?;
        fresh.initialize(progress)?;
        *self = fresh;
        Ok(())
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    /// 在根目录下创建空文件，返回 inode 编号
    pub fn create(&self, name: &str) -> Result<u64> {
        Directory::validate_name(name)?;
        let mut root = write_lock(&self.root);
        if root.find(name).is_some() {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }
        let index = write_lock(&self.inode_table).alloc_inode()?;
        root.add(index, name)?;
        log::debug!("created {} as inode {}", name, index);
        Ok(index)
    }

    pub fn lookup(&self, name: &str) -> Result<u64> {
        read_lock(&self.root)
            .find(name)
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))
    }

    pub fn open(&self, name: &str, flags: OpenFlags) -> Result<OpenFile> {
        let index = self.lookup(name)?;
        let inode = read_lock(&self.inode_table).get_inode(index)?;
        let mut file = OpenFile::new(inode, flags);
        FileOperations::open(self, &mut file)?;
        Ok(file)
    }

    /// 根目录下所有文件的 (名字, 大小)
    pub fn list(&self) -> Result<Vec<(String, u64)>> {
        let root = read_lock(&self.root);
        let table = read_lock(&self.inode_table);
        root.list_sorted()
            .into_iter()
            .map(|entry| {
                let inode = table.get_inode(entry.inode_index)?;
                let size = lock_inode(&inode).size;
                Ok((entry.name.clone(), size))
            })
            .collect()
    }

    pub fn stat(&self, name: &str) -> Result<FileStat> {
        let index = self.lookup(name)?;
        let inode = read_lock(&self.inode_table).get_inode(index)?;
        let inode = lock_inode(&inode);
        Ok(FileStat {
            name: name.to_string(),
            inode_index: index,
            id: inode.id.clone(),
            size: inode.size,
            block_count: inode.block_count(),
            extents: inode.extents.mapped().to_vec(),
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
        })
    }

    pub fn usage(&self) -> Usage {
        let table = read_lock(&self.inode_table);
        let bitmap = self.data_bitmap.lock().unwrap_or_else(PoisonError::into_inner);
        Usage {
            data_blocks: bitmap.total_blocks(),
            free_data_blocks: bitmap.free_blocks(),
            inodes: table.capacity(),
            free_inodes: table.capacity() - table.used(),
        }
    }

    /// 把所有元数据、脏 inode 和脏数据块写回磁盘
    pub fn sync(&self) -> Result<SyncReport> {
        let inodes = self.write_metadata(false)?;
        let data_blocks = write_lock(&self.data_area).sync(self.disk.as_ref())?;
        self.disk.flush()?;

        let report = SyncReport {
            inodes,
            data_blocks,
        };
        log::info!("sync: {:?}", report);
        Ok(report)
    }

    // force 为 true 时即使没有脏 inode 也写一遍 inode 表（格式化用）
    fn write_metadata(&self, force: bool) -> Result<usize> {
        let disk = self.disk.as_ref();
        write_region(disk, config::SUPER_BLOCK_BLOCK_ID, 1, &self.super_block)?;

        let inodes = read_lock(&self.inode_table).sync(disk, force)?;

        read_lock(&self.root).sync(
            disk,
            self.super_block.directory_start,
            self.super_block.directory_blocks,
        )?;
        self.data_bitmap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sync(disk)?;
        Ok(inodes)
    }
}

impl FileOperations for FileSystem {
    fn read(&self, file: &mut OpenFile, buf: &mut dyn ByteSink, len: usize) -> Result<usize> {
        check_readable(file)?;
        let inode = lock_inode(&file.inode);
        let store = read_lock(&self.data_area);
        let n = file_data::read(&inode, &store, file.position, len, buf)?;
        drop(store);
        drop(inode);

        file.position += n as u64;
        Ok(n)
    }

    fn write(&self, file: &mut OpenFile, buf: &dyn ByteSource, len: usize) -> Result<usize> {
        check_writable(file)?;
        let mut inode = lock_inode(&file.inode);
        let mut store = write_lock(&self.data_area);
        let n = file_data::write(
            &mut inode,
            &mut store,
            &self.data_bitmap,
            file.position,
            buf,
            len,
        )?;
        drop(store);
        drop(inode);

        file.position += n as u64;
        Ok(n)
    }
}

// 挂载时检查：每个已映射的块都在位图里标记为已用，且只属于一个文件的一个位置
fn check_extents(table: &InodeTable, bitmap: &DataBlockBitmap) -> Result<()> {
    let mut owners = HashSet::new();
    for index in 0..table.capacity() as u64 {
        let Ok(inode) = table.get_inode(index) else {
            continue;
        };
        let inode = lock_inode(&inode);
        for &block in inode.extents.mapped() {
            if !bitmap.is_used(block) || !owners.insert(block) {
                return Err(FileSystemError::Corrupted(format!(
                    "inode {} maps block {} which is free or shared",
                    index, block
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disk::file_disk::tests::TempImage,
        fs::{config::MAX_EXTENTS, inode_table::lock_inode},
    };
    use std::{io::SeekFrom, thread};

    fn fresh(img: &TempImage) -> FileSystem {
        FileSystem::open_disk(&FsConfig {
            disk_path: img.0.clone(),
        })
        .unwrap()
    }

    fn write_all(fs: &FileSystem, file: &mut OpenFile, data: &[u8]) -> Result<usize> {
        fs.write(file, &data, data.len())
    }

    fn read_n(fs: &FileSystem, file: &mut OpenFile, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        let n = fs.read(file, &mut buf, len).unwrap();
        buf.truncate(n);
        buf
    }

    #[test]
    fn handle_position_follows_reads_and_writes() {
        let img = TempImage::new();
        let fs = fresh(&img);
        fs.create("a").unwrap();

        let mut file = fs.open("a", OpenFlags::RDWR).unwrap();
        assert_eq!(write_all(&fs, &mut file, &[1u8; 5000]).unwrap(), 5000);
        assert_eq!(file.position, 5000);

        // 到末尾后读到 0 字节
        assert!(read_n(&fs, &mut file, 10).is_empty());

        fs.seek(&mut file, SeekFrom::Start(4990)).unwrap();
        assert_eq!(read_n(&fs, &mut file, 100), vec![1u8; 10]);
        assert_eq!(file.position, 5000);

        fs.seek(&mut file, SeekFrom::End(-5000)).unwrap();
        assert_eq!(read_n(&fs, &mut file, 5000).len(), 5000);
    }

    #[test]
    fn faulted_write_keeps_position() {
        let img = TempImage::new();
        let fs = fresh(&img);
        fs.create("a").unwrap();
        let mut file = fs.open("a", OpenFlags::WRITE).unwrap();

        let data = [0u8; 10];
        assert!(matches!(
            fs.write(&mut file, &data, 20),
            Err(FileSystemError::Fault)
        ));
        assert_eq!(file.position, 0);
        assert_eq!(file.size(), 0);
    }

    #[test]
    fn access_mode_is_enforced() {
        let img = TempImage::new();
        let fs = fresh(&img);
        fs.create("a").unwrap();

        let mut ro = fs.open("a", OpenFlags::READ).unwrap();
        assert!(matches!(
            write_all(&fs, &mut ro, b"x"),
            Err(FileSystemError::BadDescriptor)
        ));
        let mut wo = fs.open("a", OpenFlags::WRITE).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(
            fs.read(&mut wo, &mut buf, 1),
            Err(FileSystemError::BadDescriptor)
        ));
    }

    #[test]
    fn create_and_lookup_errors() {
        let img = TempImage::new();
        let fs = fresh(&img);
        fs.create("a").unwrap();
        assert!(matches!(fs.create("a"), Err(FileSystemError::AlreadyExists(_))));
        assert!(matches!(fs.create("x/y"), Err(FileSystemError::InvalidPath(_))));
        assert!(matches!(
            fs.open("missing", OpenFlags::READ),
            Err(FileSystemError::NotFound(_))
        ));
    }

    #[test]
    fn max_file_size_through_handle() {
        let img = TempImage::new();
        let fs = fresh(&img);
        fs.create("big").unwrap();
        let mut file = fs.open("big", OpenFlags::RDWR).unwrap();

        let limit = MAX_EXTENTS * BLOCK_SIZE;
        assert_eq!(write_all(&fs, &mut file, &vec![9u8; limit + 1]).unwrap(), limit);
        assert!(matches!(
            write_all(&fs, &mut file, b"more"),
            Err(FileSystemError::NoSpace)
        ));

        let usage = fs.usage();
        assert_eq!(usage.data_blocks - usage.free_data_blocks, MAX_EXTENTS as u64);
    }

    #[test]
    fn sync_and_remount_preserves_everything() {
        let img = TempImage::new();
        let data: Vec<u8> = (0..7000).map(|i| (i % 200) as u8).collect();
        let extents;
        {
            let fs = fresh(&img);
            fs.create("one").unwrap();
            fs.create("two").unwrap();
            let mut file = fs.open("two", OpenFlags::WRITE).unwrap();
            write_all(&fs, &mut file, &data).unwrap();
            extents = fs.stat("two").unwrap().extents;

            let report = fs.sync().unwrap();
            assert_eq!(report.data_blocks, 2);
            assert!(report.inodes >= 1);
            // 第二次 sync 没有东西要写
            assert_eq!(fs.sync().unwrap(), SyncReport::default());
        }

        let fs = fresh(&img);
        let names: Vec<String> = fs.list().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);

        let stat = fs.stat("two").unwrap();
        assert_eq!(stat.size, 7000);
        assert_eq!(stat.block_count, 2);
        assert_eq!(stat.extents, extents);

        let mut file = fs.open("two", OpenFlags::READ).unwrap();
        assert_eq!(read_n(&fs, &mut file, 8000), data);

        // 位图也恢复了：新文件拿到的是别的块
        fs.create("three").unwrap();
        let mut file = fs.open("three", OpenFlags::WRITE).unwrap();
        write_all(&fs, &mut file, b"z").unwrap();
        let third = fs.stat("three").unwrap().extents;
        assert!(!extents.contains(&third[0]));
    }

    #[test]
    fn reformat_clears_files() {
        let img = TempImage::new();
        let mut fs = fresh(&img);
        fs.create("a").unwrap();
        let mut file = fs.open("a", OpenFlags::WRITE).unwrap();
        write_all(&fs, &mut file, b"data").unwrap();
        fs.sync().unwrap();

        let mut calls = 0;
        fs.reformat(&mut |_, _| calls += 1).unwrap();
        assert_eq!(calls, fs.super_block().data_blocks);
        assert!(fs.list().unwrap().is_empty());
        assert_eq!(fs.usage().free_data_blocks, fs.super_block().data_blocks);

        drop(fs);
        assert!(fresh(&img).list().unwrap().is_empty());
    }

    #[test]
    fn concurrent_writers_on_one_file_allocate_each_block_once() {
        let img = TempImage::new();
        let fs = Arc::new(fresh(&img));
        fs.create("shared").unwrap();

        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let fs = Arc::clone(&fs);
                thread::spawn(move || {
                    let mut file = fs.open("shared", OpenFlags::WRITE).unwrap();
                    write_all(&fs, &mut file, &[t; 2 * BLOCK_SIZE]).unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 2 * BLOCK_SIZE);
        }

        let stat = fs.stat("shared").unwrap();
        assert_eq!(stat.block_count, 2);
        assert_eq!(stat.size, 2 * BLOCK_SIZE as u64);
        assert_eq!(fs.usage().free_data_blocks, fs.super_block().data_blocks - 2);
    }

    #[test]
    fn writers_on_different_files_never_share_blocks() {
        let img = TempImage::new();
        let fs = Arc::new(fresh(&img));
        for i in 0..4 {
            fs.create(&format!("f{}", i)).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let fs = Arc::clone(&fs);
                thread::spawn(move || {
                    let mut file = fs.open(&format!("f{}", i), OpenFlags::RDWR).unwrap();
                    write_all(&fs, &mut file, &vec![i as u8; 3 * BLOCK_SIZE]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut all = HashSet::new();
        for i in 0..4 {
            let name = format!("f{}", i);
            for b in fs.stat(&name).unwrap().extents {
                assert!(all.insert(b));
            }
            let mut file = fs.open(&name, OpenFlags::READ).unwrap();
            assert_eq!(read_n(&fs, &mut file, 3 * BLOCK_SIZE), vec![i as u8; 3 * BLOCK_SIZE]);
        }
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn mount_rejects_shared_blocks() {
        let img = TempImage::new();
        {
            let fs = fresh(&img);
            fs.create("a").unwrap();
            fs.create("b").unwrap();
            for name in ["a", "b"] {
                let mut file = fs.open(name, OpenFlags::WRITE).unwrap();
                write_all(&fs, &mut file, b"x").unwrap();
            }
            // 让 b 指向 a 的块
            let a = fs.stat("a").unwrap().extents[0];
            let b = read_lock(&fs.inode_table).get_inode(fs.lookup("b").unwrap()).unwrap();
            let mut b = lock_inode(&b);
            b.extents = Default::default();
            b.extents.grow(0, &SingleBlock(a)).unwrap();
            drop(b);
            fs.sync().unwrap();
        }

        assert!(matches!(
            FileSystem::open_disk(&FsConfig {
                disk_path: img.0.clone()
            }),
            Err(FileSystemError::Corrupted(_))
        ));
    }

    struct SingleBlock(u32);

    impl data_block_bitmap::BlockAllocator for SingleBlock {
        fn allocate(&self) -> Result<u32> {
            Ok(self.0)
        }
    }
}
