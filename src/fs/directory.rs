use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    disk::BlockDevice,
    fs::{
        config::MAX_NAME_LEN,
        error::{FileSystemError, Result},
        region::{read_region, write_region},
    },
};

// 一个目录项
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode_index: u64,
}

/// 根目录：平铺的 名字 -> inode 映射，没有子目录
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Directory {
    entries: Vec<DirEntry>,
    #[serde(skip)]
    index_map: HashMap<String, usize>, // name -> entries 索引
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild_index_map(&mut self) {
        self.index_map.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index_map.insert(entry.name.clone(), i);
        }
    }

    pub fn validate_name(name: &str) -> Result<()> {
        let bad = name.is_empty()
            || name.len() > MAX_NAME_LEN
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.chars().any(char::is_control);
        if bad {
            return Err(FileSystemError::InvalidPath(name.to_string()));
        }
        Ok(())
    }

    // 添加目录项
    pub fn add(&mut self, inode_index: u64, name: &str) -> Result<()> {
        Self::validate_name(name)?;
        if self.index_map.contains_key(name) {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }
        self.entries.push(DirEntry {
            name: name.to_string(),
            inode_index,
        });
        self.index_map
            .insert(name.to_string(), self.entries.len() - 1);
        Ok(())
    }

    // 查找目录项，返回 inode_index
    pub fn find(&self, name: &str) -> Option<u64> {
        self.index_map
            .get(name)
            .map(|&idx| self.entries[idx].inode_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn list_sorted(&self) -> Vec<&DirEntry> {
        let mut entries: Vec<&DirEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn sync(&self, disk: &dyn BlockDevice, start_block: u64, blocks: u64) -> Result<()> {
        write_region(disk, start_block, blocks, self)
    }

    // 从磁盘加载目录，自动重建 index_map
    pub fn load(disk: &dyn BlockDevice, start_block: u64, blocks: u64) -> Result<Self> {
        let mut dir: Directory = read_region(disk, start_block, blocks)?;
        dir.rebuild_index_map();
        if dir.index_map.len() != dir.entries.len() {
            return Err(FileSystemError::Corrupted(
                "duplicate names in root directory".to_string(),
            ));
        }
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{file_disk::tests::TempImage, FileDisk};

    #[test]
    fn add_find_and_reject_duplicates() {
        let mut dir = Directory::new();
        dir.add(3, "b.txt").unwrap();
        dir.add(1, "a.txt").unwrap();

        assert_eq!(dir.find("b.txt"), Some(3));
        assert_eq!(dir.find("nope"), None);
        assert!(matches!(
            dir.add(9, "a.txt"),
            Err(FileSystemError::AlreadyExists(_))
        ));

        let names: Vec<&str> = dir.list_sorted().into_iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn bad_names_are_rejected() {
        let mut dir = Directory::new();
        for name in ["", ".", "..", "a/b", "tab\there"] {
            assert!(matches!(
                dir.add(0, name),
                Err(FileSystemError::InvalidPath(_))
            ));
        }
        assert!(dir.add(0, &"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert_eq!(dir.len(), 0);
    }

    #[test]
    fn load_rebuilds_index() {
        let img = TempImage::new();
        let (disk, _) = FileDisk::open(&img.0, 2).unwrap();

        let mut dir = Directory::new();
        dir.add(5, "notes").unwrap();
        dir.sync(&disk, 1, 1).unwrap();

        let loaded = Directory::load(&disk, 1, 1).unwrap();
        assert_eq!(loaded.find("notes"), Some(5));
        assert_eq!(loaded.len(), 1);
    }
}
