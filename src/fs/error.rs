use std::fmt;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),    // 底层 I/O 错误
    Fault,                 // 调用方缓冲区拷贝失败
    NoSpace,               // 写入位置超出单文件最大长度
    DiskFull,              // 块分配器已无空闲块
    InodeFull,             // inode 已满
    // 块号/偏移越过数据区边界
    OutOfRange { block: u32, offset: usize, len: usize },
    NotFound(String),      // 文件不存在，带名字
    AlreadyExists(String), // 文件已存在，带名字
    InvalidPath(String),   // 文件名非法
    InvalidInode(u64),     // inode 无效
    InvalidSeek(i64),      // seek 结果为负
    // 写入位置前面还有未映射的块（不支持空洞）
    Hole { index: u32, mapped: u32 },
    BadDescriptor,         // 打开模式不允许该操作
    Corrupted(String),     // 文件系统损坏
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        FileSystemError::Corrupted(e.to_string())
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::Fault => write!(f, "Bad address"),
            Self::NoSpace => write!(f, "File would exceed the maximum file size"),
            Self::DiskFull => write!(f, "Disk space is full"),
            Self::InodeFull => write!(f, "No free inode available"),
            Self::OutOfRange { block, offset, len } => write!(
                f,
                "Block access out of range: block {}, offset {}, len {}",
                block, offset, len
            ),
            Self::NotFound(name) => write!(f, "File not found: {}", name),
            Self::AlreadyExists(name) => write!(f, "File already exists: {}", name),
            Self::InvalidPath(name) => write!(f, "Invalid file name: {}", name),
            Self::InvalidInode(inode) => write!(f, "Invalid inode: {}", inode),
            Self::InvalidSeek(pos) => write!(f, "Invalid seek position: {}", pos),
            Self::Hole { index, mapped } => write!(
                f,
                "Cannot map block {} while only {} blocks are mapped (holes unsupported)",
                index, mapped
            ),
            Self::BadDescriptor => write!(f, "File not opened for this operation"),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
