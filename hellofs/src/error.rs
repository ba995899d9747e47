use core::fmt;

use block_dev::BlockError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// 位图所管理的表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Inode,
    DataBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{0} table is full")]
    OutOfSpace(Table),
    #[error("directory record capacity exceeded")]
    DirectoryFull,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("no such entry")]
    NotFound,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("magic number mismatch: {found:#x}")]
    MagicMismatch { found: u64 },
    #[error("volume formatted with block size {stored}, device uses {device}")]
    BlockSizeMismatch { stored: u64, device: usize },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u64),
    #[error("invalid volume geometry")]
    InvalidGeometry,
    #[error("device holds {available} blocks, volume needs {required}")]
    DeviceTooSmall { required: u64, available: u64 },
    #[error("file name exceeds {} bytes", crate::layout::NAME_MAX_LEN)]
    NameTooLong,
    #[error("invalid file name")]
    InvalidName,
    #[error("write beyond the end of the data block")]
    WriteOutOfRange,
    #[error("inode {0} is outside the inode table")]
    InvalidInode(u64),
    #[error("inode {0} holds an unknown object kind")]
    Corrupted(u64),
    #[error("incomplete data transfer")]
    CopyFault,
    #[error("run out of block cache")]
    CacheExhausted,
    #[error("block device: {0}")]
    Device(BlockError),
}

impl Error {
    /// 创建对象时因空间不足而失败
    pub fn is_allocation_error(&self) -> bool {
        matches!(self, Self::OutOfSpace(_) | Self::DirectoryFull)
    }

    /// 供宿主分派层使用的 errno
    pub fn errno(&self) -> i32 {
        match self {
            Self::OutOfSpace(_) | Self::DirectoryFull => 28, // ENOSPC
            Self::NotADirectory => 20,                      // ENOTDIR
            Self::IsADirectory => 21,                       // EISDIR
            Self::NotFound => 2,                            // ENOENT
            Self::AlreadyExists => 17,                      // EEXIST
            Self::MagicMismatch { .. }
            | Self::BlockSizeMismatch { .. }
            | Self::UnsupportedVersion(_)
            | Self::InvalidGeometry
            | Self::InvalidName
            | Self::InvalidInode(_) => 22, // EINVAL
            Self::DeviceTooSmall { .. } => 28,
            Self::NameTooLong => 36,    // ENAMETOOLONG
            Self::WriteOutOfRange => 27, // EFBIG
            Self::CopyFault => 14,      // EFAULT
            Self::Corrupted(_) | Self::Device(_) => 5, // EIO
            Self::CacheExhausted => 12, // ENOMEM
        }
    }
}

impl From<BlockError> for Error {
    fn from(e: BlockError) -> Self {
        match e {
            BlockError::ShortTransfer { .. } => Self::CopyFault,
            e => Self::Device(e),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inode => f.write_str("inode"),
            Self::DataBlock => f.write_str("data block"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_group() {
        assert!(Error::OutOfSpace(Table::Inode).is_allocation_error());
        assert!(Error::DirectoryFull.is_allocation_error());
        assert!(!Error::NotFound.is_allocation_error());
        assert_eq!(Error::DirectoryFull.errno(), 28);
        assert_eq!(Error::NameTooLong.errno(), 36);
    }

    #[test]
    fn short_transfer_is_copy_fault() {
        let e: Error = BlockError::ShortTransfer {
            block_id: 3,
            transferred: 7,
        }
        .into();
        assert_eq!(e, Error::CopyFault);
        assert_eq!(Error::from(BlockError::Io(3)), Error::Device(BlockError::Io(3)));
    }
}
