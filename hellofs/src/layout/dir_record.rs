use core::fmt;

use crate::block_cache::OnDisk;
use crate::{Error, InodeId, Result};

/// 文件名的最大字节数
pub const NAME_MAX_LEN: usize = 255;

/// 目录项：文件名与其 inode 编号
#[derive(Clone, Copy)]
#[repr(C)]
pub struct DirRecord {
    /// 以 \0 填充；恰好255字节时没有结尾的 \0
    name: [u8; NAME_MAX_LEN],
    _pad: u8,
    inode_no: u64,
}

unsafe impl OnDisk for DirRecord {}

/// 名字须非空、不含 `/` 与 `\0`，且不超过 [`NAME_MAX_LEN`] 字节
pub fn check_name(name: &str) -> Result<()> {
    if name.len() > NAME_MAX_LEN {
        return Err(Error::NameTooLong);
    }
    if name.is_empty() || name.bytes().any(|c| c == b'/' || c == 0) {
        return Err(Error::InvalidName);
    }
    Ok(())
}

impl DirRecord {
    /// 目录项大小恒为264字节
    pub const SIZE: usize = 264;

    pub fn new(name: &str, inode_no: InodeId) -> Result<Self> {
        check_name(name)?;

        let bytes = name.as_bytes();
        let mut buf = [0; NAME_MAX_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            name: buf,
            _pad: 0,
            inode_no,
        })
    }

    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX_LEN);
        &self.name[..len]
    }

    #[inline]
    pub fn inode_no(&self) -> InodeId {
        self.inode_no
    }

    /// 逐字节比较，大小写敏感
    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.name() == name.as_bytes()
    }
}

impl fmt::Debug for DirRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirRecord")
            .field("name", &core::str::from_utf8(self.name()))
            .field("inode_no", &self.inode_no)
            .finish()
    }
}
