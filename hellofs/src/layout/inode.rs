//! inode 在磁盘上只有一个大小字段：
//! 普通文件用它记录**文件字节数**，目录用它记录**目录项个数**。
//! 载入内存后按 `mode` 中的类型位转换为 [`InodeKind`]，不会读错含义。

use enumflags2::{BitFlags, bitflags};

use crate::block_cache::OnDisk;
use crate::{BlockId, Error, InodeId, Result};

/// 磁盘上的 inode，恒为32字节
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DiskInode {
    /// 类型位 | 权限位
    pub mode: u32,
    _pad: u32,
    pub inode_no: u64,
    /// 唯一数据块的绝对块号
    pub data_block_no: u64,
    /// 文件大小或目录项个数
    pub size: u64,
}

unsafe impl OnDisk for DiskInode {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Directory = 0o040000,
    Regular = 0o100000,
}

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o0001,
    OtherWrite = 0o0002,
    OtherRead = 0o0004,
    GroupExec = 0o0010,
    GroupWrite = 0o0020,
    GroupRead = 0o0040,
    UserExec = 0o0100,
    UserWrite = 0o0200,
    UserRead = 0o0400,
    Sticky = 0o1000,
    SetGid = 0o2000,
    SetUid = 0o4000,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub ty: FileType,
    pub perm: BitFlags<Permission>,
}

/// 大小字段按类型区分的两种含义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File { size: u64 },
    Directory { children: u64 },
}

/// 内存中的 inode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub id: InodeId,
    pub perm: BitFlags<Permission>,
    pub data_block: BlockId,
    pub kind: InodeKind,
}

impl FileType {
    const MASK: u32 = 0o170000;

    fn from_mode(mode: u32) -> Option<Self> {
        match mode & Self::MASK {
            m if m == Self::Directory as u32 => Some(Self::Directory),
            m if m == Self::Regular as u32 => Some(Self::Regular),
            _ => None,
        }
    }
}

impl Mode {
    const PERM_MASK: u32 = 0o7777;

    #[inline]
    pub fn new(ty: FileType, perm: impl Into<BitFlags<Permission>>) -> Self {
        Self {
            ty,
            perm: perm.into(),
        }
    }

    /// `rwxr-xr-x` 目录
    pub fn dir_default() -> Self {
        Self {
            ty: FileType::Directory,
            perm: BitFlags::from_bits_truncate(0o755),
        }
    }

    /// `rw-rw-r--` 文件
    pub fn file_default() -> Self {
        Self {
            ty: FileType::Regular,
            perm: BitFlags::from_bits_truncate(0o664),
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(Self {
            ty: FileType::from_mode(raw)?,
            perm: BitFlags::from_bits_truncate(raw & Self::PERM_MASK),
        })
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.ty as u32 | self.perm.bits()
    }
}

impl Inode {
    /// 新建的对象大小与目录项个数皆为零
    pub fn new(id: InodeId, mode: Mode, data_block: BlockId) -> Self {
        let kind = match mode.ty {
            FileType::Regular => InodeKind::File { size: 0 },
            FileType::Directory => InodeKind::Directory { children: 0 },
        };

        Self {
            id,
            perm: mode.perm,
            data_block,
            kind,
        }
    }

    /// 从 inode 表第 `id` 个槽位的记录构造；记录编号须与槽位一致
    pub fn from_disk(id: InodeId, disk: &DiskInode) -> Result<Self> {
        let mode = Mode::from_raw(disk.mode).ok_or(Error::Corrupted(id))?;
        if disk.inode_no != id {
            return Err(Error::Corrupted(id));
        }

        let kind = match mode.ty {
            FileType::Regular => InodeKind::File { size: disk.size },
            FileType::Directory => InodeKind::Directory {
                children: disk.size,
            },
        };

        Ok(Self {
            id,
            perm: mode.perm,
            data_block: disk.data_block_no,
            kind,
        })
    }

    pub fn to_disk(&self) -> DiskInode {
        let size = match self.kind {
            InodeKind::File { size } => size,
            InodeKind::Directory { children } => children,
        };

        DiskInode {
            mode: self.mode().raw(),
            _pad: 0,
            inode_no: self.id,
            data_block_no: self.data_block,
            size,
        }
    }

    pub fn mode(&self) -> Mode {
        let ty = match self.kind {
            InodeKind::File { .. } => FileType::Regular,
            InodeKind::Directory { .. } => FileType::Directory,
        };
        Mode { ty, perm: self.perm }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    /// 文件大小，目录则为空
    pub fn file_size(&self) -> Option<u64> {
        match self.kind {
            InodeKind::File { size } => Some(size),
            InodeKind::Directory { .. } => None,
        }
    }

    /// 目录项个数，文件则为空
    pub fn children(&self) -> Option<u64> {
        match self.kind {
            InodeKind::Directory { children } => Some(children),
            InodeKind::File { .. } => None,
        }
    }
}
