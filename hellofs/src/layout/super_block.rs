use core::mem;

use crate::block_cache::OnDisk;
use crate::layout::{DirRecord, DiskInode};
use crate::{BlockId, Error, InodeId, Result};
use crate::{INODE_TABLE_START_BLOCK_ID, MAGIC, VERSION};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录两张表的容量与已用数量，其余区域皆由此定位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct SuperBlock {
    pub version: u64,
    /// 魔数：用于校验文件系统合法性
    pub magic: u64,
    pub block_size: u64,
    /// inode 表容量
    pub inode_table_size: u64,
    /// 已分配的 inode 数
    pub inode_count: u64,
    /// 数据块表容量
    pub data_block_table_size: u64,
    /// 已分配的数据块数
    pub data_block_count: u64,
}

unsafe impl OnDisk for SuperBlock {}

impl SuperBlock {
    /// 最小块大小
    pub const MIN_BLOCK_SIZE: usize = 512;

    pub fn new(block_size: usize, inode_table_size: u64, data_block_table_size: u64) -> Self {
        Self {
            version: VERSION,
            magic: MAGIC,
            block_size: block_size as u64,
            inode_table_size,
            inode_count: 0,
            data_block_table_size,
            data_block_count: 0,
        }
    }

    /// 挂载前的校验，魔数与块大小先于其它字段
    pub fn validate(&self, device_block_size: usize) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::MagicMismatch { found: self.magic });
        }
        if self.block_size != device_block_size as u64 {
            return Err(Error::BlockSizeMismatch {
                stored: self.block_size,
                device: device_block_size,
            });
        }
        if self.version != VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }
        self.check_geometry()
    }

    /// 块大小须为不小于 [`Self::MIN_BLOCK_SIZE`] 的 2 的幂；
    /// 每张表的位图都只占一个块，计数不得超过容量。
    pub fn check_geometry(&self) -> Result<()> {
        let block_size = self.block_size;
        let bits = block_size.saturating_mul(8);

        let valid = block_size.is_power_of_two()
            && block_size >= Self::MIN_BLOCK_SIZE as u64
            && (1..=bits).contains(&self.inode_table_size)
            && (1..=bits).contains(&self.data_block_table_size)
            && self.inode_count <= self.inode_table_size
            && self.data_block_count <= self.data_block_table_size;

        if valid { Ok(()) } else { Err(Error::InvalidGeometry) }
    }

    #[inline]
    pub fn inodes_per_block(&self) -> u64 {
        self.block_size / mem::size_of::<DiskInode>() as u64
    }

    /// 数据块区域的起始块
    #[inline]
    pub fn data_area_start(&self) -> BlockId {
        INODE_TABLE_START_BLOCK_ID as u64 + self.inode_table_size / self.inodes_per_block() + 1
    }

    /// 卷所占的总块数
    #[inline]
    pub fn total_blocks(&self) -> u64 {
        self.data_area_start() + self.data_block_table_size
    }

    /// 通过ID获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**
    pub fn inode_pos(&self, inode_id: InodeId) -> (usize, usize) {
        let per_block = self.inodes_per_block();
        let block_id = INODE_TABLE_START_BLOCK_ID as u64 + inode_id / per_block;
        let offset = (inode_id % per_block) as usize * mem::size_of::<DiskInode>();

        (block_id as usize, offset)
    }

    /// 单个目录可容纳的目录项数
    #[inline]
    pub fn dir_capacity(&self) -> u64 {
        self.block_size / DirRecord::SIZE as u64
    }
}
