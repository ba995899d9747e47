//! inode 表：紧密排列的定长 [`DiskInode`] 记录。

use crate::block_cache::BlockCacheManager;
use crate::layout::{DiskInode, Inode, SuperBlock};
use crate::{Error, InodeId, Result};

#[derive(Debug)]
pub struct InodeTable {
    /// 布局参数，只用到块大小与表容量
    geometry: SuperBlock,
}

impl InodeTable {
    pub fn new(super_block: &SuperBlock) -> Self {
        Self {
            geometry: *super_block,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.geometry.inode_table_size
    }

    /// inode 所在的**块ID**以及**块内偏移**
    #[inline]
    pub fn locate(&self, id: InodeId) -> (usize, usize) {
        self.geometry.inode_pos(id)
    }

    pub(crate) fn load(&self, cache: &BlockCacheManager, id: InodeId) -> Result<Inode> {
        let (block_id, offset) = self.checked_locate(id)?;
        let disk = cache.read(block_id, offset, |disk: &DiskInode| *disk)?;
        Inode::from_disk(id, &disk)
    }

    /// 覆盖写入记录，返回前已刷回设备
    pub(crate) fn store(&self, cache: &BlockCacheManager, inode: &Inode) -> Result<()> {
        let (block_id, offset) = self.checked_locate(inode.id)?;
        cache.modify(block_id, offset, |disk: &mut DiskInode| {
            *disk = inode.to_disk()
        })
    }

    fn checked_locate(&self, id: InodeId) -> Result<(usize, usize)> {
        if id >= self.capacity() {
            log::warn!("inode {id} is beyond table capacity {}", self.capacity());
            return Err(Error::InvalidInode(id));
        }
        Ok(self.locate(id))
    }
}
