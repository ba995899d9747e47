//! # 磁盘块管理器层
//!
//! 挂载卷，并在全卷唯一的分配锁下分配 inode 与数据块。

use alloc::sync::Arc;
use core::mem;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::block_cache::BlockCacheManager;
use crate::inode_table::InodeTable;
use crate::layout::SuperBlock;
use crate::layout::bitmap::Bitmap;
use crate::{BlockId, Error, InodeId, Result, Table};
use crate::{DATA_BITMAP_BLOCK_ID, INODE_BITMAP_BLOCK_ID, ROOT_INODE, SUPER_BLOCK_ID};

/// 已挂载的卷。
///
/// 卷的全部状态都在此句柄内，同一进程可以同时挂载多个卷。
pub struct HelloFileSystem {
    pub(crate) cache: BlockCacheManager,
    /// 超级块与两张位图构成一个临界区
    allocator: Mutex<Allocator>,
    pub(crate) inode_table: InodeTable,
    /// 目录项追加与 inode 大小更新互斥
    pub(crate) namespace: Mutex<()>,
}

struct Allocator {
    /// 内存中的超级块，每次修改计数后整块写回
    super_block: SuperBlock,
    inode_bitmap: Bitmap,
    data_bitmap: Bitmap,
}

impl HelloFileSystem {
    /// 校验超级块并挂载；校验失败时不做任何修改
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Arc<Self>> {
        // 块须至少容纳超级块，其余参数交给超级块校验
        let device_block_size = device.block_size();
        if device_block_size < mem::size_of::<SuperBlock>() {
            return Err(Error::InvalidGeometry);
        }

        let cache = BlockCacheManager::new(device.clone());
        let super_block = cache.read(SUPER_BLOCK_ID, 0, |sb: &SuperBlock| *sb)?;
        if let Err(e) = super_block.validate(device_block_size) {
            log::error!("refusing to mount: {e}");
            return Err(e);
        }

        let required = super_block.total_blocks();
        let available = device.block_count() as u64;
        if available < required {
            return Err(Error::DeviceTooSmall {
                required,
                available,
            });
        }

        let fs = Self {
            allocator: Mutex::new(Allocator {
                super_block,
                inode_bitmap: Bitmap::new(INODE_BITMAP_BLOCK_ID, super_block.inode_table_size),
                data_bitmap: Bitmap::new(DATA_BITMAP_BLOCK_ID, super_block.data_block_table_size),
            }),
            inode_table: InodeTable::new(&super_block),
            namespace: Mutex::new(()),
            cache,
        };

        if !fs.inode(ROOT_INODE)?.is_dir() {
            return Err(Error::Corrupted(ROOT_INODE));
        }

        log::info!(
            "hellofs mounted: block size {}, inodes {}/{}, data blocks {}/{}",
            super_block.block_size,
            super_block.inode_count,
            super_block.inode_table_size,
            super_block.data_block_count,
            super_block.data_block_table_size,
        );
        Ok(Arc::new(fs))
    }

    /// 超级块的快照
    pub fn super_block(&self) -> SuperBlock {
        self.allocator.lock().super_block
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.cache.device().block_size()
    }

    #[inline]
    pub fn inode_table(&self) -> &InodeTable {
        &self.inode_table
    }

    /// 在磁盘上分配新的 inode 并返回其ID
    pub fn alloc_inode(&self) -> Result<InodeId> {
        let mut allocator = self.allocator.lock();
        let Some(id) = allocator.inode_bitmap.alloc(&self.cache)? else {
            log::error!(
                "unable to allocate inode, inode count: {}",
                allocator.super_block.inode_count
            );
            return Err(Error::OutOfSpace(Table::Inode));
        };

        let mut next = allocator.super_block;
        next.inode_count += 1;
        if let Err(e) = allocator.commit(&self.cache, next) {
            allocator.undo(&self.cache, Table::Inode, id);
            return Err(e);
        }
        log::debug!("allocated inode {id}");
        Ok(id)
    }

    /// 在磁盘上分配新的数据块并返回其绝对块号
    pub fn alloc_data(&self) -> Result<BlockId> {
        let mut allocator = self.allocator.lock();
        let Some(slot) = allocator.data_bitmap.alloc(&self.cache)? else {
            log::error!(
                "unable to allocate data block, data block count: {}",
                allocator.super_block.data_block_count
            );
            return Err(Error::OutOfSpace(Table::DataBlock));
        };

        let mut next = allocator.super_block;
        next.data_block_count += 1;
        if let Err(e) = allocator.commit(&self.cache, next) {
            allocator.undo(&self.cache, Table::DataBlock, slot);
            return Err(e);
        }
        let block_id = next.data_area_start() + slot;
        log::debug!("allocated data block {block_id}");
        Ok(block_id)
    }

    /// 撤销一次未完成创建所占用的槽位
    pub(crate) fn release(&self, inode: Option<InodeId>, data: Option<BlockId>) -> Result<()> {
        let mut allocator = self.allocator.lock();
        let mut next = allocator.super_block;
        let data = data.map(|block_id| block_id - next.data_area_start());

        if let Some(id) = inode {
            allocator.inode_bitmap.dealloc(&self.cache, id)?;
            next.inode_count -= 1;
        }
        if let Some(slot) = data {
            if let Err(e) = allocator.data_bitmap.dealloc(&self.cache, slot) {
                if let Some(id) = inode {
                    allocator.redo(&self.cache, Table::Inode, id);
                }
                return Err(e);
            }
            next.data_block_count -= 1;
        }

        if let Err(e) = allocator.commit(&self.cache, next) {
            // 计数未能写回，槽位保持占用
            if let Some(id) = inode {
                allocator.redo(&self.cache, Table::Inode, id);
            }
            if let Some(slot) = data {
                allocator.redo(&self.cache, Table::DataBlock, slot);
            }
            return Err(e);
        }
        Ok(())
    }

    /// inode 是否已分配
    pub fn is_inode_allocated(&self, id: InodeId) -> Result<bool> {
        self.allocator.lock().inode_bitmap.is_allocated(&self.cache, id)
    }

    /// 数据块是否已分配
    pub fn is_data_allocated(&self, block_id: BlockId) -> Result<bool> {
        let allocator = self.allocator.lock();
        match block_id.checked_sub(allocator.super_block.data_area_start()) {
            Some(slot) => allocator.data_bitmap.is_allocated(&self.cache, slot),
            None => Ok(false),
        }
    }

    /// 把所有脏块刷回设备
    pub fn sync(&self) -> Result<()> {
        self.cache.sync_all()
    }
}

impl Allocator {
    /// 写回新的超级块，成功后才替换内存中的副本
    fn commit(&mut self, cache: &BlockCacheManager, next: SuperBlock) -> Result<()> {
        if let Err(e) = cache.modify(SUPER_BLOCK_ID, 0, |sb: &mut SuperBlock| *sb = next) {
            log::error!("failed to write super block: {e}");
            // 缓存中的超级块退回到设备上的内容
            let current = self.super_block;
            if let Ok(block) = cache.get(SUPER_BLOCK_ID) {
                block.lock().map_mut(0, |sb: &mut SuperBlock| *sb = current);
            }
            return Err(e);
        }
        self.super_block = next;
        Ok(())
    }

    fn bitmap(&self, table: Table) -> &Bitmap {
        match table {
            Table::Inode => &self.inode_bitmap,
            Table::DataBlock => &self.data_bitmap,
        }
    }

    /// 清除刚分配的槽位
    fn undo(&self, cache: &BlockCacheManager, table: Table, slot: u64) {
        if let Err(e) = self.bitmap(table).dealloc(cache, slot) {
            log::error!("failed to clear {table} slot {slot}: {e}");
        }
    }

    /// 重新占用刚清除的槽位
    fn redo(&self, cache: &BlockCacheManager, table: Table, slot: u64) {
        if let Err(e) = self.bitmap(table).reserve(cache, slot) {
            log::error!("failed to restore {table} slot {slot}: {e}");
        }
    }
}
