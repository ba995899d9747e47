//! # 格式化
//!
//! 在块设备上构建一个全新的卷：根目录下只有一个种子文件。
//! 所有写入位置都经由 [`SuperBlock`] 的布局计算得出，与挂载后的驱动一致。

use alloc::sync::Arc;
use core::ops::Range;

use block_dev::BlockDevice;

use crate::block_cache::BlockCacheManager;
use crate::inode_table::InodeTable;
use crate::layout::bitmap;
use crate::layout::{DirRecord, Inode, InodeKind, Mode, SuperBlock};
use crate::{DEFAULT_BLOCK_SIZE, DEFAULT_DATA_BLOCK_TABLE_SIZE, DEFAULT_INODE_TABLE_SIZE};
use crate::{DATA_BITMAP_BLOCK_ID, INODE_BITMAP_BLOCK_ID, ROOT_INODE, SUPER_BLOCK_ID};
use crate::{Error, INODE_TABLE_START_BLOCK_ID, Result};

/// 种子文件名
pub const SEED_NAME: &str = "wel_helo.txt";
/// 种子文件内容
pub const SEED_CONTENT: &[u8] = b"Welcome Hellofs!!\n";

/// 卷的尺寸参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub inode_table_size: u64,
    pub data_block_table_size: u64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            inode_table_size: DEFAULT_INODE_TABLE_SIZE,
            data_block_table_size: DEFAULT_DATA_BLOCK_TABLE_SIZE,
        }
    }
}

impl Geometry {
    /// 计数为零的超级块
    #[inline]
    pub fn super_block(&self) -> SuperBlock {
        SuperBlock::new(
            self.block_size,
            self.inode_table_size,
            self.data_block_table_size,
        )
    }

    /// 卷所占的总块数
    #[inline]
    pub fn total_blocks(&self) -> u64 {
        self.super_block().total_blocks()
    }
}

/// 格式化的各个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStage {
    Geometry,
    SuperBlock,
    Bitmap,
    Inode,
    DirectoryBlock,
    FileBlock,
}

#[derive(Debug, thiserror::Error)]
#[error("format failed while writing {stage:?}: {source}")]
pub struct FormatError {
    pub stage: FormatStage,
    pub source: Error,
}

/// 格式化设备，返回写入的超级块
pub fn format(
    device: Arc<dyn BlockDevice>,
    geometry: &Geometry,
) -> Result<SuperBlock, FormatError> {
    let at = |stage| move |source| FormatError { stage, source };

    let mut super_block = geometry.super_block();
    check(&*device, &super_block).map_err(at(FormatStage::Geometry))?;
    let data_start = super_block.data_area_start();

    log::info!("formatting {} blocks, data area at {data_start}", super_block.total_blocks());

    let cache = BlockCacheManager::new(device);

    // 根目录与种子文件
    super_block.inode_count = 2;
    super_block.data_block_count = 2;
    zero(&cache, SUPER_BLOCK_ID..SUPER_BLOCK_ID + 1)
        .and_then(|()| cache.modify(SUPER_BLOCK_ID, 0, |sb: &mut SuperBlock| *sb = super_block))
        .map_err(at(FormatStage::SuperBlock))?;

    [INODE_BITMAP_BLOCK_ID, DATA_BITMAP_BLOCK_ID]
        .into_iter()
        .try_for_each(|block_id| {
            zero(&cache, block_id..block_id + 1)?;
            let block = cache.get(block_id)?;
            let mut block = block.lock();
            bitmap::set(block.as_bytes_mut(), 0);
            bitmap::set(block.as_bytes_mut(), 1);
            block.sync()
        })
        .map_err(at(FormatStage::Bitmap))?;

    let root = Inode {
        kind: InodeKind::Directory { children: 1 },
        ..Inode::new(ROOT_INODE, Mode::dir_default(), data_start)
    };
    let seed = Inode {
        kind: InodeKind::File {
            size: SEED_CONTENT.len() as u64,
        },
        ..Inode::new(ROOT_INODE + 1, Mode::file_default(), data_start + 1)
    };
    let inode_table = InodeTable::new(&super_block);
    zero(&cache, INODE_TABLE_START_BLOCK_ID..data_start as usize)
        .and_then(|()| inode_table.store(&cache, &root))
        .and_then(|()| inode_table.store(&cache, &seed))
        .map_err(at(FormatStage::Inode))?;

    DirRecord::new(SEED_NAME, seed.id)
        .and_then(|record| {
            zero(&cache, block_range(root.data_block))?;
            cache.modify(root.data_block as usize, 0, |slot: &mut DirRecord| *slot = record)
        })
        .map_err(at(FormatStage::DirectoryBlock))?;

    zero(&cache, block_range(seed.data_block))
        .and_then(|()| {
            let block = cache.get(seed.data_block as usize)?;
            let mut block = block.lock();
            block.as_bytes_mut()[..SEED_CONTENT.len()].copy_from_slice(SEED_CONTENT);
            block.sync()
        })
        .map_err(at(FormatStage::FileBlock))?;

    cache.sync_all().map_err(at(FormatStage::FileBlock))?;
    Ok(super_block)
}

/// 设备块大小须与参数一致，且能容纳整个卷与两个初始对象
fn check(device: &dyn BlockDevice, super_block: &SuperBlock) -> Result<()> {
    if device.block_size() as u64 != super_block.block_size {
        return Err(Error::BlockSizeMismatch {
            stored: super_block.block_size,
            device: device.block_size(),
        });
    }
    super_block.check_geometry()?;
    if super_block.inode_table_size < 2 || super_block.data_block_table_size < 2 {
        return Err(Error::InvalidGeometry);
    }

    let required = super_block.total_blocks();
    let available = device.block_count() as u64;
    if available < required {
        return Err(Error::DeviceTooSmall {
            required,
            available,
        });
    }
    Ok(())
}

#[inline]
fn block_range(block_id: u64) -> Range<usize> {
    block_id as usize..block_id as usize + 1
}

fn zero(cache: &BlockCacheManager, blocks: Range<usize>) -> Result<()> {
    for block_id in blocks {
        let block = cache.get(block_id)?;
        let mut block = block.lock();
        block.zeroize();
        block.sync()?;
    }
    Ok(())
}
