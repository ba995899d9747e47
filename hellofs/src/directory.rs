//! 目录项存储：目录唯一的数据块内紧密排列的 [`DirRecord`]，
//! 有效的槽位为 `[0, children)`。

use alloc::string::String;
use alloc::vec::Vec;

use crate::block_cache::BlockCacheManager;
use crate::inode_table::InodeTable;
use crate::layout::{DirRecord, Inode, InodeKind};
use crate::{Error, InodeId, Result};

/// 按名字查找，重名时取第一个
pub(crate) fn find(cache: &BlockCacheManager, dir: &Inode, name: &str) -> Result<Option<InodeId>> {
    with_records(cache, dir, |records| {
        records
            .iter()
            .find(|record| record.matches(name))
            .map(DirRecord::inode_no)
    })
}

/// 在槽位 `children` 写入新目录项，然后更新目录 inode
pub(crate) fn append(
    cache: &BlockCacheManager,
    table: &InodeTable,
    dir: &mut Inode,
    name: &str,
    inode_no: InodeId,
) -> Result<()> {
    let children = dir.children().ok_or(Error::NotADirectory)?;
    if children >= capacity(cache) {
        log::warn!("directory {} is full", dir.id);
        return Err(Error::DirectoryFull);
    }
    let record = DirRecord::new(name, inode_no)?;

    cache.modify(
        dir.data_block as usize,
        children as usize * DirRecord::SIZE,
        |slot: &mut DirRecord| *slot = record,
    )?;

    dir.kind = InodeKind::Directory {
        children: children + 1,
    };
    table.store(cache, dir)
}

/// 所有目录项的（名字，inode 编号）；名字不是合法 UTF-8 时视为损坏
pub(crate) fn entries(cache: &BlockCacheManager, dir: &Inode) -> Result<Vec<(String, InodeId)>> {
    with_records(cache, dir, |records| {
        records
            .iter()
            .map(|record| match core::str::from_utf8(record.name()) {
                Ok(name) => Ok((String::from(name), record.inode_no())),
                Err(_) => {
                    log::error!("directory {} holds a non UTF-8 name", dir.id);
                    Err(Error::Corrupted(dir.id))
                }
            })
            .collect()
    })?
}

/// 单个目录能容纳的目录项数
#[inline]
pub(crate) fn capacity(cache: &BlockCacheManager) -> u64 {
    (cache.device().block_size() / DirRecord::SIZE) as u64
}

fn with_records<V>(
    cache: &BlockCacheManager,
    dir: &Inode,
    f: impl FnOnce(&[DirRecord]) -> V,
) -> Result<V> {
    let children = dir.children().ok_or(Error::NotADirectory)? as usize;

    let block = cache.get(dir.data_block as usize)?;
    let block = block.lock();
    let records = block
        .as_slice::<DirRecord>()
        .get(..children)
        .ok_or(Error::Corrupted(dir.id))?;

    Ok(f(records))
}
