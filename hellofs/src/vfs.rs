//! # 索引节点层
//!
//! 宿主分派层调用的操作：查找、创建、列目录、读写文件。
//! 调用者持有的 [`Inode`] 只是磁盘记录的副本，
//! 每个操作都会在命名空间锁下重新载入，并把最新状态写回调用者的副本。

use alloc::string::String;
use alloc::vec::Vec;

use enumflags2::BitFlags;

use crate::directory;
use crate::layout::{DirRecord, FileType, Inode, InodeKind, Mode, Permission, check_name};
use crate::{BlockId, Error, HelloFileSystem, InodeId, Result};

/// 列目录时返回的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub inode: InodeId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inode: InodeId,
    pub mode: Mode,
    /// 文件字节数；目录为目录项所占字节数
    pub size: u64,
    /// Optimal I/O block size
    pub block_size: u64,
    /// Occupying blocks
    pub blocks: u64,
}

impl HelloFileSystem {
    #[inline]
    pub fn root(&self) -> Result<Inode> {
        self.inode(crate::ROOT_INODE)
    }

    /// 凭借ID获取 inode；未分配的编号视为不存在
    pub fn inode(&self, id: InodeId) -> Result<Inode> {
        if id >= self.inode_table.capacity() {
            return Err(Error::InvalidInode(id));
        }
        if !self.is_inode_allocated(id)? {
            return Err(Error::NotFound);
        }
        self.inode_table.load(&self.cache, id)
    }

    /// 覆盖写入 inode 记录
    pub fn store_inode(&self, inode: &Inode) -> Result<()> {
        let _ns = self.namespace.lock();
        self.inode_table.store(&self.cache, inode)
    }

    /// 根据文件名获取 inode 编号
    pub fn lookup(&self, dir: &Inode, name: &str) -> Result<InodeId> {
        let _ns = self.namespace.lock();
        let dir = self.reload_dir(dir)?;
        directory::find(&self.cache, &dir, name)?.ok_or(Error::NotFound)
    }

    /// 直接在目录中追加一条记录，不分配任何对象，也不检查重名
    pub fn link(&self, dir: &mut Inode, name: &str, inode_no: InodeId) -> Result<()> {
        let _ns = self.namespace.lock();
        let mut current = self.reload_dir(dir)?;
        directory::append(&self.cache, &self.inode_table, &mut current, name, inode_no)?;
        *dir = current;
        Ok(())
    }

    pub fn list(&self, dir: &Inode) -> Result<Vec<DirEntry>> {
        let _ns = self.namespace.lock();
        let dir = self.reload_dir(dir)?;
        let entries = directory::entries(&self.cache, &dir)?
            .into_iter()
            .map(|(name, inode)| DirEntry { inode, name })
            .collect();
        Ok(entries)
    }

    /// 在目录下创建普通文件
    pub fn create(
        &self,
        parent: &mut Inode,
        name: &str,
        perm: BitFlags<Permission>,
    ) -> Result<Inode> {
        self.create_object(parent, name, Mode::new(FileType::Regular, perm))
    }

    /// 在目录下创建目录
    pub fn mkdir(
        &self,
        parent: &mut Inode,
        name: &str,
        perm: BitFlags<Permission>,
    ) -> Result<Inode> {
        self.create_object(parent, name, Mode::new(FileType::Directory, perm))
    }

    /// 分配 inode 与数据块，写入新 inode 并挂到父目录下。
    ///
    /// 任一步失败都会归还已分配的槽位。
    pub fn create_object(&self, parent: &mut Inode, name: &str, mode: Mode) -> Result<Inode> {
        check_name(name)?;

        let _ns = self.namespace.lock();
        let mut dir = self.reload_dir(parent)?;

        // 确认没有已创建的同名项，且目录尚有空位
        if directory::find(&self.cache, &dir, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        if dir.children().unwrap_or_default() >= directory::capacity(&self.cache) {
            log::error!("failed to add {name:?} to directory {}: full", dir.id);
            return Err(Error::DirectoryFull);
        }

        let id = self.alloc_inode()?;
        let data_block = match self.alloc_data() {
            Ok(block) => block,
            Err(e) => return Err(self.rollback(e, id, None)),
        };

        let inode = Inode::new(id, mode, data_block);
        if let Err(e) = self.link_new(&mut dir, name, &inode) {
            return Err(self.rollback(e, id, Some(data_block)));
        }

        log::debug!("created {name:?} as inode {id} in directory {}", dir.id);
        *parent = dir;
        Ok(inode)
    }

    /// 读取文件，`offset` 不小于文件大小时返回 0
    pub fn read_at(&self, inode: &Inode, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let _ns = self.namespace.lock();
        let inode = self.inode_table.load(&self.cache, inode.id)?;
        let size = inode.file_size().ok_or(Error::IsADirectory)? as usize;

        let end = size.min(self.block_size());
        if offset >= end {
            return Ok(0);
        }
        let len = buf.len().min(end - offset);

        let block = self.cache.get(inode.data_block as usize)?;
        buf[..len].copy_from_slice(&block.lock().as_bytes()[offset..offset + len]);
        Ok(len)
    }

    /// 写入文件唯一的数据块；超出块末尾的写入整体拒绝
    pub fn write_at(&self, inode: &mut Inode, offset: usize, buf: &[u8]) -> Result<usize> {
        let _ns = self.namespace.lock();
        let mut current = self.inode_table.load(&self.cache, inode.id)?;
        let size = current.file_size().ok_or(Error::IsADirectory)?;

        let end = offset
            .checked_add(buf.len())
            .filter(|&end| end <= self.block_size())
            .ok_or_else(|| {
                log::warn!(
                    "write of {} bytes at {offset} exceeds block of inode {}",
                    buf.len(),
                    current.id
                );
                Error::WriteOutOfRange
            })?;
        if buf.is_empty() {
            *inode = current;
            return Ok(0);
        }

        {
            let block = self.cache.get(current.data_block as usize)?;
            let mut block = block.lock();
            block.as_bytes_mut()[offset..end].copy_from_slice(buf);
            block.sync()?;
        }

        if end as u64 > size {
            current.kind = InodeKind::File { size: end as u64 };
            self.inode_table.store(&self.cache, &current)?;
        }

        *inode = current;
        Ok(buf.len())
    }

    pub fn stat(&self, inode: &Inode) -> Stat {
        let size = match inode.kind {
            InodeKind::File { size } => size,
            InodeKind::Directory { children } => children * DirRecord::SIZE as u64,
        };

        Stat {
            inode: inode.id,
            mode: inode.mode(),
            size,
            block_size: self.block_size() as u64,
            blocks: 1,
        }
    }
}

impl HelloFileSystem {
    /// 重新载入目录 inode
    fn reload_dir(&self, dir: &Inode) -> Result<Inode> {
        let dir = self.inode_table.load(&self.cache, dir.id)?;
        if !dir.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(dir)
    }

    /// 清零新数据块、写入新 inode、追加目录项
    fn link_new(&self, dir: &mut Inode, name: &str, inode: &Inode) -> Result<()> {
        {
            let block = self.cache.get(inode.data_block as usize)?;
            let mut block = block.lock();
            block.zeroize();
            block.sync()?;
        }
        self.inode_table.store(&self.cache, inode)?;
        directory::append(&self.cache, &self.inode_table, dir, name, inode.id)
    }

    /// 归还槽位，返回最初的错误
    fn rollback(&self, error: Error, inode: InodeId, data: Option<BlockId>) -> Error {
        log::error!("creating inode {inode} failed ({error}), releasing its slots");
        if let Err(e) = self.release(Some(inode), data) {
            log::error!("failed to release slots of inode {inode}: {e}");
        }
        error
    }
}
