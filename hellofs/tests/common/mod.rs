#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hellofs::{BlockDevice, BlockError, Geometry, HelloFileSystem, format};

/// 内存中的块设备
pub struct RamDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
    /// 写入该块时报错
    failing: AtomicUsize,
}

impl RamDisk {
    pub fn new(block_size: usize, blocks: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; block_size * blocks]),
            failing: AtomicUsize::new(usize::MAX),
        }
    }

    /// 直接读取原始字节
    pub fn raw(&self, block_id: usize) -> Vec<u8> {
        let start = block_id * self.block_size;
        self.data.lock().unwrap()[start..start + self.block_size].to_vec()
    }

    /// 绕过文件系统修改原始字节
    pub fn patch(&self, offset: usize, f: impl FnOnce(&mut [u8])) {
        f(&mut self.data.lock().unwrap()[offset..]);
    }

    /// 共享同一份数据、但声明不同块大小的设备
    pub fn with_block_size(&self, block_size: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(self.data.lock().unwrap().clone()),
            failing: AtomicUsize::new(usize::MAX),
        }
    }

    /// 此后对 `block_id` 的写入都失败
    pub fn fail_writes(&self, block_id: usize) {
        self.failing.store(block_id, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing.store(usize::MAX, Ordering::SeqCst);
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.data.lock().unwrap().len() / self.block_size
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let data = self.data.lock().unwrap();
        let start = block_id * self.block_size;
        let block = data
            .get(start..start + self.block_size)
            .ok_or(BlockError::OutOfRange(block_id))?;
        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        if self.failing.load(Ordering::SeqCst) == block_id {
            return Err(BlockError::Io(block_id));
        }
        let mut data = self.data.lock().unwrap();
        let start = block_id * self.block_size;
        let block = data
            .get_mut(start..start + self.block_size)
            .ok_or(BlockError::OutOfRange(block_id))?;
        block.copy_from_slice(buf);
        Ok(())
    }
}

/// 小尺寸的卷：块大小 1024，目录最多容纳 3 项，inode 与数据块各 16 个
pub fn small_geometry() -> Geometry {
    Geometry {
        block_size: 1024,
        inode_table_size: 16,
        data_block_table_size: 16,
    }
}

pub fn formatted(geometry: &Geometry) -> (Arc<RamDisk>, Arc<HelloFileSystem>) {
    let disk = Arc::new(RamDisk::new(
        geometry.block_size,
        geometry.total_blocks() as usize,
    ));
    format(disk.clone(), geometry).unwrap();
    let fs = HelloFileSystem::mount(disk.clone()).unwrap();
    (disk, fs)
}
