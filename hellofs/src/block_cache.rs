//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此我们在内存中开辟缓冲区，
//! 把即将操作的块复制到内存中，提高对块设备的操作效率。
//! 同时，块缓存层也会尝试返回已缓存的块。
//!
//! 每个卷持有自己的 [`BlockCacheManager`]，不同卷之间互不干扰。
//! 可变借用一个块即视为将其标脏，[`BlockCache::sync`] 负责把脏块刷回设备。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;
use core::slice;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::Result;
use crate::error::Error;

/// 可以直接映射到块缓冲区上的磁盘数据结构。
///
/// # Safety
///
/// 实现者必须是 `#[repr(C)]`，任意位模式皆合法，且对齐不超过 8 字节。
pub unsafe trait OnDisk: Sized {}

/// 块缓存全局管理，缓存、调度块缓存
pub struct BlockCacheManager {
    device: Arc<dyn BlockDevice>,
    queue: Mutex<Vec<(usize, Arc<Mutex<BlockCache>>)>>,
}

/// 内存中的块缓存
pub struct BlockCache {
    /// 缓存的数据，以 u64 为单位分配以保证 8 字节对齐
    data: Vec<u64>,
    /// 对应的块ID
    block_id: usize,
    /// 底层块设备的引用
    device: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl BlockCache {
    fn new(block_id: usize, device: Arc<dyn BlockDevice>) -> Result<Self> {
        let block_size = device.block_size();
        let mut data = vec![0u64; block_size.div_ceil(8)];
        let buf = unsafe { slice::from_raw_parts_mut(data.as_mut_ptr().cast::<u8>(), block_size) };
        device.read_block(block_id, buf)?;

        Ok(Self {
            data,
            block_id,
            device,
            modified: false,
        })
    }

    /// 脏块写回设备
    pub fn sync(&mut self) -> Result<()> {
        if self.modified {
            self.device.write_block(self.block_id, self.as_bytes())?;
            self.modified = false;
        }
        Ok(())
    }

    pub fn get<T: OnDisk>(&self, offset: usize) -> &T {
        self.check::<T>(offset);
        unsafe { &*self.as_bytes()[offset..].as_ptr().cast() }
    }

    pub fn get_mut<T: OnDisk>(&mut self, offset: usize) -> &mut T {
        self.check::<T>(offset);
        self.modified = true;
        unsafe { &mut *self.bytes_mut()[offset..].as_mut_ptr().cast() }
    }

    /// 把块视为若干个连续的 `T`
    pub fn as_slice<T: OnDisk>(&self) -> &[T] {
        let len = self.as_bytes().len() / mem::size_of::<T>();
        unsafe { slice::from_raw_parts(self.data.as_ptr().cast(), len) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.device.block_size();
        unsafe { slice::from_raw_parts(self.data.as_ptr().cast(), len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.modified = true;
        self.bytes_mut()
    }

    #[inline]
    pub fn map<T: OnDisk, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: OnDisk, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    #[inline]
    pub fn zeroize(&mut self) {
        self.data.fill(0);
        self.modified = true;
    }
}

impl BlockCache {
    fn check<T: OnDisk>(&self, offset: usize) {
        assert!(mem::size_of::<T>() + offset <= self.device.block_size());
        assert_eq!(offset % mem::align_of::<T>(), 0);
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.device.block_size();
        unsafe { slice::from_raw_parts_mut(self.data.as_mut_ptr().cast(), len) }
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            log::error!("failed to write back block {}: {e}", self.block_id);
        }
    }
}

impl BlockCacheManager {
    /// 块缓存个数的上限
    const CAPACITY: usize = 16;

    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            queue: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }

    // 块缓存调度策略：踢走闲置块
    pub fn get(&self, block_id: usize) -> Result<Arc<Mutex<BlockCache>>> {
        let mut queue = self.queue.lock();

        // 尝试从缓冲区中读取块
        if let Some(cache) = queue
            .iter()
            .find_map(|(id, cache)| (block_id == *id).then_some(cache))
        {
            return Ok(Arc::clone(cache));
        };

        // 触及上限，写回一个块
        if queue.len() == Self::CAPACITY {
            let index = queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1) // 没有其它引用的才能写回
                .ok_or(Error::CacheExhausted)?;
            let (_, evicted) = queue.remove(index);
            evicted.lock().sync()?;
        }

        // 缓存新块
        let block_cache = Arc::new(Mutex::new(BlockCache::new(block_id, self.device.clone())?));
        queue.push((block_id, block_cache.clone()));

        Ok(block_cache)
    }

    /// 修改块并立即刷回设备
    pub fn modify<T: OnDisk, V>(
        &self,
        block_id: usize,
        offset: usize,
        f: impl FnOnce(&mut T) -> V,
    ) -> Result<V> {
        let cache = self.get(block_id)?;
        let mut cache = cache.lock();
        let v = cache.map_mut(offset, f);
        cache.sync()?;
        Ok(v)
    }

    /// 读取块上的结构
    pub fn read<T: OnDisk, V>(
        &self,
        block_id: usize,
        offset: usize,
        f: impl FnOnce(&T) -> V,
    ) -> Result<V> {
        Ok(self.get(block_id)?.lock().map(offset, f))
    }

    pub fn sync_all(&self) -> Result<()> {
        self.queue
            .lock()
            .iter()
            .try_for_each(|(_, cache)| cache.lock().sync())
    }
}

// 原始字节
unsafe impl OnDisk for u8 {}
