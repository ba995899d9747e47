use crate::Result;
use crate::block_cache::BlockCacheManager;

/// 位图块，记录其指示表的槽位分配情况。
///
/// 槽位 `i` 对应第 `i / 8` 字节的第 `i % 8` 位（低位在前），1 表示已占用。
#[derive(Debug)]
pub struct Bitmap {
    /// 位图所在块
    block_id: usize,
    /// 所指示表的容量，不超过一个块的位数
    capacity: u64,
}

impl Bitmap {
    #[inline]
    pub fn new(block_id: usize, capacity: u64) -> Self {
        Self { block_id, capacity }
    }

    /// 按升序寻找第一个空闲槽位，置位后立即写回，返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&self, cache: &BlockCacheManager) -> Result<Option<u64>> {
        let block = cache.get(self.block_id)?;
        let mut block = block.lock();

        let Some(slot) = first_clear(block.as_bytes(), self.capacity) else {
            return Ok(None);
        };

        set(block.as_bytes_mut(), slot);
        if let Err(e) = block.sync() {
            clear(block.as_bytes_mut(), slot);
            return Err(e);
        }
        Ok(Some(slot))
    }

    /// 重新置位一个槽位
    pub fn reserve(&self, cache: &BlockCacheManager, slot: u64) -> Result<()> {
        let block = cache.get(self.block_id)?;
        let mut block = block.lock();

        set(block.as_bytes_mut(), slot);
        block.sync()
    }

    /// 清除槽位，仅用于撤销一次未完成的创建
    pub fn dealloc(&self, cache: &BlockCacheManager, slot: u64) -> Result<()> {
        let block = cache.get(self.block_id)?;
        let mut block = block.lock();

        let (byte, mask) = locate(slot);
        // 编号一定得有对应的位
        debug_assert_ne!(block.as_bytes()[byte] & mask, 0);
        clear(block.as_bytes_mut(), slot);
        if let Err(e) = block.sync() {
            set(block.as_bytes_mut(), slot);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_allocated(&self, cache: &BlockCacheManager, slot: u64) -> Result<bool> {
        let (byte, mask) = locate(slot);
        Ok(slot < self.capacity && cache.get(self.block_id)?.lock().as_bytes()[byte] & mask != 0)
    }
}

/// 槽位所在字节及其掩码
#[inline]
fn locate(slot: u64) -> (usize, u8) {
    ((slot / 8) as usize, 1 << (slot % 8))
}

/// 在位图字节串中置位
#[inline]
pub fn set(bits: &mut [u8], slot: u64) {
    let (byte, mask) = locate(slot);
    bits[byte] |= mask;
}

#[inline]
fn clear(bits: &mut [u8], slot: u64) {
    let (byte, mask) = locate(slot);
    bits[byte] &= !mask;
}

/// `0..capacity` 中第一个为 0 的位
pub fn first_clear(bits: &[u8], capacity: u64) -> Option<u64> {
    bits.iter()
        .enumerate()
        .find_map(|(index, &byte)| {
            (byte != u8::MAX).then(|| index as u64 * 8 + byte.trailing_ones() as u64)
        })
        .filter(|&slot| slot < capacity)
}
