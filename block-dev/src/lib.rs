//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、镜像文件；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。

#![no_std]

use core::any::Any;

/// 块设备驱动特质
///
/// `buf` 的长度恒为 [`BlockDevice::block_size`]。
pub trait BlockDevice: Send + Sync + Any {
    /// 设备配置的块大小（字节）
    fn block_size(&self) -> usize;

    /// 设备总块数
    fn block_count(&self) -> usize;

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError>;

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("block {0} is out of device range")]
    OutOfRange(usize),
    /// 传输的字节数与块大小不一致
    #[error("incomplete transfer on block {block_id}: {transferred} bytes")]
    ShortTransfer { block_id: usize, transferred: usize },
    #[error("I/O failure on block {0}")]
    Io(usize),
}
