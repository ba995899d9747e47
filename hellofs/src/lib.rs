#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* hellofs 的整体架构，自上而下 */

// 索引节点层：创建、查找、列目录、读写文件
mod vfs;
pub use vfs::{DirEntry, Stat};

// 格式化：构建一个全新的卷
mod format;
pub use format::{FormatError, FormatStage, Geometry, SEED_CONTENT, SEED_NAME, format};

// 磁盘块管理器层：挂载卷、分配 inode 与数据块
mod hfs;
pub use hfs::HelloFileSystem;

// inode 表：定位、载入、写回 inode
mod inode_table;
pub use inode_table::InodeTable;

// 目录项存储
mod directory;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
pub mod layout;

// 块缓存层：内存上的磁盘块数据缓存
mod block_cache;

mod error;
pub use error::{Error, Result, Table};

pub use block_dev::{BlockDevice, BlockError};

pub const VERSION: u64 = 1;
pub const MAGIC: u64 = 0x2016_0105;
pub const DEFAULT_BLOCK_SIZE: usize = 4096;
pub const DEFAULT_INODE_TABLE_SIZE: u64 = 1024;
pub const DEFAULT_DATA_BLOCK_TABLE_SIZE: u64 = 1024;

pub const SUPER_BLOCK_ID: usize = 0;
pub const INODE_BITMAP_BLOCK_ID: usize = 1;
pub const DATA_BITMAP_BLOCK_ID: usize = 2;
pub const INODE_TABLE_START_BLOCK_ID: usize = 3;

/// 根目录的 inode 编号
pub const ROOT_INODE: InodeId = 0;

/// inode 编号
pub type InodeId = u64;
/// 绝对块号，从设备起始处计
pub type BlockId = u64;
