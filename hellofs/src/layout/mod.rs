//! # 磁盘数据结构层
//!
//! hellofs 的磁盘布局：
//! 超级块 | 索引节点位图 | 数据块位图 | 索引节点表 | 数据块区域
//!
//! 所有位置都由超级块中记录的块大小与两张表的容量算出，
//! 格式化与挂载后的驱动共用同一套计算。

mod super_block;
pub use super_block::SuperBlock;

pub(crate) mod bitmap;

mod inode;
pub use inode::{DiskInode, FileType, Inode, InodeKind, Mode, Permission};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_record;
pub use dir_record::{DirRecord, NAME_MAX_LEN, check_name};
