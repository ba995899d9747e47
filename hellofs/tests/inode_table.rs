mod common;

use hellofs::layout::{Inode, InodeKind, Mode};
use hellofs::{Error, Geometry};

use common::{formatted, small_geometry};

#[test]
fn locate_follows_geometry() {
    let (_disk, fs) = formatted(&Geometry::default());
    let table = fs.inode_table();

    assert_eq!(table.capacity(), 1024);
    assert_eq!(table.locate(0), (3, 0));
    assert_eq!(table.locate(129), (4, 32));
    assert_eq!(table.locate(1023), (10, 4064));
}

#[test]
fn store_then_load() {
    let (disk, fs) = formatted(&small_geometry());
    let id = fs.alloc_inode().unwrap();
    let block = fs.alloc_data().unwrap();

    let inode = Inode {
        kind: InodeKind::File { size: 77 },
        ..Inode::new(id, Mode::file_default(), block)
    };
    fs.store_inode(&inode).unwrap();
    assert_eq!(fs.inode(id).unwrap(), inode);

    // 存储是同步的，设备上已是最新内容
    let (block_id, offset) = fs.inode_table().locate(id);
    let raw = disk.raw(block_id);
    assert_eq!(&raw[offset + 24..offset + 32], &77u64.to_ne_bytes());
}

#[test]
fn neighbours_untouched() {
    let (_disk, fs) = formatted(&small_geometry());
    let root = fs.root().unwrap();
    let seed = fs.inode(1).unwrap();

    let id = fs.alloc_inode().unwrap();
    fs.store_inode(&Inode::new(id, Mode::dir_default(), 9)).unwrap();

    assert_eq!(fs.root().unwrap(), root);
    assert_eq!(fs.inode(1).unwrap(), seed);
}

#[test]
fn rejects_out_of_table_numbers() {
    let (_disk, fs) = formatted(&small_geometry());
    assert_eq!(fs.inode(16), Err(Error::InvalidInode(16)));
    assert_eq!(
        fs.store_inode(&Inode::new(16, Mode::file_default(), 4)),
        Err(Error::InvalidInode(16))
    );
    // 表内但未分配
    assert_eq!(fs.inode(5), Err(Error::NotFound));
}
