mod common;

use hellofs::layout::{FileType, Permission};
use hellofs::{Error, Geometry, HelloFileSystem, SEED_CONTENT};

use common::{formatted, small_geometry};

#[test]
fn read_clamps_to_file_size() {
    let (_disk, fs) = formatted(&Geometry::default());
    let seed = fs.inode(1).unwrap();
    let size = SEED_CONTENT.len();

    let mut buf = [0u8; 10];
    assert_eq!(fs.read_at(&seed, size, &mut buf), Ok(0));
    assert_eq!(fs.read_at(&seed, size + 100, &mut buf), Ok(0));
    assert_eq!(fs.read_at(&seed, size - 1, &mut buf), Ok(1));
    assert_eq!(buf[0], b'\n');

    let n = fs.read_at(&seed, 8, &mut buf).unwrap();
    assert_eq!(n, 10);
    assert_eq!(&buf, &SEED_CONTENT[8..18]);
}

#[test]
fn write_extends_and_persists() {
    let (disk, fs) = formatted(&small_geometry());
    let mut root = fs.root().unwrap();
    let mut file = fs
        .create(&mut root, "log", Permission::UserRead | Permission::UserWrite)
        .unwrap();

    assert_eq!(fs.write_at(&mut file, 0, b"hello"), Ok(5));
    assert_eq!(file.file_size(), Some(5));
    assert_eq!(fs.write_at(&mut file, 10, b"world"), Ok(5));
    assert_eq!(file.file_size(), Some(15));
    drop(fs);

    let fs = HelloFileSystem::mount(disk).unwrap();
    let root = fs.root().unwrap();
    let file = fs.inode(fs.lookup(&root, "log").unwrap()).unwrap();
    assert_eq!(file.file_size(), Some(15));

    let mut buf = [0xffu8; 32];
    assert_eq!(fs.read_at(&file, 0, &mut buf), Ok(15));
    assert_eq!(&buf[..15], b"hello\0\0\0\0\0world");
}

#[test]
fn overwrite_keeps_size() {
    let (_disk, fs) = formatted(&Geometry::default());
    let mut seed = fs.inode(1).unwrap();

    assert_eq!(fs.write_at(&mut seed, 0, b"W"), Ok(1));
    assert_eq!(seed.file_size(), Some(SEED_CONTENT.len() as u64));

    let mut buf = [0u8; 32];
    let n = fs.read_at(&seed, 0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"Welcome Hellofs!!\n");
}

#[test]
fn write_past_block_end_is_rejected() {
    let (disk, fs) = formatted(&small_geometry());
    let mut seed = fs.inode(1).unwrap();
    let block = seed.data_block as usize;
    let before = disk.raw(block);

    assert_eq!(
        fs.write_at(&mut seed, 1020, b"overflow"),
        Err(Error::WriteOutOfRange)
    );
    assert_eq!(
        fs.write_at(&mut seed, usize::MAX, b"x"),
        Err(Error::WriteOutOfRange)
    );
    assert_eq!(disk.raw(block), before);
    assert_eq!(seed.file_size(), Some(SEED_CONTENT.len() as u64));

    // 恰好写满整个块
    assert_eq!(fs.write_at(&mut seed, 1016, b"12345678"), Ok(8));
    assert_eq!(seed.file_size(), Some(1024));
}

#[test]
fn empty_write_changes_nothing() {
    let (_disk, fs) = formatted(&small_geometry());
    let mut seed = fs.inode(1).unwrap();

    assert_eq!(fs.write_at(&mut seed, 100, &[]), Ok(0));
    assert_eq!(fs.inode(1).unwrap().file_size(), Some(SEED_CONTENT.len() as u64));
}

#[test]
fn directories_reject_data_access() {
    let (_disk, fs) = formatted(&small_geometry());
    let mut root = fs.root().unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(fs.read_at(&root, 0, &mut buf), Err(Error::IsADirectory));
    assert_eq!(fs.write_at(&mut root, 0, b"x"), Err(Error::IsADirectory));
    assert_eq!(Error::IsADirectory.errno(), 21);
}

#[test]
fn stale_handle_sees_latest_size() {
    let (_disk, fs) = formatted(&small_geometry());
    let mut writer = fs.inode(1).unwrap();
    let reader = fs.inode(1).unwrap();

    fs.write_at(&mut writer, 18, b" and more").unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(fs.read_at(&reader, 0, &mut buf), Ok(27));
    assert_eq!(&buf[18..27], b" and more");
}

#[test]
fn stat_reports_kind_and_size() {
    let (_disk, fs) = formatted(&Geometry::default());

    let seed = fs.stat(&fs.inode(1).unwrap());
    assert_eq!(seed.inode, 1);
    assert_eq!(seed.mode.ty, FileType::Regular);
    assert_eq!(seed.mode.raw(), 0o100664);
    assert_eq!(seed.size, 18);
    assert_eq!(seed.block_size, 4096);
    assert_eq!(seed.blocks, 1);

    let root = fs.stat(&fs.root().unwrap());
    assert_eq!(root.mode.raw(), 0o040755);
    assert_eq!(root.size, 264);
}
