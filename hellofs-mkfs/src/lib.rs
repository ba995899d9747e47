//! # 宿主侧格式化工具
//!
//! [`BlockFile`] 把镜像文件或块设备文件当作块设备，
//! [`mkfs`] 在其上构建一个全新的 hellofs 卷。


use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use block_dev::{BlockDevice, BlockError};
use hellofs::layout::SuperBlock;
use hellofs::{FormatError, FormatStage, Geometry, HelloFileSystem, SEED_NAME};

pub struct BlockFile {
    file: Mutex<File>,
    block_size: usize,
    block_count: usize,
}

impl BlockFile {
    /// 以读写方式打开设备；普通文件短于 `min_blocks` 个块时会被扩展
    pub fn open(path: impl AsRef<Path>, block_size: usize, min_blocks: u64) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let required = min_blocks
            .checked_mul(block_size as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "image size overflows"))?;
        let meta = file.metadata()?;
        if meta.is_file() && meta.len() < required {
            log::info!("growing image from {} to {required} bytes", meta.len());
            file.set_len(required)?;
        }

        Self::new(file, block_size)
    }

    pub fn new(mut file: File, block_size: usize) -> io::Result<Self> {
        // 块设备文件的元数据长度为 0，以末尾偏移为准
        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            file: Mutex::new(file),
            block_size,
            block_count: (len / block_size as u64) as usize,
        })
    }

    fn seek_to(&self, file: &mut File, block_id: usize) -> Result<(), BlockError> {
        if block_id >= self.block_count {
            return Err(BlockError::OutOfRange(block_id));
        }
        file.seek(SeekFrom::Start((block_id * self.block_size) as u64))
            .map_err(|e| {
                log::error!("seeking to block {block_id} failed: {e}");
                BlockError::Io(block_id)
            })?;
        Ok(())
    }
}

impl BlockDevice for BlockFile {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let mut file = self.file.lock().map_err(|_| BlockError::Io(block_id))?;
        self.seek_to(&mut file, block_id)?;

        let mut done = 0;
        while done < buf.len() {
            match file.read(&mut buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::error!("reading block {block_id} failed: {e}");
                    return Err(BlockError::Io(block_id));
                }
            }
        }
        complete(block_id, done, buf.len())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        let mut file = self.file.lock().map_err(|_| BlockError::Io(block_id))?;
        self.seek_to(&mut file, block_id)?;

        let mut done = 0;
        while done < buf.len() {
            match file.write(&buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::error!("writing block {block_id} failed: {e}");
                    return Err(BlockError::Io(block_id));
                }
            }
        }
        complete(block_id, done, buf.len())
    }
}

#[inline]
fn complete(block_id: usize, transferred: usize, expected: usize) -> Result<(), BlockError> {
    if transferred == expected {
        Ok(())
    } else {
        Err(BlockError::ShortTransfer {
            block_id,
            transferred,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MkfsError {
    #[error("cannot open device: {0}")]
    Open(#[from] io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("verification failed: {0}")]
    Verify(hellofs::Error),
}

impl MkfsError {
    /// 进程退出码，按失败的阶段区分
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Open(_) => 1,
            Self::Format(e) => match e.stage {
                FormatStage::SuperBlock => 2,
                FormatStage::Bitmap => 3,
                FormatStage::Inode => 4,
                FormatStage::DirectoryBlock => 5,
                FormatStage::FileBlock => 6,
                FormatStage::Geometry => 7,
            },
            Self::Verify(_) => 8,
        }
    }
}

/// 格式化 `path` 处的设备，`verify` 时重新挂载并检查根目录
pub fn mkfs(path: &Path, geometry: &Geometry, verify: bool) -> Result<SuperBlock, MkfsError> {
    // 几何参数非法或镜像字节数溢出时不扩展镜像
    let super_block = geometry.super_block();
    super_block
        .check_geometry()
        .and_then(|()| {
            super_block
                .total_blocks()
                .checked_mul(super_block.block_size)
                .ok_or(hellofs::Error::InvalidGeometry)
        })
        .map_err(|source| FormatError {
            stage: FormatStage::Geometry,
            source,
        })?;

    let device: Arc<dyn BlockDevice> = Arc::new(BlockFile::open(
        path,
        geometry.block_size,
        geometry.total_blocks(),
    )?);
    let super_block = hellofs::format(device.clone(), geometry)?;
    log::info!("{} formatted", path.display());

    if verify {
        self::verify(device).map_err(MkfsError::Verify)?;
    }
    Ok(super_block)
}

fn verify(device: Arc<dyn BlockDevice>) -> hellofs::Result<()> {
    let fs = HelloFileSystem::mount(device)?;
    let root = fs.root()?;
    for entry in fs.list(&root)? {
        log::info!("{:>6}  {}", entry.inode, entry.name);
    }
    fs.lookup(&root, SEED_NAME).map(|_| ())
}
