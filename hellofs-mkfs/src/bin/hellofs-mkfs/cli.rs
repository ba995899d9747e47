use std::path::PathBuf;

use clap::Parser;
use hellofs::{DEFAULT_BLOCK_SIZE, DEFAULT_DATA_BLOCK_TABLE_SIZE, DEFAULT_INODE_TABLE_SIZE};

#[derive(Parser)]
#[command(version, about = "Build an empty hellofs volume")]
pub struct Cli {
    /// Device or image file to format
    pub device: PathBuf,

    /// Block size in bytes
    #[arg(long, short, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Number of inode slots
    #[arg(long, short, default_value_t = DEFAULT_INODE_TABLE_SIZE)]
    pub inodes: u64,

    /// Number of data block slots
    #[arg(long, short, default_value_t = DEFAULT_DATA_BLOCK_TABLE_SIZE)]
    pub data_blocks: u64,

    /// Mount the fresh volume and list its root directory
    #[arg(long)]
    pub verify: bool,
}
