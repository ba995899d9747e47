mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use hellofs::Geometry;
use hellofs_mkfs::mkfs;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let geometry = Geometry {
        block_size: cli.block_size,
        inode_table_size: cli.inodes,
        data_block_table_size: cli.data_blocks,
    };
    log::debug!("device={:?} geometry={geometry:?}", cli.device);

    match mkfs(&cli.device, &geometry, cli.verify) {
        Ok(sb) => {
            println!(
                "hellofs: {} blocks of {} bytes, {} inodes, {} data blocks",
                sb.total_blocks(),
                sb.block_size,
                sb.inode_table_size,
                sb.data_block_table_size
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("hellofs-mkfs: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
