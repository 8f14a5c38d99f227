use std::env::set_var;

use anyhow::{anyhow, Result};
use clap::{arg, command, ArgAction};
use log::*;

use trunkd::allocator::Allocator;
use trunkd::binlog::Binlog;
use trunkd::codec;
use trunkd::config::Config;
use trunkd::paths::StorePaths;
use trunkd::slot::SlotTable;
use trunkd::stat::stat as resolve_stat;
use trunkd::trunk::TrunkFileManager;

use trunk_io::file::FileTrunkIo;

fn init_logs() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn build_allocator(cfg: &Config) -> Result<(Allocator, Binlog)> {
    let store_paths = StorePaths::new(cfg.store_paths.clone());
    for i in 0..store_paths.count() {
        store_paths.set_free_mb(i, cfg.storage_reserved_mb + cfg.avg_storage_reserved_mb + 1);
    }

    let slots = SlotTable::new(cfg.slot_min_size, cfg.trunk_file_size);
    let binlog = Binlog::open(&cfg.binlog_path)?;

    let replayed = Binlog::replay(&cfg.binlog_path, |entry| slots.apply_replay(&entry))?;
    info!("recovered {} binlog entries from {}", replayed, cfg.binlog_path.display());

    let trunks = TrunkFileManager::new(store_paths, cfg);
    Ok((Allocator::new(slots, trunks), binlog))
}

fn main() -> Result<()> {
    let matches = command!()
        .arg(arg!(-c --config <FILE> "Path to the TOML config file").default_value("trunkd.toml"))
        .arg(arg!(-v --verbose "Print more debug information, or set `RUST_LOG=debug`").action(ArgAction::SetTrue))
        .subcommand(
            clap::Command::new("alloc")
                .about("Reserve and immediately confirm a region of the given size")
                .arg(arg!(<size> "Size in bytes to allocate").value_parser(clap::value_parser!(u32))),
        )
        .subcommand(
            clap::Command::new("stat")
                .about("Resolve a true filename (including its HH/LL/ sub-path prefix) to its stat record")
                .arg(arg!(<store_path_index> "Index into the configured store_paths").value_parser(clap::value_parser!(u16)))
                .arg(arg!(<true_filename> "True filename, e.g. 9e/37/<encoded-name>")),
        )
        .subcommand(clap::Command::new("replay-binlog").about("Replay the binlog and print the resulting slot counts"))
        .get_matches();

    if matches.get_flag("verbose") {
        set_var("RUST_LOG", "debug");
    }
    init_logs();

    let config_path = matches.get_one::<String>("config").unwrap();
    let cfg = Config::load(config_path)?;

    match matches.subcommand() {
        Some(("alloc", sub)) => {
            let size = *sub.get_one::<u32>("size").unwrap();
            let (alloc, binlog) = build_allocator(&cfg)?;
            let extent = alloc.alloc::<FileTrunkIo>(size, &binlog)?;
            println!(
                "reserved trunk {} offset {} size {} (store_path_index={}, sub_path={:02x}/{:02x})",
                extent.file.id, extent.file.offset, extent.file.size,
                extent.path.store_path_index, extent.path.sub_path_high, extent.path.sub_path_low,
            );
            alloc.confirm(&extent, true, &binlog)?;
            Ok(())
        }
        Some(("stat", sub)) => {
            let store_path_index = *sub.get_one::<u16>("store_path_index").unwrap();
            let true_filename = sub.get_one::<String>("true_filename").unwrap();

            let store_paths = StorePaths::new(cfg.store_paths.clone());
            let trunks = TrunkFileManager::new(store_paths, &cfg);
            let (info, resolved) = resolve_stat::<FileTrunkIo>(&trunks, store_path_index, true_filename)?;
            match resolved {
                trunkd::stat::Resolved::Standalone => {
                    println!("standalone file, size={} mtime={}", info.size, info.mtime);
                }
                trunkd::stat::Resolved::Trunk { path, file } => {
                    println!(
                        "trunked file in trunk {} offset {} size {} (store_path_index={}), mtime={}",
                        file.id, file.offset, info.size, path.store_path_index, info.mtime,
                    );
                }
            }
            Ok(())
        }
        Some(("replay-binlog", _)) => {
            let (alloc, _binlog) = build_allocator(&cfg)?;
            for i in 0..alloc.slots().slot_count() {
                let class = alloc.slots().class_size(i);
                debug!("slot[{}] class_size={}", i, class);
            }
            println!("slot table rebuilt with {} classes", alloc.slots().slot_count());
            Ok(())
        }
        _ => Err(anyhow!("no subcommand given; try `alloc`, `stat`, or `replay-binlog`")),
    }
}

/// Derives the on-disk true filename's sub-path hex prefix for a trunk id,
/// the inverse of what the `stat` subcommand expects as input.
#[allow(dead_code)]
fn sub_path_hex(id: u32) -> (String, String) {
    let (high, low) = codec::sub_path_for_id(id);
    (format!("{:02x}", high), format!("{:02x}", low))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_path_hex_is_lowercase_two_digit() {
        let (high, low) = sub_path_hex(42);
        assert_eq!(high.len(), 2);
        assert_eq!(low.len(), 2);
    }
}
