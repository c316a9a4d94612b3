//! Show or reset stored import offsets.

use clap::Parser;
use csvingest::ingest::{offset_key, OffsetStore};
use csvingest::{logging, Config};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "offsets")]
#[command(about = "Print the offset map, or reset one file so it is imported from the start")]
struct Args {
    /// Reset the offset for this file to 0
    #[arg(long)]
    reset: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init_stderr();

    let args = Args::parse();
    let config = Config::load()?;
    let store = OffsetStore::new(config.offsets_path());
    let mut offsets = store.read();

    if let Some(file) = args.reset {
        let key = offset_key(&file);
        let previous = offsets.insert(key.clone(), 0);
        store.write(&offsets)?;
        log::info!("Reset {} (was {})", key, previous.unwrap_or(0));
        return Ok(());
    }

    if offsets.is_empty() {
        println!("No offsets stored in {}", store.path().display());
        return Ok(());
    }

    for (path, offset) in &offsets {
        println!("{}\t{}", offset, path);
    }
    Ok(())
}
