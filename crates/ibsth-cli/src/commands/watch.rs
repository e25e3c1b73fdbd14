//! Watch command implementation.
//!
//! Subscribes to realtime readings and prints each one as it arrives. New
//! sensors are silent for the first few seconds while their address is
//! resolved.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ibsth_core::store::ADDRESS_CACHE_NAME;
use ibsth_core::{BtleRadio, IdentityCache, JsonFileStore, ScanSession, SessionOptions};
use tokio::sync::mpsc;

use crate::cli::OutputFormat;
use crate::format::format_reading;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub cache_dir: PathBuf,
    pub count: u32,
    pub format: OutputFormat,
    pub options: SessionOptions,
    pub quiet: bool,
}

pub async fn cmd_watch(args: WatchArgs) -> Result<()> {
    let WatchArgs {
        cache_dir,
        count,
        format,
        options,
        quiet,
    } = args;

    let radio = BtleRadio::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    let store = JsonFileStore::new(&cache_dir);
    let cache = IdentityCache::open_shared(Arc::new(store), ADDRESS_CACHE_NAME)
        .with_context(|| format!("Failed to open address cache in {}", cache_dir.display()))?;
    let session = ScanSession::with_options(Arc::new(radio), cache, options);

    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe(move |reading| {
            // Receiver gone means we are shutting down.
            let _ = tx.send(reading);
        })
        .await
        .context("Failed to start scanning")?;

    if !quiet {
        if count > 0 {
            eprintln!("Watching for IBS-TH sensors | Count: {} | Press Ctrl+C to stop", count);
        } else {
            eprintln!("Watching for IBS-TH sensors | Press Ctrl+C to stop");
        }
    }

    let mut received: u32 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            reading = rx.recv() => match reading {
                Some(reading) => {
                    println!("{}", format_reading(&reading, format)?);
                    received += 1;
                    if count > 0 && received >= count {
                        if !quiet {
                            eprintln!("Completed {} readings.", received);
                        }
                        break;
                    }
                }
                None => {
                    tracing::warn!("Scan ended unexpectedly");
                    break;
                }
            }
        }
    }

    session
        .unsubscribe()
        .await
        .context("Failed to stop scanning")?;
    Ok(())
}
