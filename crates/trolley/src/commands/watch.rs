//! Watch command - keeps the coordinator alive so timers fire.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::sync::mpsc;
use tracing::info;

use super::{Context, print_view};

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long = "for", value_name = "SECS")]
    pub duration: Option<u64>,
}

/// Run the watch command.
pub async fn run(args: WatchArgs, ctx: &Context) -> Result<()> {
    let coordinator = ctx.coordinator()?;
    if !ctx.json_output {
        print_view(&coordinator.view(), ctx)?;
    }

    let (commands, receiver) = mpsc::channel(16);
    let driver = tokio::spawn(coordinator.run(receiver));

    match args.duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            info!("Watching for expirations, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    drop(commands);
    let coordinator = driver.await?;
    print_view(&coordinator.view(), ctx)
}
