// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ghost Frames CLI entry point.
//!
//! ```bash
//! # Fully configured
//! ghostframe --name alice --iface wlan0mon
//!
//! # Config file supplies defaults, flags still override it
//! ghostframe --config ghostframe.json
//!
//! # Everything prompted interactively
//! ghostframe
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ghostframe::config::{Args, Settings};
use ghostframe::messenger::{resolve_own_mac, Messenger};
use ghostframe::transceiver;
use ghostframe::{cli, logging};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::resolve(&args).context("loading configuration")?;
    logging::init(settings.debug);

    let (name, iface) =
        cli::prompt_missing_settings(settings.name, settings.iface).context("prompting for startup settings")?;

    info!(name, iface, "starting ghostframe");

    let our_mac = resolve_own_mac(&iface);
    let (sender, receiver) = transceiver::open_datalink(&iface).context("opening monitor-mode interface")?;

    let reassembly_dir = std::env::current_dir().context("resolving working directory")?;
    let messenger = Messenger::start(
        name.clone(),
        our_mac,
        Arc::new(sender),
        Box::new(receiver),
        reassembly_dir,
    );

    cli::run(&messenger, &name);
    messenger.shutdown();
    Ok(())
}
