//! kwm: a minimal floating window manager for X11

mod config;
mod wm;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::wm::display::X11Display;
use crate::wm::spawn;
use crate::wm::WindowManager;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "kwm=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kwm");

    let mut config = Config::load().context("Failed to load configuration")?;
    config.scale = config.effective_scale();

    if let Err(e) = spawn::ignore_child_exits() {
        warn!("Failed to ignore SIGCHLD, exited children may linger: {}", e);
    }

    let display = X11Display::connect().context("Failed to connect to X server")?;
    display
        .become_wm()
        .context("Failed to take over window management")?;

    let mut wm = WindowManager::new(display, &config);
    wm.start().context("Failed to adopt existing windows")?;
    wm.run().context("Event loop terminated")?;

    info!("kwm exiting");
    Ok(())
}
