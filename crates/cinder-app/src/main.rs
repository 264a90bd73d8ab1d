// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cinder_core::init_tracing;
use cinder_platform::Platform;
use cinder_render::FrameOrchestrator;
use cinder_render_vk::VkRenderDevice;
use tracing::info;

mod config;
mod scene;

use config::{AppCfg, VsyncMode};
use scene::DemoScene;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, default_value = "cinder.toml")]
    config: PathBuf,

    /// Stop after this many presented frames
    #[arg(long)]
    frames: Option<u64>,

    /// Override the configured present mode
    #[arg(long, value_enum)]
    vsync: Option<VsyncMode>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = AppCfg::load(&args.config);
    if let Some(mode) = args.vsync {
        cfg.render.vsync_mode = mode;
    }

    let mut platform = Platform::new(&cfg.window_desc()).context("open window")?;
    let window = platform.window();
    let mut device = VkRenderDevice::new(window, window, &cfg.vk_config())
        .context("initialise Vulkan")?;
    let mesh = device
        .upload_mesh(&scene::triangle(), &[])
        .context("upload triangle")?;

    let mut frames = FrameOrchestrator::new(device, cfg.clear_values());
    let mut demo = DemoScene { mesh };

    let presented = frames.run(&mut platform, &mut demo, args.frames)?;
    info!(
        presented,
        recreations = frames.recreations(),
        "shutting down"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let args = Args::parse_from(["cinder-app"]);
        assert_eq!(args.config, PathBuf::from("cinder.toml"));
        assert_eq!(args.frames, None);
        assert_eq!(args.vsync, None);
    }

    #[test]
    fn cli_overrides() {
        let args = Args::parse_from(["cinder-app", "--frames", "120", "--vsync", "mailbox"]);
        assert_eq!(args.frames, Some(120));
        assert_eq!(args.vsync, Some(VsyncMode::Mailbox));
    }
}
