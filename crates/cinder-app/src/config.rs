// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cinder_platform::WindowDesc;
use cinder_render::ClearValues;
use cinder_render_vk::{VkConfig, VkVsyncMode};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    #[default]
    Fifo,
    Mailbox,
}

impl From<VsyncMode> for VkVsyncMode {
    fn from(m: VsyncMode) -> Self {
        match m {
            VsyncMode::Fifo => VkVsyncMode::Fifo,
            VsyncMode::Mailbox => VkVsyncMode::Mailbox,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let d = WindowDesc::default();
        WindowCfg {
            title: d.title,
            width: d.width,
            height: d.height,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync_mode: VsyncMode,
    pub shader_dir: PathBuf,
    pub acquire_timeout_ms: u64,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let vk = VkConfig::default();
        RenderCfg {
            clear_color: ClearValues::default().color,
            vsync_mode: VsyncMode::Fifo,
            shader_dir: vk.shader_dir,
            acquire_timeout_ms: vk.acquire_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reads `path`. A missing file gives the defaults; so does a file that
    /// fails to read or parse, with a warning.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return AppCfg::default();
            }
            Err(e) => {
                warn!("cannot read {}: {e}; using defaults", path.display());
                return AppCfg::default();
            }
        };
        match Self::parse(&text) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("invalid config {}: {e}; using defaults", path.display());
                AppCfg::default()
            }
        }
    }

    pub fn window_desc(&self) -> WindowDesc {
        WindowDesc {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
    }

    pub fn vk_config(&self) -> VkConfig {
        VkConfig {
            present: self.render.vsync_mode.into(),
            shader_dir: self.render.shader_dir.clone(),
            acquire_timeout: Duration::from_millis(self.render.acquire_timeout_ms),
        }
    }

    pub fn clear_values(&self) -> ClearValues {
        ClearValues::with_color(self.render.clear_color)
    }
}
