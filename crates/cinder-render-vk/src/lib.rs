// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend for `cinder-render`: device context, swapchain, pipeline,
//! meshes and the command encoder.
#![deny(unsafe_op_in_unsafe_fn)]

use std::path::PathBuf;
use std::time::Duration;

mod context;
mod device;
mod encoder;
mod mesh;
mod pipeline;
mod result;
mod swapchain;

pub use context::VkContext;
pub use device::VkRenderDevice;
pub use encoder::VkEncoder;
pub use mesh::{Vertex, VkMesh};
pub use pipeline::{ShaderCode, VkPipeline};
pub use swapchain::{SwapchainSettings, VkSwapchain};

/// Present mode request. Mailbox falls back to FIFO when unsupported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VkVsyncMode {
    #[default]
    Fifo,
    Mailbox,
}

#[derive(Clone, Debug)]
pub struct VkConfig {
    pub present: VkVsyncMode,
    /// Where `simple.vert.spv` / `simple.frag.spv` are read from when the
    /// shaders are not built in.
    pub shader_dir: PathBuf,
    pub acquire_timeout: Duration,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            present: VkVsyncMode::Fifo,
            shader_dir: PathBuf::from("shaders"),
            acquire_timeout: Duration::from_secs(1),
        }
    }
}
