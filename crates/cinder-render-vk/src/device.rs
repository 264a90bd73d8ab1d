// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use cinder_render::{Extent, FrameResult, MeshId, RenderDevice};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use crate::context::VkContext;
use crate::encoder::VkEncoder;
use crate::mesh::{Vertex, VkMesh};
use crate::pipeline::{ShaderCode, VkPipeline};
use crate::result::VkResultExt;
use crate::swapchain::{SwapchainSettings, VkSwapchain};
use crate::VkConfig;

/// Vulkan implementation of [`RenderDevice`], plus the meshes drawn with it.
pub struct VkRenderDevice {
    meshes: Vec<VkMesh>,
    shaders: ShaderCode,
    settings: SwapchainSettings,
    ctx: Arc<VkContext>,
}

impl VkRenderDevice {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &VkConfig,
    ) -> Result<Self> {
        #[cfg(feature = "builtin-shaders")]
        let shaders = ShaderCode::builtin()?;
        #[cfg(not(feature = "builtin-shaders"))]
        let shaders = ShaderCode::from_dir(&cfg.shader_dir)?;

        let ctx = Arc::new(VkContext::new(window, display)?);
        let settings = SwapchainSettings {
            present: cfg.present,
            acquire_timeout: u64::try_from(cfg.acquire_timeout.as_nanos()).unwrap_or(u64::MAX),
        };
        info!("Vulkan renderer ready ({:?})", cfg.present);

        Ok(VkRenderDevice {
            meshes: Vec::new(),
            shaders,
            settings,
            ctx,
        })
    }

    /// Uploads a mesh; an empty `indices` slice draws it non-indexed.
    pub fn upload_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> Result<MeshId> {
        let mesh = VkMesh::new(self.ctx.clone(), vertices, indices)?;
        let id = MeshId(self.meshes.len());
        debug!(
            "mesh {} uploaded ({} vertices, indexed: {})",
            id.0,
            vertices.len(),
            mesh.is_indexed()
        );
        self.meshes.push(mesh);
        Ok(id)
    }
}

impl RenderDevice for VkRenderDevice {
    type CommandBuffer = vk::CommandBuffer;
    type Swapchain = VkSwapchain;
    type Pipeline = VkPipeline;
    type Encoder<'a> = VkEncoder<'a> where Self: 'a;

    fn create_swapchain(
        &mut self,
        extent: Extent,
        previous: Option<VkSwapchain>,
    ) -> FrameResult<VkSwapchain> {
        VkSwapchain::new(self.ctx.clone(), self.settings, extent, previous)
    }

    fn wait_idle(&self) -> FrameResult<()> {
        unsafe { self.ctx.device.device_wait_idle() }.frame("device_wait_idle")
    }

    fn allocate_command_buffers(&mut self, count: usize) -> FrameResult<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.ctx.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        unsafe { self.ctx.device.allocate_command_buffers(&info) }.frame("allocate_command_buffers")
    }

    fn free_command_buffers(&mut self, buffers: Vec<vk::CommandBuffer>) {
        if buffers.is_empty() {
            return;
        }
        unsafe {
            self.ctx
                .device
                .free_command_buffers(self.ctx.cmd_pool, &buffers)
        };
    }

    fn build_pipeline(&mut self, swapchain: &VkSwapchain) -> FrameResult<VkPipeline> {
        VkPipeline::new(self.ctx.clone(), &self.shaders, swapchain.render_pass)
    }

    fn encoder<'a>(
        &'a self,
        cmd: &'a vk::CommandBuffer,
        swapchain: &'a VkSwapchain,
        pipeline: &'a VkPipeline,
    ) -> VkEncoder<'a> {
        VkEncoder {
            device: &self.ctx.device,
            cmd: *cmd,
            swapchain,
            pipeline,
            meshes: &self.meshes,
        }
    }
}

impl Drop for VkRenderDevice {
    fn drop(&mut self) {
        // Mesh buffers may still be referenced by queued work.
        unsafe { self.ctx.device.device_wait_idle().ok() };
    }
}
