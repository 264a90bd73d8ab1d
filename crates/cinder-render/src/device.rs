// SPDX-License-Identifier: CEPL-1.0
use crate::error::FrameResult;
use crate::scene::{MeshId, PushConstants};
use crate::types::{Acquire, ClearValues, Extent, ImageIndex, PresentStatus, RenderPassKey};

/// A set of presentable images plus the per-slot sync objects, framebuffers
/// and render pass built for them.
///
/// The image count never changes for the lifetime of one instance.
pub trait Swapchain {
    type CommandBuffer;

    fn image_count(&self) -> usize;
    fn extent(&self) -> Extent;
    fn render_pass_key(&self) -> RenderPassKey;

    /// Waits for the next sync slot to retire, then acquires an image.
    ///
    /// When `Ready` is returned the previous submission that used the same
    /// image has completed, so its command buffer may be re-recorded.
    fn acquire_next_image(&mut self) -> FrameResult<Acquire>;

    /// Submits `cmd` for `image` and queues it for presentation.
    fn submit(&mut self, cmd: &Self::CommandBuffer, image: ImageIndex)
        -> FrameResult<PresentStatus>;
}

/// Command-level operations the recorder issues, in the order it issues them.
pub trait CommandEncoder {
    /// Resets the buffer and starts recording.
    fn begin(&mut self) -> FrameResult<()>;
    fn begin_render_pass(&mut self, image: ImageIndex, clear: &ClearValues) -> FrameResult<()>;
    fn set_viewport(&mut self, extent: Extent);
    fn set_scissor(&mut self, extent: Extent);
    fn bind_pipeline(&mut self);
    fn push_constants(&mut self, push: &PushConstants);
    /// Binds the mesh buffers and draws it, indexed when the mesh has indices.
    fn draw_mesh(&mut self, mesh: MeshId) -> FrameResult<()>;
    fn end_render_pass(&mut self);
    fn end(&mut self) -> FrameResult<()>;
}

/// Logical device, queue and command pool, plus the factories for the
/// objects that depend on them.
pub trait RenderDevice {
    type CommandBuffer;
    type Swapchain: Swapchain<CommandBuffer = Self::CommandBuffer>;
    type Pipeline;
    type Encoder<'a>: CommandEncoder
    where
        Self: 'a;

    /// Builds a swapchain for `extent`. `previous` is consumed: its
    /// presentation resources are handed over and it is released once the
    /// new swapchain exists.
    fn create_swapchain(
        &mut self,
        extent: Extent,
        previous: Option<Self::Swapchain>,
    ) -> FrameResult<Self::Swapchain>;

    fn wait_idle(&self) -> FrameResult<()>;

    fn allocate_command_buffers(&mut self, count: usize) -> FrameResult<Vec<Self::CommandBuffer>>;
    fn free_command_buffers(&mut self, buffers: Vec<Self::CommandBuffer>);

    /// Builds the graphics pipeline against the swapchain's render pass.
    fn build_pipeline(&mut self, swapchain: &Self::Swapchain) -> FrameResult<Self::Pipeline>;

    fn encoder<'a>(
        &'a self,
        cmd: &'a Self::CommandBuffer,
        swapchain: &'a Self::Swapchain,
        pipeline: &'a Self::Pipeline,
    ) -> Self::Encoder<'a>;
}
