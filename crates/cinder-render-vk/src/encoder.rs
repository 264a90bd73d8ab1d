// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use cinder_render::{
    ClearValues, CommandEncoder, Extent, FrameError, FrameResult, ImageIndex, MeshId,
    PushConstants,
};

use crate::mesh::VkMesh;
use crate::pipeline::VkPipeline;
use crate::swapchain::VkSwapchain;

/// Records into one command buffer against the current swapchain and pipeline.
pub struct VkEncoder<'a> {
    pub(crate) device: &'a ash::Device,
    pub(crate) cmd: vk::CommandBuffer,
    pub(crate) swapchain: &'a VkSwapchain,
    pub(crate) pipeline: &'a VkPipeline,
    pub(crate) meshes: &'a [VkMesh],
}

fn recording(step: &'static str) -> impl FnOnce(vk::Result) -> FrameError {
    move |e| FrameError::recording(step, format!("{e:?}"))
}

fn full_rect(extent: Extent) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: vk::Extent2D {
            width: extent.width,
            height: extent.height,
        },
    }
}

pub(crate) fn clear_values(clear: &ClearValues) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear.color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: clear.depth,
                stencil: clear.stencil,
            },
        },
    ]
}

impl CommandEncoder for VkEncoder<'_> {
    fn begin(&mut self) -> FrameResult<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe {
            self.device
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
                .map_err(recording("reset_command_buffer"))?;
            self.device
                .begin_command_buffer(self.cmd, &begin)
                .map_err(recording("begin_command_buffer"))
        }
    }

    fn begin_render_pass(&mut self, image: ImageIndex, clear: &ClearValues) -> FrameResult<()> {
        let Some(&framebuffer) = self.swapchain.framebuffers.get(image.as_usize()) else {
            return Err(FrameError::recording(
                "begin_render_pass",
                format!("no framebuffer for image {}", image.0),
            ));
        };
        let clears = clear_values(clear);
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.swapchain.render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent_2d(),
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device
                .cmd_begin_render_pass(self.cmd, &rp_begin, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    fn set_viewport(&mut self, extent: Extent) {
        let vp = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        unsafe {
            self.device
                .cmd_set_viewport(self.cmd, 0, std::slice::from_ref(&vp));
        }
    }

    fn set_scissor(&mut self, extent: Extent) {
        let sc = full_rect(extent);
        unsafe {
            self.device
                .cmd_set_scissor(self.cmd, 0, std::slice::from_ref(&sc));
        }
    }

    fn bind_pipeline(&mut self) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.pipeline,
            );
        }
    }

    fn push_constants(&mut self, push: &PushConstants) {
        unsafe {
            self.device.cmd_push_constants(
                self.cmd,
                self.pipeline.layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                push.as_bytes(),
            );
        }
    }

    fn draw_mesh(&mut self, mesh: MeshId) -> FrameResult<()> {
        let Some(m) = self.meshes.get(mesh.0) else {
            return Err(FrameError::recording(
                "draw_mesh",
                format!("unknown mesh {}", mesh.0),
            ));
        };
        unsafe { m.bind_and_draw(self.cmd) };
        Ok(())
    }

    fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.cmd) };
    }

    fn end(&mut self) -> FrameResult<()> {
        unsafe { self.device.end_command_buffer(self.cmd) }.map_err(recording("end_command_buffer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_set_is_color_then_depth() {
        let clears = clear_values(&ClearValues::with_color([0.0, 0.5, 1.0, 1.0]));
        unsafe {
            assert_eq!(clears[0].color.float32, [0.0, 0.5, 1.0, 1.0]);
            assert_eq!(clears[1].depth_stencil.depth, 1.0);
            assert_eq!(clears[1].depth_stencil.stencil, 0);
        }
    }

    #[test]
    fn scissor_covers_whole_extent() {
        let r = full_rect(Extent::new(800, 600));
        assert_eq!((r.offset.x, r.offset.y), (0, 0));
        assert_eq!((r.extent.width, r.extent.height), (800, 600));
    }
}
