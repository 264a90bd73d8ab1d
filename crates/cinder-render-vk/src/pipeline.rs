// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::util::read_spv;
use ash::vk;
use cinder_render::{FrameError, FrameResult, PushConstants};
use tracing::debug;

use crate::context::VkContext;
use crate::mesh::Vertex;
use crate::result::VkResultExt;

/// SPIR-V words for the two stages, loaded once at startup.
pub struct ShaderCode {
    vert: Vec<u32>,
    frag: Vec<u32>,
}

impl ShaderCode {
    /// Reads `simple.vert.spv` and `simple.frag.spv` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let load = |name: &str| -> Result<Vec<u32>> {
            let path = dir.join(name);
            let bytes =
                std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            read_spv(&mut Cursor::new(&bytes[..]))
                .with_context(|| format!("parse SPIR-V {}", path.display()))
        };
        Ok(ShaderCode {
            vert: load("simple.vert.spv")?,
            frag: load("simple.frag.spv")?,
        })
    }

    /// The shaders compiled into the binary by the build script.
    #[cfg(feature = "builtin-shaders")]
    pub fn builtin() -> Result<Self> {
        let vs_bytes = include_bytes!(concat!(env!("OUT_DIR"), "/simple.vert.spv"));
        let fs_bytes = include_bytes!(concat!(env!("OUT_DIR"), "/simple.frag.spv"));
        Ok(ShaderCode {
            vert: read_spv(&mut Cursor::new(&vs_bytes[..]))?,
            frag: read_spv(&mut Cursor::new(&fs_bytes[..]))?,
        })
    }
}

/// Graphics pipeline built against one render pass.
pub struct VkPipeline {
    ctx: Arc<VkContext>,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) pipeline: vk::Pipeline,
}

impl Drop for VkPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

pub(crate) fn vertex_bindings() -> (
    vk::VertexInputBindingDescription,
    [vk::VertexInputAttributeDescription; 2],
) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    };
    let attributes = [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: std::mem::offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: std::mem::offset_of!(Vertex, color) as u32,
        },
    ];
    (binding, attributes)
}

unsafe fn create_module(d: &ash::Device, code: &[u32]) -> FrameResult<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    unsafe { d.create_shader_module(&info, None) }.frame("create_shader_module")
}

impl VkPipeline {
    pub(crate) fn new(
        ctx: Arc<VkContext>,
        shaders: &ShaderCode,
        render_pass: vk::RenderPass,
    ) -> FrameResult<Self> {
        let d = &ctx.device;

        let push_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: PushConstants::SIZE,
        };
        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            push_constant_range_count: 1,
            p_push_constant_ranges: &push_range,
            ..Default::default()
        };
        let layout = unsafe { d.create_pipeline_layout(&layout_info, None) }
            .frame("create_pipeline_layout")?;

        // Owns the layout from here on, so early returns release it.
        let mut out = VkPipeline {
            ctx: ctx.clone(),
            layout,
            pipeline: vk::Pipeline::null(),
        };

        let vs = unsafe { create_module(d, &shaders.vert) }?;
        let fs = match unsafe { create_module(d, &shaders.frag) } {
            Ok(m) => m,
            Err(e) => {
                unsafe { d.destroy_shader_module(vs, None) };
                return Err(e);
            }
        };
        let built = unsafe { create_pipeline(d, vs, fs, layout, render_pass) };
        unsafe {
            d.destroy_shader_module(vs, None);
            d.destroy_shader_module(fs, None);
        }
        out.pipeline = built?;
        debug!("graphics pipeline built");
        Ok(out)
    }
}

unsafe fn create_pipeline(
    d: &ash::Device,
    vs: vk::ShaderModule,
    fs: vk::ShaderModule,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> FrameResult<vk::Pipeline> {
    let entry = c"main";
    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    let (vb, va) = vertex_bindings();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        vertex_binding_description_count: 1,
        p_vertex_binding_descriptions: &vb,
        vertex_attribute_description_count: va.len() as u32,
        p_vertex_attribute_descriptions: va.as_ptr(),
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        ..Default::default()
    };

    // Viewport and scissor are set per frame.
    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        scissor_count: 1,
        ..Default::default()
    };

    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::NONE,
        front_face: vk::FrontFace::CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: vk::TRUE,
        depth_write_enable: vk::TRUE,
        depth_compare_op: vk::CompareOp::LESS,
        ..Default::default()
    };
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: 0,
        ..Default::default()
    };

    match unsafe {
        d.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&info), None)
    } {
        Ok(p) => p.into_iter().next().ok_or_else(|| {
            FrameError::fatal("create_graphics_pipelines", "no pipeline returned")
        }),
        Err((_, err)) => Err(crate::result::frame_error("create_graphics_pipelines", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        let (binding, attrs) = vertex_bindings();
        assert_eq!(binding.stride, 20);
        assert_eq!((attrs[0].location, attrs[0].offset), (0, 0));
        assert_eq!((attrs[1].location, attrs[1].offset), (1, 8));
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn missing_shader_dir_is_reported() {
        let err = ShaderCode::from_dir(Path::new("/nonexistent/cinder-shaders"))
            .err()
            .expect("directory does not exist");
        assert!(err.to_string().contains("simple.vert.spv"));
    }

    #[cfg(feature = "builtin-shaders")]
    #[test]
    fn builtin_shaders_are_embedded() {
        let code = ShaderCode::builtin().unwrap();
        for words in [&code.vert, &code.frag] {
            assert!(!words.is_empty());
            assert_eq!(words[0], 0x0723_0203);
        }
    }
}
