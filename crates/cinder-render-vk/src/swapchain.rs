// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use cinder_render::{
    Acquire, AcquiredImage, Extent, FrameError, FrameIndex, FrameResult, ImageIndex,
    PresentStatus, RenderPassKey, Swapchain,
};
use tracing::{debug, info};

use crate::context::VkContext;
use crate::result::{frame_error, VkResultExt};
use crate::VkVsyncMode;

/// What the swapchain needs from configuration.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainSettings {
    pub present: VkVsyncMode,
    /// Acquire timeout in nanoseconds.
    pub acquire_timeout: u64,
}

pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    pref: VkVsyncMode,
) -> vk::PresentModeKHR {
    match pref {
        VkVsyncMode::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        // FIFO support is mandatory.
        _ => vk::PresentModeKHR::FIFO,
    }
}

pub(crate) fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: Extent) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded).
pub(crate) fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

pub(crate) fn render_pass_key(color: vk::Format, depth: vk::Format) -> RenderPassKey {
    RenderPassKey(((color.as_raw() as u32 as u64) << 32) | depth.as_raw() as u32 as u64)
}

struct DepthTarget {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

/// Sync objects for one submission slot.
struct FrameSlot {
    image_available: vk::Semaphore,
    in_flight: vk::Fence,
}

/// Swapchain plus everything sized by it: image views, depth targets, render
/// pass, framebuffers and sync objects.
///
/// Built field by field into an instance whose `Drop` skips null handles, so
/// a failure halfway through construction releases what was made so far.
pub struct VkSwapchain {
    ctx: Arc<VkContext>,
    settings: SwapchainSettings,

    handle: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: Vec<DepthTarget>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) framebuffers: Vec<vk::Framebuffer>,

    slots: Vec<FrameSlot>,
    // Indexed by image: a present may still be reading the semaphore after
    // the slot fence signals, so it cannot follow the slot.
    render_finished: Vec<vk::Semaphore>,
    // Fence of the last submission that rendered into each image.
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
}

impl VkSwapchain {
    pub(crate) fn new(
        ctx: Arc<VkContext>,
        settings: SwapchainSettings,
        want: Extent,
        previous: Option<VkSwapchain>,
    ) -> FrameResult<Self> {
        let mut sc = VkSwapchain {
            ctx,
            settings,
            handle: vk::SwapchainKHR::null(),
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            views: Vec::new(),
            depth: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            slots: Vec::new(),
            render_finished: Vec::new(),
            images_in_flight: Vec::new(),
            current_frame: 0,
        };

        let old = previous.as_ref().map_or(vk::SwapchainKHR::null(), |p| p.handle);
        unsafe {
            sc.create_handle(want, old)?;
            // The old swapchain is retired now; release it with its views.
            drop(previous);
            sc.create_views()?;
            sc.create_depth_targets()?;
            sc.create_render_pass()?;
            sc.create_framebuffers()?;
            sc.create_sync_objects()?;
        }

        info!(
            "swapchain {}x{} ({} images, {:?})",
            sc.extent.width,
            sc.extent.height,
            sc.images.len(),
            sc.format.format
        );
        Ok(sc)
    }

    unsafe fn create_handle(&mut self, want: Extent, old: vk::SwapchainKHR) -> FrameResult<()> {
        let ctx = &self.ctx;
        let sl = &ctx.surface_loader;

        let caps = unsafe { sl.get_physical_device_surface_capabilities(ctx.phys, ctx.surface) }
            .frame("surface capabilities")?;
        let formats = unsafe { sl.get_physical_device_surface_formats(ctx.phys, ctx.surface) }
            .frame("surface formats")?;
        let modes = unsafe { sl.get_physical_device_surface_present_modes(ctx.phys, ctx.surface) }
            .frame("surface present modes")?;

        let format = choose_surface_format(&formats).ok_or_else(|| {
            FrameError::SurfaceIncompatible {
                context: "surface formats",
                reason: "surface reports no formats".into(),
            }
        })?;
        let present_mode = choose_present_mode(&modes, self.settings.present);
        let extent = extent_from_caps(&caps, want);

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.surface,
            min_image_count: image_count_from_caps(&caps),
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };

        self.handle = unsafe { ctx.swapchain_loader.create_swapchain(&info, None) }
            .frame("create_swapchain")?;
        self.images = unsafe { ctx.swapchain_loader.get_swapchain_images(self.handle) }
            .frame("get_swapchain_images")?;
        self.format = format;
        self.extent = extent;
        debug!("present mode {present_mode:?}");
        Ok(())
    }

    unsafe fn create_views(&mut self) -> FrameResult<()> {
        for &image in &self.images {
            let view = unsafe {
                create_view(&self.ctx.device, image, self.format.format, vk::ImageAspectFlags::COLOR)
            }?;
            self.views.push(view);
        }
        Ok(())
    }

    unsafe fn create_depth_targets(&mut self) -> FrameResult<()> {
        let d = &self.ctx.device;
        let format = self.ctx.depth_format;

        for _ in 0..self.images.len() {
            let info = vk::ImageCreateInfo {
                s_type: vk::StructureType::IMAGE_CREATE_INFO,
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                },
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            };
            let image = unsafe { d.create_image(&info, None) }.frame("create depth image")?;
            // Push before allocating so a failure below still frees the image.
            self.depth.push(DepthTarget {
                image,
                memory: vk::DeviceMemory::null(),
                view: vk::ImageView::null(),
            });

            let req = unsafe { d.get_image_memory_requirements(image) };
            let type_index = self
                .ctx
                .memory_type(req.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
                .ok_or_else(|| FrameError::ResourceExhausted {
                    context: "depth image memory",
                    reason: "no device-local memory type".into(),
                })?;
            let alloc = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: type_index,
                ..Default::default()
            };
            let memory = unsafe { d.allocate_memory(&alloc, None) }.frame("allocate depth memory")?;
            let last = self.depth.len() - 1;
            self.depth[last].memory = memory;
            unsafe { d.bind_image_memory(image, memory, 0) }.frame("bind depth memory")?;
            self.depth[last].view = unsafe { create_view(d, image, format, depth_aspect(format)) }?;
        }
        Ok(())
    }

    unsafe fn create_render_pass(&mut self) -> FrameResult<()> {
        let attachments = [
            vk::AttachmentDescription {
                format: self.format.format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            vk::AttachmentDescription {
                format: self.ctx.depth_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..Default::default()
            },
        ];
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            p_depth_stencil_attachment: &depth_ref,
            ..Default::default()
        };

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: stages,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: stages,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ..Default::default()
        };

        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        self.render_pass = unsafe { self.ctx.device.create_render_pass(&info, None) }
            .frame("create_render_pass")?;
        Ok(())
    }

    unsafe fn create_framebuffers(&mut self) -> FrameResult<()> {
        for (view, depth) in self.views.iter().zip(&self.depth) {
            let attachments = [*view, depth.view];
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = unsafe { self.ctx.device.create_framebuffer(&info, None) }
                .frame("create_framebuffer")?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    unsafe fn create_sync_objects(&mut self) -> FrameResult<()> {
        let d = &self.ctx.device;
        let sem_info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        let fence_info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };

        for _ in 0..self.images.len() {
            let image_available =
                unsafe { d.create_semaphore(&sem_info, None) }.frame("create_semaphore")?;
            let in_flight = match unsafe { d.create_fence(&fence_info, None) } {
                Ok(f) => f,
                Err(e) => {
                    unsafe { d.destroy_semaphore(image_available, None) };
                    return Err(frame_error("create_fence", e));
                }
            };
            self.slots.push(FrameSlot {
                image_available,
                in_flight,
            });
            let done = unsafe { d.create_semaphore(&sem_info, None) }.frame("create_semaphore")?;
            self.render_finished.push(done);
        }
        self.images_in_flight = vec![vk::Fence::null(); self.images.len()];
        Ok(())
    }

    pub(crate) fn extent_2d(&self) -> vk::Extent2D {
        self.extent
    }
}

unsafe fn create_view(
    d: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> FrameResult<vk::ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    unsafe { d.create_image_view(&info, None) }.frame("create_image_view")
}

fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

impl Swapchain for VkSwapchain {
    type CommandBuffer = vk::CommandBuffer;

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> Extent {
        Extent::new(self.extent.width, self.extent.height)
    }

    fn render_pass_key(&self) -> RenderPassKey {
        render_pass_key(self.format.format, self.ctx.depth_format)
    }

    fn acquire_next_image(&mut self) -> FrameResult<Acquire> {
        let d = &self.ctx.device;
        let frame = self.current_frame;
        let slot = &self.slots[frame];

        unsafe { d.wait_for_fences(&[slot.in_flight], true, u64::MAX) }
            .frame("wait slot fence")?;

        let acquired = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.handle,
                self.settings.acquire_timeout,
                slot.image_available,
                vk::Fence::null(),
            )
        };
        let (index, suboptimal) = match acquired {
            Ok(r) => r,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(Acquire::OutOfDate),
            Err(e) => return Err(frame_error("acquire_next_image", e)),
        };

        // A slot other than ours may still be rendering into this image.
        let image_fence = self.images_in_flight[index as usize];
        if image_fence != vk::Fence::null() && image_fence != slot.in_flight {
            unsafe { d.wait_for_fences(&[image_fence], true, u64::MAX) }
                .frame("wait image fence")?;
        }
        self.images_in_flight[index as usize] = slot.in_flight;

        Ok(Acquire::Ready(AcquiredImage {
            image: ImageIndex(index),
            frame: FrameIndex(frame),
            suboptimal,
        }))
    }

    fn submit(&mut self, cmd: &vk::CommandBuffer, image: ImageIndex) -> FrameResult<PresentStatus> {
        let d = &self.ctx.device;
        let slot = &self.slots[self.current_frame];
        let Some(&render_finished) = self.render_finished.get(image.as_usize()) else {
            return Err(FrameError::fatal(
                "queue_submit",
                format!("image {} out of range", image.0),
            ));
        };

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &slot.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &render_finished,
            ..Default::default()
        };

        unsafe {
            d.reset_fences(&[slot.in_flight]).frame("reset_fences")?;
            d.queue_submit(self.ctx.queue, &[submit], slot.in_flight)
                .frame("queue_submit")?;
        }

        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &render_finished,
            swapchain_count: 1,
            p_swapchains: &self.handle,
            p_image_indices: &image.0,
            ..Default::default()
        };

        // The slot is spent once submitted, whatever present reports.
        self.current_frame = (self.current_frame + 1) % self.slots.len();

        match unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.queue, &present) } {
            Ok(false) => Ok(PresentStatus::Success),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(frame_error("queue_present", e)),
        }
    }
}

impl Drop for VkSwapchain {
    fn drop(&mut self) {
        let d = &self.ctx.device;
        unsafe {
            for slot in self.slots.drain(..) {
                d.destroy_semaphore(slot.image_available, None);
                d.destroy_fence(slot.in_flight, None);
            }
            for s in self.render_finished.drain(..) {
                d.destroy_semaphore(s, None);
            }
            for fb in self.framebuffers.drain(..) {
                d.destroy_framebuffer(fb, None);
            }
            d.destroy_render_pass(self.render_pass, None);
            for t in self.depth.drain(..) {
                d.destroy_image_view(t.view, None);
                d.destroy_image(t.image, None);
                d.free_memory(t.memory, None);
            }
            for v in self.views.drain(..) {
                d.destroy_image_view(v, None);
            }
            self.ctx.swapchain_loader.destroy_swapchain(self.handle, None);
        }
        debug!("swapchain released");
    }
}
