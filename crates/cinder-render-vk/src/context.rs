// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::info;

/// Instance, surface, logical device, graphics queue and command pool.
///
/// Shared through `Arc` by everything created from it so it is destroyed
/// last.
pub struct VkContext {
    _entry: Entry,
    pub(crate) instance: Instance,
    pub(crate) surface_loader: surface::Instance,
    pub(crate) surface: vk::SurfaceKHR,

    pub(crate) phys: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    pub(crate) queue: vk::Queue,

    pub(crate) swapchain_loader: swapchain::Device,
    pub(crate) cmd_pool: vk::CommandPool,

    pub(crate) depth_format: vk::Format,
    memory_props: vk::PhysicalDeviceMemoryProperties,
}

impl Drop for VkContext {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();
            d.destroy_command_pool(self.cmd_pool, None);
            d.destroy_device(None);

            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

unsafe fn create_instance(entry: &Entry, display_raw: RawDisplayHandle) -> Result<Instance> {
    let app_name = c"cinder";

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: 0,
        p_engine_name: app_name.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let ext_slice = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?;

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_slice.len() as u32,
        pp_enabled_extension_names: ext_slice.as_ptr(),
        ..Default::default()
    };

    Ok(unsafe { entry.create_instance(&create_info, None) }?)
}

unsafe fn pick_device_and_queue(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    for phys in unsafe { instance.enumerate_physical_devices() }? {
        let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };
        for (i, q) in qprops.iter().enumerate() {
            let presents = unsafe {
                surface_loader.get_physical_device_surface_support(phys, i as u32, surface)
            }
            .unwrap_or(false);
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS) && presents {
                return Ok((phys, i as u32));
            }
        }
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

/// First candidate usable as an optimally tiled depth attachment.
pub(crate) fn pick_depth_format(
    supports: impl Fn(vk::Format) -> vk::FormatFeatureFlags,
) -> Option<vk::Format> {
    [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ]
    .into_iter()
    .find(|&f| supports(f).contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT))
}

/// Index of the first memory type allowed by `type_bits` that has all of
/// `wanted`.
pub(crate) fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    wanted: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0
            && props.memory_types[i as usize].property_flags.contains(wanted)
    })
}

/// Runs `release` when `result` is an error, then hands the result back.
/// Each setup stage uses it to destroy what earlier stages created.
pub(crate) fn or_release<T>(result: Result<T>, release: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        release();
    }
    result
}

/// Physical device, graphics/present queue family and depth format.
unsafe fn pick_physical(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32, vk::Format)> {
    let (phys, queue_family) =
        unsafe { pick_device_and_queue(instance, surface_loader, surface) }?;
    let depth_format = pick_depth_format(|f| unsafe {
        instance
            .get_physical_device_format_properties(phys, f)
            .optimal_tiling_features
    })
    .ok_or_else(|| anyhow!("no depth attachment format supported"))?;
    Ok((phys, queue_family, depth_format))
}

unsafe fn create_device_and_pool(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<(ash::Device, vk::CommandPool)> {
    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };

    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };

    let device = unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")?;

    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    let cmd_pool = or_release(
        unsafe { device.create_command_pool(&pool_info, None) }.context("create_command_pool"),
        || unsafe { device.destroy_device(None) },
    )?;
    Ok((device, cmd_pool))
}

impl VkContext {
    pub fn new(window: &dyn HasWindowHandle, display: &dyn HasDisplayHandle) -> Result<Self> {
        unsafe { Self::build(window, display) }
    }

    unsafe fn build(window: &dyn HasWindowHandle, display: &dyn HasDisplayHandle) -> Result<Self> {
        let entry = unsafe { Entry::load() }.context("load Vulkan loader")?;

        let dh: RawDisplayHandle = display.display_handle()?.as_raw();
        let wh: RawWindowHandle = window.window_handle()?.as_raw();

        let instance = unsafe { create_instance(&entry, dh) }?;

        let surface = or_release(
            unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) }
                .context("create_surface"),
            || unsafe { instance.destroy_instance(None) },
        )?;
        let surface_loader = surface::Instance::new(&entry, &instance);

        let (phys, queue_family, depth_format) = or_release(
            unsafe { pick_physical(&instance, &surface_loader, surface) },
            || unsafe {
                surface_loader.destroy_surface(surface, None);
                instance.destroy_instance(None);
            },
        )?;

        let (device, cmd_pool) = or_release(
            unsafe { create_device_and_pool(&instance, phys, queue_family) },
            || unsafe {
                surface_loader.destroy_surface(surface, None);
                instance.destroy_instance(None);
            },
        )?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let swapchain_loader = swapchain::Device::new(&instance, &device);
        let memory_props = unsafe { instance.get_physical_device_memory_properties(phys) };

        let props = unsafe { instance.get_physical_device_properties(phys) };
        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Vulkan device ready ({name}, queue family {queue_family}, depth {depth_format:?})");

        Ok(VkContext {
            _entry: entry,
            instance,
            surface_loader,
            surface,
            phys,
            device,
            queue,
            swapchain_loader,
            cmd_pool,
            depth_format,
            memory_props,
        })
    }

    pub(crate) fn memory_type(&self, type_bits: u32, wanted: vk::MemoryPropertyFlags) -> Option<u32> {
        find_memory_type(&self.memory_props, type_bits, wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_format_prefers_d32() {
        let all = |_| vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        assert_eq!(pick_depth_format(all), Some(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn depth_format_falls_back_in_order() {
        let only_d24 = |f| {
            if f == vk::Format::D24_UNORM_S8_UINT {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            }
        };
        assert_eq!(pick_depth_format(only_d24), Some(vk::Format::D24_UNORM_S8_UINT));
        assert_eq!(pick_depth_format(|_| vk::FormatFeatureFlags::empty()), None);
    }

    #[test]
    fn memory_type_respects_mask_and_flags() {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        props.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        props.memory_types[2].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT
            | vk::MemoryPropertyFlags::DEVICE_LOCAL;

        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&props, 0b111, host), Some(1));
        assert_eq!(find_memory_type(&props, 0b100, host), Some(2));
        assert_eq!(find_memory_type(&props, 0b001, host), None);
    }

    #[test]
    fn release_runs_only_on_failure() {
        let mut released = 0;
        let ok = or_release(Ok::<_, anyhow::Error>(7), || released += 1);
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(released, 0);

        let err = or_release(Err::<u32, _>(anyhow!("create_device")), || released += 1);
        assert_eq!(err.unwrap_err().to_string(), "create_device");
        assert_eq!(released, 1);
    }
}
