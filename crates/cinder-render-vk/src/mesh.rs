// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::context::VkContext;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

/// A buffer with its own memory allocation.
struct Buffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
}

impl Buffer {
    unsafe fn destroy(&self, d: &ash::Device) {
        unsafe {
            d.destroy_buffer(self.buffer, None);
            d.free_memory(self.memory, None);
        }
    }
}

/// Creates a host-visible, coherent buffer and copies `bytes` into it.
unsafe fn upload(ctx: &VkContext, bytes: &[u8], usage: vk::BufferUsageFlags) -> Result<Buffer> {
    let d = &ctx.device;
    let info = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        size: bytes.len() as vk::DeviceSize,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    let buffer = unsafe { d.create_buffer(&info, None) }.context("create_buffer")?;
    let mut out = Buffer {
        buffer,
        memory: vk::DeviceMemory::null(),
    };

    let result = (|| -> Result<()> {
        let req = unsafe { d.get_buffer_memory_requirements(buffer) };
        let type_index = ctx
            .memory_type(
                req.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )
            .ok_or_else(|| anyhow!("no host-visible memory type for buffer"))?;
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: type_index,
            ..Default::default()
        };
        out.memory = unsafe { d.allocate_memory(&alloc, None) }.context("allocate_memory")?;
        unsafe {
            d.bind_buffer_memory(buffer, out.memory, 0)?;
            let ptr = d.map_memory(out.memory, 0, info.size, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            d.unmap_memory(out.memory);
        }
        Ok(())
    })();

    match result {
        Ok(()) => Ok(out),
        Err(e) => {
            unsafe { out.destroy(d) };
            Err(e)
        }
    }
}

/// Vertex buffer plus optional `u32` index buffer.
pub struct VkMesh {
    ctx: Arc<VkContext>,
    vertices: Buffer,
    vertex_count: u32,
    indices: Option<(Buffer, u32)>,
}

impl VkMesh {
    pub(crate) fn new(ctx: Arc<VkContext>, vertices: &[Vertex], indices: &[u32]) -> Result<Self> {
        if vertices.is_empty() {
            bail!("mesh has no vertices");
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            bail!("index {bad} out of range for {} vertices", vertices.len());
        }

        let vbuf = unsafe {
            upload(&ctx, bytemuck::cast_slice(vertices), vk::BufferUsageFlags::VERTEX_BUFFER)
        }?;
        let ibuf = if indices.is_empty() {
            None
        } else {
            match unsafe {
                upload(&ctx, bytemuck::cast_slice(indices), vk::BufferUsageFlags::INDEX_BUFFER)
            } {
                Ok(b) => Some((b, indices.len() as u32)),
                Err(e) => {
                    unsafe { vbuf.destroy(&ctx.device) };
                    return Err(e);
                }
            }
        };

        Ok(VkMesh {
            ctx,
            vertices: vbuf,
            vertex_count: vertices.len() as u32,
            indices: ibuf,
        })
    }

    /// Binds the buffers and issues one draw, indexed when indices exist.
    pub(crate) unsafe fn bind_and_draw(&self, cmd: vk::CommandBuffer) {
        let d = &self.ctx.device;
        unsafe {
            d.cmd_bind_vertex_buffers(cmd, 0, &[self.vertices.buffer], &[0]);
            match &self.indices {
                Some((ibuf, count)) => {
                    d.cmd_bind_index_buffer(cmd, ibuf.buffer, 0, vk::IndexType::UINT32);
                    d.cmd_draw_indexed(cmd, *count, 1, 0, 0, 0);
                }
                None => d.cmd_draw(cmd, self.vertex_count, 1, 0, 0),
            }
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }
}

impl Drop for VkMesh {
    fn drop(&mut self) {
        let d = &self.ctx.device;
        unsafe {
            if let Some((ibuf, _)) = &self.indices {
                ibuf.destroy(d);
            }
            self.vertices.destroy(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        let v = [Vertex {
            position: [0.0, -0.5],
            color: [1.0, 0.0, 0.0],
        }];
        let bytes: &[u8] = bytemuck::cast_slice(&v);
        assert_eq!(&bytes[4..8], &(-0.5f32).to_ne_bytes());
    }
}
