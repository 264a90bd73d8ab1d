// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::{Mat2, Vec2, Vec3};

/// Handle to a mesh previously uploaded to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub translation: Vec2,
    pub scale: Vec2,
    /// Radians, counter-clockwise.
    pub rotation: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2d {
    /// Rotation applied after scale. Translation travels separately as the
    /// push-constant offset.
    pub fn mat2(&self) -> Mat2 {
        Mat2::from_angle(self.rotation) * Mat2::from_diagonal(self.scale)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawObject {
    pub mesh: MeshId,
    pub transform: Transform2d,
    pub color: Vec3,
}

impl DrawObject {
    pub fn push_constants(&self) -> PushConstants {
        PushConstants {
            transform: self.transform.mat2().to_cols_array_2d(),
            offset: self.transform.translation.to_array(),
            _pad0: [0.0; 2],
            color: self.color.to_array(),
            _pad1: 0.0,
        }
    }
}

/// Per-draw push-constant block, laid out to match the shader's std430
/// `{ mat2 transform; vec2 offset; vec3 color; }`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    pub transform: [[f32; 2]; 2],
    pub offset: [f32; 2],
    _pad0: [f32; 2],
    pub color: [f32; 3],
    _pad1: f32,
}

impl PushConstants {
    pub const SIZE: u32 = std::mem::size_of::<PushConstants>() as u32;

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Everything the recorder needs for one frame. Iteration order is draw order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneSnapshot {
    pub tick: u64,
    pub objects: Vec<DrawObject>,
}

pub trait SceneProvider {
    /// Builds the snapshot for frame `tick`. Ticks increase by one per
    /// presented frame.
    fn snapshot(&mut self, tick: u64) -> SceneSnapshot;
}

impl<F> SceneProvider for F
where
    F: FnMut(u64) -> SceneSnapshot,
{
    fn snapshot(&mut self, tick: u64) -> SceneSnapshot {
        self(tick)
    }
}
