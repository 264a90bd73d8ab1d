// SPDX-License-Identifier: CEPL-1.0

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-area extent; no swapchain can be
    /// built for it.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Index of a presentable image, as handed out by acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageIndex(pub u32);

impl ImageIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Index of the synchronization slot a submission uses. Cycles in order,
/// independently of [`ImageIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameIndex(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquiredImage {
    pub image: ImageIndex,
    pub frame: FrameIndex,
    /// The image is usable but the swapchain no longer matches the surface
    /// exactly.
    pub suboptimal: bool,
}

/// Outcome of a non-fatal acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Ready(AcquiredImage),
    OutOfDate,
}

/// Outcome of a non-fatal submit + present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Success,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    pub fn needs_recreate(self) -> bool {
        !matches!(self, PresentStatus::Success)
    }
}

/// Clear set for the render pass: one color attachment followed by one
/// depth/stencil attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl ClearValues {
    pub fn with_color(color: [f32; 4]) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.1, 0.1, 0.1, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Identifies render-pass compatibility. Two swapchains with equal keys can
/// share a pipeline; a different key forces a rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderPassKey(pub u64);
