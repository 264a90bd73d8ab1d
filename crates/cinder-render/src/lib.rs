// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral frame loop: swapchain lifecycle, per-frame submission and
//! command recording, expressed against small capability traits so that any
//! backend (or a test double) can drive it.

mod device;
mod error;
mod frame;
mod recorder;
mod scene;
mod surface;
mod types;

#[cfg(test)]
mod testing;

pub use device::{CommandEncoder, RenderDevice, Swapchain};
pub use error::{FrameError, FrameResult};
pub use frame::{FrameOrchestrator, FrameOutcome, FrameState};
pub use recorder::record_frame;
pub use scene::{DrawObject, MeshId, PushConstants, SceneProvider, SceneSnapshot, Transform2d};
pub use surface::SurfaceProvider;
pub use types::{
    Acquire, AcquiredImage, ClearValues, Extent, FrameIndex, ImageIndex, PresentStatus,
    RenderPassKey,
};
