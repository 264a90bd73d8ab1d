// SPDX-License-Identifier: CEPL-1.0
use tracing::{debug, error, info, trace, warn};

use crate::device::{RenderDevice, Swapchain};
use crate::error::{FrameError, FrameResult};
use crate::recorder::record_frame;
use crate::scene::SceneProvider;
use crate::surface::SurfaceProvider;
use crate::types::{Acquire, ClearValues, PresentStatus, RenderPassKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitting,
    Presented,
    Recreating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Presented, then the swapchain was rebuilt before returning.
    PresentedAndRecreated,
    /// Nothing was recorded or submitted.
    Dropped,
}

/// Owns the swapchain, pipeline and per-image command buffers and drives the
/// acquire → record → submit → present loop.
///
/// Fields drop in declaration order: everything that borrows the device's
/// objects goes before the device itself.
pub struct FrameOrchestrator<D: RenderDevice> {
    swapchain: Option<D::Swapchain>,
    pipeline: Option<(D::Pipeline, RenderPassKey)>,
    command_buffers: Vec<D::CommandBuffer>,
    clear: ClearValues,
    state: FrameState,
    tick: u64,
    recreations: u64,
    device: D,
}

fn enter(state: &mut FrameState, next: FrameState) {
    trace!(from = ?*state, to = ?next, "frame state");
    *state = next;
}

impl<D: RenderDevice> FrameOrchestrator<D> {
    /// Nothing is built yet; the first frame (or [`Self::run`]) creates the
    /// swapchain once the surface has a non-zero area.
    pub fn new(device: D, clear: ClearValues) -> Self {
        Self {
            swapchain: None,
            pipeline: None,
            command_buffers: Vec::new(),
            clear,
            state: FrameState::Idle,
            tick: 0,
            recreations: 0,
            device,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Frames submitted so far. Fed to the scene as animation time.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of completed swapchain constructions, initial one included.
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn image_count(&self) -> Option<usize> {
        self.swapchain.as_ref().map(|s| s.image_count())
    }

    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn set_clear_values(&mut self, clear: ClearValues) {
        self.clear = clear;
    }

    /// Runs frames until the surface asks to close (or `max_frames` frames
    /// have been presented), then drains the GPU. Returns the number of
    /// presented frames.
    ///
    /// A fatal error ends the loop after a best-effort device-idle wait.
    pub fn run<S, P>(
        &mut self,
        surface: &mut S,
        scene: &mut P,
        max_frames: Option<u64>,
    ) -> FrameResult<u64>
    where
        S: SurfaceProvider,
        P: SceneProvider,
    {
        let mut presented = 0u64;
        let result = loop {
            if surface.should_close() || max_frames.is_some_and(|max| presented >= max) {
                break Ok(());
            }
            surface.poll_events();
            if surface.should_close() {
                break Ok(());
            }
            match self.draw_frame(surface, scene) {
                Ok(FrameOutcome::Dropped) => {}
                Ok(_) => presented += 1,
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = result {
            error!("frame loop aborted: {e}");
            if let Err(idle) = self.device.wait_idle() {
                warn!("device idle wait after fatal error failed: {idle}");
            }
            return Err(e);
        }

        self.device.wait_idle()?;
        info!(presented, "frame loop finished");
        Ok(presented)
    }

    /// One pass through the frame state machine.
    pub fn draw_frame<S, P>(&mut self, surface: &mut S, scene: &mut P) -> FrameResult<FrameOutcome>
    where
        S: SurfaceProvider,
        P: SceneProvider,
    {
        if self.swapchain.is_none() && !self.recreate(surface)? {
            return Ok(FrameOutcome::Dropped);
        }

        let (Some(swapchain), Some((pipeline, _))) = (self.swapchain.as_mut(), self.pipeline.as_ref())
        else {
            return Err(FrameError::fatal("draw_frame", "swapchain or pipeline missing"));
        };

        enter(&mut self.state, FrameState::Acquiring);
        let acquired = match swapchain.acquire_next_image()? {
            Acquire::Ready(acquired) => acquired,
            Acquire::OutOfDate => {
                debug!("acquire: swapchain out of date, dropping frame");
                self.recreate(surface)?;
                return Ok(FrameOutcome::Dropped);
            }
        };
        if acquired.suboptimal {
            debug!(image = acquired.image.0, "acquire: suboptimal image, rendering anyway");
        }

        let image = acquired.image;
        let cmd = self.command_buffers.get(image.as_usize()).ok_or_else(|| {
            FrameError::fatal(
                "acquire_next_image",
                format!("image {} has no command buffer", image.0),
            )
        })?;

        enter(&mut self.state, FrameState::Recording);
        let snapshot = scene.snapshot(self.tick);
        let extent = swapchain.extent();
        {
            let mut encoder = self.device.encoder(cmd, &*swapchain, pipeline);
            record_frame(&mut encoder, image, extent, &self.clear, &snapshot)?;
        }

        enter(&mut self.state, FrameState::Submitting);
        let status = swapchain.submit(cmd, image)?;
        enter(&mut self.state, FrameState::Presented);
        self.tick += 1;

        let resized = surface.was_resized();
        if !status.needs_recreate() && !resized {
            return Ok(FrameOutcome::Presented);
        }

        if status == PresentStatus::Suboptimal {
            warn!("present: swapchain suboptimal, recreating");
        } else {
            debug!(?status, resized, "present: swapchain invalidated, recreating");
        }
        if self.recreate(surface)? {
            surface.reset_resized();
            Ok(FrameOutcome::PresentedAndRecreated)
        } else {
            Ok(FrameOutcome::Presented)
        }
    }

    /// Rebuilds the swapchain for the current surface extent.
    ///
    /// Blocks on window events while the surface has zero area. Returns
    /// `Ok(false)` when the window closed during that wait.
    fn recreate<S: SurfaceProvider>(&mut self, surface: &mut S) -> FrameResult<bool> {
        enter(&mut self.state, FrameState::Recreating);

        let mut extent = surface.extent();
        while extent.is_empty() {
            if surface.should_close() {
                debug!("surface closed while minimized, skipping recreation");
                return Ok(false);
            }
            trace!("surface has zero area, waiting for events");
            surface.wait_events();
            extent = surface.extent();
        }

        self.device.wait_idle()?;

        let previous = self.swapchain.take();
        let swapchain = self.device.create_swapchain(extent, previous)?;

        let images = swapchain.image_count();
        if images != self.command_buffers.len() {
            let old = std::mem::take(&mut self.command_buffers);
            if !old.is_empty() {
                debug!(from = old.len(), to = images, "image count changed, reallocating command buffers");
                self.device.free_command_buffers(old);
            }
            self.command_buffers = self.device.allocate_command_buffers(images)?;
        }

        let key = swapchain.render_pass_key();
        if self.pipeline.as_ref().map(|(_, k)| *k) != Some(key) {
            let pipeline = self.device.build_pipeline(&swapchain)?;
            self.pipeline = Some((pipeline, key));
        }

        info!(
            width = extent.width,
            height = extent.height,
            images,
            "swapchain ready"
        );
        self.swapchain = Some(swapchain);
        self.recreations += 1;
        enter(&mut self.state, FrameState::Idle);
        Ok(true)
    }
}

impl<D: RenderDevice> Drop for FrameOrchestrator<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("device idle wait on teardown failed: {e}");
        }
        let buffers = std::mem::take(&mut self.command_buffers);
        if !buffers.is_empty() {
            self.device.free_command_buffers(buffers);
        }
    }
}
