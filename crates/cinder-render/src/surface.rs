// SPDX-License-Identifier: CEPL-1.0
use crate::types::Extent;

/// What the frame loop needs from the windowing layer.
pub trait SurfaceProvider {
    /// Current drawable size; zero area while minimized.
    fn extent(&self) -> Extent;
    fn should_close(&self) -> bool;

    fn was_resized(&self) -> bool;
    fn reset_resized(&mut self);

    /// Processes pending events without blocking.
    fn poll_events(&mut self);
    /// Blocks until at least one event arrives.
    fn wait_events(&mut self);
}
