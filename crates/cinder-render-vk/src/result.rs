// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use cinder_render::FrameError;

/// Maps a Vulkan failure code onto the frame error taxonomy.
pub(crate) fn frame_error(context: &'static str, err: vk::Result) -> FrameError {
    match err {
        vk::Result::ERROR_DEVICE_LOST => FrameError::DeviceLost { context },
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            FrameError::ResourceExhausted {
                context,
                reason: format!("{err:?}"),
            }
        }
        vk::Result::ERROR_SURFACE_LOST_KHR
        | vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR
        | vk::Result::ERROR_FORMAT_NOT_SUPPORTED => FrameError::SurfaceIncompatible {
            context,
            reason: format!("{err:?}"),
        },
        _ => FrameError::fatal(context, format!("{err:?}")),
    }
}

pub(crate) trait VkResultExt<T> {
    fn frame(self, context: &'static str) -> Result<T, FrameError>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn frame(self, context: &'static str) -> Result<T, FrameError> {
        self.map_err(|e| frame_error(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_is_its_own_class() {
        assert!(matches!(
            frame_error("queue_submit", vk::Result::ERROR_DEVICE_LOST),
            FrameError::DeviceLost {
                context: "queue_submit"
            }
        ));
    }

    #[test]
    fn allocation_failures_are_resource_exhaustion() {
        for code in [
            vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        ] {
            assert!(matches!(
                frame_error("allocate_command_buffers", code),
                FrameError::ResourceExhausted { .. }
            ));
        }
    }

    #[test]
    fn surface_problems_are_incompatibility() {
        assert!(matches!(
            frame_error("create_swapchain", vk::Result::ERROR_SURFACE_LOST_KHR),
            FrameError::SurfaceIncompatible { .. }
        ));
        assert!(matches!(
            frame_error("create_swapchain", vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR),
            FrameError::SurfaceIncompatible { .. }
        ));
    }

    #[test]
    fn initialization_failure_is_not_a_surface_problem() {
        let e = frame_error("create_swapchain", vk::Result::ERROR_INITIALIZATION_FAILED);
        assert!(matches!(e, FrameError::Fatal { .. }));
        assert_eq!(e.context(), "create_swapchain");
    }

    #[test]
    fn everything_else_is_fatal() {
        let e = Err::<(), _>(vk::Result::ERROR_UNKNOWN)
            .frame("acquire_next_image")
            .unwrap_err();
        assert!(matches!(e, FrameError::Fatal { .. }));
        assert_eq!(e.context(), "acquire_next_image");
    }
}
