// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

/// Failures surfaced by the frame loop.
///
/// Every variant is fatal for the loop. Transient presentation conditions
/// (out-of-date, suboptimal) never show up here; they are reported as
/// [`PresentStatus`](crate::PresentStatus) / [`Acquire`](crate::Acquire)
/// values and recovered by recreating the swapchain.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{context}: surface rejected the swapchain ({reason})")]
    SurfaceIncompatible {
        context: &'static str,
        reason: String,
    },

    #[error("{context}: out of memory ({reason})")]
    ResourceExhausted {
        context: &'static str,
        reason: String,
    },

    #[error("{context}: device lost")]
    DeviceLost { context: &'static str },

    #[error("command recording failed at {step}: {reason}")]
    Recording { step: &'static str, reason: String },

    #[error("{context}: {reason}")]
    Fatal {
        context: &'static str,
        reason: String,
    },
}

impl FrameError {
    pub fn recording(step: &'static str, reason: impl Into<String>) -> Self {
        FrameError::Recording {
            step,
            reason: reason.into(),
        }
    }

    pub fn fatal(context: &'static str, reason: impl Into<String>) -> Self {
        FrameError::Fatal {
            context,
            reason: reason.into(),
        }
    }

    /// The Vulkan-style operation (or recording step) that failed.
    pub fn context(&self) -> &'static str {
        match self {
            FrameError::SurfaceIncompatible { context, .. }
            | FrameError::ResourceExhausted { context, .. }
            | FrameError::DeviceLost { context }
            | FrameError::Fatal { context, .. } => context,
            FrameError::Recording { step, .. } => step,
        }
    }
}

pub type FrameResult<T> = Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failed_step() {
        let e = FrameError::recording("end_command_buffer", "ERROR_OUT_OF_HOST_MEMORY");
        assert_eq!(
            e.to_string(),
            "command recording failed at end_command_buffer: ERROR_OUT_OF_HOST_MEMORY"
        );
        assert_eq!(e.context(), "end_command_buffer");

        let e = FrameError::DeviceLost {
            context: "queue_submit",
        };
        assert_eq!(e.to_string(), "queue_submit: device lost");
    }
}
