// SPDX-License-Identifier: CEPL-1.0
//! Window ownership on top of winit, driven by pumping the event loop from
//! the render thread instead of handing control to `run_app`.

use std::time::Duration;

use anyhow::{anyhow, Result};
use cinder_render::{Extent, SurfaceProvider};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    error::OsError,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

#[derive(Clone, Debug)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "cinder".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

/// Window state updated from winit callbacks.
struct WindowState {
    attrs: WindowAttributes,
    created: Option<Window>,
    window_id: Option<WindowId>,
    create_error: Option<OsError>,
    size: PhysicalSize<u32>,
    resized: bool,
    close_requested: bool,
}

impl WindowState {
    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        if size == self.size {
            return;
        }
        debug!("Resized → {}x{}", size.width, size.height);
        self.size = size;
        self.resized = true;
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() {
            return;
        }
        match event_loop.create_window(self.attrs.clone()) {
            Ok(window) => {
                self.size = window.inner_size();
                info!("window ready ({}x{})", self.size.width, self.size.height);
                self.window_id = Some(window.id());
                self.created = Some(window);
            }
            Err(e) => self.create_error = Some(e),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window_id.is_some_and(|id| id != window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => self.on_resize(size),
            _ => {}
        }
    }
}

/// An open window plus the event loop that feeds it.
pub struct Platform {
    window: Window,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl Platform {
    /// Creates the event loop and pumps it until the window exists.
    pub fn new(desc: &WindowDesc) -> Result<Self> {
        let mut event_loop = EventLoop::new()?;
        let attrs = Window::default_attributes()
            .with_title(desc.title.clone())
            .with_inner_size(LogicalSize::new(desc.width as f64, desc.height as f64));

        let mut state = WindowState {
            attrs,
            created: None,
            window_id: None,
            create_error: None,
            size: PhysicalSize::new(0, 0),
            resized: false,
            close_requested: false,
        };

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state);
            if let Some(e) = state.create_error.take() {
                return Err(anyhow!("create_window: {e}"));
            }
            if let Some(window) = state.created.take() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(anyhow!("event loop exited ({code}) before the window was created"));
            }
        };
        // Creation itself is not a resize.
        state.resized = false;

        Ok(Platform {
            window,
            state,
            event_loop,
        })
    }

    /// The window, for surface creation.
    pub fn window(&self) -> &Window {
        &self.window
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!("event loop exited with {code}");
            self.state.close_requested = true;
        }
    }
}

impl SurfaceProvider for Platform {
    fn extent(&self) -> Extent {
        let size = self.window.inner_size();
        Extent::new(size.width, size.height)
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized(&mut self) {
        self.state.resized = false;
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }
}
