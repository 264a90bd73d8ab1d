// SPDX-License-Identifier: CEPL-1.0
//! Test doubles for the capability traits. Every call lands in a shared
//! [`EventLog`] so tests can assert on the exact protocol sequence.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::device::{CommandEncoder, RenderDevice, Swapchain};
use crate::error::{FrameError, FrameResult};
use crate::scene::{MeshId, PushConstants};
use crate::surface::SurfaceProvider;
use crate::types::{
    Acquire, AcquiredImage, ClearValues, Extent, FrameIndex, ImageIndex, PresentStatus,
    RenderPassKey,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    WaitEvents,
    WaitIdle,
    CreateSwapchain {
        id: u32,
        extent: Extent,
        images: usize,
        replaced: Option<u32>,
    },
    ReleaseSwapchain(u32),
    AllocateCommandBuffers(usize),
    FreeCommandBuffers(usize),
    BuildPipeline(RenderPassKey),
    WaitFence(ImageIndex),
    Acquire(ImageIndex),
    AcquireOutOfDate,
    Begin,
    BeginRenderPass(ImageIndex),
    SetViewport(Extent),
    SetScissor(Extent),
    BindPipeline,
    PushConstants([f32; 2]),
    Draw(MeshId),
    EndRenderPass,
    End,
    Submit(ImageIndex),
}

#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, e: Event) {
        self.0.borrow_mut().push(e);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Scripted result for one acquire or submit call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Ok,
    Suboptimal,
    OutOfDate,
    DeviceLost,
}

#[derive(Default)]
pub struct Script {
    pub acquire: VecDeque<Step>,
    pub submit: VecDeque<Step>,
}

pub type SharedScript = Rc<RefCell<Script>>;

pub const KEY_A: RenderPassKey = RenderPassKey(0xA);
pub const KEY_B: RenderPassKey = RenderPassKey(0xB);

#[derive(Debug)]
pub struct MockCommandBuffer(pub usize);

#[derive(Debug)]
pub struct MockPipeline(pub RenderPassKey);

pub struct MockSwapchain {
    id: u32,
    log: EventLog,
    script: SharedScript,
    extent: Extent,
    key: RenderPassKey,
    next_image: usize,
    frame: usize,
    pending: Vec<bool>,
}

impl Swapchain for MockSwapchain {
    type CommandBuffer = MockCommandBuffer;

    fn image_count(&self) -> usize {
        self.pending.len()
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn render_pass_key(&self) -> RenderPassKey {
        self.key
    }

    fn acquire_next_image(&mut self) -> FrameResult<Acquire> {
        let step = self.script.borrow_mut().acquire.pop_front().unwrap_or(Step::Ok);
        match step {
            Step::OutOfDate => {
                self.log.push(Event::AcquireOutOfDate);
                Ok(Acquire::OutOfDate)
            }
            Step::DeviceLost => Err(FrameError::DeviceLost {
                context: "acquire_next_image",
            }),
            Step::Ok | Step::Suboptimal => {
                let image = self.next_image;
                self.next_image = (self.next_image + 1) % self.pending.len();
                if std::mem::take(&mut self.pending[image]) {
                    self.log.push(Event::WaitFence(ImageIndex(image as u32)));
                }
                self.log.push(Event::Acquire(ImageIndex(image as u32)));
                Ok(Acquire::Ready(AcquiredImage {
                    image: ImageIndex(image as u32),
                    frame: FrameIndex(self.frame),
                    suboptimal: step == Step::Suboptimal,
                }))
            }
        }
    }

    fn submit(&mut self, cmd: &MockCommandBuffer, image: ImageIndex) -> FrameResult<PresentStatus> {
        assert_eq!(cmd.0, image.as_usize(), "command buffer must belong to the image");
        self.log.push(Event::Submit(image));
        self.pending[image.as_usize()] = true;
        self.frame = (self.frame + 1) % self.pending.len();
        let step = self.script.borrow_mut().submit.pop_front().unwrap_or(Step::Ok);
        match step {
            Step::Ok => Ok(PresentStatus::Success),
            Step::Suboptimal => Ok(PresentStatus::Suboptimal),
            Step::OutOfDate => Ok(PresentStatus::OutOfDate),
            Step::DeviceLost => Err(FrameError::DeviceLost {
                context: "queue_present",
            }),
        }
    }
}

impl Drop for MockSwapchain {
    fn drop(&mut self) {
        self.log.push(Event::ReleaseSwapchain(self.id));
    }
}

pub struct MockEncoder {
    log: EventLog,
    image_count: usize,
    fail_end: bool,
}

impl MockEncoder {
    pub fn new(log: EventLog, image_count: usize) -> Self {
        Self {
            log,
            image_count,
            fail_end: false,
        }
    }
}

impl CommandEncoder for MockEncoder {
    fn begin(&mut self) -> FrameResult<()> {
        self.log.push(Event::Begin);
        Ok(())
    }

    fn begin_render_pass(&mut self, image: ImageIndex, _clear: &ClearValues) -> FrameResult<()> {
        if image.as_usize() >= self.image_count {
            return Err(FrameError::recording("begin_render_pass", "no framebuffer for image"));
        }
        self.log.push(Event::BeginRenderPass(image));
        Ok(())
    }

    fn set_viewport(&mut self, extent: Extent) {
        self.log.push(Event::SetViewport(extent));
    }

    fn set_scissor(&mut self, extent: Extent) {
        self.log.push(Event::SetScissor(extent));
    }

    fn bind_pipeline(&mut self) {
        self.log.push(Event::BindPipeline);
    }

    fn push_constants(&mut self, push: &PushConstants) {
        self.log.push(Event::PushConstants(push.offset));
    }

    fn draw_mesh(&mut self, mesh: MeshId) -> FrameResult<()> {
        self.log.push(Event::Draw(mesh));
        Ok(())
    }

    fn end_render_pass(&mut self) {
        self.log.push(Event::EndRenderPass);
    }

    fn end(&mut self) -> FrameResult<()> {
        if self.fail_end {
            return Err(FrameError::recording("end_command_buffer", "scripted failure"));
        }
        self.log.push(Event::End);
        Ok(())
    }
}

pub struct MockDevice {
    pub log: EventLog,
    pub script: SharedScript,
    /// Image count per swapchain creation; the last entry repeats.
    pub image_counts: VecDeque<usize>,
    /// Render-pass key per swapchain creation; the last entry repeats.
    pub keys: VecDeque<RenderPassKey>,
    pub fail_recording: bool,
    pub fail_allocation: bool,
    next_id: u32,
}

impl MockDevice {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            script: SharedScript::default(),
            image_counts: VecDeque::from([3]),
            keys: VecDeque::from([KEY_A]),
            fail_recording: false,
            fail_allocation: false,
            next_id: 0,
        }
    }

    pub fn with_image_counts(mut self, counts: &[usize]) -> Self {
        self.image_counts = counts.iter().copied().collect();
        self
    }

    pub fn with_keys(mut self, keys: &[RenderPassKey]) -> Self {
        self.keys = keys.iter().copied().collect();
        self
    }

    fn next<T: Copy>(queue: &mut VecDeque<T>) -> T {
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().unwrap()
        }
    }
}

impl RenderDevice for MockDevice {
    type CommandBuffer = MockCommandBuffer;
    type Swapchain = MockSwapchain;
    type Pipeline = MockPipeline;
    type Encoder<'a> = MockEncoder where Self: 'a;

    fn create_swapchain(
        &mut self,
        extent: Extent,
        previous: Option<MockSwapchain>,
    ) -> FrameResult<MockSwapchain> {
        let images = Self::next(&mut self.image_counts);
        let key = Self::next(&mut self.keys);
        let id = self.next_id;
        self.next_id += 1;

        self.log.push(Event::CreateSwapchain {
            id,
            extent,
            images,
            replaced: previous.as_ref().map(|p| p.id),
        });
        let swapchain = MockSwapchain {
            id,
            log: self.log.clone(),
            script: self.script.clone(),
            extent,
            key,
            next_image: 0,
            frame: 0,
            pending: vec![false; images],
        };
        drop(previous);
        Ok(swapchain)
    }

    fn wait_idle(&self) -> FrameResult<()> {
        self.log.push(Event::WaitIdle);
        Ok(())
    }

    fn allocate_command_buffers(&mut self, count: usize) -> FrameResult<Vec<MockCommandBuffer>> {
        if self.fail_allocation {
            return Err(FrameError::ResourceExhausted {
                context: "allocate_command_buffers",
                reason: "ERROR_OUT_OF_DEVICE_MEMORY".into(),
            });
        }
        self.log.push(Event::AllocateCommandBuffers(count));
        Ok((0..count).map(MockCommandBuffer).collect())
    }

    fn free_command_buffers(&mut self, buffers: Vec<MockCommandBuffer>) {
        self.log.push(Event::FreeCommandBuffers(buffers.len()));
    }

    fn build_pipeline(&mut self, swapchain: &MockSwapchain) -> FrameResult<MockPipeline> {
        self.log.push(Event::BuildPipeline(swapchain.key));
        Ok(MockPipeline(swapchain.key))
    }

    fn encoder<'a>(
        &'a self,
        _cmd: &'a MockCommandBuffer,
        swapchain: &'a MockSwapchain,
        _pipeline: &'a MockPipeline,
    ) -> MockEncoder {
        MockEncoder {
            log: self.log.clone(),
            image_count: swapchain.image_count(),
            fail_end: self.fail_recording,
        }
    }
}

/// Window double: walks through a list of extents, one step per blocking
/// wait, and closes after a fixed number of polls when asked to.
pub struct MockSurface {
    log: EventLog,
    extents: Vec<Extent>,
    cursor: usize,
    pub resized: bool,
    pub close_after_polls: Option<usize>,
    pub polls: usize,
    pub closed: bool,
}

impl MockSurface {
    pub fn new(log: EventLog, extents: &[Extent]) -> Self {
        assert!(!extents.is_empty());
        Self {
            log,
            extents: extents.to_vec(),
            cursor: 0,
            resized: false,
            close_after_polls: None,
            polls: 0,
            closed: false,
        }
    }
}

impl SurfaceProvider for MockSurface {
    fn extent(&self) -> Extent {
        self.extents[self.cursor]
    }

    fn should_close(&self) -> bool {
        self.closed
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized(&mut self) {
        self.resized = false;
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        if self.close_after_polls == Some(self.polls) {
            self.closed = true;
        }
    }

    fn wait_events(&mut self) {
        self.log.push(Event::WaitEvents);
        self.cursor = (self.cursor + 1).min(self.extents.len() - 1);
    }
}
