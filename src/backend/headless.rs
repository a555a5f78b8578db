//! A backend without a device.
//!
//! The headless backend hands out fabricated handles, simulates a swapchain, and keeps the commands of recent
//! submissions, recorded through a [`CommandRecorder`]. Tests can invalidate or resize the simulated surface, and stall the simulated device to
//! exercise the engine's error paths.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use crate::backend::{AcquiredImage, PresentBackend, PresentResult, ResourceAllocator, SurfaceImage};
use crate::command::{CommandContext, CommandRecorder, RecordedCommand};
use crate::resource::{BackingHandle, BufferDescription, ImageDescription};
use crate::Error;

/// Default number of images in the simulated swapchain.
pub const DEFAULT_IMAGE_COUNT: u32 = 3;

/// Default number of submissions kept for inspection, per kind.
pub const DEFAULT_HISTORY: usize = 16;

/// Device-less backend that records everything it is asked to do.
#[derive(Debug)]
pub struct HeadlessBackend {
    extent: vk::Extent2D,
    window_extent: vk::Extent2D,
    format: vk::Format,
    images: Vec<BackingHandle>,
    next_image: u32,
    next_handle: u64,
    live: HashSet<u64>,
    acquire_out_of_date: bool,
    present_out_of_date: bool,
    stalled: bool,
    recording: CommandRecorder,
    frames: Vec<Vec<RecordedCommand>>,
    immediate: Vec<Vec<RecordedCommand>>,
    history: usize,
    presented: u64,
    surface_recreations: u64,
}

impl HeadlessBackend {
    /// Create a headless backend with a simulated surface of this extent.
    pub fn new(extent: vk::Extent2D) -> Self {
        let mut backend = Self {
            extent,
            window_extent: extent,
            format: vk::Format::B8G8R8A8_SRGB,
            images: Vec::new(),
            next_image: 0,
            next_handle: 1,
            live: HashSet::new(),
            acquire_out_of_date: false,
            present_out_of_date: false,
            stalled: false,
            recording: CommandRecorder::new(),
            frames: Vec::new(),
            immediate: Vec::new(),
            history: DEFAULT_HISTORY,
            presented: 0,
            surface_recreations: 0,
        };
        backend.create_swapchain_images();
        backend
    }

    /// Keep the commands of at most `submissions` frames and immediate submissions each. Older ones are dropped.
    pub fn with_history(mut self, submissions: usize) -> Self {
        self.history = submissions.max(1);
        Self::trim(&mut self.frames, self.history);
        Self::trim(&mut self.immediate, self.history);
        self
    }

    /// Forget every recorded frame and immediate submission.
    pub fn clear_history(&mut self) {
        self.frames.clear();
        self.immediate.clear();
    }

    fn trim(submissions: &mut Vec<Vec<RecordedCommand>>, limit: usize) {
        if submissions.len() > limit {
            let excess = submissions.len() - limit;
            submissions.drain(..excess);
        }
    }

    fn handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn create_swapchain_images(&mut self) {
        self.images = (0..DEFAULT_IMAGE_COUNT)
            .map(|_| BackingHandle::Image {
                image: vk::Image::from_raw(self.handle()),
                view: vk::ImageView::null(),
                format: self.format,
                extent: vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                },
                aspect: vk::ImageAspectFlags::COLOR,
            })
            .collect();
        self.next_image = 0;
    }

    /// Make the next acquire report an out of date surface.
    pub fn invalidate_surface(&mut self) {
        self.acquire_out_of_date = true;
    }

    /// Make the next present report an out of date surface.
    pub fn invalidate_on_present(&mut self) {
        self.present_out_of_date = true;
    }

    /// Simulate a window resize. The surface is reported out of date until it is re-created.
    pub fn resize_window(&mut self, width: u32, height: u32) {
        self.window_extent = vk::Extent2D {
            width,
            height,
        };
        self.acquire_out_of_date = true;
    }

    /// Make every following fence wait time out.
    pub fn stall_device(&mut self) {
        self.stalled = true;
    }

    /// Commands of the most recent submitted frames, oldest first.
    pub fn frames(&self) -> &[Vec<RecordedCommand>] {
        &self.frames
    }

    /// Commands of the last submitted frame.
    pub fn last_frame(&self) -> Option<&[RecordedCommand]> {
        self.frames.last().map(|frame| frame.as_slice())
    }

    /// Commands of the most recent immediate submissions, oldest first.
    pub fn immediate_submissions(&self) -> &[Vec<RecordedCommand>] {
        &self.immediate
    }

    /// Number of frames presented.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Number of times the surface was re-created.
    pub fn surface_recreations(&self) -> u64 {
        self.surface_recreations
    }

    /// Number of live images and buffers created through [`ResourceAllocator`].
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }
}

impl ResourceAllocator for HeadlessBackend {
    fn create_image(&mut self, name: &str, description: &ImageDescription, extent: vk::Extent3D) -> Result<BackingHandle> {
        let image = self.handle();
        let view = self.handle();
        self.live.insert(image);
        #[cfg(feature = "log-objects")]
        trace!("Created headless image {:#x} for `{}`", image, name);
        #[cfg(not(feature = "log-objects"))]
        let _ = name;
        Ok(BackingHandle::Image {
            image: vk::Image::from_raw(image),
            view: vk::ImageView::from_raw(view),
            format: description.format,
            extent,
            aspect: description.aspect.flags(),
        })
    }

    fn create_buffer(&mut self, name: &str, description: &BufferDescription) -> Result<BackingHandle> {
        let buffer = self.handle();
        self.live.insert(buffer);
        #[cfg(feature = "log-objects")]
        trace!("Created headless buffer {:#x} for `{}`", buffer, name);
        #[cfg(not(feature = "log-objects"))]
        let _ = name;
        Ok(BackingHandle::Buffer {
            buffer: vk::Buffer::from_raw(buffer),
            size: description.size,
        })
    }

    fn destroy(&mut self, handle: BackingHandle) -> Result<()> {
        let raw = match handle {
            BackingHandle::None => return Ok(()),
            BackingHandle::Image {
                image,
                ..
            } => image.as_raw(),
            BackingHandle::Buffer {
                buffer,
                ..
            } => buffer.as_raw(),
        };
        if !self.live.remove(&raw) {
            return Err(Error::Uncategorized("Destroyed a handle that is not alive").into());
        }
        #[cfg(feature = "log-objects")]
        trace!("Destroyed headless object {:#x}", raw);
        Ok(())
    }
}

impl PresentBackend for HeadlessBackend {
    fn surface_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn wait_for_frame(&mut self, _frame: usize, _timeout: Duration) -> Result<()> {
        if self.stalled {
            return Err(Error::DeviceTimeout.into());
        }
        Ok(())
    }

    fn acquire_image(&mut self, _frame: usize, _timeout: Duration) -> Result<AcquiredImage> {
        if self.stalled {
            return Err(Error::DeviceTimeout.into());
        }
        if self.acquire_out_of_date {
            self.acquire_out_of_date = false;
            return Ok(AcquiredImage::OutOfDate);
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len() as u32;
        Ok(AcquiredImage::Ready(SurfaceImage {
            index,
            handle: self.images[index as usize],
        }))
    }

    fn record_frame(&mut self, _frame: usize, f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>) -> Result<()> {
        self.recording = CommandRecorder::new();
        f(&mut self.recording)
    }

    fn submit_and_present(&mut self, _frame: usize, _image: &SurfaceImage) -> Result<PresentResult> {
        self.frames.push(self.recording.take());
        Self::trim(&mut self.frames, self.history);
        self.presented += 1;
        if self.present_out_of_date {
            self.present_out_of_date = false;
            return Ok(PresentResult::OutOfDate);
        }
        Ok(PresentResult::Presented)
    }

    fn immediate_submit(&mut self, f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>) -> Result<()> {
        let mut recorder = CommandRecorder::new();
        f(&mut recorder)?;
        self.immediate.push(recorder.take());
        Self::trim(&mut self.immediate, self.history);
        Ok(())
    }

    fn recreate_surface(&mut self, _extent: vk::Extent2D) -> Result<vk::Extent2D> {
        // Like a real swapchain, the window decides the extent.
        self.extent = self.window_extent;
        self.acquire_out_of_date = false;
        self.surface_recreations += 1;
        self.create_swapchain_images();
        Ok(self.extent)
    }

    fn wait_idle(&mut self) -> Result<()> {
        if self.stalled {
            return Err(Error::DeviceTimeout.into());
        }
        Ok(())
    }
}
