//! Backends connect the execution engine to a device.
//!
//! A backend allocates the memory backing registered resources ([`ResourceAllocator`]) and drives presentation and
//! submission ([`PresentBackend`]). Anything implementing both is a [`Backend`].
//!
//! Two backends ship with strata:
//! - [`VulkanBackend`](vulkan::VulkanBackend) renders to a real swapchain through `ash` and `gpu-allocator`.
//! - [`HeadlessBackend`](headless::HeadlessBackend) fakes a device and a swapchain and keeps recent commands in memory.
//!   It is used for testing render graphs without a GPU.

use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::command::CommandContext;
use crate::resource::{BackingHandle, BufferDescription, ImageDescription};

pub mod headless;
pub mod vulkan;

/// Creates and destroys the memory backing registered resources.
pub trait ResourceAllocator {
    /// Create an image with its memory and a view over the whole image.
    fn create_image(&mut self, name: &str, description: &ImageDescription, extent: vk::Extent3D) -> Result<BackingHandle>;
    /// Create a buffer with its memory.
    fn create_buffer(&mut self, name: &str, description: &BufferDescription) -> Result<BackingHandle>;
    /// Destroy a handle created by this allocator. Destroying [`BackingHandle::None`] does nothing.
    fn destroy(&mut self, handle: BackingHandle) -> Result<()>;
}

/// An acquired presentable image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceImage {
    /// Index in the swapchain
    pub index: u32,
    /// Raw image handle
    pub handle: BackingHandle,
}

/// Result of acquiring a surface image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcquiredImage {
    /// An image is ready to be rendered to.
    Ready(SurfaceImage),
    /// The surface no longer matches the swapchain, usually because the window was resized.
    OutOfDate,
}

/// Result of presenting a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresentResult {
    /// The frame was queued for presentation.
    Presented,
    /// The frame was submitted, but the surface is out of date and must be re-created.
    OutOfDate,
}

/// Frame synchronization, command submission and presentation.
pub trait PresentBackend {
    /// Current extent of the presentable surface.
    fn surface_extent(&self) -> vk::Extent2D;
    /// Block until the last submission that used this frame slot finished. Errors with
    /// [`Error::DeviceTimeout`](crate::Error::DeviceTimeout) if that takes longer than `timeout`.
    fn wait_for_frame(&mut self, frame: usize, timeout: Duration) -> Result<()>;
    /// Acquire the next presentable image for a frame slot.
    fn acquire_image(&mut self, frame: usize, timeout: Duration) -> Result<AcquiredImage>;
    /// Record this frame's commands. The closure is called exactly once with the frame's command context.
    fn record_frame(&mut self, frame: usize, f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>) -> Result<()>;
    /// Submit the recorded frame and present the image.
    fn submit_and_present(&mut self, frame: usize, image: &SurfaceImage) -> Result<PresentResult>;
    /// Record and submit a one-time command stream, and wait for it to complete.
    fn immediate_submit(&mut self, f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>) -> Result<()>;
    /// Re-create the swapchain for the requested extent. Returns the extent that was actually created.
    fn recreate_surface(&mut self, extent: vk::Extent2D) -> Result<vk::Extent2D>;
    /// Wait until the device is idle.
    fn wait_idle(&mut self) -> Result<()>;
}

/// A complete backend.
pub trait Backend: ResourceAllocator + PresentBackend {}

impl<T: ResourceAllocator + PresentBackend> Backend for T {}
