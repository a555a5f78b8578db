//! Vulkan implementation of the backend traits, built on `ash`.
//!
//! The [`VulkanBackend`] does not create the Vulkan instance or device itself. Pass it the handles of an existing
//! context through [`VulkanBackendInfo`]; it creates the swapchain, the per-frame synchronization objects and the
//! command buffers it records into. The device must support Vulkan 1.3 with `synchronization2` enabled.

use std::time::Duration;

use anyhow::Result;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr;
use ash::vk;

use crate::backend::{AcquiredImage, PresentBackend, PresentResult, ResourceAllocator, SurfaceImage};
use crate::command::CommandContext;
use crate::resource::{BackingHandle, BufferDescription, ImageDescription};
use crate::Error;

pub mod allocator;
pub mod command;

pub use allocator::VulkanAllocator;
pub use command::VulkanCommandContext;

/// Handles of an existing Vulkan context the backend renders with.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanBackendInfo<'a> {
    #[derivative(Debug = "ignore")]
    pub entry: &'a ash::Entry,
    #[derivative(Debug = "ignore")]
    pub instance: &'a ash::Instance,
    #[derivative(Debug = "ignore")]
    pub device: &'a ash::Device,
    pub physical_device: vk::PhysicalDevice,
    /// Queue used for submission and presentation. It must support graphics and present to `surface`.
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub surface: vk::SurfaceKHR,
    /// Initial swapchain extent. Ignored if the surface reports its own extent.
    pub extent: vk::Extent2D,
    pub frames_in_flight: usize,
    /// Preferred present mode, falls back to `FIFO` if unsupported.
    pub present_mode: vk::PresentModeKHR,
    /// Record debug labels through this extension, if set.
    #[derivative(Debug = "ignore")]
    pub debug_utils: Option<DebugUtils>,
}

/// Command buffer with its pool and a fence signaled when its last submission finished.
#[derive(Debug)]
struct CommandSlot {
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

/// Information stored for each in-flight frame.
#[derive(Debug)]
struct PerFrame {
    commands: CommandSlot,
    /// Signaled by the GPU when a swapchain image is ready.
    image_ready: vk::Semaphore,
    /// Signaled by the GPU when all commands for a frame have been processed.
    /// We wait on this before presenting.
    gpu_finished: vk::Semaphore,
}

#[derive(Debug)]
struct Swapchain {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

/// Renders to a swapchain on a real device.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanBackend {
    #[derivative(Debug = "ignore")]
    device: ash::Device,
    queue: vk::Queue,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    present_mode: vk::PresentModeKHR,
    #[derivative(Debug = "ignore")]
    surface_fns: khr::Surface,
    #[derivative(Debug = "ignore")]
    swapchain_fns: khr::Swapchain,
    #[derivative(Debug = "ignore")]
    debug_utils: Option<DebugUtils>,
    swapchain: Swapchain,
    per_frame: Vec<PerFrame>,
    immediate: CommandSlot,
    allocator: VulkanAllocator,
}

fn create_command_slot(device: &ash::Device, queue_family: u32, signaled: bool) -> Result<CommandSlot> {
    let pool_info = vk::CommandPoolCreateInfo {
        flags: vk::CommandPoolCreateFlags::TRANSIENT,
        queue_family_index: queue_family,
        ..Default::default()
    };
    let pool = unsafe { device.create_command_pool(&pool_info, None).map_err(Error::from)? };
    let alloc_info = vk::CommandBufferAllocateInfo {
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: 1,
        ..Default::default()
    };
    let cmd = unsafe { device.allocate_command_buffers(&alloc_info).map_err(Error::from)? }
        .first()
        .copied()
        .ok_or(Error::Uncategorized("Command buffer allocation returned no buffers"))?;
    let fence_info = vk::FenceCreateInfo {
        flags: if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() },
        ..Default::default()
    };
    let fence = unsafe { device.create_fence(&fence_info, None).map_err(Error::from)? };
    Ok(CommandSlot {
        pool,
        cmd,
        fence,
    })
}

fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let info = vk::SemaphoreCreateInfo::default();
    Ok(unsafe { device.create_semaphore(&info, None).map_err(Error::from)? })
}

fn to_nanos(timeout: Duration) -> u64 {
    timeout.as_nanos().min(u64::MAX as u128) as u64
}

impl VulkanBackend {
    /// Create the backend. This creates a swapchain over `info.surface`.
    pub fn new(info: VulkanBackendInfo) -> Result<Self> {
        let device = info.device.clone();
        let surface_fns = khr::Surface::new(info.entry, info.instance);
        let swapchain_fns = khr::Swapchain::new(info.instance, info.device);
        let allocator = VulkanAllocator::new(info.instance, info.device, info.physical_device)?;

        let present_modes = unsafe {
            surface_fns
                .get_physical_device_surface_present_modes(info.physical_device, info.surface)
                .map_err(Error::from)?
        };
        // FIFO is guaranteed to be supported
        let present_mode = if present_modes.contains(&info.present_mode) {
            info.present_mode
        } else {
            vk::PresentModeKHR::FIFO
        };

        let per_frame = (0..info.frames_in_flight.max(1))
            .map(|_| -> Result<PerFrame> {
                Ok(PerFrame {
                    commands: create_command_slot(&device, info.queue_family, true)?,
                    image_ready: create_semaphore(&device)?,
                    gpu_finished: create_semaphore(&device)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let immediate = create_command_slot(&device, info.queue_family, false)?;

        let mut backend = Self {
            device,
            queue: info.queue,
            physical_device: info.physical_device,
            surface: info.surface,
            present_mode,
            surface_fns,
            swapchain_fns,
            debug_utils: info.debug_utils,
            swapchain: Swapchain {
                handle: vk::SwapchainKHR::null(),
                images: Vec::new(),
                format: vk::SurfaceFormatKHR::default(),
                extent: info.extent,
            },
            per_frame,
            immediate,
            allocator,
        };
        backend.swapchain = backend.create_swapchain(info.extent, vk::SwapchainKHR::null())?;
        info!(
            "Created swapchain with {} images at {}x{}",
            backend.swapchain.images.len(),
            backend.swapchain.extent.width,
            backend.swapchain.extent.height
        );
        Ok(backend)
    }

    /// Access to the allocator, for passes that need their own images or buffers.
    pub fn allocator(&mut self) -> &mut VulkanAllocator {
        &mut self.allocator
    }

    fn choose_surface_format(&self) -> Result<vk::SurfaceFormatKHR> {
        // If this format is not available, we fall back to the first available format.
        const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let formats = unsafe {
            self.surface_fns
                .get_physical_device_surface_formats(self.physical_device, self.surface)
                .map_err(Error::from)?
        };
        if formats.contains(&PREFERRED_FORMAT) {
            return Ok(PREFERRED_FORMAT);
        }
        formats
            .first()
            .copied()
            .ok_or_else(|| anyhow::Error::from(Error::NoSurfaceFormat))
    }

    fn create_swapchain(&self, requested: vk::Extent2D, old: vk::SwapchainKHR) -> Result<Swapchain> {
        let capabilities = unsafe {
            self.surface_fns
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(Error::from)?
        };
        let format = self.choose_surface_format()?;
        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: requested
                    .width
                    .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                height: requested
                    .height
                    .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
            }
        };
        let image_count = {
            let count = capabilities.min_image_count + 1;
            // If a maximum is set, clamp to it
            if capabilities.max_image_count != 0 {
                count.min(capabilities.max_image_count)
            } else {
                count
            }
        };

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .present_mode(self.present_mode)
            .min_image_count(image_count)
            .clipped(true)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .old_swapchain(old)
            .build();

        let handle = unsafe { self.swapchain_fns.create_swapchain(&info, None).map_err(Error::from)? };
        let images = unsafe { self.swapchain_fns.get_swapchain_images(handle).map_err(Error::from)? };
        Ok(Swapchain {
            handle,
            images,
            format,
            extent,
        })
    }

    fn surface_image(&self, index: u32) -> Result<SurfaceImage> {
        let image = self
            .swapchain
            .images
            .get(index as usize)
            .copied()
            .ok_or(Error::Uncategorized("Swapchain returned an invalid image index"))?;
        Ok(SurfaceImage {
            index,
            handle: BackingHandle::Image {
                image,
                view: vk::ImageView::null(),
                format: self.swapchain.format.format,
                extent: vk::Extent3D {
                    width: self.swapchain.extent.width,
                    height: self.swapchain.extent.height,
                    depth: 1,
                },
                aspect: vk::ImageAspectFlags::COLOR,
            },
        })
    }

    fn record_slot(
        device: &ash::Device,
        debug: Option<&DebugUtils>,
        slot: &CommandSlot,
        f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>,
    ) -> Result<()> {
        unsafe {
            device
                .reset_command_pool(slot.pool, vk::CommandPoolResetFlags::empty())
                .map_err(Error::from)?;
            let begin = vk::CommandBufferBeginInfo {
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            device.begin_command_buffer(slot.cmd, &begin).map_err(Error::from)?;
        }
        let mut ctx = VulkanCommandContext::new(device, debug, slot.cmd);
        f(&mut ctx)?;
        unsafe { device.end_command_buffer(slot.cmd).map_err(Error::from)? };
        Ok(())
    }

    fn frame(&self, frame: usize) -> Result<&PerFrame> {
        self.per_frame
            .get(frame % self.per_frame.len().max(1))
            .ok_or_else(|| anyhow::Error::from(Error::Uncategorized("No per-frame data")))
    }
}

impl ResourceAllocator for VulkanBackend {
    fn create_image(&mut self, name: &str, description: &ImageDescription, extent: vk::Extent3D) -> Result<BackingHandle> {
        self.allocator.create_image(name, description, extent)
    }

    fn create_buffer(&mut self, name: &str, description: &BufferDescription) -> Result<BackingHandle> {
        self.allocator.create_buffer(name, description)
    }

    fn destroy(&mut self, handle: BackingHandle) -> Result<()> {
        self.allocator.destroy(handle)
    }
}

impl PresentBackend for VulkanBackend {
    fn surface_extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    fn wait_for_frame(&mut self, frame: usize, timeout: Duration) -> Result<()> {
        let fence = self.frame(frame)?.commands.fence;
        // A timeout is converted to `Error::DeviceTimeout`.
        unsafe {
            self.device
                .wait_for_fences(std::slice::from_ref(&fence), true, to_nanos(timeout))
                .map_err(Error::from)?
        };
        Ok(())
    }

    fn acquire_image(&mut self, frame: usize, timeout: Duration) -> Result<AcquiredImage> {
        let semaphore = self.frame(frame)?.image_ready;
        let result = unsafe {
            self.swapchain_fns
                .acquire_next_image(self.swapchain.handle, to_nanos(timeout), semaphore, vk::Fence::null())
        };
        match result {
            // We ignore the flag for suboptimal swapchain images for now
            Ok((index, _)) => Ok(AcquiredImage::Ready(self.surface_image(index)?)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(err) => Err(Error::from(err).into()),
        }
    }

    fn record_frame(&mut self, frame: usize, f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>) -> Result<()> {
        let slot = &self.frame(frame)?.commands;
        Self::record_slot(&self.device, self.debug_utils.as_ref(), slot, f)
    }

    fn submit_and_present(&mut self, frame: usize, image: &SurfaceImage) -> Result<PresentResult> {
        let per_frame = self.frame(frame)?;
        let wait = vk::SemaphoreSubmitInfo {
            semaphore: per_frame.image_ready,
            stage_mask: vk::PipelineStageFlags2::TRANSFER | vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            ..Default::default()
        };
        let signal = vk::SemaphoreSubmitInfo {
            semaphore: per_frame.gpu_finished,
            stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
            ..Default::default()
        };
        let cmd = vk::CommandBufferSubmitInfo {
            command_buffer: per_frame.commands.cmd,
            ..Default::default()
        };
        let submit = vk::SubmitInfo2 {
            wait_semaphore_info_count: 1,
            p_wait_semaphore_infos: &wait,
            command_buffer_info_count: 1,
            p_command_buffer_infos: &cmd,
            signal_semaphore_info_count: 1,
            p_signal_semaphore_infos: &signal,
            ..Default::default()
        };
        unsafe {
            self.device
                .reset_fences(std::slice::from_ref(&per_frame.commands.fence))
                .map_err(Error::from)?;
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit), per_frame.commands.fence)
                .map_err(Error::from)?;
        }

        let present = vk::PresentInfoKHR {
            wait_semaphore_count: 1,
            p_wait_semaphores: &per_frame.gpu_finished,
            swapchain_count: 1,
            p_swapchains: &self.swapchain.handle,
            p_image_indices: &image.index,
            ..Default::default()
        };
        let result = unsafe { self.swapchain_fns.queue_present(self.queue, &present) };
        match result {
            Ok(_) => Ok(PresentResult::Presented),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
            Err(err) => Err(Error::from(err).into()),
        }
    }

    fn immediate_submit(&mut self, f: &mut dyn FnMut(&mut dyn CommandContext) -> Result<()>) -> Result<()> {
        Self::record_slot(&self.device, self.debug_utils.as_ref(), &self.immediate, f)?;
        let cmd = vk::CommandBufferSubmitInfo {
            command_buffer: self.immediate.cmd,
            ..Default::default()
        };
        let submit = vk::SubmitInfo2 {
            command_buffer_info_count: 1,
            p_command_buffer_infos: &cmd,
            ..Default::default()
        };
        unsafe {
            self.device
                .reset_fences(std::slice::from_ref(&self.immediate.fence))
                .map_err(Error::from)?;
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit), self.immediate.fence)
                .map_err(Error::from)?;
            self.device
                .wait_for_fences(std::slice::from_ref(&self.immediate.fence), true, u64::MAX)
                .map_err(Error::from)?;
        }
        Ok(())
    }

    fn recreate_surface(&mut self, extent: vk::Extent2D) -> Result<vk::Extent2D> {
        self.wait_idle()?;
        let swapchain = self.create_swapchain(extent, self.swapchain.handle)?;
        let old = std::mem::replace(&mut self.swapchain, swapchain);
        unsafe { self.swapchain_fns.destroy_swapchain(old.handle, None) };
        Ok(self.swapchain.extent)
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.device.device_wait_idle().map_err(Error::from)? };
        Ok(())
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            // Nothing sensible can be done with an error here.
            let _ = self.device.device_wait_idle();
            for frame in self.per_frame.drain(..) {
                self.device.destroy_semaphore(frame.image_ready, None);
                self.device.destroy_semaphore(frame.gpu_finished, None);
                self.device.destroy_fence(frame.commands.fence, None);
                self.device.destroy_command_pool(frame.commands.pool, None);
            }
            self.device.destroy_fence(self.immediate.fence, None);
            self.device.destroy_command_pool(self.immediate.pool, None);
            self.swapchain_fns.destroy_swapchain(self.swapchain.handle, None);
        }
    }
}
