//! Resource allocator based on the [`gpu_allocator`] crate.

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan as vk_alloc;
use gpu_allocator::vulkan::AllocationScheme;
use gpu_allocator::MemoryLocation;

use crate::backend::ResourceAllocator;
use crate::resource::{BackingHandle, BufferDescription, ImageAspect, ImageDescription};
use crate::Error;

/// Creates images and buffers and binds them to memory from a `gpu_allocator` allocator.
/// Every allocation is keyed by the raw handle it backs, so it can be freed from the handle alone.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanAllocator {
    #[derivative(Debug = "ignore")]
    device: ash::Device,
    #[derivative(Debug = "ignore")]
    alloc: vk_alloc::Allocator,
    #[derivative(Debug = "ignore")]
    allocations: HashMap<u64, vk_alloc::Allocation>,
}

fn supports_storage(format: vk::Format) -> bool {
    !matches!(
        format,
        vk::Format::R8G8B8A8_SRGB | vk::Format::B8G8R8A8_SRGB | vk::Format::A8B8G8R8_SRGB_PACK32 | vk::Format::R8G8B8_SRGB
    )
}

fn image_usage(description: &ImageDescription) -> vk::ImageUsageFlags {
    let transfer = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED;
    match description.aspect {
        ImageAspect::Depth => transfer | vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        ImageAspect::Color if supports_storage(description.format) => {
            transfer | vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE
        }
        ImageAspect::Color => transfer | vk::ImageUsageFlags::COLOR_ATTACHMENT,
    }
}

impl VulkanAllocator {
    /// Create a new allocator.
    /// # Errors
    /// * May fail if creating the internal `gpu_allocator` fails.
    pub fn new(instance: &ash::Instance, device: &ash::Device, physical_device: vk::PhysicalDevice) -> Result<Self> {
        let alloc = vk_alloc::Allocator::new(&vk_alloc::AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
        })
        .map_err(Error::from)?;
        Ok(Self {
            device: device.clone(),
            alloc,
            allocations: HashMap::new(),
        })
    }

    fn allocate(&mut self, name: &str, requirements: vk::MemoryRequirements, location: MemoryLocation) -> Result<vk_alloc::Allocation> {
        let allocation = self
            .alloc
            .allocate(&vk_alloc::AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(Error::from)?;
        Ok(allocation)
    }

    fn free(&mut self, key: u64) -> Result<()> {
        if let Some(allocation) = self.allocations.remove(&key) {
            self.alloc.free(allocation).map_err(Error::from)?;
        }
        Ok(())
    }
}

impl ResourceAllocator for VulkanAllocator {
    fn create_image(&mut self, name: &str, description: &ImageDescription, extent: vk::Extent3D) -> Result<BackingHandle> {
        let info = vk::ImageCreateInfo {
            image_type: vk::ImageType::TYPE_2D,
            format: description.format,
            extent,
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: image_usage(description),
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { self.device.create_image(&info, None).map_err(Error::from)? };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self.allocate(name, requirements, MemoryLocation::GpuOnly)?;
        unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(Error::from)?;
        }
        self.allocations.insert(image.as_raw(), allocation);

        let aspect = description.aspect.flags();
        let view_info = vk::ImageViewCreateInfo {
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: description.format,
            components: vk::ComponentMapping::default(),
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        let view = unsafe { self.device.create_image_view(&view_info, None).map_err(Error::from)? };

        #[cfg(feature = "log-objects")]
        trace!("Created new VkImage {:p} for `{}`", image, name);
        Ok(BackingHandle::Image {
            image,
            view,
            format: description.format,
            extent,
            aspect,
        })
    }

    fn create_buffer(&mut self, name: &str, description: &BufferDescription) -> Result<BackingHandle> {
        let info = vk::BufferCreateInfo {
            size: description.size,
            usage: description.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = unsafe { self.device.create_buffer(&info, None).map_err(Error::from)? };
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let location = if description.usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER) {
            MemoryLocation::CpuToGpu
        } else {
            MemoryLocation::GpuOnly
        };
        let allocation = self.allocate(name, requirements, location)?;
        unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(Error::from)?;
        }
        self.allocations.insert(buffer.as_raw(), allocation);

        #[cfg(feature = "log-objects")]
        trace!("Created new VkBuffer {:p} for `{}`", buffer, name);
        Ok(BackingHandle::Buffer {
            buffer,
            size: description.size,
        })
    }

    fn destroy(&mut self, handle: BackingHandle) -> Result<()> {
        match handle {
            BackingHandle::None => {}
            BackingHandle::Image {
                image,
                view,
                ..
            } => {
                #[cfg(feature = "log-objects")]
                trace!("Destroying VkImage {:p}", image);
                unsafe {
                    self.device.destroy_image_view(view, None);
                    self.device.destroy_image(image, None);
                }
                self.free(image.as_raw())?;
            }
            BackingHandle::Buffer {
                buffer,
                ..
            } => {
                #[cfg(feature = "log-objects")]
                trace!("Destroying VkBuffer {:p}", buffer);
                unsafe { self.device.destroy_buffer(buffer, None) };
                self.free(buffer.as_raw())?;
            }
        }
        Ok(())
    }
}
