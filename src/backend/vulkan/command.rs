//! Translates command context calls to Vulkan commands.

use std::ffi::CString;

use anyhow::Result;
use ash::extensions::ext::DebugUtils;
use ash::vk;

use crate::command::CommandContext;
use crate::resource::{BackingHandle, InitialValue};
use crate::sync::transition::Transition;
use crate::Error;

/// A command context recording into a `VkCommandBuffer` in the recording state.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanCommandContext<'d> {
    #[derivative(Debug = "ignore")]
    device: &'d ash::Device,
    #[derivative(Debug = "ignore")]
    debug: Option<&'d DebugUtils>,
    handle: vk::CommandBuffer,
}

impl<'d> VulkanCommandContext<'d> {
    /// Wrap a command buffer. Debug labels are only recorded if `debug` is set.
    pub fn new(device: &'d ash::Device, debug: Option<&'d DebugUtils>, handle: vk::CommandBuffer) -> Self {
        Self {
            device,
            debug,
            handle,
        }
    }

    fn record_image_barrier(&mut self, transition: &Transition, image: vk::Image, range: vk::ImageSubresourceRange) {
        let barrier = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            p_next: std::ptr::null(),
            src_stage_mask: transition.src.stage,
            src_access_mask: transition.src.access,
            dst_stage_mask: transition.dst.stage,
            dst_access_mask: transition.dst.access,
            old_layout: transition.src.layout,
            new_layout: transition.dst.layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image,
            subresource_range: range,
        };

        let dependency = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            p_next: std::ptr::null(),
            dependency_flags: vk::DependencyFlags::BY_REGION,
            memory_barrier_count: 0,
            p_memory_barriers: std::ptr::null(),
            buffer_memory_barrier_count: 0,
            p_buffer_memory_barriers: std::ptr::null(),
            image_memory_barrier_count: 1,
            p_image_memory_barriers: &barrier,
        };

        unsafe { self.device.cmd_pipeline_barrier2(self.handle, &dependency) };
    }

    fn record_buffer_barrier(&mut self, transition: &Transition) {
        // Every driver implements buffer barriers as global memory barriers, so we record one directly.
        let barrier = vk::MemoryBarrier2 {
            s_type: vk::StructureType::MEMORY_BARRIER_2,
            p_next: std::ptr::null(),
            src_stage_mask: transition.src.stage,
            src_access_mask: transition.src.access,
            dst_stage_mask: transition.dst.stage,
            dst_access_mask: transition.dst.access,
        };

        let dependency = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            p_next: std::ptr::null(),
            dependency_flags: vk::DependencyFlags::BY_REGION,
            memory_barrier_count: 1,
            p_memory_barriers: &barrier,
            buffer_memory_barrier_count: 0,
            p_buffer_memory_barriers: std::ptr::null(),
            image_memory_barrier_count: 0,
            p_image_memory_barriers: std::ptr::null(),
        };

        unsafe { self.device.cmd_pipeline_barrier2(self.handle, &dependency) };
    }
}

impl CommandContext for VulkanCommandContext<'_> {
    fn transition(&mut self, transition: &Transition) -> Result<()> {
        match transition.handle {
            BackingHandle::Image {
                image,
                ..
            } => {
                let range = transition.handle.subresource_range().unwrap_or_default();
                self.record_image_barrier(transition, image, range)
            }
            BackingHandle::Buffer {
                ..
            } => self.record_buffer_barrier(transition),
            BackingHandle::None => {
                return Err(Error::Uncategorized("Tried to transition a resource without backing memory").into());
            }
        }
        Ok(())
    }

    fn clear_image(&mut self, target: &BackingHandle, value: &InitialValue) -> Result<()> {
        let BackingHandle::Image { image, .. } = *target else {
            return Err(Error::Uncategorized("Tried to clear something that is not an image").into());
        };
        let range = target.subresource_range().unwrap_or_default();
        match *value {
            InitialValue::Undefined => {}
            InitialValue::Color(color) => unsafe {
                self.device.cmd_clear_color_image(
                    self.handle,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &vk::ClearColorValue {
                        float32: color,
                    },
                    std::slice::from_ref(&range),
                );
            },
            InitialValue::DepthStencil {
                depth,
                stencil,
            } => unsafe {
                self.device.cmd_clear_depth_stencil_image(
                    self.handle,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &vk::ClearDepthStencilValue {
                        depth,
                        stencil,
                    },
                    std::slice::from_ref(&range),
                );
            },
        }
        Ok(())
    }

    fn blit_image(&mut self, src: &BackingHandle, dst: &BackingHandle) -> Result<()> {
        let (
            BackingHandle::Image { image: src_image, extent: src_extent, aspect: src_aspect, .. },
            BackingHandle::Image { image: dst_image, extent: dst_extent, aspect: dst_aspect, .. },
        ) = (*src, *dst) else {
            return Err(Error::Uncategorized("Blit source and destination must both be images").into());
        };

        let layers = |aspect_mask| vk::ImageSubresourceLayers {
            aspect_mask,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let corner = |extent: vk::Extent3D| vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        };
        let region = vk::ImageBlit {
            src_subresource: layers(src_aspect),
            src_offsets: [vk::Offset3D::default(), corner(src_extent)],
            dst_subresource: layers(dst_aspect),
            dst_offsets: [vk::Offset3D::default(), corner(dst_extent)],
        };
        unsafe {
            self.device.cmd_blit_image(
                self.handle,
                src_image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
                vk::Filter::LINEAR,
            );
        }
        Ok(())
    }

    fn begin_label(&mut self, name: &str) -> Result<()> {
        if let Some(debug) = self.debug {
            let name = CString::new(name)?;
            let label = vk::DebugUtilsLabelEXT {
                s_type: vk::StructureType::DEBUG_UTILS_LABEL_EXT,
                p_next: std::ptr::null(),
                p_label_name: name.as_ptr(),
                color: [1.0, 1.0, 1.0, 1.0],
            };
            unsafe { debug.cmd_begin_debug_utils_label(self.handle, &label) };
        }
        Ok(())
    }

    fn end_label(&mut self) -> Result<()> {
        if let Some(debug) = self.debug {
            unsafe { debug.cmd_end_debug_utils_label(self.handle) };
        }
        Ok(())
    }

    fn insert_label(&mut self, name: &str) -> Result<()> {
        if let Some(debug) = self.debug {
            let name = CString::new(name)?;
            let label = vk::DebugUtilsLabelEXT {
                s_type: vk::StructureType::DEBUG_UTILS_LABEL_EXT,
                p_next: std::ptr::null(),
                p_label_name: name.as_ptr(),
                color: [1.0, 1.0, 1.0, 1.0],
            };
            unsafe { debug.cmd_insert_debug_utils_label(self.handle, &label) };
        }
        Ok(())
    }

    fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }
}
