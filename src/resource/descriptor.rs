//! Resource descriptors and the raw handles backing them.

use ash::vk;

use crate::resource::ResourceType;

/// Largest scale allowed for a surface-relative image.
pub const MAX_RELATIVE_SCALE: f32 = 16.0;

/// Whether an image holds color data or depth data. This decides which layouts and barrier aspects are used.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ImageAspect {
    /// Color image
    Color,
    /// Depth (and possibly stencil) image
    Depth,
}

impl ImageAspect {
    /// The matching Vulkan aspect flags.
    pub fn flags(&self) -> vk::ImageAspectFlags {
        match self {
            ImageAspect::Color => vk::ImageAspectFlags::COLOR,
            ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        }
    }
}

/// Sizing policy of an image.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ExtentPolicy {
    /// The image always has this extent.
    Fixed(vk::Extent3D),
    /// The image is sized relative to the render surface, and is re-created when the surface is resized.
    SurfaceRelative(f32),
}

impl ExtentPolicy {
    /// Whether this extent depends on the surface size.
    pub fn is_surface_relative(&self) -> bool {
        matches!(self, ExtentPolicy::SurfaceRelative(_))
    }

    /// Compute the actual extent for a given surface extent. Relative extents are rounded down, but never become zero.
    pub fn resolve(&self, surface: vk::Extent2D) -> vk::Extent3D {
        match *self {
            ExtentPolicy::Fixed(extent) => extent,
            ExtentPolicy::SurfaceRelative(scale) => vk::Extent3D {
                width: ((surface.width as f32 * scale).floor() as u32).max(1),
                height: ((surface.height as f32 * scale).floor() as u32).max(1),
                depth: 1,
            },
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        match *self {
            ExtentPolicy::Fixed(extent) => extent.width > 0 && extent.height > 0 && extent.depth > 0,
            ExtentPolicy::SurfaceRelative(scale) => scale > 0.0 && scale <= MAX_RELATIVE_SCALE,
        }
    }
}

/// Value an image is cleared to when its initial state is established.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum InitialValue {
    /// The image contents are left undefined.
    #[default]
    Undefined,
    /// Clear a color image to this value.
    Color([f32; 4]),
    /// Clear a depth image to these values.
    DepthStencil {
        /// Depth clear value
        depth: f32,
        /// Stencil clear value
        stencil: u32,
    },
}

/// Description of a shared image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescription {
    /// Pixel format of the image.
    pub format: vk::Format,
    /// Color or depth.
    pub aspect: ImageAspect,
    /// Sizing policy.
    pub extent: ExtentPolicy,
    /// Clear value applied once after creation.
    pub initial_value: InitialValue,
}

/// Description of a shared buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescription {
    /// Size in bytes.
    pub size: vk::DeviceSize,
    /// Usage flags the buffer is created with.
    pub usage: vk::BufferUsageFlags,
    /// Allocate one buffer per frame in flight. The current frame index selects the slot.
    pub per_frame: bool,
}

/// Kind-specific part of a [`ResourceDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDescription {
    /// An image resource
    Image(ImageDescription),
    /// A buffer resource
    Buffer(BufferDescription),
}

/// A named description of a shared GPU resource. Register it in a [`ResourceRegistry`](crate::ResourceRegistry)
/// to obtain a [`ResourceId`](crate::ResourceId).
///
/// Setters that do not apply to the resource kind are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub(crate) name: String,
    pub(crate) description: ResourceDescription,
}

impl ResourceDescriptor {
    /// Describe a color image of one pixel. Use [`ResourceDescriptor::fixed`] or [`ResourceDescriptor::relative`] to size it.
    pub fn image(name: impl Into<String>, format: vk::Format) -> Self {
        Self {
            name: name.into(),
            description: ResourceDescription::Image(ImageDescription {
                format,
                aspect: ImageAspect::Color,
                extent: ExtentPolicy::Fixed(vk::Extent3D {
                    width: 1,
                    height: 1,
                    depth: 1,
                }),
                initial_value: InitialValue::Undefined,
            }),
        }
    }

    /// Describe a buffer.
    pub fn buffer(name: impl Into<String>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            name: name.into(),
            description: ResourceDescription::Buffer(BufferDescription {
                size,
                usage,
                per_frame: false,
            }),
        }
    }

    /// Mark this image as a depth image.
    pub fn depth(mut self) -> Self {
        if let ResourceDescription::Image(image) = &mut self.description {
            image.aspect = ImageAspect::Depth;
        }
        self
    }

    /// Give this image a fixed 2D extent.
    pub fn fixed(mut self, width: u32, height: u32) -> Self {
        if let ResourceDescription::Image(image) = &mut self.description {
            image.extent = ExtentPolicy::Fixed(vk::Extent3D {
                width,
                height,
                depth: 1,
            });
        }
        self
    }

    /// Size this image relative to the render surface. The scale must lie in `(0, 16]`.
    pub fn relative(mut self, scale: f32) -> Self {
        if let ResourceDescription::Image(image) = &mut self.description {
            image.extent = ExtentPolicy::SurfaceRelative(scale);
        }
        self
    }

    /// Set the value this image is cleared to after creation.
    pub fn initial_value(mut self, value: InitialValue) -> Self {
        if let ResourceDescription::Image(image) = &mut self.description {
            image.initial_value = value;
        }
        self
    }

    /// Allocate one copy of this buffer per frame in flight.
    pub fn per_frame(mut self) -> Self {
        if let ResourceDescription::Buffer(buffer) = &mut self.description {
            buffer.per_frame = true;
        }
        self
    }

    /// Name of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the resource.
    pub fn ty(&self) -> ResourceType {
        match self.description {
            ResourceDescription::Image(_) => ResourceType::Image,
            ResourceDescription::Buffer(_) => ResourceType::Buffer,
        }
    }

    /// Kind-specific description.
    pub fn description(&self) -> &ResourceDescription {
        &self.description
    }

    /// The image description, if this is an image.
    pub fn as_image(&self) -> Option<&ImageDescription> {
        match &self.description {
            ResourceDescription::Image(image) => Some(image),
            ResourceDescription::Buffer(_) => None,
        }
    }

    /// The buffer description, if this is a buffer.
    pub fn as_buffer(&self) -> Option<&BufferDescription> {
        match &self.description {
            ResourceDescription::Buffer(buffer) => Some(buffer),
            ResourceDescription::Image(_) => None,
        }
    }

    /// Whether this resource must be re-created when the surface is resized.
    pub fn is_surface_relative(&self) -> bool {
        self.as_image().map_or(false, |image| image.extent.is_surface_relative())
    }
}

/// Raw Vulkan handles backing a resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BackingHandle {
    /// Not allocated yet.
    #[default]
    None,
    /// A Vulkan image with a view over all of it.
    Image {
        /// Raw image handle
        image: vk::Image,
        /// Image view over the whole image. May be null for images not owned by strata.
        view: vk::ImageView,
        /// Image format
        format: vk::Format,
        /// Image extent
        extent: vk::Extent3D,
        /// Aspect used for barriers and clears
        aspect: vk::ImageAspectFlags,
    },
    /// A Vulkan buffer.
    Buffer {
        /// Raw buffer handle
        buffer: vk::Buffer,
        /// Size in bytes
        size: vk::DeviceSize,
    },
}

impl BackingHandle {
    /// Whether this handle refers to an image.
    pub fn is_image(&self) -> bool {
        matches!(self, BackingHandle::Image { .. })
    }

    /// Whether this handle refers to a buffer.
    pub fn is_buffer(&self) -> bool {
        matches!(self, BackingHandle::Buffer { .. })
    }

    /// Subresource range covering every mip level and layer of an image.
    pub fn subresource_range(&self) -> Option<vk::ImageSubresourceRange> {
        match *self {
            BackingHandle::Image {
                aspect,
                ..
            } => Some(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            }),
            _ => None,
        }
    }
}
