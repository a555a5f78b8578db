//! Tracked access state of a resource.

use ash::vk;

/// Pipeline stage flags used throughout strata.
pub type PipelineStage = vk::PipelineStageFlags2;

/// The last known way a resource was accessed: the pipeline stage, the access mask and, for images, the layout.
/// A [`Transition`](crate::sync::transition::Transition) moves a resource from one state to another.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceState {
    /// Pipeline stage of the access
    pub stage: PipelineStage,
    /// Memory access mask
    pub access: vk::AccessFlags2,
    /// Image layout. Always [`vk::ImageLayout::UNDEFINED`] for buffers.
    pub layout: vk::ImageLayout,
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl ResourceState {
    /// State of a resource that was never used. Its contents may be discarded.
    pub const UNDEFINED: Self = Self::new(PipelineStage::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// Destination of a clear, copy or blit.
    pub const TRANSFER_DST: Self = Self::new(
        PipelineStage::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    /// Source of a copy or blit.
    pub const TRANSFER_SRC: Self = Self::new(
        PipelineStage::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    /// Written as a color attachment.
    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        PipelineStage::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// Written as a depth attachment.
    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::new(
        PipelineStage::from_raw(
            PipelineStage::EARLY_FRAGMENT_TESTS.as_raw() | PipelineStage::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// Bound as a depth attachment that is both tested against and written.
    pub const DEPTH_ATTACHMENT_READ_WRITE: Self = Self::new(
        PipelineStage::from_raw(
            PipelineStage::EARLY_FRAGMENT_TESTS.as_raw() | PipelineStage::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw() | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// Ready to be presented.
    pub const PRESENT: Self = Self::new(PipelineStage::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    /// Create a new resource state.
    pub const fn new(stage: PipelineStage, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self {
            stage,
            access,
            layout,
        }
    }

    /// Sampled read of a color image in the given stages.
    pub fn shader_read(stage: PipelineStage) -> Self {
        Self::new(stage, vk::AccessFlags2::SHADER_SAMPLED_READ, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    }

    /// Sampled read of a depth image in the given stages.
    pub fn depth_read(stage: PipelineStage) -> Self {
        Self::new(
            stage,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        )
    }

    /// Storage image write in the given stages.
    pub fn storage_write(stage: PipelineStage) -> Self {
        Self::new(stage, vk::AccessFlags2::SHADER_STORAGE_WRITE, vk::ImageLayout::GENERAL)
    }

    /// Storage image read and write in the given stages.
    pub fn storage_read_write(stage: PipelineStage) -> Self {
        Self::new(
            stage,
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            vk::ImageLayout::GENERAL,
        )
    }

    /// Buffer read through a storage or uniform binding.
    pub fn buffer_read(stage: PipelineStage) -> Self {
        Self::new(
            stage,
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::UNIFORM_READ,
            vk::ImageLayout::UNDEFINED,
        )
    }

    /// Buffer written through a storage binding.
    pub fn buffer_write(stage: PipelineStage) -> Self {
        Self::new(stage, vk::AccessFlags2::SHADER_STORAGE_WRITE, vk::ImageLayout::UNDEFINED)
    }

    /// Buffer read and written through a storage binding.
    pub fn buffer_read_write(stage: PipelineStage) -> Self {
        Self::new(
            stage,
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            vk::ImageLayout::UNDEFINED,
        )
    }

    /// Whether this state allows writes.
    pub fn is_write(&self) -> bool {
        self.access.intersects(
            vk::AccessFlags2::SHADER_STORAGE_WRITE
                | vk::AccessFlags2::SHADER_WRITE
                | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
                | vk::AccessFlags2::TRANSFER_WRITE,
        )
    }
}
