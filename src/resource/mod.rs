//! Exposes the shared GPU resources a frame graph schedules around.
//!
//! Every image or buffer that is shared between passes is described by a [`ResourceDescriptor`] and registered
//! once in the [`ResourceRegistry`]. The registry owns an arena of resource records, and hands out [`ResourceId`]
//! handles that passes use to declare their dependencies. Each record carries the resource's tracked
//! [`ResourceState`] and its current version. Both are only ever mutated by the
//! [`StateTracker`](crate::sync::tracker::StateTracker).
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut registry = ResourceRegistry::new(vk::Extent2D { width: 1920, height: 1080 }, 2);
//! let shadow = registry.register(
//!     ResourceDescriptor::image("shadow_map", vk::Format::D32_SFLOAT)
//!         .depth()
//!         .fixed(2048, 2048)
//!         .initial_value(InitialValue::DepthStencil { depth: 1.0, stencil: 0 }),
//! )?;
//! let color = registry.register(
//!     ResourceDescriptor::image("scene_color", vk::Format::R16G16B16A16_SFLOAT).relative(0.5),
//! )?;
//! assert_eq!(registry.extent(color)?.width, 960);
//! assert_eq!(registry.version(shadow)?, 0);
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod registry;
pub mod state;

pub use descriptor::*;
pub use registry::ResourceRegistry;
pub use state::{PipelineStage, ResourceState};

/// Handle to a resource in the [`ResourceRegistry`]. This is an index into the registry's arena,
/// so it is only meaningful for the registry that created it.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    /// Index of this resource in registration order.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The kind of a registered resource.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ResourceType {
    /// A GPU image.
    Image,
    /// A GPU buffer.
    Buffer,
}
