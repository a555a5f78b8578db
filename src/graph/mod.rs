//! The frame graph system automatically orders passes and synchronizes the resources they share **within a single queue**.
//! Each pass declares the resources it reads and writes, together with the version of each resource it expects.
//! Every frame, the [`FrameGraph`](frame_graph::FrameGraph) is rebuilt from these declarations and sorted, and the
//! [`StateTracker`](crate::sync::tracker::StateTracker) inserts the transitions each pass needs.
//!
//! # Example
//!
//! A shadow pass writes a shadow map, and a lighting pass samples the version it produced.
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut registry = ResourceRegistry::new(vk::Extent2D { width: 1280, height: 720 }, 2);
//! let shadow = registry.register(ResourceDescriptor::image("shadow_map", vk::Format::D32_SFLOAT).depth())?;
//! let color = registry.register(ResourceDescriptor::image("scene_color", vk::Format::R8G8B8A8_UNORM).relative(1.0))?;
//!
//! let shadow_pass = DependencyBuilder::new()
//!     .add_image_dependency(shadow, Usage::Write, 0, ClearPolicy::Clear)?
//!     .build()?;
//! let lighting_pass = DependencyBuilder::new()
//!     .add_image_dependency(shadow, Usage::Read, 1, ClearPolicy::DontCare)?
//!     .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
//!     .build()?;
//!
//! // Declared in the "wrong" order, the graph still runs the producer first.
//! let graph = FrameGraph::build([("lighting", &lighting_pass), ("shadow", &shadow_pass)])?;
//! assert_eq!(graph.schedule_names(), ["shadow", "lighting"]);
//! # Ok(())
//! # }
//! ```

pub mod dependency;
pub mod frame_graph;
pub mod pass;
