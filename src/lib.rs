//! Frame graph scheduling and resource synchronization for Vulkan renderers.
//!
//! Strata lets a renderer be written as a list of passes. Each pass declares which shared resources it reads and
//! writes, and at which version. Every frame, strata derives the dependencies between passes from these declarations,
//! sorts them, brings each resource into the state a pass needs right before it runs, and finally composites the
//! result onto the swapchain.
//!
//! To get started, import the prelude
//! ```
//! use strata::prelude::*;
//! ```
//!
//! # Example
//!
//! An [`ExecutionEngine`](crate::ExecutionEngine) is created from [`EngineSettings`](crate::EngineSettings) and a
//! backend. The [`HeadlessBackend`](crate::HeadlessBackend) used here records commands in memory, a real application
//! would use a [`VulkanBackend`](crate::VulkanBackend).
//! ```
//! use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let settings = EngineBuilder::new()
//!     .name("strata demo")
//!     .frames_in_flight(2)
//!     .surface_extent(1280, 720)
//!     .composite_source("scene_color")
//!     .build();
//! let mut engine = ExecutionEngine::new(settings, HeadlessBackend::new(vk::Extent2D { width: 1280, height: 720 }))?;
//! # let _ = &mut engine;
//! # Ok(())
//! # }
//! ```
//! Resources are registered once, before initialization.
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! # let settings = EngineBuilder::new().surface_extent(1280, 720).composite_source("scene_color").build();
//! # let mut engine = ExecutionEngine::new(settings, HeadlessBackend::new(vk::Extent2D { width: 1280, height: 720 }))?;
//! let shadow = engine.register_resource(
//!     ResourceDescriptor::image("shadow_map", vk::Format::D32_SFLOAT)
//!         .depth()
//!         .fixed(2048, 2048)
//!         .initial_value(InitialValue::DepthStencil { depth: 1.0, stencil: 0 }),
//! )?;
//! let color = engine.register_resource(
//!     ResourceDescriptor::image("scene_color", vk::Format::R16G16B16A16_SFLOAT).relative(1.0),
//! )?;
//! # let _ = (shadow, color);
//! # Ok(())
//! # }
//! ```
//! Passes declare their dependencies. The lighting pass reads version 1 of the shadow map, which is the version the
//! shadow pass produces, so the shadow pass always runs first.
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! # let settings = EngineBuilder::new().surface_extent(1280, 720).composite_source("scene_color").build();
//! # let mut engine = ExecutionEngine::new(settings, HeadlessBackend::new(vk::Extent2D { width: 1280, height: 720 }))?;
//! # let shadow = engine.register_resource(ResourceDescriptor::image("shadow_map", vk::Format::D32_SFLOAT).depth().fixed(2048, 2048))?;
//! # let color = engine.register_resource(ResourceDescriptor::image("scene_color", vk::Format::R16G16B16A16_SFLOAT).relative(1.0))?;
//! engine.add_pass(FnPass::new(
//!     "shadow",
//!     DependencyBuilder::new()
//!         .add_image_dependency(shadow, Usage::Write, 0, ClearPolicy::Clear)?
//!         .add_shader(ShaderStage::Vertex, "shaders/shadow.vert")
//!         .build()?,
//!     |cmd, _ctx| cmd.insert_label("draw shadow casters"),
//! ))?;
//! engine.add_pass(FnPass::new(
//!     "lighting",
//!     DependencyBuilder::new()
//!         .add_image_dependency(shadow, Usage::Read, 1, ClearPolicy::DontCare)?
//!         .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
//!         .add_shader(ShaderStage::Vertex, "shaders/fullscreen.vert")
//!         .add_shader(ShaderStage::Fragment, "shaders/lighting.frag")
//!         .build()?,
//!     |cmd, _ctx| cmd.insert_label("shade"),
//! ))?;
//! engine.initialize()?;
//!
//! let status = engine.render_frame(&FrameInputs::new(vk::Extent2D { width: 1280, height: 720 }))?;
//! assert_eq!(status.report().map(|report| report.executed.clone()), Some(vec!["shadow".to_owned(), "lighting".to_owned()]));
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```
//! For further documentation, check out the following modules
//! - [`resource`] for resource descriptors and the registry.
//! - [`graph`] for dependency declarations, passes and the frame graph.
//! - [`sync`] for the state tracker and transitions.
//! - [`wsi`] for the execution engine and the frame loop.
//! - [`backend`] for the Vulkan and headless backends.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod backend;
pub mod command;
pub mod core;
pub mod graph;
pub mod resource;
pub mod sync;
pub mod wsi;
