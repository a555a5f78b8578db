//! This module exposes the [`RenderPass`] trait, the unit of scheduling.
//!
//! A pass declares its dependencies once in [`RenderPass::prepare`], and then records its commands every frame in
//! [`RenderPass::execute`]. The engine guarantees every declared resource is in the declared state before `execute`
//! runs. Accessing a resource that was not declared is not detected.
//!
//! Small passes do not need their own type. [`FnPass`] wraps a declaration and a closure.
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! # let mut registry = ResourceRegistry::new(vk::Extent2D { width: 64, height: 64 }, 2);
//! # let target = registry.register(ResourceDescriptor::image("target", vk::Format::R8G8B8A8_UNORM))?;
//! let pass = FnPass::new(
//!     "clear",
//!     DependencyBuilder::new()
//!         .add_image_dependency(target, Usage::Write, 0, ClearPolicy::Clear)?
//!         .build()?,
//!     move |cmd, ctx| {
//!         let _image = ctx.backing(target)?;
//!         cmd.insert_label("clear target")
//!     },
//! );
//! assert_eq!(pass.name(), "clear");
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use ash::vk;
use bytemuck::Pod;

use crate::command::CommandContext;
use crate::graph::dependency::{DependencyBuilder, DependencyDeclaration};
use crate::resource::{BackingHandle, ResourceId, ResourceRegistry};

/// Data available to a pass while it prepares.
#[derive(Debug)]
pub struct PrepareContext<'r> {
    pub(crate) registry: &'r ResourceRegistry,
    pub(crate) frames_in_flight: usize,
}

impl<'r> PrepareContext<'r> {
    /// Create a prepare context over a registry.
    pub fn new(registry: &'r ResourceRegistry, frames_in_flight: usize) -> Self {
        Self {
            registry,
            frames_in_flight,
        }
    }

    /// Look up a resource by name.
    pub fn resource(&self, name: &str) -> Result<ResourceId> {
        self.registry.lookup(name)
    }

    /// Current version of a resource. Declaring a dependency at this version consumes whatever was in the resource
    /// when preparation happened.
    pub fn version(&self, id: ResourceId) -> Result<u32> {
        self.registry.version(id)
    }

    /// The registry this pass is being prepared against.
    pub fn registry(&self) -> &ResourceRegistry {
        self.registry
    }

    /// Number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Start a new dependency declaration.
    pub fn builder(&self) -> DependencyBuilder {
        DependencyBuilder::new()
    }
}

/// Data available to a pass while it executes.
#[derive(Debug)]
pub struct PassContext<'r> {
    pub(crate) registry: &'r ResourceRegistry,
    pub(crate) frame_index: usize,
    pub(crate) parameters: &'r [u8],
}

impl<'r> PassContext<'r> {
    /// Create a pass context.
    pub fn new(registry: &'r ResourceRegistry, frame_index: usize, parameters: &'r [u8]) -> Self {
        Self {
            registry,
            frame_index,
            parameters,
        }
    }

    /// Index of the frame in flight that is being recorded.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Current extent of the render surface.
    pub fn surface_extent(&self) -> vk::Extent2D {
        self.registry.surface_extent()
    }

    /// Raw handles of a resource for the current frame.
    pub fn backing(&self, id: ResourceId) -> Result<BackingHandle> {
        self.registry.backing(id, self.frame_index)
    }

    /// Extent of an image resource.
    pub fn extent(&self, id: ResourceId) -> Result<vk::Extent3D> {
        self.registry.extent(id)
    }

    /// Contents of the parameter block for this frame. This is zero-filled up to the declared block size.
    /// Passes without a parameter block get an empty slice.
    pub fn parameters(&self) -> &[u8] {
        self.parameters
    }

    /// Interpret the start of the parameter block as a `T`. Returns `None` if the block is too small.
    pub fn parameters_as<T: Pod>(&self) -> Option<T> {
        let size = std::mem::size_of::<T>();
        if self.parameters.len() < size {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&self.parameters[..size]))
    }
}

/// A unit of GPU work that is scheduled by the frame graph.
pub trait RenderPass {
    /// Unique, human readable name. Used for parameter lookup, debug labels and error messages.
    fn name(&self) -> &str;

    /// One-time setup. Returns the dependency declaration of this pass, which is fixed from here on.
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<DependencyDeclaration>;

    /// Record this pass. All declared resources are in their declared state.
    fn execute(&mut self, cmd: &mut dyn CommandContext, ctx: &PassContext) -> Result<()>;

    /// Release pass-owned state. Shared resources are owned by the registry and must not be released here.
    fn destroy(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Defines the body of a pass that can be called when the pass is recorded.
pub trait PassExecutor {
    /// Record this pass to a command context.
    fn execute(&mut self, cmd: &mut dyn CommandContext, ctx: &PassContext) -> Result<()>;
}

impl<F> PassExecutor for F
where
    F: FnMut(&mut dyn CommandContext, &PassContext) -> Result<()>,
{
    fn execute(&mut self, cmd: &mut dyn CommandContext, ctx: &PassContext) -> Result<()> {
        self(cmd, ctx)
    }
}

/// Pass executor that does nothing. Useful for passes that only exist to order transitions.
#[derive(Debug, Default, Copy, Clone)]
pub struct EmptyPassExecutor;

impl PassExecutor for EmptyPassExecutor {
    fn execute(&mut self, _cmd: &mut dyn CommandContext, _ctx: &PassContext) -> Result<()> {
        Ok(())
    }
}

/// A pass made from a prebuilt declaration and an executor.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FnPass<E: PassExecutor = EmptyPassExecutor> {
    name: String,
    declaration: DependencyDeclaration,
    #[derivative(Debug = "ignore")]
    executor: E,
}

impl FnPass<EmptyPassExecutor> {
    /// A pass that records nothing besides its transitions.
    pub fn empty(name: impl Into<String>, declaration: DependencyDeclaration) -> Self {
        Self {
            name: name.into(),
            declaration,
            executor: EmptyPassExecutor,
        }
    }
}

impl<F> FnPass<F>
where
    F: FnMut(&mut dyn CommandContext, &PassContext) -> Result<()>,
{
    /// Create a new pass from a closure.
    pub fn new(name: impl Into<String>, declaration: DependencyDeclaration, f: F) -> Self {
        Self {
            name: name.into(),
            declaration,
            executor: f,
        }
    }
}

impl<E: PassExecutor> RenderPass for FnPass<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, _ctx: &mut PrepareContext) -> Result<DependencyDeclaration> {
        Ok(self.declaration.clone())
    }

    fn execute(&mut self, cmd: &mut dyn CommandContext, ctx: &PassContext) -> Result<()> {
        self.executor.execute(cmd, ctx)
    }
}
