//! Dependency declarations describe which shared resources a pass touches, and how.
//!
//! A declaration is built once, in [`RenderPass::prepare`](crate::RenderPass::prepare), through a [`DependencyBuilder`].
//! Each dependency carries the version of the resource the pass expects to consume. This is usually a snapshot of the
//! resource's current version, or the version a producer earlier in the pass list will have written.
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! # let mut registry = ResourceRegistry::new(vk::Extent2D { width: 64, height: 64 }, 2);
//! # let shadow = registry.register(ResourceDescriptor::image("shadow", vk::Format::D32_SFLOAT).depth())?;
//! # let color = registry.register(ResourceDescriptor::image("color", vk::Format::R8G8B8A8_UNORM))?;
//! let lighting = DependencyBuilder::new()
//!     // Sample version 1 of the shadow map, produced by the shadow pass.
//!     .add_image_dependency(shadow, Usage::Read, 1, ClearPolicy::DontCare)?
//!     .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
//!     .set_parameter_block(16, vk::ShaderStageFlags::FRAGMENT)?
//!     .add_shader(ShaderStage::Vertex, "shaders/fullscreen.vert")
//!     .add_shader(ShaderStage::Fragment, "shaders/lighting.frag")
//!     .build()?;
//! assert_eq!(lighting.images().len(), 2);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::resource::{ImageAspect, PipelineStage, ResourceId, ResourceRegistry, ResourceType};
use crate::Error;

/// Largest parameter block a pass may declare. This matches the push constant range most desktop drivers expose.
pub const MAX_PARAMETER_BLOCK_SIZE: u32 = 256;

/// How a pass uses a resource.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Usage {
    /// The pass only reads the resource.
    Read,
    /// The pass overwrites the resource. Produces a new version.
    Write,
    /// The pass reads and writes the resource, for example an in-place blur. Produces a new version.
    Combined,
    /// Depth image bound as an attachment that is tested against and written in the same pass.
    /// Consumes a version like a read, but does not produce a new one.
    DepthStencilRead,
}

impl Usage {
    /// Whether this usage consumes a version of the resource.
    pub fn is_read(&self) -> bool {
        matches!(self, Usage::Read | Usage::Combined | Usage::DepthStencilRead)
    }

    /// Whether this usage produces a new version of the resource.
    pub fn produces_version(&self) -> bool {
        matches!(self, Usage::Write | Usage::Combined)
    }
}

/// Whether a written image should be cleared when the pass begins.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// Clear the attachment on load.
    Clear,
    /// Keep or discard the previous contents, the pass does not care.
    #[default]
    DontCare,
}

/// A programmable shader stage.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
    RayGen,
    AnyHit,
    ClosestHit,
    Miss,
    Intersection,
    Callable,
    Task,
    Mesh,
}

impl ShaderStage {
    /// The matching Vulkan shader stage bit.
    pub fn flags(&self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
            ShaderStage::RayGen => vk::ShaderStageFlags::RAYGEN_KHR,
            ShaderStage::AnyHit => vk::ShaderStageFlags::ANY_HIT_KHR,
            ShaderStage::ClosestHit => vk::ShaderStageFlags::CLOSEST_HIT_KHR,
            ShaderStage::Miss => vk::ShaderStageFlags::MISS_KHR,
            ShaderStage::Intersection => vk::ShaderStageFlags::INTERSECTION_KHR,
            ShaderStage::Callable => vk::ShaderStageFlags::CALLABLE_KHR,
            ShaderStage::Task => vk::ShaderStageFlags::TASK_NV,
            ShaderStage::Mesh => vk::ShaderStageFlags::MESH_NV,
        }
    }

    /// The pipeline stage this shader runs in.
    pub fn pipeline_stage(&self) -> PipelineStage {
        match self {
            ShaderStage::Vertex => PipelineStage::VERTEX_SHADER,
            ShaderStage::TessellationControl => PipelineStage::TESSELLATION_CONTROL_SHADER,
            ShaderStage::TessellationEvaluation => PipelineStage::TESSELLATION_EVALUATION_SHADER,
            ShaderStage::Geometry => PipelineStage::GEOMETRY_SHADER,
            ShaderStage::Fragment => PipelineStage::FRAGMENT_SHADER,
            ShaderStage::Compute => PipelineStage::COMPUTE_SHADER,
            ShaderStage::RayGen
            | ShaderStage::AnyHit
            | ShaderStage::ClosestHit
            | ShaderStage::Miss
            | ShaderStage::Intersection
            | ShaderStage::Callable => PipelineStage::RAY_TRACING_SHADER_KHR,
            ShaderStage::Task => PipelineStage::TASK_SHADER_NV,
            ShaderStage::Mesh => PipelineStage::MESH_SHADER_NV,
        }
    }

    fn is_ray_tracing(&self) -> bool {
        matches!(
            self,
            ShaderStage::RayGen
                | ShaderStage::AnyHit
                | ShaderStage::ClosestHit
                | ShaderStage::Miss
                | ShaderStage::Intersection
                | ShaderStage::Callable
        )
    }
}

/// A shader used by a pass, identified by its source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Stage this shader runs in
    pub stage: ShaderStage,
    /// Path to the shader source or binary
    pub path: String,
}

/// Push-constant-style block of per-frame parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParameterBlock {
    /// Size in bytes
    pub size: u32,
    /// Shader stages that read the block
    pub stages: vk::ShaderStageFlags,
}

/// A declared use of a shared image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageDependency {
    /// The image
    pub resource: ResourceId,
    /// How it is used
    pub usage: Usage,
    /// The version this pass expects to consume
    pub required_version: u32,
    /// Whether to clear it on load
    pub clear: ClearPolicy,
}

/// A declared use of a shared buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferDependency {
    /// The buffer
    pub resource: ResourceId,
    /// How it is used
    pub usage: Usage,
    /// The version this pass expects to consume
    pub required_version: u32,
}

/// Kind-agnostic view of a single dependency, as seen by the scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceAccess {
    /// The resource
    pub resource: ResourceId,
    /// Image or buffer
    pub ty: ResourceType,
    /// How it is used
    pub usage: Usage,
    /// The version this pass expects to consume
    pub required_version: u32,
}

/// The fixed manifest of resources a pass uses. Created through a [`DependencyBuilder`] and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyDeclaration {
    images: Vec<ImageDependency>,
    buffers: Vec<BufferDependency>,
    parameters: Option<ParameterBlock>,
    shaders: Vec<ShaderSource>,
}

impl DependencyDeclaration {
    /// A declaration without any dependencies.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Declared image dependencies, in declaration order.
    pub fn images(&self) -> &[ImageDependency] {
        &self.images
    }

    /// Declared buffer dependencies, in declaration order.
    pub fn buffers(&self) -> &[BufferDependency] {
        &self.buffers
    }

    /// The parameter block, if any.
    pub fn parameter_block(&self) -> Option<&ParameterBlock> {
        self.parameters.as_ref()
    }

    /// The shaders this pass uses.
    pub fn shaders(&self) -> &[ShaderSource] {
        &self.shaders
    }

    /// All dependencies, images first, in declaration order.
    pub fn accesses(&self) -> impl Iterator<Item = ResourceAccess> + '_ {
        let images = self.images.iter().map(|dep| ResourceAccess {
            resource: dep.resource,
            ty: ResourceType::Image,
            usage: dep.usage,
            required_version: dep.required_version,
        });
        let buffers = self.buffers.iter().map(|dep| ResourceAccess {
            resource: dep.resource,
            ty: ResourceType::Buffer,
            usage: dep.usage,
            required_version: dep.required_version,
        });
        images.chain(buffers)
    }

    /// Union of the stage bits of all declared shaders.
    pub fn shader_stages(&self) -> vk::ShaderStageFlags {
        self.shaders
            .iter()
            .fold(vk::ShaderStageFlags::empty(), |flags, shader| flags | shader.stage.flags())
    }

    /// Pipeline stages resources are accessed in. Passes without shaders, such as copy passes,
    /// report [`PipelineStage::ALL_COMMANDS`].
    pub fn pipeline_stages(&self) -> PipelineStage {
        if self.shaders.is_empty() {
            return PipelineStage::ALL_COMMANDS;
        }
        self.shaders
            .iter()
            .fold(PipelineStage::empty(), |stages, shader| stages | shader.stage.pipeline_stage())
    }

    /// Whether this pass runs a compute pipeline.
    pub fn is_compute(&self) -> bool {
        self.shaders.iter().any(|shader| shader.stage == ShaderStage::Compute)
    }

    /// Whether this pass rasterizes, i.e. declares a shader that is neither compute nor ray tracing.
    pub fn is_graphics(&self) -> bool {
        self.shaders
            .iter()
            .any(|shader| shader.stage != ShaderStage::Compute && !shader.stage.is_ray_tracing())
    }

    /// Whether this pass declares no shaders at all. Such passes only copy, blit or clear.
    pub fn is_transfer(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Check this declaration against a registry. Every resource must be registered and used as the right kind.
    /// [`Usage::DepthStencilRead`] is only valid on depth images.
    pub fn validate(&self, registry: &ResourceRegistry) -> Result<()> {
        for access in self.accesses() {
            let descriptor = registry.resolve(access.resource)?;
            if descriptor.ty() != access.ty {
                return Err(Error::ResourceKindMismatch {
                    resource: descriptor.name().to_owned(),
                    expected: access.ty,
                }
                .into());
            }
            if access.usage == Usage::DepthStencilRead {
                let is_depth = descriptor
                    .as_image()
                    .map_or(false, |image| image.aspect == ImageAspect::Depth);
                if !is_depth {
                    return Err(Error::InvalidUsage {
                        resource: descriptor.name().to_owned(),
                        usage: access.usage,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Checks that a set of shader stages forms a complete pipeline.
fn validate_pipeline_shape(shaders: &[ShaderSource]) -> Result<()> {
    let has = |stage: ShaderStage| shaders.iter().any(|shader| shader.stage == stage);
    let has_graphics = shaders
        .iter()
        .any(|shader| !shader.stage.is_ray_tracing() && shader.stage != ShaderStage::Compute);
    let has_ray_tracing = shaders.iter().any(|shader| shader.stage.is_ray_tracing());

    if has(ShaderStage::Compute) && (has_graphics || has_ray_tracing) {
        return Err(Error::MixedPipelineShape.into());
    }
    if has(ShaderStage::Fragment) && !has(ShaderStage::Vertex) && !has(ShaderStage::Mesh) {
        return Err(Error::MissingShaderStage(ShaderStage::Vertex).into());
    }
    if has(ShaderStage::Geometry) && !has(ShaderStage::Vertex) {
        return Err(Error::MissingShaderStage(ShaderStage::Vertex).into());
    }
    if has(ShaderStage::Task) && !has(ShaderStage::Mesh) {
        return Err(Error::MissingShaderStage(ShaderStage::Mesh).into());
    }
    let tess_control = has(ShaderStage::TessellationControl);
    let tess_eval = has(ShaderStage::TessellationEvaluation);
    if tess_control && !tess_eval {
        return Err(Error::MissingShaderStage(ShaderStage::TessellationEvaluation).into());
    }
    if tess_eval && !tess_control {
        return Err(Error::MissingShaderStage(ShaderStage::TessellationControl).into());
    }
    if (tess_control || tess_eval) && !has(ShaderStage::Vertex) {
        return Err(Error::MissingShaderStage(ShaderStage::Vertex).into());
    }
    if has_ray_tracing && !has(ShaderStage::RayGen) {
        return Err(Error::MissingShaderStage(ShaderStage::RayGen).into());
    }
    if has(ShaderStage::Vertex) && has(ShaderStage::Mesh) {
        return Err(Error::MixedPipelineShape.into());
    }
    Ok(())
}

/// Fluent builder for a [`DependencyDeclaration`].
#[derive(Debug, Default)]
pub struct DependencyBuilder {
    inner: DependencyDeclaration,
}

impl DependencyBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn is_declared(&self, resource: ResourceId) -> bool {
        self.inner.images.iter().any(|dep| dep.resource == resource)
            || self.inner.buffers.iter().any(|dep| dep.resource == resource)
    }

    fn check_version(resource: ResourceId, usage: Usage, required_version: u32) -> Result<()> {
        if usage.produces_version() && required_version == u32::MAX {
            return Err(Error::VersionOverflow(format!("{:?}", resource)).into());
        }
        Ok(())
    }

    /// Declare a use of an image.
    /// # Errors
    /// * Fails if this resource was already declared in this pass.
    /// * Fails if a write would produce a version past [`u32::MAX`].
    pub fn add_image_dependency(
        mut self,
        resource: ResourceId,
        usage: Usage,
        required_version: u32,
        clear: ClearPolicy,
    ) -> Result<Self> {
        if self.is_declared(resource) {
            return Err(Error::DuplicateDependency(format!("{:?}", resource)).into());
        }
        Self::check_version(resource, usage, required_version)?;
        self.inner.images.push(ImageDependency {
            resource,
            usage,
            required_version,
            clear,
        });
        Ok(self)
    }

    /// Declare a use of a buffer.
    /// # Errors
    /// * Fails if this resource was already declared in this pass.
    /// * Fails on [`Usage::DepthStencilRead`], which only applies to images.
    /// * Fails if a write would produce a version past [`u32::MAX`].
    pub fn add_buffer_dependency(mut self, resource: ResourceId, usage: Usage, required_version: u32) -> Result<Self> {
        if usage == Usage::DepthStencilRead {
            return Err(Error::InvalidUsage {
                resource: format!("{:?}", resource),
                usage,
            }
            .into());
        }
        if self.is_declared(resource) {
            return Err(Error::DuplicateDependency(format!("{:?}", resource)).into());
        }
        Self::check_version(resource, usage, required_version)?;
        self.inner.buffers.push(BufferDependency {
            resource,
            usage,
            required_version,
        });
        Ok(self)
    }

    /// Declare a parameter block of `size` bytes, read by `stages`.
    /// # Errors
    /// * Fails if the size is zero, not a multiple of four, or larger than [`MAX_PARAMETER_BLOCK_SIZE`].
    pub fn set_parameter_block(mut self, size: u32, stages: vk::ShaderStageFlags) -> Result<Self> {
        if size == 0 || size % 4 != 0 || size > MAX_PARAMETER_BLOCK_SIZE {
            return Err(Error::InvalidParameterBlock(size).into());
        }
        self.inner.parameters = Some(ParameterBlock {
            size,
            stages,
        });
        Ok(self)
    }

    /// Add a shader to the pass pipeline.
    pub fn add_shader(mut self, stage: ShaderStage, path: impl Into<String>) -> Self {
        self.inner.shaders.push(ShaderSource {
            stage,
            path: path.into(),
        });
        self
    }

    /// Finish the declaration.
    /// # Errors
    /// * Fails if the shader set does not form a valid pipeline, for example a fragment shader without a vertex or mesh shader.
    pub fn build(self) -> Result<DependencyDeclaration> {
        validate_pipeline_shape(&self.inner.shaders)?;
        Ok(self.inner)
    }
}
