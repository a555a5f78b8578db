//! Exposes the strata error type

use std::ffi::NulError;

use ash;
use gpu_allocator::AllocationError;
use thiserror::Error;

use crate::graph::dependency::{ShaderStage, Usage};
use crate::resource::ResourceType;

/// Error type that strata can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Could not convert rust string to C-String because it has null bytes
    #[error("Invalid C string")]
    InvalidString(NulError),
    /// No supported surface formats found.
    #[error("No supported surface formats found.")]
    NoSurfaceFormat,
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(ash::vk::Result),
    /// Vulkan allocation error.
    #[error("Vulkan allocation error: `{0}`")]
    AllocationError(AllocationError),
    /// The frame graph contains a cycle and is impossible to schedule. Holds the names of the passes
    /// that could not be scheduled.
    #[error("Frame graph contains a cycle between passes {0:?}")]
    GraphHasCycle(Vec<String>),
    /// Two passes were added under the same name.
    #[error("A pass named `{0}` is already added.")]
    DuplicatePass(String),
    /// Parameters were supplied for a pass that does not exist.
    #[error("No pass named `{0}`.")]
    UnknownPass(String),
    /// A resource was referenced that was never registered.
    #[error("Resource `{0}` is not registered.")]
    UnknownResource(String),
    /// Two resources were registered under the same name.
    #[error("A resource named `{0}` is already registered.")]
    DuplicateResource(String),
    /// An image dependency was declared on a buffer, or the other way around.
    #[error("Resource `{resource}` was used as {expected:?}, but is registered as something else.")]
    ResourceKindMismatch {
        /// Name of the offending resource.
        resource: String,
        /// The kind of resource the dependency expected.
        expected: ResourceType,
    },
    /// A pass declared the same resource more than once. Use [`Usage::Combined`] for read-modify-write access.
    #[error("Resource `{0}` is declared more than once in the same pass.")]
    DuplicateDependency(String),
    /// The usage is not valid for this resource.
    #[error("Usage {usage:?} is not allowed on resource `{resource}`.")]
    InvalidUsage {
        /// Name of the offending resource.
        resource: String,
        /// The declared usage.
        usage: Usage,
    },
    /// The shader set of a pass is missing a stage required by its pipeline shape.
    #[error("Pipeline requires a {0:?} shader stage, but none was declared.")]
    MissingShaderStage(ShaderStage),
    /// Compute stages were mixed with graphics or ray tracing stages in one pass.
    #[error("A pass cannot mix compute shaders with graphics or ray tracing shaders.")]
    MixedPipelineShape,
    /// Parameter block size is zero, not a multiple of four, or too large.
    #[error("Invalid parameter block size `{0}`.")]
    InvalidParameterBlock(u32),
    /// Per-frame parameters do not fit in the parameter block of a pass.
    #[error("Parameters for pass `{pass}` are {size} bytes, but its parameter block holds {capacity} bytes.")]
    ParameterBlockOverflow {
        /// Name of the pass.
        pass: String,
        /// Size of the supplied parameters.
        size: usize,
        /// Size of the declared parameter block.
        capacity: u32,
    },
    /// Parameters were supplied for a pass that did not declare a parameter block.
    #[error("Parameters supplied for pass `{0}`, which has no parameter block.")]
    NoParameterBlock(String),
    /// Invalid extent policy.
    #[error("Invalid extent for resource `{0}`.")]
    InvalidExtent(String),
    /// The version counter of a resource cannot be incremented any further.
    #[error("Version of resource `{0}` overflowed.")]
    VersionOverflow(String),
    /// Waiting on the device took longer than the configured timeout.
    #[error("Timed out waiting for the device.")]
    DeviceTimeout,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl Error {
    /// Whether this error is an authoring mistake in the pass or resource setup, as opposed to a device failure.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::GraphHasCycle(_)
                | Error::DuplicatePass(_)
                | Error::UnknownPass(_)
                | Error::UnknownResource(_)
                | Error::DuplicateResource(_)
                | Error::ResourceKindMismatch { .. }
                | Error::DuplicateDependency(_)
                | Error::InvalidUsage { .. }
                | Error::MissingShaderStage(_)
                | Error::MixedPipelineShape
                | Error::InvalidParameterBlock(_)
                | Error::ParameterBlockOverflow { .. }
                | Error::NoParameterBlock(_)
                | Error::InvalidExtent(_)
                | Error::VersionOverflow(_)
        )
    }

    /// Whether this error was reported by the device or driver.
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::VkError(_) | Error::AllocationError(_) | Error::DeviceTimeout)
    }
}

impl From<NulError> for Error {
    fn from(value: NulError) -> Self {
        Error::InvalidString(value)
    }
}

impl From<ash::vk::Result> for Error {
    fn from(value: ash::vk::Result) -> Self {
        match value {
            ash::vk::Result::TIMEOUT => Error::DeviceTimeout,
            value => Error::VkError(value),
        }
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Error::AllocationError(value)
    }
}
