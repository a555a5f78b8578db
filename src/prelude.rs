pub use ash::vk;

pub use crate::core::app_info::*;
pub use crate::core::error::Error;

pub use crate::resource::{
    BackingHandle, BufferDescription, ExtentPolicy, ImageAspect, ImageDescription, InitialValue, PipelineStage,
    ResourceDescription, ResourceDescriptor, ResourceId, ResourceRegistry, ResourceState, ResourceType,
};

pub use crate::graph::dependency::{
    ClearPolicy, DependencyBuilder, DependencyDeclaration, ParameterBlock, ShaderStage, Usage, MAX_PARAMETER_BLOCK_SIZE,
};
pub use crate::graph::frame_graph::{DependencyEdge, FrameGraph, GraphViz, UnmatchedRead};
pub use crate::graph::pass::{EmptyPassExecutor, FnPass, PassContext, PassExecutor, PrepareContext, RenderPass};

pub use crate::command::{CommandContext, CommandRecorder, RecordedCommand};
pub use crate::sync::tracker::StateTracker;
pub use crate::sync::transition::{Transition, TransitionTarget};

pub use crate::backend::headless::HeadlessBackend;
pub use crate::backend::vulkan::{VulkanBackend, VulkanBackendInfo};
pub use crate::backend::{AcquiredImage, Backend, PresentBackend, PresentResult, ResourceAllocator, SurfaceImage};

pub use crate::wsi::frame::{EngineState, ExecutionEngine, FrameInputs, FrameReport, FrameStatus, SkipReason};
pub use crate::wsi::overlay::OverlayRenderer;
