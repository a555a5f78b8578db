//! Resource state transitions, the unit of synchronization recorded before every pass.

use crate::resource::{BackingHandle, ResourceId, ResourceState};

/// What a transition acts on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransitionTarget {
    /// A resource owned by the registry.
    Resource(ResourceId),
    /// A presentable surface image, by swapchain index.
    Surface(u32),
}

/// Moves a resource from one access state to another. For images this is an image memory barrier with a layout
/// transition, for buffers a global memory barrier.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The transitioned resource
    pub target: TransitionTarget,
    /// Raw handle of the resource in the current frame
    pub handle: BackingHandle,
    /// Previously tracked state
    pub src: ResourceState,
    /// State required by the next access
    pub dst: ResourceState,
}

impl Transition {
    /// Whether this transition acts on an image.
    pub fn is_image(&self) -> bool {
        self.handle.is_image() || matches!(self.target, TransitionTarget::Surface(_))
    }

    /// Whether this transition changes a layout.
    pub fn changes_layout(&self) -> bool {
        self.is_image() && self.src.layout != self.dst.layout
    }

    /// Whether source and destination state are identical. Such transitions are still recorded,
    /// they only serve as an execution and memory dependency.
    pub fn is_redundant(&self) -> bool {
        self.src == self.dst
    }
}
