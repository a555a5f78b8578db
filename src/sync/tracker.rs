//! The state tracker brings resources into the state a pass declared, right before the pass executes.
//!
//! For every dependency of a pass, in declaration order, the tracker computes the state the usage requires,
//! records one transition from the tracked state, stores the new state, and for writes bumps the resource version.
//! Transitions are never elided, even when the tracked state already matches.

use anyhow::Result;

use crate::backend::SurfaceImage;
use crate::command::CommandContext;
use crate::graph::dependency::{DependencyDeclaration, ResourceAccess, Usage};
use crate::resource::{ImageAspect, InitialValue, PipelineStage, ResourceDescriptor, ResourceId, ResourceRegistry, ResourceState, ResourceType};
use crate::sync::transition::{Transition, TransitionTarget};
use crate::Error;

/// Computes the state a single dependency requires.
pub fn required_state(descriptor: &ResourceDescriptor, usage: Usage, declaration: &DependencyDeclaration) -> ResourceState {
    let stages = declaration.pipeline_stages();
    match descriptor.ty() {
        ResourceType::Image => {
            let aspect = descriptor
                .as_image()
                .map_or(ImageAspect::Color, |image| image.aspect);
            image_state(aspect, usage, stages, PassKind::of(declaration))
        }
        ResourceType::Buffer => match usage {
            Usage::Read | Usage::DepthStencilRead => ResourceState::buffer_read(stages),
            Usage::Write => ResourceState::buffer_write(stages),
            Usage::Combined => ResourceState::buffer_read_write(stages),
        },
    }
}

/// How a pass touches color images it writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PassKind {
    /// Render targets, bound as attachments.
    Graphics,
    /// Storage images in `GENERAL`, for compute and ray tracing.
    Storage,
    /// Copy and blit destinations.
    Transfer,
}

impl PassKind {
    fn of(declaration: &DependencyDeclaration) -> Self {
        if declaration.is_transfer() {
            PassKind::Transfer
        } else if declaration.is_graphics() {
            PassKind::Graphics
        } else {
            PassKind::Storage
        }
    }
}

fn image_state(aspect: ImageAspect, usage: Usage, stages: PipelineStage, kind: PassKind) -> ResourceState {
    match (aspect, usage) {
        (ImageAspect::Color, Usage::Read) if kind == PassKind::Transfer => ResourceState::TRANSFER_SRC,
        (ImageAspect::Color, Usage::Read) => ResourceState::shader_read(stages),
        (ImageAspect::Depth, Usage::Read) => ResourceState::depth_read(stages),
        (ImageAspect::Color, Usage::Write) => match kind {
            PassKind::Graphics => ResourceState::COLOR_ATTACHMENT_WRITE,
            PassKind::Storage => ResourceState::storage_write(stages),
            PassKind::Transfer => ResourceState::TRANSFER_DST,
        },
        (ImageAspect::Depth, Usage::Write) => ResourceState::DEPTH_ATTACHMENT_WRITE,
        (ImageAspect::Color, Usage::Combined) => ResourceState::storage_read_write(stages),
        (ImageAspect::Depth, Usage::Combined) => ResourceState::DEPTH_ATTACHMENT_READ_WRITE,
        (_, Usage::DepthStencilRead) => ResourceState::DEPTH_ATTACHMENT_READ_WRITE,
    }
}

/// Issues transitions and maintains the version counters of the registry.
#[derive(Debug, Default)]
pub struct StateTracker {
    issued: u64,
}

impl StateTracker {
    /// Create a new state tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of transitions issued by this tracker.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    fn issue(&mut self, transition: Transition, cmd: &mut dyn CommandContext) -> Result<()> {
        trace!(
            "Transition {:?}: {:?} => {:?}",
            transition.target,
            transition.src.layout,
            transition.dst.layout
        );
        cmd.transition(&transition)?;
        self.issued += 1;
        Ok(())
    }

    /// Move a registry resource to `state`, regardless of its tracked state. Does not touch the version.
    pub fn transition_resource(
        &mut self,
        registry: &mut ResourceRegistry,
        id: ResourceId,
        state: ResourceState,
        frame: usize,
        cmd: &mut dyn CommandContext,
    ) -> Result<()> {
        let transition = Transition {
            target: TransitionTarget::Resource(id),
            handle: registry.backing(id, frame)?,
            src: registry.state(id)?,
            dst: state,
        };
        self.issue(transition, cmd)?;
        registry.set_state(id, state)
    }

    /// Move a presentable surface image between two states. Surface images are not tracked by the registry.
    pub fn transition_surface(
        &mut self,
        image: &SurfaceImage,
        src: ResourceState,
        dst: ResourceState,
        cmd: &mut dyn CommandContext,
    ) -> Result<()> {
        let transition = Transition {
            target: TransitionTarget::Surface(image.index),
            handle: image.handle,
            src,
            dst,
        };
        self.issue(transition, cmd)
    }

    fn apply(
        &mut self,
        registry: &mut ResourceRegistry,
        declaration: &DependencyDeclaration,
        access: ResourceAccess,
        frame: usize,
        cmd: &mut dyn CommandContext,
    ) -> Result<()> {
        let descriptor = registry.resolve(access.resource)?;
        if descriptor.ty() != access.ty {
            return Err(Error::ResourceKindMismatch {
                resource: descriptor.name().to_owned(),
                expected: access.ty,
            }
            .into());
        }
        let target = required_state(descriptor, access.usage, declaration);
        self.transition_resource(registry, access.resource, target, frame, cmd)?;
        if access.usage.produces_version() {
            let version = registry.bump_version(access.resource)?;
            trace!("{} is now at version {}", registry.name(access.resource), version);
        }
        Ok(())
    }

    /// Issue the transitions for every dependency of a pass, then bump the version of everything it writes.
    /// Returns the number of transitions issued.
    pub fn prepare_pass(
        &mut self,
        declaration: &DependencyDeclaration,
        registry: &mut ResourceRegistry,
        frame: usize,
        cmd: &mut dyn CommandContext,
    ) -> Result<usize> {
        let mut count = 0;
        for access in declaration.accesses() {
            self.apply(registry, declaration, access, frame, cmd)?;
            count += 1;
        }
        Ok(count)
    }

    /// Establish the initial state of freshly allocated resources. Images are moved from an undefined layout to
    /// `TRANSFER_DST_OPTIMAL` and cleared if they carry an [`InitialValue`]. Buffers are left untouched.
    pub fn initialize(&mut self, registry: &mut ResourceRegistry, ids: &[ResourceId], cmd: &mut dyn CommandContext) -> Result<()> {
        for &id in ids {
            let descriptor = registry.resolve(id)?;
            let Some(image) = descriptor.as_image() else {
                registry.set_state(id, ResourceState::UNDEFINED)?;
                continue;
            };
            let initial_value = image.initial_value;
            registry.set_state(id, ResourceState::UNDEFINED)?;
            self.transition_resource(registry, id, ResourceState::TRANSFER_DST, 0, cmd)?;
            if initial_value != InitialValue::Undefined {
                cmd.clear_image(&registry.backing(id, 0)?, &initial_value)?;
            }
        }
        Ok(())
    }
}
