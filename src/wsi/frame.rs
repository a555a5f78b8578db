//! Contains the [`ExecutionEngine`], which drives the frame loop.
//!
//! Every frame goes through the same steps:
//! 1. Handle a pending resize. Surface-relative resources are re-created and their initial state is established again.
//! 2. Rebuild the [`FrameGraph`] from the pass declarations. A cycle is reported here, before any pass executes.
//! 3. Write the per-pass parameters supplied in [`FrameInputs`] into the parameter blocks.
//! 4. Wait for the frame slot to be free and acquire a surface image. An out of date surface skips the frame and
//!    schedules a resize.
//! 5. Record every pass in schedule order, each behind the transitions its declaration requires.
//! 6. Composite the configured source image onto the surface image, let the overlay draw, and present.
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let settings = EngineBuilder::new()
//!     .name("demo")
//!     .surface_extent(640, 480)
//!     .composite_source("final_color")
//!     .build();
//! let backend = HeadlessBackend::new(vk::Extent2D { width: 640, height: 480 });
//! let mut engine = ExecutionEngine::new(settings, backend)?;
//! let color = engine.register_resource(
//!     ResourceDescriptor::image("final_color", vk::Format::R8G8B8A8_UNORM).relative(1.0),
//! )?;
//! engine.add_pass(FnPass::empty(
//!     "draw",
//!     DependencyBuilder::new()
//!         .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
//!         .build()?,
//! ))?;
//! engine.initialize()?;
//!
//! let status = engine.render_frame(&FrameInputs::new(vk::Extent2D { width: 640, height: 480 }))?;
//! assert!(status.is_presented());
//! assert_eq!(engine.registry().version(color)?, 1);
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::Pod;

use crate::backend::{AcquiredImage, Backend, PresentResult, SurfaceImage};
use crate::command::CommandContext;
use crate::core::app_info::EngineSettings;
use crate::graph::dependency::DependencyDeclaration;
use crate::graph::frame_graph::{FrameGraph, UnmatchedRead};
use crate::graph::pass::{PassContext, PrepareContext, RenderPass};
use crate::resource::{ResourceDescriptor, ResourceId, ResourceRegistry, ResourceState, ResourceType};
use crate::sync::tracker::StateTracker;
use crate::wsi::overlay::OverlayRenderer;
use crate::Error;

/// Inputs consumed by a single call to [`ExecutionEngine::render_frame`].
#[derive(Debug, Clone)]
pub struct FrameInputs {
    /// Current extent of the render surface. A change triggers a resize before the frame is recorded.
    pub surface_extent: vk::Extent2D,
    parameters: HashMap<String, Vec<u8>>,
}

impl FrameInputs {
    /// Inputs without any parameters.
    pub fn new(surface_extent: vk::Extent2D) -> Self {
        Self {
            surface_extent,
            parameters: HashMap::new(),
        }
    }

    /// Supply raw parameter bytes for a pass. They must fit in the pass's parameter block.
    pub fn with_parameters(mut self, pass: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.parameters.insert(pass.into(), bytes.into());
        self
    }

    /// Supply a plain-old-data value as parameters for a pass.
    pub fn with_pod<T: Pod>(self, pass: impl Into<String>, value: &T) -> Self {
        self.with_parameters(pass, bytemuck::bytes_of(value).to_vec())
    }

    /// Parameters supplied for a pass.
    pub fn parameters(&self, pass: &str) -> Option<&[u8]> {
        self.parameters.get(pass).map(|bytes| bytes.as_slice())
    }
}

/// Why a frame was not rendered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The surface was out of date. Surface resources are re-created before the next frame.
    SurfaceOutOfDate,
}

/// Summary of a presented frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame in flight slot that was used
    pub frame_index: usize,
    /// Names of the executed passes, in execution order
    pub executed: Vec<String>,
    /// Number of transitions recorded, including the composite step
    pub transitions: usize,
}

/// Outcome of [`ExecutionEngine::render_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was recorded, submitted and presented.
    Presented(FrameReport),
    /// Nothing was executed.
    Skipped(SkipReason),
}

impl FrameStatus {
    /// Whether the frame was presented.
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameStatus::Presented(_))
    }

    /// The frame report, if the frame was presented.
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            FrameStatus::Presented(report) => Some(report),
            FrameStatus::Skipped(_) => None,
        }
    }
}

/// Lifecycle of an engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Resources and passes can be added.
    Setup,
    /// Frames can be rendered.
    Ready,
    /// All resources were released.
    Destroyed,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct PassSlot {
    #[derivative(Debug = "ignore")]
    pass: Box<dyn RenderPass>,
    declaration: Option<DependencyDeclaration>,
    parameters: Vec<u8>,
}

/// Owns the resources and passes of a renderer, and renders frames with them.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ExecutionEngine<B: Backend> {
    settings: EngineSettings,
    #[derivative(Debug = "ignore")]
    backend: B,
    registry: ResourceRegistry,
    tracker: StateTracker,
    passes: Vec<PassSlot>,
    #[derivative(Debug = "ignore")]
    overlay: Option<Box<dyn OverlayRenderer>>,
    composite: Option<ResourceId>,
    frame_index: usize,
    frame_count: u64,
    requested_extent: vk::Extent2D,
    resize_requested: bool,
    state: EngineState,
    warned: HashSet<UnmatchedRead>,
}

fn composite_frame(
    tracker: &mut StateTracker,
    registry: &mut ResourceRegistry,
    source: Option<ResourceId>,
    overlay: &mut Option<Box<dyn OverlayRenderer>>,
    image: &SurfaceImage,
    frame: usize,
    cmd: &mut dyn CommandContext,
) -> Result<usize> {
    let before = tracker.issued();
    match source {
        Some(source) => {
            tracker.transition_resource(registry, source, ResourceState::TRANSFER_SRC, frame, cmd)?;
            tracker.transition_surface(image, ResourceState::UNDEFINED, ResourceState::TRANSFER_DST, cmd)?;
            cmd.blit_image(&registry.backing(source, frame)?, &image.handle)?;
            tracker.transition_surface(image, ResourceState::TRANSFER_DST, ResourceState::COLOR_ATTACHMENT_WRITE, cmd)?;
        }
        None => {
            tracker.transition_surface(image, ResourceState::UNDEFINED, ResourceState::COLOR_ATTACHMENT_WRITE, cmd)?;
        }
    }
    if let Some(overlay) = overlay {
        overlay.draw(cmd, image).context("Overlay renderer failed")?;
    }
    tracker.transition_surface(image, ResourceState::COLOR_ATTACHMENT_WRITE, ResourceState::PRESENT, cmd)?;
    Ok((tracker.issued() - before) as usize)
}

impl<B: Backend> ExecutionEngine<B> {
    /// Create an engine rendering through `backend`.
    /// # Errors
    /// * Fails if `settings.frames_in_flight` is zero.
    pub fn new(settings: EngineSettings, backend: B) -> Result<Self> {
        if settings.frames_in_flight == 0 {
            return Err(Error::Uncategorized("At least one frame in flight is required").into());
        }
        let registry = ResourceRegistry::new(settings.surface_extent, settings.frames_in_flight);
        Ok(Self {
            requested_extent: settings.surface_extent,
            settings,
            backend,
            registry,
            tracker: StateTracker::new(),
            passes: Vec::new(),
            overlay: None,
            composite: None,
            frame_index: 0,
            frame_count: 0,
            resize_requested: false,
            state: EngineState::Setup,
            warned: HashSet::new(),
        })
    }

    fn require_state(&self, state: EngineState, message: &'static str) -> Result<()> {
        if self.state != state {
            return Err(Error::Uncategorized(message).into());
        }
        Ok(())
    }

    /// Register a shared resource. Only allowed before [`ExecutionEngine::initialize`].
    pub fn register_resource(&mut self, descriptor: ResourceDescriptor) -> Result<ResourceId> {
        self.require_state(EngineState::Setup, "Resources can only be registered before initialization")?;
        self.registry.register(descriptor)
    }

    /// Append a pass to the pass list. Producers must be added before the first consumer of their output.
    /// Only allowed before [`ExecutionEngine::initialize`].
    pub fn add_pass(&mut self, pass: impl RenderPass + 'static) -> Result<()> {
        self.require_state(EngineState::Setup, "Passes can only be added before initialization")?;
        if self.passes.iter().any(|slot| slot.pass.name() == pass.name()) {
            return Err(Error::DuplicatePass(pass.name().to_owned()).into());
        }
        self.passes.push(PassSlot {
            pass: Box::new(pass),
            declaration: None,
            parameters: Vec::new(),
        });
        Ok(())
    }

    /// Set the renderer that draws on top of the composited image.
    pub fn set_overlay(&mut self, overlay: impl OverlayRenderer + 'static) {
        self.overlay = Some(Box::new(overlay));
    }

    /// Set the image that is blitted onto the surface each frame. Overrides
    /// [`EngineSettings::composite_source`](crate::EngineSettings::composite_source).
    pub fn set_composite_source(&mut self, id: ResourceId) -> Result<()> {
        let descriptor = self.registry.resolve(id)?;
        if descriptor.ty() != ResourceType::Image {
            return Err(Error::ResourceKindMismatch {
                resource: descriptor.name().to_owned(),
                expected: ResourceType::Image,
            }
            .into());
        }
        self.composite = Some(id);
        Ok(())
    }

    /// Allocate all resources, establish their initial state, and prepare every pass.
    /// The frame graph is built once to report cycles before the first frame.
    /// # Errors
    /// * Any configuration error in the resources or pass declarations.
    /// * Device errors while allocating or submitting the initial clears.
    pub fn initialize(&mut self) -> Result<()> {
        self.require_state(EngineState::Setup, "Engine is already initialized")?;
        if self.composite.is_none() {
            if let Some(name) = self.settings.composite_source.clone() {
                let id = self.registry.lookup(&name)?;
                self.set_composite_source(id)?;
            }
        }

        self.registry.allocate_all(&mut self.backend)?;
        let ids = self.registry.ids().collect::<Vec<_>>();
        {
            let Self {
                backend,
                registry,
                tracker,
                ..
            } = self;
            backend.immediate_submit(&mut |cmd| tracker.initialize(registry, &ids, cmd))?;
        }

        for slot in &mut self.passes {
            let name = slot.pass.name().to_owned();
            let mut ctx = PrepareContext::new(&self.registry, self.settings.frames_in_flight);
            let declaration = slot
                .pass
                .prepare(&mut ctx)
                .with_context(|| format!("Failed to prepare pass `{}`", name))?;
            declaration
                .validate(&self.registry)
                .with_context(|| format!("Invalid dependencies in pass `{}`", name))?;
            slot.parameters = vec![0; declaration.parameter_block().map_or(0, |block| block.size as usize)];
            slot.declaration = Some(declaration);
        }

        let graph = self.build_graph()?;
        info!(
            "Initialized `{}` with {} resource(s) and {} pass(es), initial order {:?}",
            self.settings.name,
            self.registry.len(),
            self.passes.len(),
            graph.schedule_names()
        );
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Build the frame graph from the current pass declarations.
    /// # Errors
    /// * [`Error::GraphHasCycle`] if the declarations form a cycle.
    pub fn build_graph(&self) -> Result<FrameGraph> {
        let passes = self
            .passes
            .iter()
            .map(|slot| {
                slot.declaration
                    .as_ref()
                    .map(|declaration| (slot.pass.name(), declaration))
                    .ok_or(Error::Uncategorized("Pass was not prepared"))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        FrameGraph::build(passes)
    }

    fn warn_unmatched(&mut self, graph: &FrameGraph) {
        for read in graph.unmatched_reads() {
            if self.warned.insert(*read) {
                warn!(
                    "Pass `{}` reads `{}` at version {}, but no pass produces that version. \
                     Its contents are assumed to be set up outside the frame graph.",
                    graph.pass_name(read.pass).unwrap_or("<unknown>"),
                    self.registry.name(read.resource),
                    read.version
                );
            }
        }
    }

    fn write_parameters(&mut self, inputs: &FrameInputs) -> Result<()> {
        for (name, bytes) in &inputs.parameters {
            let slot = self
                .passes
                .iter_mut()
                .find(|slot| slot.pass.name() == name)
                .ok_or_else(|| Error::UnknownPass(name.clone()))?;
            let block = slot
                .declaration
                .as_ref()
                .and_then(|declaration| declaration.parameter_block().copied())
                .ok_or_else(|| Error::NoParameterBlock(name.clone()))?;
            if bytes.len() > block.size as usize {
                return Err(Error::ParameterBlockOverflow {
                    pass: name.clone(),
                    size: bytes.len(),
                    capacity: block.size,
                }
                .into());
            }
            slot.parameters.fill(0);
            slot.parameters[..bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    fn handle_resize(&mut self, extent: vk::Extent2D) -> Result<()> {
        self.backend.wait_idle()?;
        let actual = self.backend.recreate_surface(extent)?;
        let Self {
            backend,
            registry,
            tracker,
            ..
        } = self;
        let ids = registry.resize(actual, backend)?;
        if !ids.is_empty() {
            backend.immediate_submit(&mut |cmd| tracker.initialize(registry, &ids, cmd))?;
        }
        self.requested_extent = extent;
        self.resize_requested = false;
        Ok(())
    }

    /// Render and present one frame.
    ///
    /// Parameters in `inputs` stay in the parameter blocks until they are supplied again.
    /// # Errors
    /// * Configuration errors, such as a cycle or parameters that do not fit. These are raised before any pass executes.
    /// * [`Error::DeviceTimeout`] if the frame slot or surface image does not become available in time.
    /// * Any error returned by a pass or by the backend.
    pub fn render_frame(&mut self, inputs: &FrameInputs) -> Result<FrameStatus> {
        self.require_state(EngineState::Ready, "Engine must be initialized before rendering")?;
        if self.resize_requested || inputs.surface_extent != self.requested_extent {
            self.handle_resize(inputs.surface_extent)?;
        }

        let graph = self.build_graph()?;
        self.warn_unmatched(&graph);
        self.write_parameters(inputs)?;

        let frame = self.frame_index;
        let timeout = self.settings.timeout;
        self.backend.wait_for_frame(frame, timeout)?;
        let image = match self.backend.acquire_image(frame, timeout)? {
            AcquiredImage::Ready(image) => image,
            AcquiredImage::OutOfDate => {
                warn!("Surface out of date, skipping frame {}", self.frame_count);
                self.resize_requested = true;
                return Ok(FrameStatus::Skipped(SkipReason::SurfaceOutOfDate));
            }
        };

        let mut executed = Vec::with_capacity(graph.schedule().len());
        let mut transitions = 0;
        {
            let Self {
                settings,
                backend,
                registry,
                tracker,
                passes,
                overlay,
                composite,
                ..
            } = self;
            let labels = settings.debug_labels && cfg!(feature = "debug-markers");
            backend.record_frame(frame, &mut |cmd| {
                for &index in graph.schedule() {
                    let slot = &mut passes[index];
                    let declaration = slot
                        .declaration
                        .as_ref()
                        .ok_or(Error::Uncategorized("Pass was not prepared"))?;
                    if labels {
                        cmd.begin_label(slot.pass.name())?;
                    }
                    transitions += tracker.prepare_pass(declaration, registry, frame, cmd)?;
                    let ctx = PassContext::new(registry, frame, &slot.parameters);
                    slot.pass
                        .execute(cmd, &ctx)
                        .with_context(|| format!("Pass `{}` failed", slot.pass.name()))?;
                    if labels {
                        cmd.end_label()?;
                    }
                    executed.push(slot.pass.name().to_owned());
                }
                transitions += composite_frame(tracker, registry, *composite, overlay, &image, frame, cmd)?;
                Ok(())
            })?;
        }

        if self.backend.submit_and_present(frame, &image)? == PresentResult::OutOfDate {
            self.resize_requested = true;
        }
        debug!("Frame {} executed {:?} with {} transition(s)", self.frame_count, executed, transitions);

        self.frame_index = (frame + 1) % self.settings.frames_in_flight;
        self.frame_count += 1;
        Ok(FrameStatus::Presented(FrameReport {
            frame_index: frame,
            executed,
            transitions,
        }))
    }

    /// Wait for the device, destroy every pass and release all resources.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == EngineState::Destroyed {
            return Ok(());
        }
        self.backend.wait_idle()?;
        for slot in &mut self.passes {
            let name = slot.pass.name().to_owned();
            slot.pass
                .destroy()
                .with_context(|| format!("Failed to destroy pass `{}`", name))?;
        }
        self.registry.release_all(&mut self.backend)?;
        self.state = EngineState::Destroyed;
        info!("Shut down `{}` after {} frame(s)", self.settings.name, self.frame_count);
        Ok(())
    }

    /// The resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The settings this engine was created with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Frame in flight slot the next frame will use.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Number of frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether a resize will happen before the next frame.
    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    /// Total number of transitions issued, including initial-state establishment.
    pub fn transitions_issued(&self) -> u64 {
        self.tracker.issued()
    }

    /// Names of all passes, in declaration order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|slot| slot.pass.name()).collect()
    }

    /// The declaration of a pass. Only available after initialization.
    pub fn declaration(&self, pass: &str) -> Option<&DependencyDeclaration> {
        self.passes
            .iter()
            .find(|slot| slot.pass.name() == pass)
            .and_then(|slot| slot.declaration.as_ref())
    }
}
