#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use strata::prelude::*;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D {
        width,
        height,
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// Creates an engine on a headless backend, ready for automated tests
pub fn make_engine() -> Result<ExecutionEngine<HeadlessBackend>> {
    make_engine_with_settings(|builder| builder)
}

pub fn make_engine_with_settings<F: FnOnce(EngineBuilder) -> EngineBuilder>(callback: F) -> Result<ExecutionEngine<HeadlessBackend>> {
    init_logging();
    let builder = EngineBuilder::new()
        .name("strata test framework")
        .frames_in_flight(2)
        .surface_extent(WIDTH, HEIGHT);
    let settings = callback(builder).build();
    let backend = HeadlessBackend::new(settings.surface_extent);
    ExecutionEngine::new(settings, backend)
}

/// Shared log of pass executions, in execution order.
pub type ExecutionLog = Rc<RefCell<Vec<String>>>;

pub fn execution_log() -> ExecutionLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// A pass that inserts a label with its own name and appends it to `log` when it executes.
pub fn logged_pass(name: &str, declaration: DependencyDeclaration, log: &ExecutionLog) -> impl RenderPass {
    let label = name.to_owned();
    let log = log.clone();
    FnPass::new(name, declaration, move |cmd, _ctx| {
        log.borrow_mut().push(label.clone());
        cmd.insert_label(&label)
    })
}

/// A pass that inserts a label with its own name when it executes.
pub fn labelled_pass(name: &str, declaration: DependencyDeclaration) -> impl RenderPass {
    let label = name.to_owned();
    FnPass::new(name, declaration, move |cmd, _ctx| cmd.insert_label(&label))
}

pub fn color_image(name: &str) -> ResourceDescriptor {
    ResourceDescriptor::image(name, vk::Format::R8G8B8A8_UNORM).relative(1.0)
}

pub fn depth_image(name: &str) -> ResourceDescriptor {
    ResourceDescriptor::image(name, vk::Format::D32_SFLOAT).depth().fixed(256, 256)
}

pub fn fullscreen(builder: DependencyBuilder) -> DependencyBuilder {
    builder
        .add_shader(ShaderStage::Vertex, "fullscreen.vert")
        .add_shader(ShaderStage::Fragment, "fullscreen.frag")
}

/// Labels inserted by passes, in recording order.
pub fn labels(commands: &[RecordedCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::Label(label) => Some(label.clone()),
            _ => None,
        })
        .collect()
}

pub fn transitions(commands: &[RecordedCommand]) -> Vec<Transition> {
    commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::Transition(transition) => Some(*transition),
            _ => None,
        })
        .collect()
}

/// Transitions of a single registry resource.
pub fn transitions_of(commands: &[RecordedCommand], id: ResourceId) -> Vec<Transition> {
    transitions(commands)
        .into_iter()
        .filter(|transition| transition.target == TransitionTarget::Resource(id))
        .collect()
}

pub fn surface_transitions(commands: &[RecordedCommand]) -> Vec<Transition> {
    transitions(commands)
        .into_iter()
        .filter(|transition| matches!(transition.target, TransitionTarget::Surface(_)))
        .collect()
}

pub fn frame_inputs() -> FrameInputs {
    FrameInputs::new(extent(WIDTH, HEIGHT))
}
