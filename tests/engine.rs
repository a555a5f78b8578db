use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;

use strata::prelude::*;

mod framework;

use framework::ExecutionLog;

struct Deferred {
    engine: ExecutionEngine<HeadlessBackend>,
    log: ExecutionLog,
    shadow: ResourceId,
    scene: ResourceId,
    final_color: ResourceId,
}

/// Shadow, lighting and tonemap passes, declared out of order.
fn deferred_engine() -> Result<Deferred> {
    let mut engine = framework::make_engine_with_settings(|builder| builder.composite_source("final_color"))?;
    let log = framework::execution_log();
    let shadow = engine.register_resource(
        framework::depth_image("shadow_map").initial_value(InitialValue::DepthStencil {
            depth: 1.0,
            stencil: 0,
        }),
    )?;
    let scene = engine.register_resource(framework::color_image("scene_color"))?;
    let final_color = engine.register_resource(framework::color_image("final_color"))?;

    let tonemap = framework::fullscreen(DependencyBuilder::new())
        .add_image_dependency(scene, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(final_color, Usage::Write, 0, ClearPolicy::DontCare)?
        .build()?;
    let lighting = framework::fullscreen(DependencyBuilder::new())
        .add_image_dependency(shadow, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(scene, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let shadow_pass = DependencyBuilder::new()
        .add_image_dependency(shadow, Usage::Write, 0, ClearPolicy::Clear)?
        .add_shader(ShaderStage::Vertex, "shadow.vert")
        .build()?;

    engine.add_pass(framework::logged_pass("tonemap", tonemap, &log))?;
    engine.add_pass(framework::logged_pass("lighting", lighting, &log))?;
    engine.add_pass(framework::logged_pass("shadow", shadow_pass, &log))?;
    engine.initialize()?;
    Ok(Deferred {
        engine,
        log,
        shadow,
        scene,
        final_color,
    })
}

fn strata_error(err: &anyhow::Error) -> &Error {
    match err.downcast_ref::<Error>() {
        Some(err) => err,
        None => panic!("expected a strata error, got {:?}", err),
    }
}

#[test]
fn passes_execute_in_dependency_order() -> Result<()> {
    let mut d = deferred_engine()?;
    let status = d.engine.render_frame(&framework::frame_inputs())?;

    let report = status.report().unwrap();
    assert_eq!(report.executed, ["shadow", "lighting", "tonemap"]);
    assert_eq!(report.frame_index, 0);
    // Five declared dependencies, then the composite source and three surface transitions
    assert_eq!(report.transitions, 9);
    assert_eq!(*d.log.borrow(), ["shadow", "lighting", "tonemap"]);
    assert_eq!(framework::labels(d.engine.backend().last_frame().unwrap()), ["shadow", "lighting", "tonemap"]);

    assert_eq!(d.engine.registry().version(d.shadow)?, 1);
    assert_eq!(d.engine.registry().version(d.scene)?, 1);
    assert_eq!(d.engine.registry().version(d.final_color)?, 1);
    // Three images were moved out of an undefined layout during initialization
    assert_eq!(d.engine.transitions_issued(), 3 + 9);
    d.engine.shutdown()?;
    Ok(())
}

#[test]
fn versions_grow_by_one_per_frame() -> Result<()> {
    let mut d = deferred_engine()?;
    for frame in 1..=8u32 {
        let status = d.engine.render_frame(&framework::frame_inputs())?;
        assert!(status.is_presented());
        assert_eq!(status.report().unwrap().frame_index, (frame as usize - 1) % 2);
        for id in [d.shadow, d.scene, d.final_color] {
            assert_eq!(d.engine.registry().version(id)?, frame);
        }
    }
    assert_eq!(d.engine.frame_count(), 8);
    assert_eq!(d.engine.backend().presented(), 8);
    assert_eq!(d.log.borrow().len(), 24);
    Ok(())
}

#[test]
fn recorded_frames_are_deterministic() -> Result<()> {
    let mut first = deferred_engine()?;
    let mut second = deferred_engine()?;
    for _ in 0..3 {
        first.engine.render_frame(&framework::frame_inputs())?;
        second.engine.render_frame(&framework::frame_inputs())?;
    }
    assert_eq!(first.engine.backend().frames(), second.engine.backend().frames());
    assert_eq!(
        first.engine.backend().immediate_submissions(),
        second.engine.backend().immediate_submissions()
    );
    Ok(())
}

#[test]
fn transitions_are_recorded_every_frame() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.render_frame(&framework::frame_inputs())?;
    d.engine.render_frame(&framework::frame_inputs())?;

    let frames = d.engine.backend().frames();
    for frame in frames {
        assert_eq!(framework::transitions(frame).len(), 9);
    }
    // The lighting pass of the previous frame left the shadow map in a read-only depth layout
    let shadow = framework::transitions_of(&frames[1], d.shadow);
    assert_eq!(shadow.len(), 2);
    assert_eq!(shadow[0].src.layout, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
    assert_eq!(shadow[0].dst, ResourceState::DEPTH_ATTACHMENT_WRITE);
    assert_eq!(shadow[1].src, ResourceState::DEPTH_ATTACHMENT_WRITE);
    assert_eq!(shadow[1].dst.layout, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
    Ok(())
}

#[test]
fn initial_values_are_cleared_once() -> Result<()> {
    let mut d = deferred_engine()?;
    let immediate = d.engine.backend().immediate_submissions();
    assert_eq!(immediate.len(), 1);
    let clears = immediate[0]
        .iter()
        .filter(|command| matches!(command, RecordedCommand::Clear { .. }))
        .collect::<Vec<_>>();
    assert_eq!(clears.len(), 1);
    assert_eq!(
        *clears[0],
        RecordedCommand::Clear {
            image: d.engine.registry().backing(d.shadow, 0)?,
            value: InitialValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            },
        }
    );

    d.engine.render_frame(&framework::frame_inputs())?;
    let first = framework::transitions_of(d.engine.backend().last_frame().unwrap(), d.shadow);
    assert_eq!(first[0].src, ResourceState::TRANSFER_DST);
    assert_eq!(d.engine.backend().immediate_submissions().len(), 1);
    Ok(())
}

#[test]
fn composite_and_present() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.render_frame(&framework::frame_inputs())?;
    let frame = d.engine.backend().last_frame().unwrap();
    let final_color = d.engine.registry().backing(d.final_color, 0)?;

    let tail = &frame[frame.len() - 5..];
    let RecordedCommand::Transition(source) = &tail[0] else {
        panic!("expected the composite source transition, got {:?}", tail[0]);
    };
    assert_eq!(source.target, TransitionTarget::Resource(d.final_color));
    assert_eq!(source.dst, ResourceState::TRANSFER_SRC);
    assert!(matches!(&tail[2], RecordedCommand::Blit { src, .. } if *src == final_color));

    let surface = framework::surface_transitions(frame);
    let layouts = surface
        .iter()
        .map(|transition| (transition.src.layout, transition.dst.layout))
        .collect::<Vec<_>>();
    assert_eq!(
        layouts,
        [
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR),
        ]
    );
    assert_eq!(d.engine.registry().state(d.final_color)?, ResourceState::TRANSFER_SRC);
    Ok(())
}

#[test]
fn present_without_composite_source() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let color = engine.register_resource(framework::color_image("color"))?;
    engine.add_pass(framework::labelled_pass(
        "draw",
        framework::fullscreen(DependencyBuilder::new())
            .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
            .build()?,
    ))?;
    engine.initialize()?;
    engine.render_frame(&framework::frame_inputs())?;

    let frame = engine.backend().last_frame().unwrap();
    assert!(!frame.iter().any(|command| matches!(command, RecordedCommand::Blit { .. })));
    let layouts = framework::surface_transitions(frame)
        .iter()
        .map(|transition| transition.dst.layout)
        .collect::<Vec<_>>();
    assert_eq!(layouts, [vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR]);
    Ok(())
}

struct CountingOverlay {
    draws: Rc<Cell<u32>>,
}

impl OverlayRenderer for CountingOverlay {
    fn draw(&mut self, cmd: &mut dyn CommandContext, target: &SurfaceImage) -> Result<()> {
        assert!(target.handle.is_image());
        self.draws.set(self.draws.get() + 1);
        cmd.insert_label("overlay")
    }
}

#[test]
fn overlay_draws_after_composite() -> Result<()> {
    let mut d = deferred_engine()?;
    let draws = Rc::new(Cell::new(0));
    d.engine.set_overlay(CountingOverlay {
        draws: draws.clone(),
    });
    d.engine.render_frame(&framework::frame_inputs())?;
    d.engine.render_frame(&framework::frame_inputs())?;
    assert_eq!(draws.get(), 2);

    let frame = d.engine.backend().last_frame().unwrap();
    let overlay = frame
        .iter()
        .position(|command| *command == RecordedCommand::Label("overlay".to_owned()))
        .unwrap();
    let blit = frame
        .iter()
        .position(|command| matches!(command, RecordedCommand::Blit { .. }))
        .unwrap();
    assert!(blit < overlay);
    // Only the present transition follows the overlay
    assert_eq!(overlay, frame.len() - 2);
    Ok(())
}

#[test]
fn independent_passes_run_in_declaration_order() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let log = framework::execution_log();
    let a = engine.register_resource(framework::color_image("a"))?;
    let b = engine.register_resource(framework::color_image("b"))?;
    for (name, resource) in [("x", a), ("y", b)] {
        let declaration = framework::fullscreen(DependencyBuilder::new())
            .add_image_dependency(resource, Usage::Write, 0, ClearPolicy::Clear)?
            .build()?;
        engine.add_pass(framework::logged_pass(name, declaration, &log))?;
    }
    engine.initialize()?;
    engine.render_frame(&framework::frame_inputs())?;
    engine.render_frame(&framework::frame_inputs())?;
    assert_eq!(*log.borrow(), ["x", "y", "x", "y"]);
    Ok(())
}

#[test]
fn read_of_unproduced_version_still_executes() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let log = framework::execution_log();
    let c = engine.register_resource(framework::color_image("c"))?;
    let out = engine.register_resource(framework::color_image("out"))?;
    let declaration = framework::fullscreen(DependencyBuilder::new())
        .add_image_dependency(c, Usage::Read, 2, ClearPolicy::DontCare)?
        .add_image_dependency(out, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    engine.add_pass(framework::logged_pass("z", declaration, &log))?;
    engine.initialize()?;

    assert_eq!(engine.build_graph()?.unmatched_reads().len(), 1);
    for _ in 0..2 {
        assert!(engine.render_frame(&framework::frame_inputs())?.is_presented());
    }
    assert_eq!(*log.borrow(), ["z", "z"]);
    assert_eq!(engine.registry().version(c)?, 0);
    Ok(())
}

#[test]
fn cycle_fails_before_any_pass_executes() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let log = framework::execution_log();
    let x = engine.register_resource(framework::color_image("x"))?;
    let y = engine.register_resource(framework::color_image("y"))?;
    let a = framework::fullscreen(DependencyBuilder::new())
        .add_image_dependency(x, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(y, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    let b = framework::fullscreen(DependencyBuilder::new())
        .add_image_dependency(y, Usage::Read, 1, ClearPolicy::DontCare)?
        .add_image_dependency(x, Usage::Write, 0, ClearPolicy::Clear)?
        .build()?;
    engine.add_pass(framework::logged_pass("a", a, &log))?;
    engine.add_pass(framework::logged_pass("b", b, &log))?;

    let err = engine.initialize().unwrap_err();
    assert!(matches!(strata_error(&err), Error::GraphHasCycle(passes) if passes.len() == 2));
    assert_eq!(engine.state(), EngineState::Setup);
    assert!(engine.render_frame(&framework::frame_inputs()).is_err());
    assert!(log.borrow().is_empty());
    assert_eq!(engine.backend().presented(), 0);
    Ok(())
}

#[test]
fn out_of_date_surface_skips_frame() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.render_frame(&framework::frame_inputs())?;
    d.engine.backend_mut().invalidate_surface();

    let status = d.engine.render_frame(&framework::frame_inputs())?;
    assert_eq!(status, FrameStatus::Skipped(SkipReason::SurfaceOutOfDate));
    assert!(d.engine.resize_requested());
    assert_eq!(d.log.borrow().len(), 3);
    assert_eq!(d.engine.frame_count(), 1);
    assert_eq!(d.engine.registry().version(d.scene)?, 1);

    let status = d.engine.render_frame(&framework::frame_inputs())?;
    assert!(status.is_presented());
    assert!(!d.engine.resize_requested());
    assert_eq!(d.engine.backend().surface_recreations(), 1);
    // Surface-relative images were re-created and their initial state established again
    assert_eq!(d.engine.backend().immediate_submissions().len(), 2);
    // Versions survive the resize
    assert_eq!(d.engine.registry().version(d.scene)?, 2);
    Ok(())
}

#[test]
fn window_resize_recreates_relative_images() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.render_frame(&framework::frame_inputs())?;
    let shadow_before = d.engine.registry().backing(d.shadow, 0)?;
    d.engine.backend_mut().resize_window(128, 96);

    let status = d.engine.render_frame(&framework::frame_inputs())?;
    assert!(!status.is_presented());

    let resized = FrameInputs::new(framework::extent(128, 96));
    assert!(d.engine.render_frame(&resized)?.is_presented());
    assert_eq!(d.engine.backend().surface_extent(), framework::extent(128, 96));
    assert_eq!(d.engine.registry().surface_extent(), framework::extent(128, 96));
    let scene = d.engine.registry().extent(d.scene)?;
    assert_eq!((scene.width, scene.height), (128, 96));
    // Fixed size images are kept
    assert_eq!(d.engine.registry().backing(d.shadow, 0)?, shadow_before);
    assert_eq!(d.engine.registry().extent(d.shadow)?.width, 256);

    // Same extent again, no further resize
    d.engine.render_frame(&resized)?;
    assert_eq!(d.engine.backend().surface_recreations(), 1);
    Ok(())
}

#[test]
fn out_of_date_on_present_resizes_next_frame() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.backend_mut().invalidate_on_present();
    let status = d.engine.render_frame(&framework::frame_inputs())?;
    assert!(status.is_presented());
    assert!(d.engine.resize_requested());

    d.engine.render_frame(&framework::frame_inputs())?;
    assert_eq!(d.engine.backend().surface_recreations(), 1);
    assert!(!d.engine.resize_requested());
    Ok(())
}

#[test]
fn device_timeout_is_fatal() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.backend_mut().stall_device();
    let err = d.engine.render_frame(&framework::frame_inputs()).unwrap_err();
    assert!(matches!(strata_error(&err), Error::DeviceTimeout));
    assert!(strata_error(&err).is_device_error());
    assert!(d.log.borrow().is_empty());
    Ok(())
}

#[test]
fn parameters_reach_the_pass() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let color = engine.register_resource(framework::color_image("color"))?;
    let seen = Rc::new(RefCell::new(Vec::<[f32; 4]>::new()));
    let declaration = framework::fullscreen(DependencyBuilder::new())
        .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
        .set_parameter_block(16, vk::ShaderStageFlags::FRAGMENT)?
        .build()?;
    let sink = seen.clone();
    engine.add_pass(FnPass::new("exposure", declaration, move |_cmd, ctx| {
        assert_eq!(ctx.parameters().len(), 16);
        sink.borrow_mut().push(ctx.parameters_as::<[f32; 4]>().unwrap_or_default());
        Ok(())
    }))?;
    engine.add_pass(FnPass::empty("untouched", DependencyDeclaration::empty()))?;
    engine.initialize()?;

    // Zero-filled until something is supplied
    engine.render_frame(&framework::frame_inputs())?;
    engine.render_frame(&framework::frame_inputs().with_pod("exposure", &[1.0f32, 2.0, 3.0, 4.0]))?;
    // Kept until replaced
    engine.render_frame(&framework::frame_inputs())?;
    // Shorter parameters are zero extended
    engine.render_frame(&framework::frame_inputs().with_pod("exposure", &0.5f32))?;
    assert_eq!(
        *seen.borrow(),
        [
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 2.0, 3.0, 4.0],
            [1.0, 2.0, 3.0, 4.0],
            [0.5, 0.0, 0.0, 0.0]
        ]
    );

    let err = engine
        .render_frame(&framework::frame_inputs().with_parameters("exposure", vec![0u8; 20]))
        .unwrap_err();
    assert!(matches!(
        strata_error(&err),
        Error::ParameterBlockOverflow {
            size: 20,
            capacity: 16,
            ..
        }
    ));
    let err = engine
        .render_frame(&framework::frame_inputs().with_parameters("missing", vec![0u8; 4]))
        .unwrap_err();
    assert!(matches!(strata_error(&err), Error::UnknownPass(name) if name == "missing"));
    let err = engine
        .render_frame(&framework::frame_inputs().with_parameters("untouched", vec![0u8; 4]))
        .unwrap_err();
    assert!(matches!(strata_error(&err), Error::NoParameterBlock(_)));
    // Nothing executed for the rejected frames
    assert_eq!(seen.borrow().len(), 4);
    assert_eq!(engine.frame_count(), 4);
    Ok(())
}

#[test]
fn per_frame_buffers_rotate() -> Result<()> {
    let mut engine = framework::make_engine_with_settings(|builder| builder.frames_in_flight(3))?;
    let camera = engine.register_resource(
        ResourceDescriptor::buffer("camera", 256, vk::BufferUsageFlags::UNIFORM_BUFFER).per_frame(),
    )?;
    let handles = Rc::new(RefCell::new(Vec::new()));
    let sink = handles.clone();
    engine.add_pass(FnPass::new(
        "upload",
        DependencyBuilder::new().add_buffer_dependency(camera, Usage::Write, 0)?.build()?,
        move |_cmd, ctx| {
            sink.borrow_mut().push(ctx.backing(camera)?);
            Ok(())
        },
    ))?;
    engine.initialize()?;
    for _ in 0..4 {
        engine.render_frame(&framework::frame_inputs())?;
    }

    let handles = handles.borrow();
    assert_eq!(handles.len(), 4);
    assert_ne!(handles[0], handles[1]);
    assert_ne!(handles[1], handles[2]);
    assert_eq!(handles[3], handles[0]);
    for (frame, handle) in handles.iter().enumerate() {
        assert_eq!(*handle, engine.registry().backing(camera, frame)?);
    }
    Ok(())
}

#[cfg(feature = "debug-markers")]
#[test]
fn debug_labels_wrap_passes() -> Result<()> {
    let mut engine = framework::make_engine_with_settings(|builder| builder.debug_labels(true))?;
    engine.add_pass(framework::labelled_pass("first", DependencyDeclaration::empty()))?;
    engine.initialize()?;
    engine.render_frame(&framework::frame_inputs())?;

    let frame = engine.backend().last_frame().unwrap();
    assert_eq!(frame[0], RecordedCommand::BeginLabel("first".to_owned()));
    assert_eq!(frame[1], RecordedCommand::Label("first".to_owned()));
    assert_eq!(frame[2], RecordedCommand::EndLabel);
    Ok(())
}

/// A pass with its own state, that finds its resources by name while preparing.
struct Blur {
    target: Option<ResourceId>,
    destroyed: Rc<Cell<bool>>,
}

impl RenderPass for Blur {
    fn name(&self) -> &str {
        "blur"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<DependencyDeclaration> {
        let target = ctx.resource("bloom")?;
        self.target = Some(target);
        ctx.builder()
            .add_image_dependency(target, Usage::Combined, ctx.version(target)?, ClearPolicy::DontCare)?
            .add_shader(ShaderStage::Compute, "blur.comp")
            .build()
    }

    fn execute(&mut self, cmd: &mut dyn CommandContext, ctx: &PassContext) -> Result<()> {
        let target = self.target.ok_or(Error::Uncategorized("blur was not prepared"))?;
        assert_eq!(ctx.extent(target)?.width, framework::WIDTH / 2);
        cmd.insert_label("blur")
    }

    fn destroy(&mut self) -> Result<()> {
        self.destroyed.set(true);
        Ok(())
    }
}

#[test]
fn custom_pass_lifecycle() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let bloom = engine.register_resource(ResourceDescriptor::image("bloom", vk::Format::R16G16B16A16_SFLOAT).relative(0.5))?;
    let destroyed = Rc::new(Cell::new(false));
    engine.add_pass(Blur {
        target: None,
        destroyed: destroyed.clone(),
    })?;
    engine.initialize()?;
    assert!(engine.declaration("blur").unwrap().is_compute());

    engine.render_frame(&framework::frame_inputs())?;
    let transition = framework::transitions_of(engine.backend().last_frame().unwrap(), bloom)[0];
    assert_eq!(transition.dst.layout, vk::ImageLayout::GENERAL);
    assert_eq!(engine.registry().version(bloom)?, 1);

    engine.shutdown()?;
    assert!(destroyed.get());
    Ok(())
}

#[test]
fn shutdown_releases_everything() -> Result<()> {
    let mut d = deferred_engine()?;
    d.engine.render_frame(&framework::frame_inputs())?;
    assert_eq!(d.engine.backend().live_allocations(), 3);
    d.engine.shutdown()?;
    assert_eq!(d.engine.backend().live_allocations(), 0);
    assert_eq!(d.engine.state(), EngineState::Destroyed);
    assert!(d.engine.render_frame(&framework::frame_inputs()).is_err());
    // Shutting down twice is harmless
    d.engine.shutdown()?;
    Ok(())
}

#[test]
fn setup_errors() -> Result<()> {
    let settings = EngineBuilder::new().frames_in_flight(0).build();
    assert!(ExecutionEngine::new(settings, HeadlessBackend::new(framework::extent(8, 8))).is_err());

    let mut engine = framework::make_engine()?;
    engine.add_pass(FnPass::empty("pass", DependencyDeclaration::empty()))?;
    let err = engine.add_pass(FnPass::empty("pass", DependencyDeclaration::empty())).unwrap_err();
    assert!(matches!(strata_error(&err), Error::DuplicatePass(name) if name == "pass"));

    let buffer = engine.register_resource(ResourceDescriptor::buffer("buffer", 64, vk::BufferUsageFlags::UNIFORM_BUFFER))?;
    let err = engine.set_composite_source(buffer).unwrap_err();
    assert!(matches!(strata_error(&err), Error::ResourceKindMismatch { .. }));

    engine.initialize()?;
    assert!(engine.register_resource(framework::color_image("late")).is_err());
    assert!(engine
        .add_pass(FnPass::empty("late", DependencyDeclaration::empty()))
        .is_err());
    assert!(engine.initialize().is_err());

    let mut engine = framework::make_engine_with_settings(|builder| builder.composite_source("missing"))?;
    let err = engine.initialize().unwrap_err();
    assert!(matches!(strata_error(&err), Error::UnknownResource(name) if name == "missing"));
    Ok(())
}

#[test]
fn invalid_declaration_names_the_pass() -> Result<()> {
    let mut engine = framework::make_engine()?;
    let color = engine.register_resource(framework::color_image("color"))?;
    engine.add_pass(FnPass::empty(
        "broken",
        DependencyBuilder::new()
            .add_image_dependency(color, Usage::DepthStencilRead, 0, ClearPolicy::DontCare)?
            .build()?,
    ))?;
    let err = engine.initialize().unwrap_err();
    assert!(format!("{:#}", err).contains("broken"));
    assert!(matches!(strata_error(&err), Error::InvalidUsage { .. }));
    assert!(strata_error(&err).is_configuration_error());
    Ok(())
}

#[test]
fn headless_history_is_bounded() -> Result<()> {
    framework::init_logging();
    let settings = EngineBuilder::new()
        .frames_in_flight(2)
        .surface_extent(framework::WIDTH, framework::HEIGHT)
        .build();
    let backend = HeadlessBackend::new(settings.surface_extent).with_history(4);
    let mut engine = ExecutionEngine::new(settings, backend)?;
    let color = engine.register_resource(framework::color_image("color"))?;
    engine.add_pass(FnPass::empty(
        "draw",
        framework::fullscreen(DependencyBuilder::new())
            .add_image_dependency(color, Usage::Write, 0, ClearPolicy::Clear)?
            .build()?,
    ))?;
    engine.initialize()?;
    for _ in 0..40 {
        engine.render_frame(&framework::frame_inputs())?;
    }
    assert_eq!(engine.backend().presented(), 40);
    assert_eq!(engine.backend().frames().len(), 4);
    assert_eq!(engine.registry().version(color)?, 40);

    engine.backend_mut().clear_history();
    assert!(engine.backend().frames().is_empty());
    assert!(engine.backend().immediate_submissions().is_empty());
    assert!(engine.backend().last_frame().is_none());
    Ok(())
}
